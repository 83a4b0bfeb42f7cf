use crate::models::{Exchange, RawTimestamp};
use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resolves the timestamps found in stored exchanges
pub struct TimestampParser;

impl TimestampParser {
    /// Parse an ISO 8601 timestamp string into a DateTime<Utc>
    /// Handles both Z suffix and timezone info formats
    pub fn parse(timestamp_str: &str) -> Result<DateTime<Utc>> {
        let timestamp = if timestamp_str.ends_with('Z') {
            timestamp_str.replace('Z', "+00:00")
        } else {
            timestamp_str.to_string()
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(&timestamp) {
            return Ok(dt.with_timezone(&Utc));
        }

        // Try parsing as naive datetime and assume UTC
        if let Ok(naive) = NaiveDateTime::parse_from_str(&timestamp, "%Y-%m-%dT%H:%M:%S%.f") {
            return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
        }

        anyhow::bail!("Failed to parse timestamp: {}", timestamp_str)
    }

    /// Resolve the epoch millis of an exchange.
    ///
    /// Numeric values are used as-is, numeric or ISO strings are parsed, and otherwise the
    /// millis embedded after the first `-` of the identifier are tried. Anything that still
    /// does not yield a positive finite instant becomes `now_ms`, so ordering and day
    /// bucketing always receive a value.
    pub fn normalize(exchange: &Exchange, now_ms: i64) -> i64 {
        let stored = match &exchange.timestamp {
            RawTimestamp::Millis(ms) => Some(*ms),
            RawTimestamp::Text(text) => Self::millis_from_text(text),
            RawTimestamp::Missing => None,
        };

        let resolved = stored
            .filter(|ms| is_usable(*ms))
            .or_else(|| exchange.id.as_deref().and_then(Self::millis_from_id))
            .filter(|ms| is_usable(*ms));

        match resolved {
            Some(ms) => ms as i64,
            None => {
                tracing::debug!(
                    id = ?exchange.id,
                    timestamp = ?exchange.timestamp,
                    "Unusable timestamp, substituting current instant"
                );
                now_ms
            }
        }
    }

    /// Millis from a numeric string, falling back to ISO 8601.
    pub fn millis_from_text(text: &str) -> Option<f64> {
        let trimmed = text.trim();
        if let Ok(ms) = trimmed.parse::<f64>() {
            return Some(ms);
        }
        Self::parse(trimmed)
            .ok()
            .map(|dt| dt.timestamp_millis() as f64)
    }

    /// Millis encoded in identifiers shaped like `exchange-1700000000000-abc`.
    pub fn millis_from_id(id: &str) -> Option<f64> {
        let segment = id.split('-').nth(1)?;
        let digits: String = segment.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }
        digits.parse::<f64>().ok()
    }
}

fn is_usable(ms: f64) -> bool {
    ms.is_finite() && ms > 0.0 && ms < i64::MAX as f64
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Which calendar is used to cut exchanges into days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayBoundary {
    #[default]
    Local,
    Utc,
}

impl DayBoundary {
    pub fn day_of(&self, millis: i64) -> NaiveDate {
        let instant = DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_else(Utc::now);
        match self {
            DayBoundary::Utc => instant.date_naive(),
            DayBoundary::Local => instant.with_timezone(&Local).date_naive(),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.day_of(now_millis())
    }
}

impl FromStr for DayBoundary {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(DayBoundary::Local),
            "utc" => Ok(DayBoundary::Utc),
            other => anyhow::bail!("Unknown day boundary '{}', expected 'local' or 'utc'", other),
        }
    }
}

impl fmt::Display for DayBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayBoundary::Local => write!(f, "local"),
            DayBoundary::Utc => write!(f, "utc"),
        }
    }
}
