//! Core Data Models
//!
//! This module defines the records shared by every stage of the footprint engine, from the
//! raw exchange log to the aggregated totals shown to the user.
//!
//! ## Data Flow
//!
//! 1. **Raw Data**: [`Exchange`] - One recorded prompt/response pair as persisted by the capture layer
//! 2. **Aggregation**: [`DailyBucket`] - Per-day energy sums used for charting and forecasting
//! 3. **Totals**: [`AggregateTotals`] - Running totals, either freshly computed or read from the cache
//! 4. **Reference Data**: [`ReferenceTier`] - Static monthly-kWh brackets for user-facing comparison
//!
//! ## Resilience
//!
//! Stored records come from several write paths and are not always well formed. Numeric
//! fields are decoded leniently: token counts that are missing, negative, non-numeric or
//! non-finite become zero, and energy/CO₂ values that cannot be read become absent. A bad
//! field never causes the surrounding record to be rejected.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

/// Chat platform an exchange was captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Chatgpt,
    Claude,
    Gemini,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Timestamp exactly as it was stored, before normalization.
///
/// Capture paths have written epoch millis as numbers, as numeric strings and occasionally
/// not at all, so the raw shape is kept until [`crate::timestamp_parser::TimestampParser`]
/// resolves it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawTimestamp {
    #[default]
    Missing,
    Millis(f64),
    Text(String),
}

impl RawTimestamp {
    /// Epoch millis when the stored value is directly numeric, without any fallback.
    pub fn as_millis(&self) -> Option<i64> {
        let value = match self {
            RawTimestamp::Missing => return None,
            RawTimestamp::Millis(ms) => *ms,
            RawTimestamp::Text(text) => text.trim().parse::<f64>().ok()?,
        };
        if value.is_finite() && value > 0.0 {
            Some(value as i64)
        } else {
            None
        }
    }
}

impl Serialize for RawTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RawTimestamp::Missing => serializer.serialize_none(),
            RawTimestamp::Millis(ms) if ms.fract() == 0.0 && ms.abs() < i64::MAX as f64 => {
                serializer.serialize_i64(*ms as i64)
            }
            RawTimestamp::Millis(ms) => serializer.serialize_f64(*ms),
            RawTimestamp::Text(text) => serializer.serialize_str(text),
        }
    }
}

impl<'de> Deserialize<'de> for RawTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_f64().map(RawTimestamp::Millis).unwrap_or_default(),
            Value::String(s) => RawTimestamp::Text(s),
            _ => RawTimestamp::Missing,
        })
    }
}

/// One recorded prompt/response interaction with an LLM.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Exchange {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: RawTimestamp,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default, deserialize_with = "lenient_model")]
    pub model: String,
    #[serde(
        rename = "promptTokens",
        alias = "prompt_token_length",
        default,
        deserialize_with = "lenient_count"
    )]
    pub prompt_tokens: u64,
    #[serde(
        rename = "responseTokens",
        alias = "response_token_length",
        default,
        deserialize_with = "lenient_count"
    )]
    pub response_tokens: u64,
    #[serde(
        rename = "energyJoules",
        alias = "energy_consumption_llm_total",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_measure"
    )]
    pub energy_joules: Option<f64>,
    #[serde(
        rename = "co2Grams",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_measure"
    )]
    pub co2_grams: Option<f64>,
}

impl Exchange {
    pub fn new(model: impl Into<String>, prompt_tokens: u64, response_tokens: u64) -> Self {
        Self {
            model: model.into(),
            prompt_tokens,
            response_tokens,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn at(mut self, millis: i64) -> Self {
        self.timestamp = RawTimestamp::Millis(millis as f64);
        self
    }

    pub fn on(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_energy(mut self, joules: f64) -> Self {
        self.energy_joules = Some(joules);
        self
    }

    pub fn with_co2(mut self, grams: f64) -> Self {
        self.co2_grams = Some(grams);
        self
    }

    /// Give the exchange a stable identifier if the capture path did not assign one.
    ///
    /// Identifiers make "already counted" checks exact; records without one fall back to
    /// the tolerant match in [`crate::reconcile`].
    pub fn assign_id_if_missing(&mut self) -> &str {
        if self.id.as_deref().map_or(true, str::is_empty) {
            self.id = Some(Uuid::new_v4().to_string());
        }
        self.id.as_deref().unwrap_or_default()
    }

    pub fn has_tokens(&self) -> bool {
        self.prompt_tokens > 0 || self.response_tokens > 0
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens.saturating_add(self.response_tokens)
    }

    /// Stored timestamp as epoch millis when it is present and numeric.
    pub fn raw_timestamp_millis(&self) -> Option<i64> {
        self.timestamp.as_millis()
    }
}

/// Running totals over a set of exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateTotals {
    #[serde(default, deserialize_with = "lenient_count")]
    pub requests: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub prompt_tokens: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub response_tokens: u64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub energy_joules: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub co2_grams: f64,
}

impl AggregateTotals {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens.saturating_add(self.response_tokens)
    }

    /// True when at least one counter carries data.
    pub fn has_any_value(&self) -> bool {
        self.requests > 0
            || self.prompt_tokens > 0
            || self.response_tokens > 0
            || self.energy_joules > 0.0
            || self.co2_grams > 0.0
    }

    pub fn absorb(&mut self, exchange: &Exchange, energy_joules: f64, co2_grams: f64) {
        self.requests += 1;
        self.prompt_tokens = self.prompt_tokens.saturating_add(exchange.prompt_tokens);
        self.response_tokens = self.response_tokens.saturating_add(exchange.response_tokens);
        self.energy_joules += energy_joules;
        self.co2_grams += co2_grams;
    }
}

/// Energy used on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyBucket {
    pub date: NaiveDate,
    pub energy_kwh: f64,
    pub exchanges: u64,
}

impl DailyBucket {
    pub fn key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// A named reference bracket of monthly energy consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceTier {
    pub key: String,
    pub name: String,
    #[serde(rename = "monthly_kWh", alias = "monthlyKwh")]
    pub monthly_kwh: f64,
    pub description: String,
    pub color: String,
}

/// Read a count, mapping anything unreadable to zero.
pub fn coerce_count(value: &Value) -> u64 {
    coerce_number(value)
        .filter(|n| *n >= 0.0)
        .map(|n| n.trunc().min(u64::MAX as f64) as u64)
        .unwrap_or(0)
}

/// Read a non-negative measurement, mapping anything unreadable to `None`.
pub fn coerce_measure(value: &Value) -> Option<f64> {
    coerce_number(value).filter(|n| *n >= 0.0)
}

fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(coerce_count(&Value::deserialize(deserializer)?))
}

fn lenient_measure<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(coerce_measure(&Value::deserialize(deserializer)?))
}

fn lenient_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(coerce_measure(&Value::deserialize(deserializer)?).unwrap_or(0.0))
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_model<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}
