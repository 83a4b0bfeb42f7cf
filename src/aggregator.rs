//! Daily Aggregation
//!
//! Groups the exchange log into calendar days and derives the consumption figures that the
//! forecaster and the tier comparison work from.
//!
//! ## Processing Rules
//!
//! - Every timestamp goes through [`TimestampParser::normalize`], so entries with lost or
//!   garbled timestamps land on "today" instead of breaking ordering
//! - Energy per entry comes from [`EnergyEstimator`], measured when available and
//!   estimated otherwise, so charts and totals agree on every exchange
//! - Buckets are returned in ascending date order; nothing is promised about entries
//!   within a day since they are summed
//!
//! ## Key Types
//!
//! - [`DailyAggregator`] - Day bucketing, usage projection and recent-activity views
//! - [`UsageProjection`] - Monthly and annual extrapolation of observed usage
//! - [`RecentExchange`] - One exchange with its resolved timestamp, energy and CO₂

use crate::carbon::{joules_to_kwh, CarbonConverter};
use crate::energy::EnergyEstimator;
use crate::models::{DailyBucket, Exchange};
use crate::timestamp_parser::{DayBoundary, TimestampParser};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

const MILLIS_PER_DAY: f64 = 1000.0 * 60.0 * 60.0 * 24.0;
pub const DAYS_PER_MONTH: f64 = 30.0;
pub const MONTHS_PER_YEAR: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageProjection {
    pub total_kwh: f64,
    /// Days between the oldest and newest exchange, at least one
    pub span_days: f64,
    pub monthly_kwh: f64,
    pub annual_kwh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentExchange {
    pub exchange: Exchange,
    pub timestamp_ms: i64,
    pub energy_joules: f64,
    pub co2_grams: f64,
}

#[derive(Debug, Clone, Default)]
pub struct DailyAggregator {
    estimator: EnergyEstimator,
    boundary: DayBoundary,
}

impl DailyAggregator {
    pub fn new(estimator: EnergyEstimator, boundary: DayBoundary) -> Self {
        Self {
            estimator,
            boundary,
        }
    }

    pub fn boundary(&self) -> DayBoundary {
        self.boundary
    }

    pub fn aggregate_by_day(&self, exchanges: &[Exchange], now_ms: i64) -> Vec<DailyBucket> {
        let mut by_day: BTreeMap<NaiveDate, (f64, u64)> = BTreeMap::new();

        for exchange in exchanges {
            let timestamp = TimestampParser::normalize(exchange, now_ms);
            let day = self.boundary.day_of(timestamp);
            let energy = self.estimator.estimate_exchange(exchange);

            let (joules, count) = by_day.entry(day).or_insert((0.0, 0));
            *joules += energy;
            *count += 1;
        }

        tracing::debug!(
            exchanges = exchanges.len(),
            days = by_day.len(),
            boundary = %self.boundary,
            "Aggregated exchanges by day"
        );

        by_day
            .into_iter()
            .map(|(date, (joules, exchanges))| DailyBucket {
                date,
                energy_kwh: joules_to_kwh(joules),
                exchanges,
            })
            .collect()
    }

    /// Extrapolate observed usage to a 30-day month and a 12-month year.
    pub fn project_usage(&self, exchanges: &[Exchange], now_ms: i64) -> UsageProjection {
        let total_joules: f64 = exchanges
            .iter()
            .map(|exchange| self.estimator.estimate_exchange(exchange))
            .sum();
        let total_kwh = joules_to_kwh(total_joules);

        let timestamps = exchanges
            .iter()
            .map(|exchange| TimestampParser::normalize(exchange, now_ms));
        let span_ms = match (timestamps.clone().min(), timestamps.max()) {
            (Some(oldest), Some(newest)) => (newest - oldest) as f64,
            _ => 0.0,
        };
        let span_days = (span_ms / MILLIS_PER_DAY).max(1.0);

        let monthly_kwh = total_kwh / span_days * DAYS_PER_MONTH;
        UsageProjection {
            total_kwh,
            span_days,
            monthly_kwh,
            annual_kwh: monthly_kwh * MONTHS_PER_YEAR,
        }
    }

    /// The `limit` most recent exchanges, newest first.
    pub fn most_recent(
        &self,
        exchanges: &[Exchange],
        limit: usize,
        converter: &CarbonConverter,
        now_ms: i64,
    ) -> Vec<RecentExchange> {
        let mut resolved: Vec<RecentExchange> = exchanges
            .iter()
            .map(|exchange| {
                let energy_joules = self.estimator.estimate_exchange(exchange);
                RecentExchange {
                    exchange: exchange.clone(),
                    timestamp_ms: TimestampParser::normalize(exchange, now_ms),
                    energy_joules,
                    co2_grams: converter.grams_for_joules(energy_joules),
                }
            })
            .collect();

        resolved.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        resolved.truncate(limit);
        resolved
    }
}
