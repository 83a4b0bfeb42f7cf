//! Trend Forecasting
//!
//! Projects daily energy use forward from the historical [`DailyBucket`] series using a
//! split-half linear trend plus bounded stochastic jitter, and wraps the result in a
//! confidence band.
//!
//! ## Algorithm
//!
//! 1. Mean and sample standard deviation of the daily kWh values; with fewer than two days
//!    the deviation is approximated as 30% of the mean
//! 2. Trend per day: `(mean(second half) - mean(first half)) / len(first half)`, zero with
//!    fewer than two days
//! 3. Starting from the anchor (the historical mean by default), each simulated day adds
//!    `trend * multiplier` and a jitter of `(u1 + u2 + u3 + u4 - 2) / 2` scaled by
//!    `std_dev * volatility`, clamped at zero
//! 4. The band is `central ± 1.28 * std_dev * volatility` (80% two-sided), with the lower
//!    edge clamped at zero
//!
//! Jitter comes from a [`RandomSource`], so tests can pin it to exact values.
//!
//! ## Scenarios
//!
//! | Key | Multiplier | Volatility |
//! |-----|------------|------------|
//! | conservative | 0.8 | 0.15 |
//! | normal | 1.0 | 0.25 |
//! | intensive | 1.5 | 0.35 |

use crate::models::DailyBucket;
use anyhow::Result;
use chrono::{Datelike, Duration, Months, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// z-score of an 80% two-sided Gaussian interval.
pub const BAND_Z_SCORE: f64 = 1.28;
/// Deviation used when there is too little history to measure one, as a share of the mean.
pub const SPARSE_STD_DEV_RATIO: f64 = 0.3;
pub const DEFAULT_HORIZON_DAYS: usize = 30;
pub const LONG_TERM_MONTHS: u32 = 12;

/// Uniform samples in `[0, 1)` for forecast jitter.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;
}

/// Adapter for any `rand` generator.
pub struct RngSource<R>(pub R);

impl<R: Rng> RandomSource for RngSource<R> {
    fn next_unit(&mut self) -> f64 {
        self.0.gen::<f64>()
    }
}

pub fn thread_source() -> RngSource<rand::rngs::ThreadRng> {
    RngSource(rand::thread_rng())
}

/// Always returns the same value; `0.5` yields zero jitter.
pub struct ConstantSource(pub f64);

impl RandomSource for ConstantSource {
    fn next_unit(&mut self) -> f64 {
        self.0
    }
}

/// Replays a fixed sequence, cycling when exhausted.
pub struct SequenceSource {
    values: Vec<f64>,
    position: usize,
}

impl SequenceSource {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            position: 0,
        }
    }
}

impl RandomSource for SequenceSource {
    fn next_unit(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.5;
        }
        let value = self.values[self.position % self.values.len()];
        self.position += 1;
        value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioKey {
    Conservative,
    #[default]
    Normal,
    Intensive,
}

impl ScenarioKey {
    pub const ALL: [ScenarioKey; 3] = [
        ScenarioKey::Conservative,
        ScenarioKey::Normal,
        ScenarioKey::Intensive,
    ];

    /// Parse a key, falling back to `normal` for anything unknown.
    pub fn from_key_or_default(key: &str) -> Self {
        key.parse().unwrap_or_else(|_| {
            tracing::warn!(scenario = key, "Unknown forecast scenario, using normal");
            ScenarioKey::Normal
        })
    }

    pub fn scenario(&self) -> ForecastScenario {
        match self {
            ScenarioKey::Conservative => ForecastScenario {
                key: *self,
                multiplier: 0.8,
                volatility: 0.15,
                label: "Moderate project",
            },
            ScenarioKey::Normal => ForecastScenario {
                key: *self,
                multiplier: 1.0,
                volatility: 0.25,
                label: "Normal project",
            },
            ScenarioKey::Intensive => ForecastScenario {
                key: *self,
                multiplier: 1.5,
                volatility: 0.35,
                label: "Intensive project",
            },
        }
    }
}

impl FromStr for ScenarioKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(ScenarioKey::Conservative),
            "normal" => Ok(ScenarioKey::Normal),
            "intensive" => Ok(ScenarioKey::Intensive),
            other => anyhow::bail!("Unknown forecast scenario: {}", other),
        }
    }
}

impl fmt::Display for ScenarioKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self {
            ScenarioKey::Conservative => "conservative",
            ScenarioKey::Normal => "normal",
            ScenarioKey::Intensive => "intensive",
        };
        write!(f, "{}", key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastScenario {
    pub key: ScenarioKey,
    /// Trend amplification
    pub multiplier: f64,
    /// Share of the historical deviation used as noise scale
    pub volatility: f64,
    pub label: &'static str,
}

/// Where the simulated walk starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastAnchor {
    #[default]
    Mean,
    #[serde(alias = "last")]
    LastObserved,
}

impl FromStr for ForecastAnchor {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(ForecastAnchor::Mean),
            "last" | "lastobserved" | "last_observed" => Ok(ForecastAnchor::LastObserved),
            other => anyhow::bail!("Unknown forecast anchor: {}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesStats {
    pub mean: f64,
    pub std_dev: f64,
    pub trend_per_day: f64,
}

impl SeriesStats {
    pub fn from_values(values: &[f64]) -> Self {
        let n = values.len();
        let mean = mean_of(values);

        let std_dev = if n > 1 {
            let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (squares / (n - 1) as f64).sqrt()
        } else {
            mean * SPARSE_STD_DEV_RATIO
        };

        let trend_per_day = if n >= 2 {
            let (first, second) = values.split_at(n / 2);
            (mean_of(second) - mean_of(first)) / first.len() as f64
        } else {
            0.0
        };

        Self {
            mean: finite_or_zero(mean),
            std_dev: finite_or_zero(std_dev).max(0.0),
            trend_per_day: finite_or_zero(trend_per_day),
        }
    }
}

fn mean_of(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Historical series followed by the synthetic forecast.
///
/// History occupies indices `0..boundary()` of the combined view and the forecast the
/// rest, so a chart can draw the split without recomputing anything.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastBundle {
    pub scenario: ForecastScenario,
    pub stats: SeriesStats,
    pub history_labels: Vec<String>,
    pub history: Vec<f64>,
    pub labels: Vec<String>,
    pub central: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPoint {
    pub label: String,
    pub historical: Option<f64>,
    pub central: Option<f64>,
    pub upper: Option<f64>,
    pub lower: Option<f64>,
}

impl ForecastBundle {
    /// Index of the first forecast point in the combined view.
    pub fn boundary(&self) -> usize {
        self.history.len()
    }

    pub fn horizon(&self) -> usize {
        self.central.len()
    }

    pub fn combined(&self) -> Vec<ForecastPoint> {
        let history = self
            .history_labels
            .iter()
            .zip(&self.history)
            .map(|(label, value)| ForecastPoint {
                label: label.clone(),
                historical: Some(*value),
                central: None,
                upper: None,
                lower: None,
            });
        let forecast = self.labels.iter().enumerate().map(|(i, label)| ForecastPoint {
            label: label.clone(),
            historical: None,
            central: Some(self.central[i]),
            upper: Some(self.upper[i]),
            lower: Some(self.lower[i]),
        });
        history.chain(forecast).collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TrendForecaster {
    anchor: ForecastAnchor,
}

impl TrendForecaster {
    pub fn new(anchor: ForecastAnchor) -> Self {
        Self { anchor }
    }

    /// Forecast `horizon_days` days after `first_day - 1`, labelling them from `first_day`.
    pub fn forecast<R: RandomSource + ?Sized>(
        &self,
        daily_series: &[DailyBucket],
        horizon_days: usize,
        scenario: &ForecastScenario,
        first_day: NaiveDate,
        rng: &mut R,
    ) -> ForecastBundle {
        let mut series: Vec<&DailyBucket> = daily_series.iter().collect();
        series.sort_by_key(|bucket| bucket.date);

        let history: Vec<f64> = series
            .iter()
            .map(|bucket| finite_or_zero(bucket.energy_kwh).max(0.0))
            .collect();
        let history_labels = series.iter().map(|bucket| bucket.key()).collect();
        let stats = SeriesStats::from_values(&history);

        let noise_scale = stats.std_dev * scenario.volatility.max(0.0);
        let band = BAND_Z_SCORE * noise_scale;
        let step = stats.trend_per_day * scenario.multiplier;

        let mut base = match self.anchor {
            ForecastAnchor::Mean => stats.mean,
            ForecastAnchor::LastObserved => history.last().copied().unwrap_or(stats.mean),
        };

        let mut labels = Vec::with_capacity(horizon_days);
        let mut central = Vec::with_capacity(horizon_days);
        let mut upper = Vec::with_capacity(horizon_days);
        let mut lower = Vec::with_capacity(horizon_days);

        for offset in 0..horizon_days {
            let day = first_day + Duration::days(offset as i64);
            labels.push(day.format("%Y-%m-%d").to_string());

            base += step;
            let jitter = centered_jitter(rng);
            let value = finite_or_zero(base + jitter * noise_scale).max(0.0);

            central.push(value);
            upper.push(value + band);
            lower.push((value - band).max(0.0));
        }

        tracing::debug!(
            scenario = %scenario.key,
            history_days = history.len(),
            horizon_days,
            mean = stats.mean,
            std_dev = stats.std_dev,
            trend_per_day = stats.trend_per_day,
            "Generated forecast"
        );

        ForecastBundle {
            scenario: *scenario,
            stats,
            history_labels,
            history,
            labels,
            central,
            upper,
            lower,
        }
    }
}

/// Bounded, roughly normal value in `[-1, 1]` centered on zero.
fn centered_jitter<R: RandomSource + ?Sized>(rng: &mut R) -> f64 {
    let sum: f64 = (0..4).map(|_| rng.next_unit().clamp(0.0, 1.0)).sum();
    (sum - 2.0) / 2.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPoint {
    pub label: String,
    pub energy_kwh: f64,
}

/// Flat projection of monthly consumption over the months starting at `from`.
pub fn long_term_projection(monthly_kwh: f64, from: NaiveDate, months: u32) -> Vec<MonthlyPoint> {
    let first_of_month = from.with_day(1).unwrap_or(from);
    (0..months)
        .filter_map(|i| first_of_month.checked_add_months(Months::new(i)))
        .map(|month| MonthlyPoint {
            label: month.format("%b %Y").to_string(),
            energy_kwh: finite_or_zero(monthly_kwh).max(0.0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> Vec<DailyBucket> {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| DailyBucket {
                date: start + Duration::days(i as i64),
                energy_kwh: *v,
                exchanges: 1,
            })
            .collect()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()
    }

    #[test]
    fn test_split_half_trend() {
        let stats = SeriesStats::from_values(&[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        assert!((stats.mean - 1.5).abs() < 1e-12);
        assert!((stats.trend_per_day - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_sparse_history_defaults() {
        let one = SeriesStats::from_values(&[2.0]);
        assert!((one.std_dev - 0.6).abs() < 1e-12);
        assert_eq!(one.trend_per_day, 0.0);

        let none = SeriesStats::from_values(&[]);
        assert_eq!(none.mean, 0.0);
        assert_eq!(none.std_dev, 0.0);
    }

    #[test]
    fn test_zero_jitter_follows_trend() {
        let scenario = ScenarioKey::Normal.scenario();
        let bundle = TrendForecaster::default().forecast(
            &series(&[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]),
            3,
            &scenario,
            day(),
            &mut ConstantSource(0.5),
        );
        assert!((bundle.central[0] - (1.5 + 1.0 / 3.0)).abs() < 1e-9);
        assert!((bundle.central[2] - 2.5).abs() < 1e-9);
        let band = 1.28 * bundle.stats.std_dev * 0.25;
        assert!((bundle.upper[0] - bundle.central[0] - band).abs() < 1e-9);
    }

    #[test]
    fn test_last_observed_anchor() {
        let scenario = ScenarioKey::Normal.scenario();
        let bundle = TrendForecaster::new(ForecastAnchor::LastObserved).forecast(
            &series(&[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]),
            1,
            &scenario,
            day(),
            &mut ConstantSource(0.5),
        );
        assert!((bundle.central[0] - (2.0 + 1.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_extreme_jitter_is_bounded() {
        let scenario = ScenarioKey::Intensive.scenario();
        let data = series(&[0.5, 0.7, 0.4, 0.9]);
        let high = TrendForecaster::default().forecast(&data, 5, &scenario, day(), &mut ConstantSource(1.0));
        let flat = TrendForecaster::default().forecast(&data, 5, &scenario, day(), &mut ConstantSource(0.5));
        let noise = high.stats.std_dev * scenario.volatility;
        for i in 0..5 {
            assert!((high.central[i] - flat.central[i] - noise).abs() < 1e-9);
        }
    }

    #[test]
    fn test_negative_trend_clamps_at_zero() {
        let scenario = ScenarioKey::Intensive.scenario();
        let bundle = TrendForecaster::default().forecast(
            &series(&[10.0, 10.0, 0.0, 0.0]),
            30,
            &scenario,
            day(),
            &mut ConstantSource(0.0),
        );
        assert!(bundle.central.iter().all(|v| *v >= 0.0));
        assert!(bundle.lower.iter().all(|v| *v >= 0.0));
        assert_eq!(*bundle.central.last().unwrap(), 0.0);
    }

    #[test]
    fn test_bands_enclose_central_for_every_scenario() {
        let data = series(&[0.2, 0.9, 0.1, 0.4, 1.3, 0.05, 0.6]);
        for key in ScenarioKey::ALL {
            let scenario = key.scenario();
            let bundle = TrendForecaster::default().forecast(&data, 30, &scenario, day(), &mut thread_source());
            for i in 0..bundle.horizon() {
                assert!(bundle.lower[i] <= bundle.central[i]);
                assert!(bundle.central[i] <= bundle.upper[i]);
            }
        }
    }

    #[test]
    fn test_combined_view_marks_boundary() {
        let bundle = TrendForecaster::default().forecast(
            &series(&[1.0, 2.0]),
            2,
            &ScenarioKey::Conservative.scenario(),
            day(),
            &mut ConstantSource(0.5),
        );
        let points = bundle.combined();
        assert_eq!(bundle.boundary(), 2);
        assert_eq!(points.len(), 4);
        assert!(points[1].historical.is_some() && points[1].central.is_none());
        assert!(points[2].historical.is_none() && points[2].central.is_some());
        assert_eq!(points[2].label, "2024-04-01");
    }

    #[test]
    fn test_unknown_scenario_falls_back() {
        assert_eq!(ScenarioKey::from_key_or_default("apocalyptic"), ScenarioKey::Normal);
        assert_eq!(ScenarioKey::from_key_or_default("Intensive"), ScenarioKey::Intensive);
    }

    #[test]
    fn test_long_term_projection() {
        let points = long_term_projection(4.0, NaiveDate::from_ymd_opt(2024, 11, 15).unwrap(), 12);
        assert_eq!(points.len(), 12);
        assert_eq!(points[0].label, "Nov 2024");
        assert_eq!(points[2].label, "Jan 2025");
        assert!(points.iter().all(|p| p.energy_kwh == 4.0));
    }
}
