//! Scenario forecasting over daily series

mod common;

use chrono::NaiveDate;
use common::{approx_eq, buckets};
use llm_footprint::forecast::{
    thread_source, ConstantSource, ForecastAnchor, ScenarioKey, SequenceSource, TrendForecaster,
    BAND_Z_SCORE,
};

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
}

fn first_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 7).unwrap()
}

#[test]
fn test_band_contains_central_for_every_scenario() {
    let series = buckets(start(), &[0.2, 0.9, 0.1, 1.4, 0.0, 0.7, 2.2]);

    for key in ScenarioKey::ALL {
        let bundle = TrendForecaster::default().forecast(
            &series,
            60,
            &key.scenario(),
            first_day(),
            &mut thread_source(),
        );
        assert_eq!(bundle.horizon(), 60);
        for i in 0..bundle.horizon() {
            assert!(bundle.lower[i] <= bundle.central[i], "{} lower at {}", key, i);
            assert!(bundle.central[i] <= bundle.upper[i], "{} upper at {}", key, i);
            assert!(bundle.lower[i] >= 0.0);
            assert!(bundle.central[i] >= 0.0);
        }
    }
}

#[test]
fn test_rising_series_trend_from_mean() {
    let series = buckets(start(), &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
    let bundle = TrendForecaster::new(ForecastAnchor::Mean).forecast(
        &series,
        3,
        &ScenarioKey::Normal.scenario(),
        first_day(),
        &mut ConstantSource(0.5),
    );

    assert!(approx_eq(bundle.stats.trend_per_day, 1.0 / 3.0));
    assert!(approx_eq(bundle.central[0], 1.5 + 1.0 / 3.0));
    assert!(approx_eq(bundle.central[2], 1.5 + 1.0));
}

#[test]
fn test_rising_series_trend_from_last_observed_day() {
    let series = buckets(start(), &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
    let bundle = TrendForecaster::new(ForecastAnchor::LastObserved).forecast(
        &series,
        1,
        &ScenarioKey::Normal.scenario(),
        first_day(),
        &mut ConstantSource(0.5),
    );

    assert!(approx_eq(bundle.central[0], 2.0 + 1.0 / 3.0));
    let band = BAND_Z_SCORE * bundle.stats.std_dev * 0.25;
    assert!(approx_eq(bundle.upper[0] - bundle.central[0], band));
}

#[test]
fn test_deterministic_sequence_gives_exact_band() {
    let series = buckets(start(), &[1.0, 3.0]);
    let scenario = ScenarioKey::Intensive.scenario();
    let bundle = TrendForecaster::default().forecast(
        &series,
        2,
        &scenario,
        first_day(),
        &mut SequenceSource::new(vec![1.0, 1.0, 1.0, 1.0, 0.5, 0.5, 0.5, 0.5]),
    );

    // mean 2, sample std dev sqrt(2), trend 2 per day amplified by 1.5
    let noise = 2.0_f64.sqrt() * scenario.volatility;
    assert!(approx_eq(bundle.central[0], 2.0 + 3.0 + noise));
    assert!(approx_eq(bundle.central[1], 2.0 + 6.0));
    assert!(approx_eq(bundle.upper[1], 8.0 + BAND_Z_SCORE * noise));
    assert!(approx_eq(bundle.lower[1], 8.0 - BAND_Z_SCORE * noise));
}

#[test]
fn test_single_day_uses_sparse_deviation() {
    let series = buckets(start(), &[2.0]);
    let bundle = TrendForecaster::default().forecast(
        &series,
        5,
        &ScenarioKey::Conservative.scenario(),
        first_day(),
        &mut ConstantSource(0.5),
    );

    assert!(approx_eq(bundle.stats.std_dev, 0.6));
    assert!(approx_eq(bundle.stats.trend_per_day, 0.0));
    assert!(bundle.central.iter().all(|v| approx_eq(*v, 2.0)));
}

#[test]
fn test_empty_history_forecasts_zero() {
    let bundle = TrendForecaster::default().forecast(
        &[],
        4,
        &ScenarioKey::Normal.scenario(),
        first_day(),
        &mut thread_source(),
    );

    assert_eq!(bundle.boundary(), 0);
    assert_eq!(bundle.central, vec![0.0; 4]);
    assert_eq!(bundle.lower, vec![0.0; 4]);
    assert_eq!(bundle.labels[0], "2025-01-07");
}

#[test]
fn test_combined_view_splits_history_and_forecast() {
    let series = buckets(start(), &[0.5, 0.5, 0.5]);
    let bundle = TrendForecaster::default().forecast(
        &series,
        2,
        &ScenarioKey::Normal.scenario(),
        first_day(),
        &mut ConstantSource(0.5),
    );

    let points = bundle.combined();
    assert_eq!(points.len(), 5);
    assert_eq!(bundle.boundary(), 3);
    assert!(points[..3].iter().all(|p| p.historical.is_some() && p.central.is_none()));
    assert!(points[3..].iter().all(|p| p.historical.is_none() && p.central.is_some()));
    assert_eq!(points[0].label, "2025-01-01");
    assert_eq!(points[3].label, "2025-01-07");
}
