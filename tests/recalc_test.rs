//! CO₂ recalculation after an energy-mix change

mod common;

use common::approx_eq;
use llm_footprint::carbon::{joules_to_kwh, kwh_to_joules, CarbonConverter};
use llm_footprint::energy::EnergyEstimator;
use llm_footprint::models::{AggregateTotals, Exchange};
use llm_footprint::recalc::MixRecalculator;
use llm_footprint::reconcile::StatsReconciler;

fn history() -> Vec<Exchange> {
    vec![
        Exchange::new("gpt-4", 100, 200)
            .with_id("1")
            .with_energy(kwh_to_joules(0.5))
            .with_co2(240.0),
        Exchange::new("claude-3-opus", 30, 90)
            .with_id("2")
            .with_energy(kwh_to_joules(0.25))
            .with_co2(120.0),
    ]
}

#[test]
fn test_switch_from_global_average_to_low_carbon_mix() {
    let session = Exchange::new("gpt-4", 10, 10)
        .with_energy(kwh_to_joules(2.0))
        .with_co2(960.0);

    let result = MixRecalculator::new().recalculate(&[], Some(&session), None, 50.0);
    let updated = result.current_session.expect("session is carried through");

    assert!(approx_eq(updated.co2_grams.unwrap_or_default(), 100.0));
    assert_eq!(updated.energy_joules, session.energy_joules);
}

#[test]
fn test_energy_and_counts_are_preserved() {
    let original = history();
    let cached = AggregateTotals {
        requests: 2,
        prompt_tokens: 130,
        response_tokens: 290,
        energy_joules: kwh_to_joules(0.75),
        co2_grams: 360.0,
    };

    let result = MixRecalculator::new().recalculate(&original, None, Some(&cached), 100.0);

    for (before, after) in original.iter().zip(&result.history) {
        assert_eq!(before.energy_joules, after.energy_joules);
        assert_eq!(before.prompt_tokens, after.prompt_tokens);
        assert_eq!(before.response_tokens, after.response_tokens);
        assert_eq!(before.id, after.id);
    }

    let totals = result.cached_totals.expect("cache is carried through");
    assert_eq!(totals.requests, cached.requests);
    assert_eq!(totals.energy_joules, cached.energy_joules);
    assert!(approx_eq(totals.co2_grams, 75.0));
    assert!(approx_eq(result.history_co2_grams(), 75.0));
}

#[test]
fn test_recalculating_twice_is_a_no_op() {
    let recalculator = MixRecalculator::new();
    let once = recalculator.recalculate(&history(), None, None, 56.0);
    let twice = recalculator.recalculate(&once.history, None, None, 56.0);

    for (a, b) in once.history.iter().zip(&twice.history) {
        assert_eq!(a.co2_grams, b.co2_grams);
    }
}

#[test]
fn test_missing_energy_uses_token_estimate() {
    let entries = vec![Exchange::new("gpt-4", 500, 500).with_co2(12.0)];
    let estimated = EnergyEstimator::new().estimate_exchange(&entries[0]);
    let result = MixRecalculator::new().recalculate(&entries, None, None, 480.0);
    assert!(approx_eq(
        result.history[0].co2_grams.unwrap_or_default(),
        joules_to_kwh(estimated) * 480.0
    ));
    assert_eq!(result.history[0].energy_joules, None);
}

#[test]
fn test_insignificant_measurement_falls_back_to_estimate() {
    let entries = vec![Exchange::new("gpt-4", 200, 300).with_energy(0.001)];
    let estimated = EnergyEstimator::new().estimate_exchange(&entries[0]);
    let reconciled = StatsReconciler::new(EnergyEstimator::new(), CarbonConverter::new(300.0))
        .reconcile(&entries, None, None);

    let result = MixRecalculator::new().recalculate(&entries, None, None, 300.0);
    let co2 = result.history[0].co2_grams.unwrap_or_default();
    assert!(estimated > 0.01);
    assert!(approx_eq(co2, reconciled.computed.co2_grams));
    assert_eq!(result.history[0].energy_joules, Some(0.001));
}
