//! Totals reconciliation against history, last exchange and cache

mod common;

use common::{approx_eq, exchange_at, noon_utc, DAY_MS};
use llm_footprint::carbon::CarbonConverter;
use llm_footprint::energy::EnergyEstimator;
use llm_footprint::models::{AggregateTotals, Exchange};
use llm_footprint::reconcile::{CacheState, StatsReconciler};

fn reconciler() -> StatsReconciler {
    StatsReconciler::new(EnergyEstimator::new(), CarbonConverter::new(480.0))
}

#[test]
fn test_last_exchange_matched_by_id_is_not_double_counted() {
    let entry = Exchange::new("gpt-4", 10, 20)
        .with_id("exchange-1700000000000-abc")
        .at(1_700_000_000_000)
        .with_energy(1000.0);
    let history = vec![entry.clone()];

    // captured again later, same id
    let last = entry.at(1_700_000_005_000);

    let result = reconciler().reconcile(&history, Some(&last), None);
    assert_eq!(result.totals.requests, 1);
    assert!(!result.last_exchange_counted);
    assert!(approx_eq(result.totals.energy_joules, 1000.0));
}

#[test]
fn test_empty_cache_recomputes_token_heuristic() {
    let history = vec![
        Exchange::new("gpt-3.5", 100, 200).with_energy(0.0),
        Exchange::new("gpt-3.5", 50, 50).with_energy(0.0),
        Exchange::new("gpt-3.5", 10, 10).with_energy(0.0),
    ];
    let cached = AggregateTotals::default();

    let result = reconciler().reconcile(&history, None, Some(&cached));
    assert_eq!(result.cache_state, CacheState::Empty);
    assert_eq!(result.totals.total_tokens(), 420);
    assert_eq!(result.totals.requests, 3);

    let expected: f64 = [(100.0, 200.0), (50.0, 50.0), (10.0, 10.0)]
        .iter()
        .map(|(p, r)| 0.1 + p * 0.00005 * 0.3 + r * 0.00005 * 1.0)
        .sum();
    assert!(approx_eq(result.totals.energy_joules, expected));
    assert!(approx_eq(
        result.totals.co2_grams,
        CarbonConverter::new(480.0).grams_for_joules(expected)
    ));
    assert_eq!(result.write_back, Some(result.totals));
}

#[test]
fn test_reconcile_is_idempotent_after_write_back() {
    let base = noon_utc(2025, 3, 1);
    let history = vec![
        exchange_at("claude-3-haiku", 120, 300, base),
        exchange_at("gpt-4o", 40, 80, base + 60_000),
    ];
    let last = exchange_at("gpt-4o", 5, 9, base + 3_600_000);

    let first = reconciler().reconcile(&history, Some(&last), None);
    assert!(first.last_exchange_counted);
    assert_eq!(first.totals.requests, 3);
    let healed = first.write_back.expect("missing cache must be healed");

    let second = reconciler().reconcile(&history, Some(&last), Some(&healed));
    assert!(matches!(second.cache_state, CacheState::Valid(_)));
    assert_eq!(second.totals, first.totals);
    assert!(second.write_back.is_none());
}

#[test]
fn test_last_exchange_already_in_history_equals_no_last_exchange() {
    let base = noon_utc(2025, 3, 2);
    let history = vec![
        exchange_at("gpt-4", 10, 10, base),
        exchange_at("gpt-4", 20, 30, base + 5_000),
    ];
    let stale = AggregateTotals {
        requests: 1,
        ..AggregateTotals::default()
    };

    for cache in [None, Some(&stale)] {
        let with_last = reconciler().reconcile(&history, history.last(), cache);
        let without = reconciler().reconcile(&history, None, cache);
        assert_eq!(with_last, without);
    }
}

#[test]
fn test_stale_cache_is_replaced() {
    let base = noon_utc(2025, 3, 3);
    let history = vec![
        exchange_at("gemini-pro", 10, 10, base),
        exchange_at("gemini-pro", 10, 10, base + DAY_MS),
    ];
    let stale = AggregateTotals {
        requests: 1,
        prompt_tokens: 10,
        response_tokens: 10,
        energy_joules: 0.5,
        co2_grams: 0.1,
    };

    let result = reconciler().reconcile(&history, None, Some(&stale));
    assert_eq!(result.cache_state, CacheState::Stale(stale));
    assert_eq!(result.totals.requests, 2);
    assert!(result.write_back.is_some());
}

#[test]
fn test_valid_cache_is_trusted() {
    let history = vec![Exchange::new("gpt-4", 10, 10).with_id("1")];
    let cached = AggregateTotals {
        requests: 5,
        prompt_tokens: 50,
        response_tokens: 50,
        energy_joules: 9.0,
        co2_grams: 1.2,
    };

    let result = reconciler().reconcile(&history, None, Some(&cached));
    assert_eq!(result.totals, cached);
    assert!(result.write_back.is_none());
}

#[test]
fn test_empty_history_never_writes_back() {
    let last = Exchange::new("gpt-4", 10, 10).with_id("only");
    let result = reconciler().reconcile(&[], Some(&last), None);
    assert_eq!(result.totals.requests, 1);
    assert!(result.write_back.is_none());
}
