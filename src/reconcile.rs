//! Stats Reconciliation
//!
//! Produces one authoritative [`AggregateTotals`] from three sources that can drift apart:
//! the persisted exchange history, the in-flight "last exchange", and a cached running total.
//!
//! ## Reconciliation Strategy
//!
//! 1. **Fresh Totals**: Token counts, energy and CO₂ are summed across the whole history
//! 2. **Duplicate Detection**: The last exchange is matched against history by timestamp,
//!    identifier, or equal token counts recorded less than a second apart
//! 3. **In-flight Exchange**: An unmatched last exchange is added once to the fresh totals
//! 4. **Cache Validation**: The cache is classified as a [`CacheState`]; only a valid cache
//!    is returned, and a missing, empty or stale cache is replaced by the fresh totals
//!
//! The cache is only a display shortcut. History is the system of record and is never
//! modified here. Writing the corrected totals back is left to the caller through
//! [`Reconciliation::write_back`], which keeps this module free of side effects and makes
//! repeated calls with the same inputs return identical results.

use crate::carbon::CarbonConverter;
use crate::energy::EnergyEstimator;
use crate::models::{AggregateTotals, Exchange};
use serde::Serialize;

/// Two recordings of the same exchange may differ by up to this much.
pub const TIMESTAMP_PROXIMITY_MS: i64 = 1000;

/// What was found in the totals cache.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", content = "cached", rename_all = "camelCase")]
pub enum CacheState {
    /// Nothing cached
    Missing,
    /// Cached, but every counter is zero
    Empty,
    /// Cached with data, but fewer requests than the persisted history holds
    Stale(AggregateTotals),
    /// Cached and trusted for display
    Valid(AggregateTotals),
}

impl CacheState {
    pub fn classify(cached: Option<&AggregateTotals>, history_len: usize) -> Self {
        match cached {
            None => CacheState::Missing,
            Some(totals) if !totals.has_any_value() => CacheState::Empty,
            Some(totals) if totals.requests < history_len as u64 => CacheState::Stale(*totals),
            Some(totals) => CacheState::Valid(*totals),
        }
    }

    pub fn is_trusted(&self) -> bool {
        matches!(self, CacheState::Valid(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    /// Totals to display
    pub totals: AggregateTotals,
    /// Totals computed from history plus any unmatched last exchange
    pub computed: AggregateTotals,
    pub cache_state: CacheState,
    pub last_exchange_counted: bool,
    /// Corrected totals the caller should persist, if the cache needs healing
    pub write_back: Option<AggregateTotals>,
}

#[derive(Debug, Clone, Default)]
pub struct StatsReconciler {
    estimator: EnergyEstimator,
    converter: CarbonConverter,
}

impl StatsReconciler {
    pub fn new(estimator: EnergyEstimator, converter: CarbonConverter) -> Self {
        Self {
            estimator,
            converter,
        }
    }

    /// Energy and CO₂ attributed to one exchange.
    ///
    /// A stored CO₂ figure is only reused alongside a usable energy measurement; otherwise
    /// it was derived from an energy value the estimator has since replaced.
    pub fn footprint_of(&self, exchange: &Exchange) -> (f64, f64) {
        let energy = self.estimator.estimate_exchange(exchange);
        let co2 = match exchange.co2_grams {
            Some(co2) if EnergyEstimator::is_significant(exchange.energy_joules) => co2,
            _ => self.converter.grams_for_joules(energy),
        };
        (energy, co2)
    }

    pub fn compute_totals(&self, history: &[Exchange]) -> AggregateTotals {
        let mut totals = AggregateTotals::default();
        for exchange in history {
            let (energy, co2) = self.footprint_of(exchange);
            totals.absorb(exchange, energy, co2);
        }
        totals
    }

    pub fn reconcile(
        &self,
        history: &[Exchange],
        last_exchange: Option<&Exchange>,
        cached: Option<&AggregateTotals>,
    ) -> Reconciliation {
        let mut computed = self.compute_totals(history);

        let last_exchange_counted = match last_exchange {
            Some(last) if !is_recorded(history, last) => {
                let (energy, co2) = self.footprint_of(last);
                computed.absorb(last, energy, co2);
                tracing::debug!(
                    id = ?last.id,
                    prompt_tokens = last.prompt_tokens,
                    response_tokens = last.response_tokens,
                    "Counting last exchange not yet in history"
                );
                true
            }
            _ => false,
        };

        let cache_state = CacheState::classify(cached, history.len());
        let (totals, write_back) = match cache_state {
            CacheState::Valid(cached) => (cached, None),
            CacheState::Missing | CacheState::Empty | CacheState::Stale(_) => {
                let heal = !history.is_empty() && computed.has_any_value();
                if heal {
                    tracing::info!(
                        cache_state = ?cache_state,
                        requests = computed.requests,
                        "Totals cache needs healing"
                    );
                }
                (computed, heal.then_some(computed))
            }
        };

        Reconciliation {
            totals,
            computed,
            cache_state,
            last_exchange_counted,
            write_back,
        }
    }
}

/// Whether `candidate` already appears in `history`.
pub fn is_recorded(history: &[Exchange], candidate: &Exchange) -> bool {
    history.iter().any(|entry| is_same_exchange(entry, candidate))
}

/// Tolerant match: equal timestamps, equal identifiers, or equal token counts recorded
/// less than [`TIMESTAMP_PROXIMITY_MS`] apart.
pub fn is_same_exchange(a: &Exchange, b: &Exchange) -> bool {
    let (ts_a, ts_b) = (a.raw_timestamp_millis(), b.raw_timestamp_millis());

    if let (Some(x), Some(y)) = (ts_a, ts_b) {
        if x == y {
            return true;
        }
    }

    if let (Some(x), Some(y)) = (a.id.as_deref(), b.id.as_deref()) {
        if !x.is_empty() && x == y {
            return true;
        }
    }

    a.prompt_tokens == b.prompt_tokens
        && a.response_tokens == b.response_tokens
        && (ts_a.unwrap_or(0) - ts_b.unwrap_or(0)).abs() < TIMESTAMP_PROXIMITY_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000_000;

    fn reconciler() -> StatsReconciler {
        StatsReconciler::default()
    }

    #[test]
    fn test_match_by_timestamp_id_and_proximity() {
        let base = Exchange::new("gpt-4", 10, 20).with_id("a").at(T0);

        assert!(is_same_exchange(&base, &Exchange::new("gpt-4", 1, 1).at(T0)));
        assert!(is_same_exchange(&base, &Exchange::new("gpt-4", 1, 1).with_id("a").at(T0 + 50_000)));
        assert!(is_same_exchange(&base, &Exchange::new("gpt-4", 10, 20).with_id("b").at(T0 + 999)));
        assert!(!is_same_exchange(&base, &Exchange::new("gpt-4", 10, 20).with_id("b").at(T0 + 1000)));
        assert!(!is_same_exchange(&base, &Exchange::new("gpt-4", 10, 21).with_id("b").at(T0 + 1)));
    }

    #[test]
    fn test_empty_ids_never_match() {
        let a = Exchange::new("gpt-4", 1, 1).with_id("").at(T0);
        let b = Exchange::new("gpt-4", 2, 2).with_id("").at(T0 + 10_000);
        assert!(!is_same_exchange(&a, &b));
    }

    #[test]
    fn test_cache_state_classification() {
        let full = AggregateTotals {
            requests: 3,
            ..AggregateTotals::default()
        };
        assert_eq!(CacheState::classify(None, 2), CacheState::Missing);
        assert_eq!(CacheState::classify(Some(&AggregateTotals::default()), 2), CacheState::Empty);
        assert_eq!(CacheState::classify(Some(&full), 5), CacheState::Stale(full));
        assert_eq!(CacheState::classify(Some(&full), 3), CacheState::Valid(full));
    }

    #[test]
    fn test_valid_cache_is_returned() {
        let history = vec![Exchange::new("gpt-4", 10, 10).at(T0).with_energy(5.0)];
        let cached = AggregateTotals {
            requests: 7,
            prompt_tokens: 70,
            response_tokens: 70,
            energy_joules: 35.0,
            co2_grams: 0.1,
        };
        let result = reconciler().reconcile(&history, None, Some(&cached));
        assert_eq!(result.totals, cached);
        assert_eq!(result.computed.requests, 1);
        assert!(result.write_back.is_none());
    }

    #[test]
    fn test_empty_cache_heals_from_history() {
        let history = vec![
            Exchange::new("gpt-4", 10, 10).at(T0).with_energy(5.0),
            Exchange::new("gpt-4", 20, 20).at(T0 + 5000).with_energy(7.0),
        ];
        let result = reconciler().reconcile(&history, None, Some(&AggregateTotals::default()));
        assert_eq!(result.cache_state, CacheState::Empty);
        assert_eq!(result.totals.requests, 2);
        assert_eq!(result.totals.energy_joules, 12.0);
        assert_eq!(result.write_back, Some(result.totals));
    }

    #[test]
    fn test_no_write_back_without_history() {
        let last = Exchange::new("gpt-4", 10, 10).at(T0).with_energy(5.0);
        let result = reconciler().reconcile(&[], Some(&last), None);
        assert_eq!(result.totals.requests, 1);
        assert!(result.last_exchange_counted);
        assert!(result.write_back.is_none());
    }

    #[test]
    fn test_stored_co2_kept_only_with_measured_energy() {
        let measured = Exchange::new("gpt-4", 10, 10).at(T0).with_energy(3_600_000.0).with_co2(1.0);
        let estimated = Exchange::new("gpt-4", 10, 10).at(T0 + 9000).with_energy(0.0).with_co2(0.0);

        let reconciler = reconciler();
        assert_eq!(reconciler.footprint_of(&measured), (3_600_000.0, 1.0));

        let (energy, co2) = reconciler.footprint_of(&estimated);
        assert!(energy > 0.0);
        assert!(co2 > 0.0);
    }
}
