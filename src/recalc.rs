//! Re-derivation of CO₂ after the carbon intensity changes.
//!
//! Only CO₂ figures change. Each one is recomputed from the energy the reconciler attributes
//! to the record: the measured value when significant, otherwise the token estimate. Stored
//! energy and counts pass through untouched. The whole result
//! is built before anything is returned; callers persist it in one commit.

use crate::carbon::{co2_grams, joules_to_kwh, sanitize_intensity};
use crate::energy::EnergyEstimator;
use crate::models::{AggregateTotals, Exchange};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MixRecalculation {
    pub intensity_g_per_kwh: f64,
    pub history: Vec<Exchange>,
    pub current_session: Option<Exchange>,
    pub cached_totals: Option<AggregateTotals>,
}

impl MixRecalculation {
    pub fn history_co2_grams(&self) -> f64 {
        self.history.iter().filter_map(|e| e.co2_grams).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MixRecalculator {
    estimator: EnergyEstimator,
}

impl MixRecalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_estimator(estimator: EnergyEstimator) -> Self {
        Self { estimator }
    }

    pub fn recalculate(
        &self,
        history: &[Exchange],
        current_session: Option<&Exchange>,
        cached_totals: Option<&AggregateTotals>,
        new_intensity: f64,
    ) -> MixRecalculation {
        let intensity = sanitize_intensity(new_intensity);

        let history: Vec<Exchange> = history
            .iter()
            .map(|entry| self.with_recomputed_co2(entry, intensity))
            .collect();
        let current_session = current_session.map(|session| self.with_recomputed_co2(session, intensity));

        let history_co2: f64 = history.iter().filter_map(|e| e.co2_grams).sum();
        let cached_totals = cached_totals.map(|totals| AggregateTotals {
            co2_grams: history_co2,
            ..*totals
        });

        tracing::info!(
            intensity,
            entries = history.len(),
            history_co2_grams = history_co2,
            "Recalculated CO₂ for new energy mix"
        );

        MixRecalculation {
            intensity_g_per_kwh: intensity,
            history,
            current_session,
            cached_totals,
        }
    }

    fn with_recomputed_co2(&self, exchange: &Exchange, intensity: f64) -> Exchange {
        let joules = self.estimator.estimate_exchange(exchange);
        Exchange {
            co2_grams: Some(co2_grams(joules_to_kwh(joules), intensity)),
            ..exchange.clone()
        }
    }
}
