//! Per-exchange energy estimation.
//!
//! Measured energy always wins when it is significant. Otherwise a heuristic derived from
//! the model family and token counts fills the gap, with response tokens weighted more
//! heavily than prompt tokens since generation dominates inference cost.

use crate::models::Exchange;

/// Measurements below this many joules are treated as missing.
pub const MIN_MEASURED_JOULES: f64 = 0.01;
pub const PROMPT_TOKEN_WEIGHT: f64 = 0.3;
pub const RESPONSE_TOKEN_WEIGHT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelCoefficients {
    /// Fixed joules per exchange
    pub base: f64,
    /// Joules per weighted token
    pub per_token: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelFamily {
    pub pattern: String,
    pub coefficients: ModelCoefficients,
}

impl ModelFamily {
    pub fn new(pattern: &str, base: f64, per_token: f64) -> Self {
        Self {
            pattern: pattern.to_ascii_lowercase(),
            coefficients: ModelCoefficients { base, per_token },
        }
    }
}

pub const DEFAULT_COEFFICIENTS: ModelCoefficients = ModelCoefficients {
    base: 0.2,
    per_token: 0.00006,
};

/// Known families, most specific first: the first pattern contained in the model name wins,
/// so `gpt-4o` and `gpt-4-turbo` must precede `gpt-4`.
pub fn builtin_families() -> Vec<ModelFamily> {
    vec![
        ModelFamily::new("gpt-4-turbo", 0.4, 0.00008),
        ModelFamily::new("gpt-4o", 0.45, 0.00009),
        ModelFamily::new("gpt-4", 0.5, 0.0001),
        ModelFamily::new("gpt-3.5", 0.1, 0.00005),
        ModelFamily::new("claude-3-opus", 0.6, 0.00012),
        ModelFamily::new("claude-3-sonnet", 0.3, 0.00008),
        ModelFamily::new("claude-3-haiku", 0.15, 0.00005),
        ModelFamily::new("gemini-pro", 0.2, 0.00006),
    ]
}

#[derive(Debug, Clone)]
pub struct EnergyEstimator {
    families: Vec<ModelFamily>,
    fallback: ModelCoefficients,
}

impl Default for EnergyEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl EnergyEstimator {
    pub fn new() -> Self {
        Self::with_families(builtin_families(), DEFAULT_COEFFICIENTS)
    }

    pub fn with_families(families: Vec<ModelFamily>, fallback: ModelCoefficients) -> Self {
        Self { families, fallback }
    }

    pub fn families(&self) -> &[ModelFamily] {
        &self.families
    }

    /// Case-insensitive substring lookup of the model's family.
    pub fn coefficients_for(&self, model_name: &str) -> ModelCoefficients {
        let model = model_name.to_ascii_lowercase();
        self.families
            .iter()
            .find(|family| model.contains(family.pattern.as_str()))
            .map(|family| family.coefficients)
            .unwrap_or(self.fallback)
    }

    pub fn is_significant(measured_joules: Option<f64>) -> bool {
        matches!(measured_joules, Some(j) if j.is_finite() && j >= MIN_MEASURED_JOULES)
    }

    /// Energy in joules for one exchange. Deterministic for identical inputs.
    pub fn estimate(
        &self,
        model_name: &str,
        prompt_tokens: u64,
        response_tokens: u64,
        measured_joules: Option<f64>,
    ) -> f64 {
        if Self::is_significant(measured_joules) {
            return measured_joules.unwrap_or(0.0);
        }

        if prompt_tokens == 0 && response_tokens == 0 {
            // a negligible reading is still better than nothing
            return measured_joules
                .filter(|j| j.is_finite() && *j > 0.0)
                .unwrap_or(0.0);
        }

        let coefficients = self.coefficients_for(model_name);
        let energy = coefficients.base
            + prompt_tokens as f64 * coefficients.per_token * PROMPT_TOKEN_WEIGHT
            + response_tokens as f64 * coefficients.per_token * RESPONSE_TOKEN_WEIGHT;

        tracing::debug!(
            model = model_name,
            prompt_tokens,
            response_tokens,
            measured_joules = ?measured_joules,
            estimated_joules = energy,
            "Using token-based energy estimate"
        );

        energy.max(0.0)
    }

    pub fn estimate_exchange(&self, exchange: &Exchange) -> f64 {
        self.estimate(
            &exchange.model,
            exchange.prompt_tokens,
            exchange.response_tokens,
            exchange.energy_joules,
        )
    }
}
