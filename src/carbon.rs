//! Carbon Conversion
//!
//! Converts energy into CO₂ using a carbon intensity (grams of CO₂ per kWh) chosen from a
//! table of regional energy mixes, and renders CO₂ amounts at a human scale.
//!
//! ## Key Types
//!
//! - [`CarbonConverter`] - Energy to CO₂ at a fixed intensity
//! - [`CarbonIntensityTable`] - Selectable energy mixes, built in or loaded from JSON
//! - [`Co2Equivalence`] - Everyday comparison for a CO₂ amount
//!
//! ## Intensity File Format
//!
//! ```json
//! {
//!   "countries": {
//!     "france": { "name": "France", "intensity": 56 },
//!     "global_average": { "name": "Global average", "intensity": 480 }
//!   }
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::warn;

pub const JOULES_PER_KWH: f64 = 3_600_000.0;
/// Global average grid intensity, used whenever no valid intensity is selected.
pub const DEFAULT_INTENSITY_G_PER_KWH: f64 = 480.0;
pub const GLOBAL_AVERAGE_MIX: &str = "global_average";

pub fn joules_to_kwh(joules: f64) -> f64 {
    joules / JOULES_PER_KWH
}

pub fn kwh_to_joules(kwh: f64) -> f64 {
    kwh * JOULES_PER_KWH
}

pub fn co2_grams(energy_kwh: f64, intensity_g_per_kwh: f64) -> f64 {
    energy_kwh * intensity_g_per_kwh
}

/// Intensity if it is usable, otherwise the global average.
pub fn sanitize_intensity(intensity_g_per_kwh: f64) -> f64 {
    if intensity_g_per_kwh.is_finite() && intensity_g_per_kwh >= 0.0 {
        intensity_g_per_kwh
    } else {
        warn!(
            intensity = intensity_g_per_kwh,
            fallback = DEFAULT_INTENSITY_G_PER_KWH,
            "Invalid carbon intensity, using global average"
        );
        DEFAULT_INTENSITY_G_PER_KWH
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarbonConverter {
    intensity_g_per_kwh: f64,
}

impl Default for CarbonConverter {
    fn default() -> Self {
        Self::new(DEFAULT_INTENSITY_G_PER_KWH)
    }
}

impl CarbonConverter {
    pub fn new(intensity_g_per_kwh: f64) -> Self {
        Self {
            intensity_g_per_kwh: sanitize_intensity(intensity_g_per_kwh),
        }
    }

    pub fn intensity(&self) -> f64 {
        self.intensity_g_per_kwh
    }

    pub fn grams_for_kwh(&self, energy_kwh: f64) -> f64 {
        co2_grams(energy_kwh, self.intensity_g_per_kwh)
    }

    pub fn grams_for_joules(&self, energy_joules: f64) -> f64 {
        self.grams_for_kwh(joules_to_kwh(energy_joules))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyMix {
    pub name: String,
    pub intensity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonIntensityTable {
    countries: BTreeMap<String, EnergyMix>,
}

impl Default for CarbonIntensityTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CarbonIntensityTable {
    pub fn builtin() -> Self {
        let entries = [
            (GLOBAL_AVERAGE_MIX, "Global average", DEFAULT_INTENSITY_G_PER_KWH),
            ("australia", "Australia", 549.0),
            ("brazil", "Brazil", 98.0),
            ("canada", "Canada", 128.0),
            ("china", "China", 582.0),
            ("france", "France", 56.0),
            ("germany", "Germany", 380.0),
            ("india", "India", 713.0),
            ("italy", "Italy", 331.0),
            ("japan", "Japan", 485.0),
            ("norway", "Norway", 30.0),
            ("poland", "Poland", 662.0),
            ("spain", "Spain", 174.0),
            ("sweden", "Sweden", 41.0),
            ("united_kingdom", "United Kingdom", 238.0),
            ("united_states", "United States", 386.0),
        ];

        Self {
            countries: entries
                .into_iter()
                .map(|(key, name, intensity)| {
                    (
                        key.to_string(),
                        EnergyMix {
                            name: name.to_string(),
                            intensity,
                        },
                    )
                })
                .collect(),
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let mut table: CarbonIntensityTable =
            serde_json::from_str(content).context("Failed to parse carbon intensity table")?;

        table
            .countries
            .retain(|_, mix| mix.intensity.is_finite() && mix.intensity >= 0.0);
        table
            .countries
            .entry(GLOBAL_AVERAGE_MIX.to_string())
            .or_insert_with(|| EnergyMix {
                name: "Global average".to_string(),
                intensity: DEFAULT_INTENSITY_G_PER_KWH,
            });

        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read carbon intensity file: {}", path.display()))?;
        Self::from_json_str(&content)
    }

    pub fn get(&self, key: &str) -> Option<&EnergyMix> {
        self.countries.get(key)
    }

    pub fn mixes(&self) -> impl Iterator<Item = (&str, &EnergyMix)> {
        self.countries.iter().map(|(key, mix)| (key.as_str(), mix))
    }

    /// Intensity of the named mix, or the global average for unknown keys.
    pub fn intensity_for(&self, key: &str) -> f64 {
        match self.countries.get(key) {
            Some(mix) => mix.intensity,
            None => {
                warn!(mix = key, "Unknown energy mix, using global average");
                self.countries
                    .get(GLOBAL_AVERAGE_MIX)
                    .map(|mix| mix.intensity)
                    .unwrap_or(DEFAULT_INTENSITY_G_PER_KWH)
            }
        }
    }
}

/// Everyday comparison for an amount of CO₂.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Co2Equivalence {
    Negligible,
    Micrograms(f64),
    BreathingSeconds(f64),
    Milligrams(f64),
    WebSearches(f64),
    Emails(f64),
    CarKilometres(f64),
    TreeYears(f64),
}

const BREATHING_GRAMS_PER_MINUTE: f64 = 0.2;
const WEB_SEARCH_GRAMS: f64 = 0.2;
const EMAIL_GRAMS: f64 = 4.0;
const CAR_GRAMS_PER_KM: f64 = 120.0;
const TREE_KG_PER_YEAR: f64 = 21.0;

impl Co2Equivalence {
    pub fn for_grams(grams: f64) -> Self {
        if !grams.is_finite() || grams < 0.00001 {
            Co2Equivalence::Negligible
        } else if grams < 0.0001 {
            Co2Equivalence::Micrograms(grams * 1_000_000.0)
        } else if grams < 0.001 {
            Co2Equivalence::BreathingSeconds(grams / (BREATHING_GRAMS_PER_MINUTE / 60.0))
        } else if grams < 0.01 {
            Co2Equivalence::Milligrams(grams * 1000.0)
        } else if grams < 0.1 {
            Co2Equivalence::WebSearches(grams / WEB_SEARCH_GRAMS)
        } else if grams < 1.0 {
            Co2Equivalence::Emails(grams / EMAIL_GRAMS)
        } else if grams < 10.0 {
            Co2Equivalence::CarKilometres(grams / CAR_GRAMS_PER_KM)
        } else {
            Co2Equivalence::TreeYears(grams / 1000.0 / TREE_KG_PER_YEAR)
        }
    }
}

impl fmt::Display for Co2Equivalence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Co2Equivalence::Negligible => write!(f, "-"),
            Co2Equivalence::Micrograms(v) => write!(f, "{:.2} µg CO₂", v),
            Co2Equivalence::BreathingSeconds(v) => write!(f, "{:.0} s of breathing", v),
            Co2Equivalence::Milligrams(v) => write!(f, "{:.2} mg CO₂", v),
            Co2Equivalence::WebSearches(v) => write!(f, "{:.1} web searches", v),
            Co2Equivalence::Emails(v) => write!(f, "{:.2} emails sent", v),
            Co2Equivalence::CarKilometres(v) => write!(f, "{:.3} km by car", v),
            Co2Equivalence::TreeYears(v) => write!(f, "{:.2} tree-years of absorption", v),
        }
    }
}

/// Grams of CO₂ for display: scientific notation for tiny values, four decimals otherwise.
pub fn format_co2(grams: f64) -> String {
    if grams == 0.0 || !grams.is_finite() {
        "0.0000".to_string()
    } else if grams < 0.0001 {
        format!("{:.2e}", grams)
    } else {
        format!("{:.4}", grams)
    }
}
