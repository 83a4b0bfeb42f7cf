//! Reference tiers, classification and advice.
//!
//! [`classify_tier`] is the only classification routine in the crate; advice, comparison
//! rows and reports all go through it so they can never disagree about the user's tier.

use crate::aggregator::UsageProjection;
use crate::carbon::co2_grams;
use crate::models::ReferenceTier;
use anyhow::Result;
use serde::Serialize;

/// Annual consumption above which an optimization hint is given.
pub const OPTIMIZATION_HINT_ANNUAL_KWH: f64 = 50.0;
/// Projected annual CO₂ above which an impact note is given.
pub const IMPACT_NOTE_ANNUAL_CO2_KG: f64 = 10.0;
/// CO₂ one tree offsets per year, for the impact note.
pub const TREE_OFFSET_KG_PER_YEAR: f64 = 20.0;

/// Tiers are scanned in ascending order and the first whose threshold is at least the
/// value wins; values above every threshold map to the highest tier.
///
/// Unreadable or negative values are classified as zero. `tiers` must not be empty.
pub fn classify_tier(monthly_kwh: f64, tiers: &[ReferenceTier]) -> usize {
    let value = if monthly_kwh.is_finite() && monthly_kwh > 0.0 {
        monthly_kwh
    } else {
        0.0
    };
    tiers
        .iter()
        .position(|tier| tier.monthly_kwh >= value)
        .unwrap_or_else(|| tiers.len().saturating_sub(1))
}

#[derive(Debug, Clone, PartialEq)]
pub struct TierTable {
    tiers: Vec<ReferenceTier>,
}

impl Default for TierTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn tier(key: &str, name: &str, monthly_kwh: f64, description: &str, color: &str) -> ReferenceTier {
    ReferenceTier {
        key: key.to_string(),
        name: name.to_string(),
        monthly_kwh,
        description: description.to_string(),
        color: color.to_string(),
    }
}

impl TierTable {
    pub fn builtin() -> Self {
        Self {
            tiers: vec![
                tier(
                    "casual",
                    "Casual user",
                    1.0,
                    "A few questions a day for everyday tasks",
                    "#4CAF50",
                ),
                tier(
                    "developer",
                    "Developer",
                    5.0,
                    "Daily coding assistance and code reviews",
                    "#2196F3",
                ),
                tier(
                    "business",
                    "Business",
                    25.0,
                    "Team-wide usage for documents, support and analysis",
                    "#FF9800",
                ),
                tier(
                    "power_user",
                    "Power user",
                    100.0,
                    "Agents, long contexts and continuous generation",
                    "#F44336",
                ),
            ],
        }
    }

    /// Build a table, rejecting empty tables and thresholds that are not strictly increasing.
    pub fn new(tiers: Vec<ReferenceTier>) -> Result<Self> {
        if tiers.is_empty() {
            anyhow::bail!("Tier table must contain at least one tier");
        }
        if let Some(bad) = tiers.iter().find(|t| !t.monthly_kwh.is_finite() || t.monthly_kwh < 0.0) {
            anyhow::bail!("Tier '{}' has an invalid threshold {}", bad.key, bad.monthly_kwh);
        }
        if let Some(pair) = tiers.windows(2).find(|w| w[0].monthly_kwh >= w[1].monthly_kwh) {
            anyhow::bail!(
                "Tier thresholds must be strictly increasing: '{}' ({}) >= '{}' ({})",
                pair[0].key,
                pair[0].monthly_kwh,
                pair[1].key,
                pair[1].monthly_kwh
            );
        }
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[ReferenceTier] {
        &self.tiers
    }

    pub fn classify(&self, monthly_kwh: f64) -> TierClassification<'_> {
        let rank = classify_tier(monthly_kwh, &self.tiers);
        TierClassification {
            rank,
            tier: &self.tiers[rank],
        }
    }

    /// One row per tier comparing it with the user's monthly consumption.
    pub fn comparison(&self, monthly_kwh: f64, intensity_g_per_kwh: f64) -> Vec<TierComparison> {
        let user_rank = classify_tier(monthly_kwh, &self.tiers);
        self.tiers
            .iter()
            .enumerate()
            .map(|(rank, tier)| {
                let difference_kwh = monthly_kwh - tier.monthly_kwh;
                let difference_pct = if tier.monthly_kwh > 0.0 {
                    difference_kwh / tier.monthly_kwh * 100.0
                } else {
                    0.0
                };
                TierComparison {
                    tier: tier.clone(),
                    reference_co2_kg: co2_grams(tier.monthly_kwh, intensity_g_per_kwh) / 1000.0,
                    difference_kwh,
                    difference_pct,
                    is_user_tier: rank == user_rank,
                }
            })
            .collect()
    }

    pub fn advise(&self, projection: &UsageProjection, intensity_g_per_kwh: f64) -> Vec<Advice> {
        let mut advice = Vec::new();
        let monthly = projection.monthly_kwh;

        advice.push(match self.classify(monthly).rank {
            0 => Advice {
                level: AdviceLevel::Success,
                title: "Moderate usage".to_string(),
                message: format!(
                    "Your consumption ({:.2} kWh/month) is below the typical developer. You can keep using AI without concern.",
                    monthly
                ),
            },
            1 => Advice {
                level: AdviceLevel::Info,
                title: "Average usage".to_string(),
                message: format!(
                    "Your consumption ({:.2} kWh/month) matches an active developer. This is normal for regular professional use.",
                    monthly
                ),
            },
            _ => Advice {
                level: AdviceLevel::Warning,
                title: "High usage".to_string(),
                message: format!(
                    "Your consumption ({:.2} kWh/month) is high. Consider optimizing your prompts or reducing how often you query.",
                    monthly
                ),
            },
        });

        if projection.annual_kwh > OPTIMIZATION_HINT_ANNUAL_KWH {
            advice.push(Advice {
                level: AdviceLevel::Warning,
                title: "Optimization recommended".to_string(),
                message: format!(
                    "With {:.1} kWh/year projected, prefer more efficient models, batch your requests, or ask for shorter answers when possible.",
                    projection.annual_kwh
                ),
            });
        }

        let annual_co2_kg = co2_grams(projection.annual_kwh, intensity_g_per_kwh) / 1000.0;
        if annual_co2_kg > IMPACT_NOTE_ANNUAL_CO2_KG {
            advice.push(Advice {
                level: AdviceLevel::Info,
                title: "Environmental impact".to_string(),
                message: format!(
                    "Your projected footprint is {:.2} kg CO₂/year. Offsetting it takes about {} trees, or pick a cleaner energy mix.",
                    annual_co2_kg,
                    (annual_co2_kg / TREE_OFFSET_KG_PER_YEAR).ceil() as u64
                ),
            });
        }

        advice
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TierClassification<'a> {
    pub rank: usize,
    pub tier: &'a ReferenceTier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierComparison {
    pub tier: ReferenceTier,
    pub reference_co2_kg: f64,
    pub difference_kwh: f64,
    pub difference_pct: f64,
    pub is_user_tier: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdviceLevel {
    Success,
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advice {
    pub level: AdviceLevel,
    pub title: String,
    pub message: String,
}
