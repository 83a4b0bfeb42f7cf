//! Output Formatting and Display Management
//!
//! Renders engine results either as colored terminal reports or as JSON on stdout.
//!
//! ## Report Types
//! - **Totals**: Reconciled requests, tokens, energy and CO₂ with an everyday equivalence
//! - **Daily**: Energy per calendar day
//! - **Forecast**: Historical series followed by the central path and its band
//! - **Tiers**: Monthly projection, reference tier comparison, advice and yearly outlook
//! - **Recent**: The latest exchanges with their footprint
//! - **Mixes**: Available energy mixes and the effect of switching
//!
//! ### JSON Output
//! Every report has a JSON form keyed by report name, e.g.:
//! ```json
//! {
//!   "daily": [
//!     { "date": "2025-01-15", "energyKwh": 0.0012, "exchanges": 4 }
//!   ]
//! }
//! ```

use crate::aggregator::RecentExchange;
use crate::analyzer::{MixChangeReport, TierReport, TotalsReport};
use crate::carbon::{format_co2, joules_to_kwh, CarbonIntensityTable};
use crate::forecast::ForecastBundle;
use crate::models::DailyBucket;
use crate::tiers::AdviceLevel;
use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use colored::Colorize;
use serde::Serialize;

const RULE_WIDTH: usize = 80;
const BAR_WIDTH: usize = 40;

pub struct DisplayManager {
    json_pretty: bool,
}

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new(true)
    }
}

impl DisplayManager {
    pub fn new(json_pretty: bool) -> Self {
        Self { json_pretty }
    }

    fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        let rendered = if self.json_pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
        .context("Failed to serialize report to JSON")?;
        println!("{}", rendered);
        Ok(())
    }

    fn print_header(&self, title: &str) {
        println!("\n{}", "=".repeat(RULE_WIDTH).bright_cyan());
        println!("{}", title.bright_white().bold());
        println!("{}", "=".repeat(RULE_WIDTH).bright_cyan());
    }

    pub fn display_totals(&self, report: &TotalsReport, json_output: bool) -> Result<()> {
        let totals = &report.reconciliation.totals;

        if json_output {
            return self.print_json(&serde_json::json!({
                "totals": totals,
                "totalTokens": totals.total_tokens(),
                "energyKwh": joules_to_kwh(totals.energy_joules),
                "intensityGPerKwh": report.intensity_g_per_kwh,
                "equivalence": report.equivalence,
                "cacheState": report.reconciliation.cache_state,
                "lastExchangeCounted": report.reconciliation.last_exchange_counted,
                "healed": report.healed,
            }));
        }

        self.print_header("LLM Footprint - Totals");
        println!(
            "\n{} Requests: {}   Tokens: {} ({} prompt / {} response)",
            "📊".bright_yellow(),
            totals.requests.to_string().bright_white().bold(),
            totals.total_tokens().to_string().bright_white().bold(),
            totals.prompt_tokens,
            totals.response_tokens
        );
        println!(
            "{} Energy: {} ({:.2} J)",
            "⚡".bright_yellow(),
            format!("{:.6} kWh", joules_to_kwh(totals.energy_joules)).bright_green().bold(),
            totals.energy_joules
        );
        println!(
            "{} CO₂: {} at {:.0} g/kWh",
            "🌍".bright_yellow(),
            format!("{} g", format_co2(totals.co2_grams)).bright_green().bold(),
            report.intensity_g_per_kwh
        );
        println!("   ≈ {}", report.equivalence.to_string().bright_blue());

        if report.reconciliation.last_exchange_counted {
            println!("{}", "   includes the latest exchange not yet in history".dimmed());
        }
        if report.healed {
            println!("{}", "   cached totals were out of date and have been refreshed".dimmed());
        }
        println!();
        Ok(())
    }

    pub fn display_daily(&self, buckets: &[DailyBucket], json_output: bool) -> Result<()> {
        if json_output {
            return self.print_json(&serde_json::json!({ "daily": buckets }));
        }

        self.print_header("LLM Footprint - Daily Energy");
        if buckets.is_empty() {
            println!("\n{}", "No exchanges recorded yet.".yellow());
            return Ok(());
        }

        let total_kwh: f64 = buckets.iter().map(|b| b.energy_kwh).sum();
        let peak = buckets.iter().map(|b| b.energy_kwh).fold(0.0_f64, f64::max);
        println!(
            "\n{} {} days, {} total\n",
            "📊".bright_yellow(),
            buckets.len().to_string().bright_white().bold(),
            format!("{:.6} kWh", total_kwh).bright_green().bold()
        );

        for bucket in buckets {
            println!(
                "{}  {}  {} {}",
                bucket.key().bright_white().bold(),
                format!("{:>12.6} kWh", bucket.energy_kwh).bright_green(),
                bar(bucket.energy_kwh, peak).cyan(),
                format!("({} exchanges)", bucket.exchanges).dimmed()
            );
        }
        println!();
        Ok(())
    }

    pub fn display_forecast(&self, bundle: &ForecastBundle, json_output: bool) -> Result<()> {
        if json_output {
            return self.print_json(&serde_json::json!({
                "forecast": bundle,
                "boundary": bundle.boundary(),
                "points": bundle.combined(),
            }));
        }

        self.print_header(&format!("LLM Footprint - Forecast ({})", bundle.scenario.label));
        println!(
            "\n{} mean {:.6} kWh/day, std dev {:.6}, trend {:+.6} kWh/day",
            "📈".bright_yellow(),
            bundle.stats.mean,
            bundle.stats.std_dev,
            bundle.stats.trend_per_day
        );
        println!(
            "   multiplier {:.2}, volatility {:.2}, {} days ahead\n",
            bundle.scenario.multiplier,
            bundle.scenario.volatility,
            bundle.horizon()
        );

        for point in bundle.combined() {
            match (point.historical, point.central, point.lower, point.upper) {
                (Some(value), _, _, _) => {
                    println!("{}  {}", point.label.white(), format!("{:>12.6}", value).bright_white());
                }
                (None, Some(central), Some(lower), Some(upper)) => {
                    println!(
                        "{}  {}  {}",
                        point.label.bright_cyan(),
                        format!("{:>12.6}", central).bright_green(),
                        format!("[{:.6} .. {:.6}]", lower, upper).dimmed()
                    );
                }
                _ => {}
            }
        }
        println!();
        Ok(())
    }

    pub fn display_tiers(&self, report: &TierReport, json_output: bool) -> Result<()> {
        if json_output {
            return self.print_json(&serde_json::json!({ "tiers": report }));
        }

        let projection = &report.projection;
        self.print_header("LLM Footprint - Usage Tier");
        println!(
            "\n{} {} over {:.1} days",
            "📊".bright_yellow(),
            format!("{:.6} kWh", projection.total_kwh).bright_green().bold(),
            projection.span_days
        );
        println!(
            "   projected {} per month, {} per year\n",
            format!("{:.4} kWh", projection.monthly_kwh).bright_white().bold(),
            format!("{:.3} kWh", projection.annual_kwh).bright_white().bold()
        );

        for row in &report.comparison {
            let marker = if row.is_user_tier { "▶".bright_green().bold() } else { " ".normal() };
            let name = if row.is_user_tier {
                row.tier.name.bright_green().bold()
            } else {
                row.tier.name.normal()
            };
            println!(
                "{} {:<14} {:>8.1} kWh/month  {:>8.2} kg CO₂  {}",
                marker,
                name,
                row.tier.monthly_kwh,
                row.reference_co2_kg,
                format!("{:+.1}%", row.difference_pct).dimmed()
            );
        }

        if !report.advice.is_empty() {
            println!();
            for advice in &report.advice {
                let title = match advice.level {
                    AdviceLevel::Success => advice.title.bright_green().bold(),
                    AdviceLevel::Info => advice.title.bright_blue().bold(),
                    AdviceLevel::Warning => advice.title.yellow().bold(),
                };
                println!("{} {}", title, advice.message);
            }
        }

        if let (Some(first), Some(last)) = (report.long_term.first(), report.long_term.last()) {
            let total: f64 = report.long_term.iter().map(|p| p.energy_kwh).sum();
            println!(
                "\n{} {} to {}: {}",
                "🗓".bright_yellow(),
                first.label,
                last.label,
                format!("{:.3} kWh", total).bright_white().bold()
            );
        }
        println!();
        Ok(())
    }

    pub fn display_recent(&self, recent: &[RecentExchange], json_output: bool) -> Result<()> {
        if json_output {
            return self.print_json(&serde_json::json!({ "recent": recent }));
        }

        self.print_header("LLM Footprint - Recent Exchanges");
        if recent.is_empty() {
            println!("\n{}", "No exchanges recorded yet.".yellow());
            return Ok(());
        }
        println!();

        for entry in recent {
            let when = Local
                .timestamp_millis_opt(entry.timestamp_ms)
                .single()
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string());
            let model = if entry.exchange.model.is_empty() {
                "unknown"
            } else {
                entry.exchange.model.as_str()
            };
            println!(
                "{}  {:<18} {:>7} tokens  {}  {}",
                when.bright_white(),
                model.bright_cyan(),
                entry.exchange.total_tokens(),
                format!("{:>10.4} J", entry.energy_joules).bright_green(),
                format!("{} g CO₂", format_co2(entry.co2_grams)).dimmed()
            );
        }
        println!();
        Ok(())
    }

    pub fn display_mix_change(&self, report: &MixChangeReport, json_output: bool) -> Result<()> {
        if json_output {
            return self.print_json(&serde_json::json!({
                "mix": report.mix,
                "intensityGPerKwh": report.recalculation.intensity_g_per_kwh,
                "previousCo2Grams": report.previous_co2_grams,
                "historyCo2Grams": report.recalculation.history_co2_grams(),
                "totals": report.recalculation.cached_totals,
                "entries": report.recalculation.history.len(),
            }));
        }

        let label = report.mix.as_deref().unwrap_or("custom intensity");
        println!(
            "\n{} Energy mix set to {} ({:.0} g/kWh)",
            "✅".bright_green(),
            label.bright_white().bold(),
            report.recalculation.intensity_g_per_kwh
        );
        println!(
            "   {} exchanges recalculated, history CO₂ now {}",
            report.recalculation.history.len(),
            format!("{} g", format_co2(report.recalculation.history_co2_grams())).bright_green()
        );
        if let Some(previous) = report.previous_co2_grams {
            println!("   {}", format!("previously {} g", format_co2(previous)).dimmed());
        }
        println!();
        Ok(())
    }

    pub fn display_mixes(&self, table: &CarbonIntensityTable, json_output: bool) -> Result<()> {
        if json_output {
            return self.print_json(table);
        }

        self.print_header("LLM Footprint - Energy Mixes");
        println!();
        for (key, mix) in table.mixes() {
            println!(
                "{:<16} {:<24} {}",
                key.bright_cyan(),
                mix.name,
                format!("{:>5.0} g/kWh", mix.intensity).bright_white()
            );
        }
        println!();
        Ok(())
    }
}

fn bar(value: f64, peak: f64) -> String {
    if peak <= 0.0 || !value.is_finite() {
        return String::new();
    }
    let filled = ((value / peak) * BAR_WIDTH as f64).round().clamp(0.0, BAR_WIDTH as f64) as usize;
    "█".repeat(filled)
}
