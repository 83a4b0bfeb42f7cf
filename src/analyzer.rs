//! Footprint Analysis Engine
//!
//! This module wires the pure estimation, reconciliation and forecasting components to a
//! [`FootprintStore`] and a [`DisplayManager`]. It is the only place where engine results
//! cause writes: the self-healed totals cache and the energy-mix commit.
//!
//! ## Data Flow
//!
//! 1. **Load**: One snapshot is read from the store per operation
//! 2. **Resolve Intensity**: Explicit intensity, else the stored mix selection, else the
//!    configured mix, looked up in the [`CarbonIntensityTable`]
//! 3. **Compute**: Reconciliation, day aggregation, forecasting or tier classification
//! 4. **Persist**: Only for cache healing and mix changes, through the store port
//! 5. **Report**: Terminal or JSON output through the display manager
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use llm_footprint::analyzer::{Command, FootprintAnalyzer, ProcessOptions};
//! use llm_footprint::config::Config;
//! use llm_footprint::store::JsonFileStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::default();
//! let store = JsonFileStore::in_dir(&config.paths.data_directory);
//! let analyzer = FootprintAnalyzer::from_config(store, &config)?;
//!
//! analyzer.run_command(&Command::Totals, &ProcessOptions::default()).await?;
//! # Ok(())
//! # }
//! ```

use crate::aggregator::{DailyAggregator, RecentExchange, UsageProjection};
use crate::carbon::{CarbonConverter, CarbonIntensityTable, Co2Equivalence, GLOBAL_AVERAGE_MIX};
use crate::config::Config;
use crate::display::DisplayManager;
use crate::energy::EnergyEstimator;
use crate::forecast::{
    long_term_projection, thread_source, ForecastAnchor, ForecastBundle, MonthlyPoint, RandomSource,
    ScenarioKey, TrendForecaster, LONG_TERM_MONTHS,
};
use crate::models::DailyBucket;
use crate::recalc::{MixRecalculation, MixRecalculator};
use crate::reconcile::{Reconciliation, StatsReconciler};
use crate::store::{FootprintStore, StoreSnapshot};
use crate::tiers::{Advice, TierComparison, TierTable};
use crate::timestamp_parser::{now_millis, DayBoundary};
use anyhow::{ensure, Result};
use chrono::Duration;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Totals,
    Daily,
    Forecast,
    Tiers,
    Recent,
    Mix(MixSelection),
    Mixes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MixSelection {
    Named(String),
    Intensity(f64),
}

#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    pub json_output: bool,
    pub limit: Option<usize>,
    pub scenario: Option<ScenarioKey>,
    pub horizon_days: Option<usize>,
    pub anchor: Option<ForecastAnchor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsReport {
    pub reconciliation: Reconciliation,
    pub intensity_g_per_kwh: f64,
    pub equivalence: Co2Equivalence,
    pub healed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierReport {
    pub projection: UsageProjection,
    pub intensity_g_per_kwh: f64,
    pub user_tier: String,
    pub comparison: Vec<TierComparison>,
    pub advice: Vec<Advice>,
    pub long_term: Vec<MonthlyPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MixChangeReport {
    pub mix: Option<String>,
    pub previous_co2_grams: Option<f64>,
    pub recalculation: MixRecalculation,
}

pub struct FootprintAnalyzer<S> {
    store: S,
    estimator: EnergyEstimator,
    mixes: CarbonIntensityTable,
    tiers: TierTable,
    boundary: DayBoundary,
    intensity_override: Option<f64>,
    default_mix: String,
    defaults: ProcessDefaults,
    display_manager: DisplayManager,
}

#[derive(Debug, Clone)]
struct ProcessDefaults {
    scenario: ScenarioKey,
    horizon_days: usize,
    anchor: ForecastAnchor,
    daily_limit: usize,
    recent_limit: usize,
}

impl<S: FootprintStore> FootprintAnalyzer<S> {
    pub fn new(store: S) -> Self {
        Self::with_tables(store, &Config::default(), CarbonIntensityTable::builtin(), TierTable::builtin())
    }

    pub fn from_config(store: S, config: &Config) -> Result<Self> {
        let mixes = match &config.paths.intensity_file {
            Some(path) => CarbonIntensityTable::load(path)?,
            None => CarbonIntensityTable::builtin(),
        };
        Ok(Self::with_tables(store, config, mixes, TierTable::builtin()))
    }

    pub fn with_tables(store: S, config: &Config, mixes: CarbonIntensityTable, tiers: TierTable) -> Self {
        Self {
            store,
            estimator: EnergyEstimator::new(),
            mixes,
            tiers,
            boundary: config.engine.day_boundary,
            intensity_override: config.engine.carbon_intensity,
            default_mix: config.engine.selected_mix.clone(),
            defaults: ProcessDefaults {
                scenario: config.scenario(),
                horizon_days: config.forecast.horizon_days,
                anchor: config.forecast.anchor,
                daily_limit: config.output.daily_limit,
                recent_limit: config.output.recent_limit,
            },
            display_manager: DisplayManager::new(config.output.json_pretty),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn intensity_for(&self, snapshot: &StoreSnapshot) -> f64 {
        if let Some(intensity) = self.intensity_override.or(snapshot.custom_intensity) {
            return intensity;
        }
        let key = snapshot
            .selected_country
            .as_deref()
            .unwrap_or(self.default_mix.as_str());
        self.mixes.intensity_for(key)
    }

    fn reconciler(&self, intensity: f64) -> StatsReconciler {
        StatsReconciler::new(self.estimator.clone(), CarbonConverter::new(intensity))
    }

    fn aggregator(&self) -> DailyAggregator {
        DailyAggregator::new(self.estimator.clone(), self.boundary)
    }

    /// Reconciled totals; heals the cache through the store when it is missing or stale.
    pub async fn totals(&self) -> Result<TotalsReport> {
        let snapshot = self.store.load().await?;
        let intensity = self.intensity_for(&snapshot);

        let reconciliation = self.reconciler(intensity).reconcile(
            &snapshot.conversation_history,
            snapshot.last_exchange.as_ref(),
            snapshot.total_stats.as_ref(),
        );

        let healed = match &reconciliation.write_back {
            Some(corrected) => {
                self.store.write_totals(corrected).await?;
                info!(
                    requests = corrected.requests,
                    co2_grams = corrected.co2_grams,
                    "Wrote corrected totals to cache"
                );
                true
            }
            None => false,
        };

        Ok(TotalsReport {
            equivalence: Co2Equivalence::for_grams(reconciliation.totals.co2_grams),
            reconciliation,
            intensity_g_per_kwh: intensity,
            healed,
        })
    }

    pub async fn daily(&self) -> Result<Vec<DailyBucket>> {
        let snapshot = self.store.load().await?;
        Ok(self
            .aggregator()
            .aggregate_by_day(&snapshot.conversation_history, now_millis()))
    }

    pub async fn forecast<R: RandomSource + ?Sized>(
        &self,
        scenario: ScenarioKey,
        horizon_days: usize,
        anchor: ForecastAnchor,
        rng: &mut R,
    ) -> Result<ForecastBundle> {
        ensure!(horizon_days > 0, "Forecast horizon must be at least one day");
        let series = self.daily().await?;
        let first_day = self.boundary.today() + Duration::days(1);
        Ok(TrendForecaster::new(anchor).forecast(
            &series,
            horizon_days,
            &scenario.scenario(),
            first_day,
            rng,
        ))
    }

    pub async fn tier_report(&self) -> Result<TierReport> {
        let snapshot = self.store.load().await?;
        let intensity = self.intensity_for(&snapshot);
        let projection = self
            .aggregator()
            .project_usage(&snapshot.conversation_history, now_millis());

        let classification = self.tiers.classify(projection.monthly_kwh);
        Ok(TierReport {
            user_tier: classification.tier.key.clone(),
            comparison: self.tiers.comparison(projection.monthly_kwh, intensity),
            advice: self.tiers.advise(&projection, intensity),
            long_term: long_term_projection(projection.monthly_kwh, self.boundary.today(), LONG_TERM_MONTHS),
            projection,
            intensity_g_per_kwh: intensity,
        })
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<RecentExchange>> {
        let snapshot = self.store.load().await?;
        let converter = CarbonConverter::new(self.intensity_for(&snapshot));
        Ok(self
            .aggregator()
            .most_recent(&snapshot.conversation_history, limit, &converter, now_millis()))
    }

    /// Recompute CO₂ for a new mix and persist history, session and totals in one commit.
    pub async fn change_mix(&self, selection: &MixSelection) -> Result<MixChangeReport> {
        let snapshot = self.store.load().await?;

        let (mix_key, intensity) = match selection {
            MixSelection::Named(key) => {
                if self.mixes.get(key).is_none() {
                    warn!(mix = %key, "Unknown energy mix, storing global average instead");
                    (GLOBAL_AVERAGE_MIX.to_string(), self.mixes.intensity_for(GLOBAL_AVERAGE_MIX))
                } else {
                    (key.clone(), self.mixes.intensity_for(key))
                }
            }
            MixSelection::Intensity(value) => (String::new(), *value),
        };
        let mix = (!mix_key.is_empty()).then_some(mix_key);

        let recalculation = MixRecalculator::with_estimator(self.estimator.clone()).recalculate(
            &snapshot.conversation_history,
            snapshot.current_session.as_ref(),
            snapshot.total_stats.as_ref(),
            intensity,
        );

        self.store.commit_mix(mix.as_deref(), &recalculation).await?;

        Ok(MixChangeReport {
            mix,
            previous_co2_grams: snapshot.total_stats.map(|totals| totals.co2_grams),
            recalculation,
        })
    }

    pub fn mixes(&self) -> &CarbonIntensityTable {
        &self.mixes
    }

    pub async fn run_command(&self, command: &Command, options: &ProcessOptions) -> Result<()> {
        let json = options.json_output;
        match command {
            Command::Totals => {
                let report = self.totals().await?;
                self.display_manager.display_totals(&report, json)
            }
            Command::Daily => {
                let mut buckets = self.daily().await?;
                let limit = options.limit.unwrap_or(self.defaults.daily_limit);
                if buckets.len() > limit {
                    buckets.drain(..buckets.len() - limit);
                }
                self.display_manager.display_daily(&buckets, json)
            }
            Command::Forecast => {
                let scenario = options.scenario.unwrap_or(self.defaults.scenario);
                let horizon = options.horizon_days.unwrap_or(self.defaults.horizon_days);
                let anchor = options.anchor.unwrap_or(self.defaults.anchor);
                let bundle = self.forecast(scenario, horizon, anchor, &mut thread_source()).await?;
                self.display_manager.display_forecast(&bundle, json)
            }
            Command::Tiers => {
                let report = self.tier_report().await?;
                self.display_manager.display_tiers(&report, json)
            }
            Command::Recent => {
                let limit = options.limit.unwrap_or(self.defaults.recent_limit);
                let recent = self.recent(limit).await?;
                self.display_manager.display_recent(&recent, json)
            }
            Command::Mix(selection) => {
                let report = self.change_mix(selection).await?;
                self.display_manager.display_mix_change(&report, json)
            }
            Command::Mixes => self.display_manager.display_mixes(&self.mixes, json),
        }
    }
}
