//! Storage Port
//!
//! The engine reads a snapshot of the key/value store and hands back records to persist;
//! it never talks to storage directly. [`FootprintStore`] is the seam, with a JSON file
//! implementation for the CLI and an in-memory one for tests and embedding.
//!
//! ## Snapshot Keys
//!
//! | Key | Content |
//! |-----|---------|
//! | `conversationHistory` | every persisted [`Exchange`], insertion ordered |
//! | `lastExchange` | the most recently captured exchange, possibly not yet in history |
//! | `currentSession` | the exchange currently shown as "this conversation" |
//! | `totalStats` | cached [`AggregateTotals`] |
//! | `selectedCountry` | key of the selected energy mix |

use crate::models::{AggregateTotals, Exchange};
use crate::recalc::MixRecalculation;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const SNAPSHOT_FILE_NAME: &str = "footprint.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    #[serde(default)]
    pub conversation_history: Vec<Exchange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_exchange: Option<Exchange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_session: Option<Exchange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_stats: Option<AggregateTotals>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_country: Option<String>,
    /// Intensity chosen directly in g/kWh; takes precedence over the selected mix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_intensity: Option<f64>,
}

impl StoreSnapshot {
    fn apply_mix(&mut self, mix_key: Option<&str>, recalculation: &MixRecalculation) {
        self.conversation_history = recalculation.history.clone();
        self.current_session = recalculation.current_session.clone();
        self.total_stats = recalculation.cached_totals;
        match mix_key {
            Some(key) => {
                self.selected_country = Some(key.to_string());
                self.custom_intensity = None;
            }
            None => self.custom_intensity = Some(recalculation.intensity_g_per_kwh),
        }
    }
}

#[allow(async_fn_in_trait)]
pub trait FootprintStore {
    async fn load(&self) -> Result<StoreSnapshot>;

    /// Replace the cached totals.
    async fn write_totals(&self, totals: &AggregateTotals) -> Result<()>;

    /// Persist history, session, totals and mix selection together.
    async fn commit_mix(&self, mix_key: Option<&str>, recalculation: &MixRecalculation) -> Result<()>;
}

/// Snapshot kept in a single JSON file. Writes go through a temporary file that is renamed
/// over the original, so readers see either the old or the new snapshot.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SNAPSHOT_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
            }
        }

        let content = serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, content)
            .await
            .with_context(|| format!("Failed to write snapshot: {}", staging.display()))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .with_context(|| format!("Failed to replace snapshot: {}", self.path.display()))?;

        tracing::debug!(path = %self.path.display(), "Snapshot saved");
        Ok(())
    }
}

impl FootprintStore for JsonFileStore {
    async fn load(&self) -> Result<StoreSnapshot> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            tracing::debug!(path = %self.path.display(), "No snapshot yet, starting empty");
            return Ok(StoreSnapshot::default());
        }

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read snapshot: {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(StoreSnapshot::default());
        }

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse snapshot: {}", self.path.display()))
    }

    async fn write_totals(&self, totals: &AggregateTotals) -> Result<()> {
        let mut snapshot = self.load().await?;
        snapshot.total_stats = Some(*totals);
        self.save(&snapshot).await
    }

    async fn commit_mix(&self, mix_key: Option<&str>, recalculation: &MixRecalculation) -> Result<()> {
        let mut snapshot = self.load().await?;
        snapshot.apply_mix(mix_key, recalculation);
        self.save(&snapshot).await
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<StoreSnapshot>,
}

impl MemoryStore {
    pub fn new(snapshot: StoreSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreSnapshot> {
        // the snapshot is always replaced whole, so a poisoned lock still holds a consistent value
        self.snapshot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl FootprintStore for MemoryStore {
    async fn load(&self) -> Result<StoreSnapshot> {
        Ok(self.snapshot())
    }

    async fn write_totals(&self, totals: &AggregateTotals) -> Result<()> {
        self.lock().total_stats = Some(*totals);
        Ok(())
    }

    async fn commit_mix(&self, mix_key: Option<&str>, recalculation: &MixRecalculation) -> Result<()> {
        self.lock().apply_mix(mix_key, recalculation);
        Ok(())
    }
}
