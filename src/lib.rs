//! LLM Footprint Library
//!
//! Estimates the energy and CO₂ footprint of LLM conversations, keeps cached totals
//! consistent with the exchange log, aggregates usage per day and forecasts it.
//!
//! ## Core Features
//!
//! - **Energy estimation**: Measured energy when significant, otherwise a per-model
//!   heuristic from token counts
//! - **Carbon conversion**: kWh to grams of CO₂ for a selectable energy mix
//! - **Reconciliation**: Cached totals are trusted only when consistent with history,
//!   and corrected values are handed back for persistence
//! - **Forecasting**: Trend and noise based daily projection with a confidence band
//! - **Tier classification**: Projected monthly use compared with reference brackets
//!
//! ## Architecture Overview
//!
//! - [`models`] - Exchange records, totals, daily buckets and reference tiers
//! - [`timestamp_parser`] - Timestamp normalization and calendar-day boundaries
//! - [`energy`] - Per-exchange energy estimation
//! - [`carbon`] - Unit conversion, intensity table and CO₂ equivalences
//! - [`tiers`] - Tier classification, comparison and advice
//! - [`aggregator`] - Daily series and usage projection
//! - [`forecast`] - Scenario forecasting and long-term projection
//! - [`reconcile`] - Totals reconciliation and cache healing
//! - [`recalc`] - CO₂ recalculation after an energy-mix change
//! - [`store`] - Storage port with JSON file and in-memory implementations
//! - [`analyzer`] - Orchestration over a store
//! - [`display`] - Terminal and JSON output
//! - [`config`] - Configuration management with environment variable support
//! - [`logging`] - Structured logging with JSON and pretty-print formats
//!
//! ## Main Entry Point
//!
//! ```rust
//! use llm_footprint::{Exchange, FootprintAnalyzer};
//! use llm_footprint::store::{MemoryStore, StoreSnapshot};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let snapshot = StoreSnapshot {
//!     conversation_history: vec![Exchange::new("gpt-4", 100, 50).with_id("exchange-1700000000000-a")],
//!     ..StoreSnapshot::default()
//! };
//! let analyzer = FootprintAnalyzer::new(MemoryStore::new(snapshot));
//!
//! let report = analyzer.totals().await?;
//! assert_eq!(report.reconciliation.totals.requests, 1);
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod analyzer;
pub mod carbon;
pub mod config;
pub mod display;
pub mod energy;
pub mod forecast;
pub mod logging;
pub mod models;
pub mod recalc;
pub mod reconcile;
pub mod store;
pub mod tiers;
pub mod timestamp_parser;

pub use analyzer::FootprintAnalyzer;
pub use models::*;
