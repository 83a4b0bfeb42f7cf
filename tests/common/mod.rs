#![allow(dead_code)]

use anyhow::Result;
use chrono::{NaiveDate, TimeZone, Utc};
use llm_footprint::models::{DailyBucket, Exchange};
use llm_footprint::store::{StoreSnapshot, SNAPSHOT_FILE_NAME};
use std::fs;
use std::path::{Path, PathBuf};

pub const DAY_MS: i64 = 86_400_000;

/// Noon UTC on the given date, in epoch milliseconds.
pub fn noon_utc(year: i32, month: u32, day: u32) -> i64 {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0)
        .single()
        .map(|t| t.timestamp_millis())
        .unwrap_or_default()
}

pub fn exchange_at(model: &str, prompt: u64, response: u64, millis: i64) -> Exchange {
    Exchange::new(model, prompt, response)
        .with_id(format!("exchange-{}-{}", millis, prompt))
        .at(millis)
}

pub fn buckets(start: NaiveDate, values: &[f64]) -> Vec<DailyBucket> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| DailyBucket {
            date: start + chrono::Duration::days(i as i64),
            energy_kwh: *v,
            exchanges: 1,
        })
        .collect()
}

pub fn write_snapshot(dir: &Path, snapshot: &StoreSnapshot) -> Result<PathBuf> {
    let path = dir.join(SNAPSHOT_FILE_NAME);
    fs::write(&path, serde_json::to_string_pretty(snapshot)?)?;
    Ok(path)
}

pub fn write_raw_snapshot(dir: &Path, content: &str) -> Result<PathBuf> {
    let path = dir.join(SNAPSHOT_FILE_NAME);
    fs::write(&path, content)?;
    Ok(path)
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
