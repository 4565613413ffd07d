//! Persisted check results
//!
//! A standalone resource check writes its full snapshot and verdict to a
//! JSON file so operators can inspect why a launch was refused.

use crate::models::{ResourceSnapshot, ResourceVerdict};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Full result of one resource check invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    pub timestamp: i64,
    pub snapshot: ResourceSnapshot,
    pub verdict: ResourceVerdict,
}

impl CheckReport {
    pub fn new(snapshot: ResourceSnapshot, verdict: ResourceVerdict) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp(),
            snapshot,
            verdict,
        }
    }
}

/// Write a check report as pretty-printed JSON
pub fn write_report(path: &Path, report: &CheckReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize check report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write check report to {}", path.display()))?;
    Ok(())
}
