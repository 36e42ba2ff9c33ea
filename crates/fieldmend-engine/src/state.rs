//! Persisted learning state
//!
//! Everything the engine learns from validation (pattern statistics, epsilon and the
//! learning curve, the override history and the confirmed corrections) in one JSON
//! envelope:
//!
//! ```text
//! {
//!   "format_version": 1,
//!   "learning":         { patterns, epsilon, learning_curve },
//!   "history":          [[key, [entry, ...]], ...],
//!   "success_patterns": [pattern, ...]
//! }
//! ```

use crate::learning::LearningStateSnapshot;
use crate::strategies::{HistoricalEntry, HistoryKey, SuccessPattern};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current format version
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningSnapshot {
    pub format_version: u32,
    pub learning: LearningStateSnapshot,
    pub history: Vec<(HistoryKey, Vec<HistoricalEntry>)>,
    pub success_patterns: Vec<SuccessPattern>,
}

impl LearningSnapshot {
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize learning state")
    }

    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let snapshot: Self = serde_json::from_str(s).context("invalid learning state")?;
        if snapshot.format_version > FORMAT_VERSION {
            bail!(
                "learning state format {} is newer than supported format {}",
                snapshot.format_version,
                FORMAT_VERSION
            );
        }
        Ok(snapshot)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write learning state {}", path.display()))
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read learning state {}", path.display()))?;
        Self::from_json(&raw)
    }
}
