//! Engine configuration
//!
//! Every threshold and learning constant lives here. Missing keys in a JSON override
//! fall back to the defaults, so a config file only needs the values it changes.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Thresholds for classification, acceptance and the structural checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum exemplar similarity for a field to get a semantic type
    pub classification_threshold: f64,
    /// Acceptance threshold for per-field corrections before learning adjusts it
    pub base_threshold: f64,
    /// Acceptance threshold while a pattern's weight is still near neutral
    pub uncertain_threshold: f64,
    /// Distance from weight 1.0 within which a pattern counts as uncertain
    pub uncertainty_band: f64,
    /// Acceptance threshold for fields classified `unknown`
    pub unknown_type_threshold: f64,
    /// Acceptance threshold for arithmetic and cross-field rules
    pub cross_field_threshold: f64,
    /// Minimum swap score for a pair to be considered
    pub swap_threshold: f64,
    /// Swap score above which the type check is skipped
    pub swap_override_threshold: f64,
    /// Minimum context similarity for reusing a confirmed correction
    pub similarity_threshold: f64,
    /// Logged overrides needed before historical votes count
    pub historical_min_entries: usize,
    /// Identical overrides needed for a historical vote to win
    pub historical_min_agreement: usize,
    /// Allowed gap between stated and implied IRR, in percentage points
    pub irr_tolerance: f64,
    pub learning: LearningConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            classification_threshold: 0.75,
            base_threshold: 0.8,
            uncertain_threshold: 0.75,
            uncertainty_band: 0.05,
            unknown_type_threshold: 0.9,
            cross_field_threshold: 0.9,
            swap_threshold: 0.85,
            swap_override_threshold: 0.95,
            similarity_threshold: 0.85,
            historical_min_entries: 6,
            historical_min_agreement: 3,
            irr_tolerance: 5.0,
            learning: LearningConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        serde_json::from_str(s).context("invalid engine config")
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config {}", path.display()))?;
        Self::from_json_str(&raw)
    }
}

/// Online learning constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    pub reward_factor: f64,
    pub penalty_factor: f64,
    pub min_weight: f64,
    pub max_weight: f64,
    pub initial_epsilon: f64,
    pub epsilon_decay: f64,
    pub epsilon_floor: f64,
    /// Seed for the explore/exploit draw; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            reward_factor: 1.05,
            penalty_factor: 0.95,
            min_weight: 0.1,
            max_weight: 10.0,
            initial_epsilon: 0.2,
            epsilon_decay: 0.99,
            epsilon_floor: 0.01,
            seed: None,
        }
    }
}
