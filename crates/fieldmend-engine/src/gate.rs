//! Confidence gate
//!
//! Decides whether a proposed correction is applied. Per-field proposals face an
//! adaptive threshold derived from the document's structural-pattern weight:
//!
//! - weight > 1.0: `base * weight`
//! - weight within the uncertainty band of 1.0: the lower uncertain threshold
//! - otherwise: `base`
//!
//! Fields classified `unknown` always use the fixed unknown-type threshold, and the
//! cross-field rules use their own fixed thresholds. Every comparison is strict.

use crate::catalogue::SemanticType;
use crate::config::EngineConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceGate {
    base: f64,
    uncertain: f64,
    unknown: f64,
    cross_field: f64,
}

impl ConfidenceGate {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            base: config.base_threshold,
            uncertain: config.uncertain_threshold,
            unknown: config.unknown_type_threshold,
            cross_field: config.cross_field_threshold,
        }
    }

    /// Threshold for a document whose pattern has `weight`.
    pub fn adaptive_threshold(&self, weight: f64, uncertain: bool) -> f64 {
        if uncertain {
            self.uncertain
        } else if weight > 1.0 {
            self.base * weight
        } else {
            self.base
        }
    }

    /// Threshold for a per-field proposal on a field of `semantic_type`.
    pub fn field_threshold(&self, semantic_type: SemanticType, adaptive: f64) -> f64 {
        match semantic_type {
            SemanticType::Unknown => self.unknown,
            _ => adaptive,
        }
    }

    pub fn cross_field_threshold(&self) -> f64 {
        self.cross_field
    }

    pub fn admits(confidence: f64, threshold: f64) -> bool {
        confidence > threshold
    }
}

impl Default for ConfidenceGate {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}
