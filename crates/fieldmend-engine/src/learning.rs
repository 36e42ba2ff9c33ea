//! Online learning state
//!
//! Documents are grouped by [`StructuralPattern`], the sorted set of their field names
//! and value kinds. Each pattern carries a multiplicative weight that validation
//! outcomes push up (accepted) or down (rejected) within configured bounds. The weight
//! feeds the adaptive acceptance threshold in [`crate::gate`].
//!
//! A process-wide epsilon drives an explore/exploit draw per document. The draw is
//! advisory: it is reported and logged but never changes which corrections are made.
//!
//! ```text
//! update(pattern, accepted)
//!     weight  *= reward_factor | penalty_factor   (clamped)
//!     rewards += +1 | -1
//!     epsilon  = max(epsilon * decay, floor)
//!     curve   += {pattern, weight, reward, epsilon, timestamp}
//! ```

use crate::config::LearningConfig;
use crate::document::{Document, ValueKind};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

// ============================================================================
// Structural patterns
// ============================================================================

/// Shape of a document: sorted `(field name, value kind)` pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructuralPattern {
    fields: Vec<(String, ValueKind)>,
}

impl StructuralPattern {
    pub fn of(document: &Document) -> Self {
        let mut fields: Vec<(String, ValueKind)> = document
            .iter()
            .map(|(name, value)| (name.clone(), ValueKind::of(value)))
            .collect();
        fields.sort();
        Self { fields }
    }

    pub fn fields(&self) -> &[(String, ValueKind)] {
        &self.fields
    }

    /// Short stable identifier, used in logs.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_string().as_bytes());
        let digest: [u8; 32] = hasher.finalize().into();
        digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for StructuralPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, (name, kind)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}:{}", name, kind)?;
        }
        f.write_str(")")
    }
}

// ============================================================================
// Per-pattern statistics
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternStats {
    pub count: u64,
    pub accepted: u64,
    pub weight: f64,
    /// +1 for every accepted outcome, -1 for every rejected one, in order.
    pub rewards: Vec<i8>,
}

impl Default for PatternStats {
    fn default() -> Self {
        Self {
            count: 0,
            accepted: 0,
            weight: 1.0,
            rewards: Vec::new(),
        }
    }
}

impl PatternStats {
    pub fn acceptance_rate(&self) -> Option<f64> {
        (self.count > 0).then(|| self.accepted as f64 / self.count as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    Explore,
    Exploit,
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingMode::Explore => f.write_str("explore"),
            ProcessingMode::Exploit => f.write_str("exploit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningCurvePoint {
    pub pattern: StructuralPattern,
    pub weight: f64,
    pub reward: i8,
    pub epsilon: f64,
    pub timestamp: DateTime<Utc>,
}

/// What one `update` did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningStep {
    pub accepted: bool,
    pub weight_before: f64,
    pub weight_after: f64,
    pub reward: i8,
    pub epsilon: f64,
}

/// Serializable copy of the learned statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningStateSnapshot {
    pub patterns: Vec<(StructuralPattern, PatternStats)>,
    pub epsilon: f64,
    pub learning_curve: Vec<LearningCurvePoint>,
}

struct Exploration {
    epsilon: f64,
    curve: Vec<LearningCurvePoint>,
    rng: StdRng,
}

// ============================================================================
// Learning state
// ============================================================================

pub struct LearningState {
    config: LearningConfig,
    stats: DashMap<StructuralPattern, PatternStats>,
    exploration: Mutex<Exploration>,
}

impl LearningState {
    pub fn new(config: LearningConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            exploration: Mutex::new(Exploration {
                epsilon: config.initial_epsilon,
                curve: Vec::new(),
                rng,
            }),
            stats: DashMap::new(),
            config,
        }
    }

    /// Learned weight; patterns never seen are neutral.
    pub fn weight(&self, pattern: &StructuralPattern) -> f64 {
        self.stats.get(pattern).map(|s| s.weight).unwrap_or(1.0)
    }

    pub fn stats(&self, pattern: &StructuralPattern) -> Option<PatternStats> {
        self.stats.get(pattern).map(|s| s.clone())
    }

    pub fn pattern_count(&self) -> usize {
        self.stats.len()
    }

    /// A pattern is uncertain while its weight is within `band` of neutral.
    pub fn is_uncertain(&self, pattern: &StructuralPattern, band: f64) -> bool {
        (self.weight(pattern) - 1.0).abs() < band
    }

    pub fn explore_or_exploit(&self) -> ProcessingMode {
        let mut exploration = self.exploration.lock();
        let epsilon = exploration.epsilon;
        if exploration.rng.gen::<f64>() < epsilon {
            ProcessingMode::Explore
        } else {
            ProcessingMode::Exploit
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.exploration.lock().epsilon
    }

    pub fn learning_curve(&self) -> Vec<LearningCurvePoint> {
        self.exploration.lock().curve.clone()
    }

    /// Fold one validation outcome into the pattern's statistics.
    pub fn update(&self, pattern: &StructuralPattern, accepted: bool) -> LearningStep {
        let reward: i8 = if accepted { 1 } else { -1 };
        let (weight_before, weight_after) = {
            let mut stats = self.stats.entry(pattern.clone()).or_default();
            let before = stats.weight;
            let factor = if accepted {
                self.config.reward_factor
            } else {
                self.config.penalty_factor
            };
            stats.count += 1;
            if accepted {
                stats.accepted += 1;
            }
            stats.rewards.push(reward);
            stats.weight = (before * factor).clamp(self.config.min_weight, self.config.max_weight);
            (before, stats.weight)
        };

        let epsilon = {
            let mut exploration = self.exploration.lock();
            exploration.epsilon =
                (exploration.epsilon * self.config.epsilon_decay).max(self.config.epsilon_floor);
            let epsilon = exploration.epsilon;
            exploration.curve.push(LearningCurvePoint {
                pattern: pattern.clone(),
                weight: weight_after,
                reward,
                epsilon,
                timestamp: Utc::now(),
            });
            epsilon
        };

        tracing::info!(
            pattern = %pattern.fingerprint(),
            accepted,
            weight_before,
            weight_after,
            epsilon,
            "learning update"
        );

        LearningStep {
            accepted,
            weight_before,
            weight_after,
            reward,
            epsilon,
        }
    }

    pub fn snapshot(&self) -> LearningStateSnapshot {
        let mut patterns: Vec<(StructuralPattern, PatternStats)> = self
            .stats
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        patterns.sort_by(|a, b| a.0.cmp(&b.0));
        let exploration = self.exploration.lock();
        LearningStateSnapshot {
            patterns,
            epsilon: exploration.epsilon,
            learning_curve: exploration.curve.clone(),
        }
    }

    /// Replace all learned statistics with `snapshot`. The RNG is left as is.
    pub fn restore(&self, snapshot: LearningStateSnapshot) {
        self.stats.clear();
        for (pattern, stats) in snapshot.patterns {
            self.stats.insert(pattern, stats);
        }
        let mut exploration = self.exploration.lock();
        exploration.epsilon = snapshot.epsilon;
        exploration.curve = snapshot.learning_curve;
    }
}
