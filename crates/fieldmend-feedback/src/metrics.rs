//! Aggregate validation metrics

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionBreakdown {
    /// Applied corrections validation confirmed
    pub correct: u64,
    /// Applied corrections validation overturned
    pub incorrect: u64,
    /// Fields validation changed that the engine left alone
    pub missed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackMetrics {
    pub total_corrections: u64,
    pub accepted_corrections: u64,
    pub rejected_corrections: u64,
    /// `accepted / (accepted + rejected)`; 1.0 until the first validated correction.
    pub accuracy: f64,
    pub correction_breakdown: CorrectionBreakdown,
}

impl Default for FeedbackMetrics {
    fn default() -> Self {
        Self {
            total_corrections: 0,
            accepted_corrections: 0,
            rejected_corrections: 0,
            accuracy: 1.0,
            correction_breakdown: CorrectionBreakdown::default(),
        }
    }
}

impl FeedbackMetrics {
    pub(crate) fn record_processed(&mut self, corrections: usize) {
        self.total_corrections += corrections as u64;
    }

    pub(crate) fn record_validation(&mut self, correct: u64, incorrect: u64, missed: u64) {
        self.accepted_corrections += correct;
        self.rejected_corrections += incorrect + missed;
        self.correction_breakdown.correct += correct;
        self.correction_breakdown.incorrect += incorrect;
        self.correction_breakdown.missed += missed;

        let validated = self.accepted_corrections + self.rejected_corrections;
        if validated > 0 {
            self.accuracy = self.accepted_corrections as f64 / validated as f64;
        }
    }
}
