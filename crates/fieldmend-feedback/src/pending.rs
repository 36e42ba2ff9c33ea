//! Documents awaiting validation

use chrono::{DateTime, Utc};
use fieldmend_engine::{
    Classification, CorrectionDecision, DetectionOutcome, Document, StructuralPattern,
};
use serde::{Deserialize, Serialize};

/// Everything needed to reconcile one processed document against its ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingValidation {
    pub document_id: String,
    pub original: Document,
    pub corrected: Document,
    pub decisions: Vec<CorrectionDecision>,
    pub classifications: Classification,
    /// Pattern of `original`; the key the learning update goes to.
    pub pattern: StructuralPattern,
    pub processed_at: DateTime<Utc>,
}

impl PendingValidation {
    pub fn new(document_id: String, original: Document, outcome: DetectionOutcome) -> Self {
        Self {
            document_id,
            original,
            corrected: outcome.corrected,
            decisions: outcome.decisions,
            classifications: outcome.classifications,
            pattern: outcome.pattern,
            processed_at: Utc::now(),
        }
    }

    pub fn is_corrected(&self, field: &str) -> bool {
        self.decisions.iter().any(|d| d.field() == field)
    }
}
