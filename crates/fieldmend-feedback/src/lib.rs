//! Fieldmend Feedback: Folding Human Validation Back into the Engine
//!
//! Every processed document waits here until DataOps returns its validated
//! version. Reconciliation compares the engine's decisions against that ground truth,
//! updates the aggregate metrics and teaches the engine:
//!
//! ```text
//! process(doc, id) ──► engine.detect_and_correct ──► pending[id]
//!                                                       │
//! receive_validation(id, truth) ◄───────────────────────┘
//!     ├── confirmed decision   ──► accepted++, reinforce (similarity store)
//!     ├── overturned decision  ──► rejected++, override history
//!     ├── missed field         ──► rejected++, override history
//!     ├── pattern weight update (accepted iff nothing overturned or missed)
//!     └── pending[id] removed
//! ```
//!
//! Validation for an unknown id is ignored.

pub mod metrics;
pub mod pending;

pub use metrics::{CorrectionBreakdown, FeedbackMetrics};
pub use pending::PendingValidation;

use fieldmend_engine::{values_match, CorrectionDecision, CorrectionEngine, Document, LearningStep};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// What `process` hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub document_id: String,
    pub corrected_data: Document,
    pub corrections_made: usize,
    /// Mean decision confidence, 1.0 when nothing was corrected.
    pub confidence: f64,
}

/// Result of reconciling one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub document_id: String,
    pub correct: u64,
    pub incorrect: u64,
    pub missed: u64,
    /// Overall verdict fed to the learning update.
    pub accepted: bool,
    /// Confirmed corrections stored for similarity matching.
    pub reinforced: usize,
    pub learning: LearningStep,
}

pub struct FeedbackLoop {
    engine: Arc<CorrectionEngine>,
    pending: Mutex<HashMap<String, PendingValidation>>,
    metrics: Mutex<FeedbackMetrics>,
}

impl FeedbackLoop {
    pub fn new(engine: Arc<CorrectionEngine>) -> Self {
        Self {
            engine,
            pending: Mutex::new(HashMap::new()),
            metrics: Mutex::new(FeedbackMetrics::default()),
        }
    }

    pub fn engine(&self) -> &Arc<CorrectionEngine> {
        &self.engine
    }

    /// Correct `document` and hold it for validation under `document_id`.
    ///
    /// Processing the same id again replaces the earlier pending record.
    pub async fn process(
        &self,
        document: Document,
        document_id: impl Into<String>,
    ) -> ProcessSummary {
        let document_id = document_id.into();
        let outcome = self.engine.detect_and_correct(&document).await;

        let summary = ProcessSummary {
            document_id: document_id.clone(),
            corrected_data: outcome.corrected.clone(),
            corrections_made: outcome.decisions.len(),
            confidence: outcome.mean_confidence(),
        };

        let record = PendingValidation::new(document_id.clone(), document, outcome);
        if self.pending.lock().insert(document_id.clone(), record).is_some() {
            tracing::debug!(document_id = %document_id, "replaced pending validation");
        }
        self.metrics.lock().record_processed(summary.corrections_made);

        tracing::info!(
            document_id = %document_id,
            corrections = summary.corrections_made,
            confidence = summary.confidence,
            "document awaiting validation"
        );
        summary
    }

    /// Reconcile `document_id` against `ground_truth`. `None` if the id is not pending.
    pub async fn receive_validation(
        &self,
        document_id: &str,
        ground_truth: &Document,
    ) -> Option<ValidationReport> {
        let Some(pending) = self.pending.lock().remove(document_id) else {
            tracing::debug!(document_id = %document_id, "validation for unknown document ignored");
            return None;
        };

        let mut correct = 0u64;
        let mut incorrect = 0u64;
        let mut confirmed: Vec<&CorrectionDecision> = Vec::new();

        for decision in &pending.decisions {
            let Some(truth) = ground_truth.get(decision.field()) else {
                continue;
            };
            if values_match(truth, decision.corrected_value()) {
                correct += 1;
                confirmed.push(decision);
            } else {
                incorrect += 1;
                self.engine.learn_from_override(
                    decision.field(),
                    pending.classifications.type_of(decision.field()),
                    decision.corrected_value().clone(),
                    truth.clone(),
                    &pending.original,
                );
            }
        }

        let corrected_fields: HashSet<&str> = pending.decisions.iter().map(|d| d.field()).collect();
        let mut missed = 0u64;
        for (field, truth) in ground_truth.iter() {
            if corrected_fields.contains(field.as_str()) {
                continue;
            }
            let Some(original) = pending.original.get(field) else {
                continue;
            };
            let left: &Value = pending.corrected.get(field).unwrap_or(original);
            if !values_match(truth, left) {
                missed += 1;
                self.engine.learn_from_override(
                    field,
                    pending.classifications.type_of(field),
                    original.clone(),
                    truth.clone(),
                    &pending.original,
                );
            }
        }

        let mut reinforced = 0;
        for decision in confirmed {
            if values_match(decision.original_value(), decision.corrected_value()) {
                continue;
            }
            let semantic_type = pending.classifications.type_of(decision.field());
            if self
                .engine
                .reinforce(decision, semantic_type, &pending.original)
                .await
            {
                reinforced += 1;
            }
        }

        let accepted = incorrect == 0 && missed == 0;
        let learning = self.engine.record_outcome(&pending.pattern, accepted);
        self.metrics
            .lock()
            .record_validation(correct, incorrect, missed);

        tracing::info!(
            document_id = %document_id,
            correct,
            incorrect,
            missed,
            accepted,
            weight = learning.weight_after,
            "validation reconciled"
        );

        Some(ValidationReport {
            document_id: document_id.to_string(),
            correct,
            incorrect,
            missed,
            accepted,
            reinforced,
            learning,
        })
    }

    pub fn metrics(&self) -> FeedbackMetrics {
        self.metrics.lock().clone()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn pending(&self, document_id: &str) -> Option<PendingValidation> {
        self.pending.lock().get(document_id).cloned()
    }
}
