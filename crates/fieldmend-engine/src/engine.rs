//! The correction engine
//!
//! ```text
//! document ──► classify fields ──► per-field pass ──► structural pass ──► outcome
//!                                   (failing fields)    accounting
//!                                   pattern rules       totals
//!                                   similarity          quarterly sums/dates
//!                                   history             field swaps
//!                                                       IRR vs multiple
//! ```
//!
//! The per-field pass touches only fields that fail their type's validator (or are
//! `unknown`) and applies at most one decision per field, gated by the adaptive
//! threshold. Structural rules run afterwards on the partly corrected document and
//! take precedence: a structural decision on a field replaces the per-field one, so
//! each field ends up with at most one applied decision.

use crate::catalogue::SemanticType;
use crate::checks::{ArithmeticChecker, CheckOutcome, SwapDetector};
use crate::classifier::{Classification, FieldTypeClassifier};
use crate::config::EngineConfig;
use crate::decision::CorrectionDecision;
use crate::document::{values_match, Document};
use crate::embedding::{Embedder, TokenHashEmbedder};
use crate::gate::ConfidenceGate;
use crate::learning::{
    LearningCurvePoint, LearningState, LearningStep, PatternStats, ProcessingMode,
    StructuralPattern,
};
use crate::state::{LearningSnapshot, FORMAT_VERSION};
use crate::strategies::{
    DeferredCandidate, FieldContext, HistoricalPatternCorrector, HistoryKey, PatternCorrector,
    SimilarityCorrector, SuccessPattern,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Result of one `detect_and_correct` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionOutcome {
    pub corrected: Document,
    /// Applied decisions, in the order they were applied.
    pub decisions: Vec<CorrectionDecision>,
    pub classifications: Classification,
    /// Pattern of the input document.
    pub pattern: StructuralPattern,
    pub mode: ProcessingMode,
    pub uncertain: bool,
    /// Adaptive threshold the per-field pass used.
    pub threshold: f64,
    /// Proposals that did not clear their threshold.
    pub deferred: Vec<DeferredCandidate>,
    /// Per-field decisions replaced by a structural rule on the same field. A structural
    /// decision replaced by a later one is dropped.
    pub superseded: Vec<CorrectionDecision>,
}

impl DetectionOutcome {
    pub fn decision_for(&self, field: &str) -> Option<&CorrectionDecision> {
        self.decisions.iter().find(|d| d.field() == field)
    }

    /// Mean decision confidence, 1.0 when nothing was corrected.
    pub fn mean_confidence(&self) -> f64 {
        if self.decisions.is_empty() {
            return 1.0;
        }
        self.decisions.iter().map(|d| d.confidence()).sum::<f64>() / self.decisions.len() as f64
    }
}

/// Edits accumulated while processing one document.
struct Corrections<'a> {
    original: &'a Document,
    corrected: Document,
    applied: Vec<CorrectionDecision>,
    deferred: Vec<DeferredCandidate>,
    superseded: Vec<CorrectionDecision>,
}

impl<'a> Corrections<'a> {
    fn new(original: &'a Document) -> Self {
        Self {
            original,
            corrected: original.clone(),
            applied: Vec::new(),
            deferred: Vec::new(),
            superseded: Vec::new(),
        }
    }

    fn defer(&mut self, decision: CorrectionDecision, threshold: f64) {
        tracing::debug!(
            field = %decision.field(),
            pattern_id = %decision.pattern_id(),
            confidence = decision.confidence(),
            threshold,
            "candidate below threshold"
        );
        self.deferred.push(DeferredCandidate { decision, threshold });
    }

    fn write(&mut self, decision: &CorrectionDecision) -> bool {
        match self
            .corrected
            .insert(decision.field(), decision.corrected_value().clone())
        {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(field = %decision.field(), error = %err, "correction not applied");
                false
            }
        }
    }

    fn apply_field(&mut self, decision: CorrectionDecision) {
        if self.write(&decision) {
            tracing::info!(
                field = %decision.field(),
                pattern_id = %decision.pattern_id(),
                confidence = decision.confidence(),
                "applied correction"
            );
            self.applied.push(decision);
        }
    }

    /// Apply a structural decision, replacing any earlier decision on the same field.
    fn apply_structural(&mut self, decision: CorrectionDecision) {
        let original = self
            .original
            .get(decision.field())
            .cloned()
            .unwrap_or(Value::Null);
        let decision = decision.rebased(original);

        let (replaced, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.applied)
            .into_iter()
            .partition(|d| d.field() == decision.field());
        self.applied = kept;
        for old in replaced {
            if old.pattern_id().is_structural() {
                tracing::debug!(
                    field = %old.field(),
                    replaced = %old.pattern_id(),
                    by = %decision.pattern_id(),
                    "later structural rule replaces earlier one"
                );
                continue;
            }
            tracing::debug!(
                field = %old.field(),
                superseded = %old.pattern_id(),
                by = %decision.pattern_id(),
                "structural rule takes precedence"
            );
            self.superseded.push(old);
        }

        if !self.write(&decision) {
            return;
        }
        if values_match(decision.original_value(), decision.corrected_value()) {
            return;
        }
        tracing::info!(
            field = %decision.field(),
            pattern_id = %decision.pattern_id(),
            confidence = decision.confidence(),
            "applied structural correction"
        );
        self.applied.push(decision);
    }

    fn gate_structural(&mut self, outcome: CheckOutcome, threshold: f64) {
        match outcome {
            CheckOutcome::Propose(d) if ConfidenceGate::admits(d.confidence(), threshold) => {
                self.apply_structural(d)
            }
            CheckOutcome::Propose(d) => self.defer(d, threshold),
            CheckOutcome::Skipped(reason) => {
                tracing::debug!(reason = %reason, "check skipped")
            }
            CheckOutcome::Consistent | CheckOutcome::NotApplicable => {}
        }
    }
}

pub struct CorrectionEngine {
    config: EngineConfig,
    embedder: Arc<dyn Embedder>,
    classifier: FieldTypeClassifier,
    gate: ConfidenceGate,
    patterns: PatternCorrector,
    similarity: SimilarityCorrector,
    historical: HistoricalPatternCorrector,
    arithmetic: ArithmeticChecker,
    swaps: SwapDetector,
    learning: LearningState,
}

impl CorrectionEngine {
    pub fn new(config: EngineConfig, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            classifier: FieldTypeClassifier::new(Arc::clone(&embedder), config.classification_threshold),
            gate: ConfidenceGate::from_config(&config),
            patterns: PatternCorrector::new(),
            similarity: SimilarityCorrector::new(config.similarity_threshold),
            historical: HistoricalPatternCorrector::new(
                config.historical_min_entries,
                config.historical_min_agreement,
            ),
            arithmetic: ArithmeticChecker::new(config.irr_tolerance),
            swaps: SwapDetector::new(config.swap_threshold, config.swap_override_threshold),
            learning: LearningState::new(config.learning.clone()),
            embedder,
            config,
        }
    }

    /// Engine backed by the offline [`TokenHashEmbedder`].
    pub fn with_token_hash_embedder(config: EngineConfig) -> Self {
        Self::new(config, Arc::new(TokenHashEmbedder::default()))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // Detection
    // ========================================================================

    pub async fn detect_and_correct(&self, document: &Document) -> DetectionOutcome {
        let pattern = StructuralPattern::of(document);
        let mode = self.learning.explore_or_exploit();
        let uncertain = self
            .learning
            .is_uncertain(&pattern, self.config.uncertainty_band);
        let threshold = self
            .gate
            .adaptive_threshold(self.learning.weight(&pattern), uncertain);

        let classifications = self.classifier.classify(document).await;
        let context = self.context_embedding(document).await;
        let mut edits = Corrections::new(document);

        // Per-field pass: every proposal sees the original document.
        for (field, value) in document.iter() {
            let semantic_type = classifications.type_of(field);
            if semantic_type != SemanticType::Unknown && semantic_type.validate(value) {
                continue;
            }
            let ctx = FieldContext::new(field, value, semantic_type, document);
            let Some(decision) = self.propose(&ctx, context.as_deref()) else {
                continue;
            };
            let field_threshold = self.gate.field_threshold(semantic_type, threshold);
            if ConfidenceGate::admits(decision.confidence(), field_threshold) {
                edits.apply_field(decision);
            } else {
                edits.defer(decision, field_threshold);
            }
        }

        // Structural pass.
        let cross_field = self.gate.cross_field_threshold();
        let outcome = self.arithmetic.accounting_equation(&edits.corrected);
        edits.gate_structural(outcome, cross_field);
        for outcome in self.arithmetic.cumulative_totals(&edits.corrected) {
            edits.gate_structural(outcome, cross_field);
        }
        let outcome = self.arithmetic.quarterly_sum(&edits.corrected);
        edits.gate_structural(outcome, cross_field);
        let outcome = self.arithmetic.quarterly_dates(&edits.corrected);
        edits.gate_structural(outcome, cross_field);

        // Swap candidates are already gated by the detector's own thresholds.
        for pair in self.swaps.scan(document, &classifications) {
            for decision in pair.into_decisions() {
                edits.apply_structural(decision);
            }
        }

        let outcome = self.arithmetic.irr_consistency(&edits.corrected);
        edits.gate_structural(outcome, cross_field);

        tracing::info!(
            pattern = %pattern.fingerprint(),
            mode = %mode,
            uncertain,
            threshold,
            corrections = edits.applied.len(),
            deferred = edits.deferred.len(),
            "processed document"
        );

        DetectionOutcome {
            corrected: edits.corrected,
            decisions: edits.applied,
            classifications,
            pattern,
            mode,
            uncertain,
            threshold,
            deferred: edits.deferred,
            superseded: edits.superseded,
        }
    }

    /// First proposal wins: rules, then similarity, then history.
    fn propose(&self, ctx: &FieldContext<'_>, context: Option<&[f32]>) -> Option<CorrectionDecision> {
        self.patterns
            .propose(ctx)
            .or_else(|| self.similarity.propose(ctx, context))
            .or_else(|| self.historical.propose(ctx))
    }

    /// Whole-document embedding for the similarity strategy. Skipped while there is
    /// nothing to compare against.
    async fn context_embedding(&self, document: &Document) -> Option<Vec<f32>> {
        if self.similarity.is_empty() {
            return None;
        }
        match self.embedder.embed(&document.context_string()).await {
            Ok(v) => Some(v),
            Err(err) => {
                tracing::warn!(error = %err, "context embedding failed; similarity correction disabled");
                None
            }
        }
    }

    // ========================================================================
    // Learning
    // ========================================================================

    /// Fold a validation outcome for documents of `pattern` into the learned weights.
    pub fn record_outcome(&self, pattern: &StructuralPattern, accepted: bool) -> LearningStep {
        self.learning.update(pattern, accepted)
    }

    /// Log a value validation overrode (or that the engine should have corrected).
    pub fn learn_from_override(
        &self,
        field: &str,
        semantic_type: SemanticType,
        wrong: Value,
        right: Value,
        context: &Document,
    ) {
        self.historical
            .record(HistoryKey::new(field, semantic_type), wrong, right, context.clone());
    }

    /// Store a confirmed correction for the similarity strategy. Returns `false` when
    /// the document context could not be embedded.
    pub async fn reinforce(
        &self,
        decision: &CorrectionDecision,
        semantic_type: SemanticType,
        context: &Document,
    ) -> bool {
        match self.embedder.embed(&context.context_string()).await {
            Ok(embedding) => {
                self.similarity
                    .reinforce(SuccessPattern::new(decision, semantic_type, embedding));
                true
            }
            Err(err) => {
                tracing::warn!(field = %decision.field(), error = %err, "could not reinforce correction");
                false
            }
        }
    }

    pub fn pattern_weight(&self, pattern: &StructuralPattern) -> f64 {
        self.learning.weight(pattern)
    }

    pub fn pattern_stats(&self, pattern: &StructuralPattern) -> Option<PatternStats> {
        self.learning.stats(pattern)
    }

    pub fn epsilon(&self) -> f64 {
        self.learning.epsilon()
    }

    pub fn learning_curve(&self) -> Vec<LearningCurvePoint> {
        self.learning.learning_curve()
    }

    pub fn history_len(&self) -> usize {
        self.historical.len()
    }

    pub fn success_patterns(&self) -> Vec<SuccessPattern> {
        self.similarity.all()
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub fn export_state(&self) -> LearningSnapshot {
        LearningSnapshot {
            format_version: FORMAT_VERSION,
            learning: self.learning.snapshot(),
            history: self.historical.snapshot(),
            success_patterns: self.similarity.all(),
        }
    }

    /// Replace everything learned so far with `state`.
    pub fn import_state(&self, state: LearningSnapshot) {
        self.learning.restore(state.learning);
        self.historical.restore(state.history);
        self.similarity.replace_all(state.success_patterns);
    }

    pub fn save_state(&self, path: &Path) -> anyhow::Result<()> {
        self.export_state().save(path)
    }

    pub fn load_state(&self, path: &Path) -> anyhow::Result<()> {
        let state = LearningSnapshot::load(path)?;
        self.import_state(state);
        Ok(())
    }
}

impl Default for CorrectionEngine {
    fn default() -> Self {
        Self::with_token_hash_embedder(EngineConfig::default())
    }
}
