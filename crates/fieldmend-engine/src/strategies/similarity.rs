//! Nearest-neighbour correction over reinforced successes
//!
//! Every correction that validation confirmed is stored with the embedding of the
//! document it came from. A failing field of the same semantic type in a sufficiently
//! similar document gets the stored correction, with the similarity as confidence.

use super::FieldContext;
use crate::catalogue::SemanticType;
use crate::decision::{CorrectionDecision, PatternId};
use crate::document::values_match;
use crate::embedding::cosine_similarity;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// A confirmed correction and the document context it was made in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessPattern {
    pub id: Uuid,
    pub field: String,
    pub semantic_type: SemanticType,
    pub original: Value,
    pub correction: Value,
    pub confidence: f64,
    pub source_pattern: PatternId,
    pub embedding: Vec<f32>,
    pub recorded_at: DateTime<Utc>,
}

impl SuccessPattern {
    pub fn new(
        decision: &CorrectionDecision,
        semantic_type: SemanticType,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            field: decision.field().to_string(),
            semantic_type,
            original: decision.original_value().clone(),
            correction: decision.corrected_value().clone(),
            confidence: decision.confidence(),
            source_pattern: decision.pattern_id().clone(),
            embedding,
            recorded_at: Utc::now(),
        }
    }
}

pub struct SimilarityCorrector {
    threshold: f64,
    patterns: RwLock<HashMap<SemanticType, Vec<SuccessPattern>>>,
}

impl SimilarityCorrector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            patterns: RwLock::new(HashMap::new()),
        }
    }

    pub fn reinforce(&self, pattern: SuccessPattern) {
        tracing::debug!(
            field = %pattern.field,
            semantic_type = %pattern.semantic_type,
            id = %pattern.id,
            "reinforced correction"
        );
        self.patterns
            .write()
            .entry(pattern.semantic_type)
            .or_default()
            .push(pattern);
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.read().values().all(Vec::is_empty)
    }

    pub fn len(&self) -> usize {
        self.patterns.read().values().map(Vec::len).sum()
    }

    pub fn patterns_for(&self, semantic_type: SemanticType) -> Vec<SuccessPattern> {
        self.patterns
            .read()
            .get(&semantic_type)
            .cloned()
            .unwrap_or_default()
    }

    pub fn all(&self) -> Vec<SuccessPattern> {
        self.patterns.read().values().flatten().cloned().collect()
    }

    pub fn replace_all(&self, patterns: Vec<SuccessPattern>) {
        let mut map: HashMap<SemanticType, Vec<SuccessPattern>> = HashMap::new();
        for p in patterns {
            map.entry(p.semantic_type).or_default().push(p);
        }
        *self.patterns.write() = map;
    }

    /// `context` is the embedding of the whole document; without it the strategy is off.
    /// Candidates are confirmed corrections of this field from the value it holds now.
    pub fn propose(
        &self,
        ctx: &FieldContext<'_>,
        context: Option<&[f32]>,
    ) -> Option<CorrectionDecision> {
        let context = context?;
        let patterns = self.patterns.read();
        let candidates = patterns.get(&ctx.semantic_type)?;

        let mut best: Option<(&SuccessPattern, f64)> = None;
        // Only the same field holding the same wrong value may reuse a correction.
        let same_mistake = candidates
            .iter()
            .filter(|p| p.field == ctx.field && values_match(&p.original, ctx.value));
        for pattern in same_mistake {
            let similarity = match cosine_similarity(context, &pattern.embedding) {
                Ok(s) => s,
                Err(err) => {
                    tracing::debug!(id = %pattern.id, error = %err, "skipping success pattern");
                    continue;
                }
            };
            if best.map_or(true, |(_, s)| similarity > s) {
                best = Some((pattern, similarity));
            }
        }

        let (pattern, similarity) = best?;
        if similarity <= self.threshold || values_match(&pattern.correction, ctx.value) {
            return None;
        }
        Some(CorrectionDecision::new(
            ctx.field,
            ctx.value.clone(),
            pattern.correction.clone(),
            similarity,
            format!("Similar to a confirmed correction (similarity {:.2})", similarity),
            PatternId::Similarity(pattern.id.simple().to_string()),
        ))
    }
}
