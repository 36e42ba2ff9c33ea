//! Majority vote over past overrides
//!
//! Validation feeds back every correction the engine got wrong or missed, keyed by
//! field and semantic type. Once a key has enough history, a value that was corrected
//! the same way often enough is corrected that way again.

use super::FieldContext;
use crate::catalogue::SemanticType;
use crate::decision::{CorrectionDecision, PatternId};
use crate::document::{values_match, Document};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

const HISTORICAL_CONFIDENCE: f64 = 0.9;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryKey {
    pub field: String,
    pub semantic_type: SemanticType,
}

impl HistoryKey {
    pub fn new(field: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            field: field.into(),
            semantic_type,
        }
    }
}

impl fmt::Display for HistoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.field, self.semantic_type.as_str())
    }
}

/// One override observed during validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalEntry {
    pub original: Value,
    pub corrected: Value,
    pub context: Document,
    pub recorded_at: DateTime<Utc>,
}

pub struct HistoricalPatternCorrector {
    min_entries: usize,
    min_agreement: usize,
    log: RwLock<HashMap<HistoryKey, Vec<HistoricalEntry>>>,
}

impl HistoricalPatternCorrector {
    pub fn new(min_entries: usize, min_agreement: usize) -> Self {
        Self {
            min_entries,
            min_agreement,
            log: RwLock::new(HashMap::new()),
        }
    }

    pub fn record(&self, key: HistoryKey, original: Value, corrected: Value, context: Document) {
        tracing::debug!(key = %key, "recorded override");
        self.log.write().entry(key).or_default().push(HistoricalEntry {
            original,
            corrected,
            context,
            recorded_at: Utc::now(),
        });
    }

    pub fn entries(&self, key: &HistoryKey) -> Vec<HistoricalEntry> {
        self.log.read().get(key).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.log.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<(HistoryKey, Vec<HistoricalEntry>)> {
        self.log
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn restore(&self, entries: Vec<(HistoryKey, Vec<HistoricalEntry>)>) {
        *self.log.write() = entries.into_iter().collect();
    }

    pub fn propose(&self, ctx: &FieldContext<'_>) -> Option<CorrectionDecision> {
        let key = HistoryKey::new(ctx.field, ctx.semantic_type);
        let log = self.log.read();
        let entries = log.get(&key)?;
        if entries.len() < self.min_entries {
            return None;
        }

        // Insertion-ordered tally; ties go to the value seen first.
        let mut tally: Vec<(&Value, usize)> = Vec::new();
        for entry in entries.iter().filter(|e| values_match(&e.original, ctx.value)) {
            match tally.iter_mut().find(|(v, _)| values_match(v, &entry.corrected)) {
                Some((_, n)) => *n += 1,
                None => tally.push((&entry.corrected, 1)),
            }
        }

        let mut best: Option<(&Value, usize)> = None;
        for (value, n) in tally {
            if best.map_or(true, |(_, m)| n > m) {
                best = Some((value, n));
            }
        }
        let (corrected, count) = best?;
        if count < self.min_agreement || values_match(corrected, ctx.value) {
            return None;
        }

        Some(CorrectionDecision::new(
            ctx.field,
            ctx.value.clone(),
            corrected.clone(),
            HISTORICAL_CONFIDENCE,
            format!("Historical pattern: corrected {} times", count),
            PatternId::Historical(key.to_string()),
        ))
    }
}
