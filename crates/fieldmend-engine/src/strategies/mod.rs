//! Per-field correction strategies
//!
//! Each strategy looks at one field of a document (its name, value, classified type and
//! the surrounding document) and either proposes a [`CorrectionDecision`] or stays
//! silent. Strategies never mutate the document; the engine decides what is applied.
//!
//! Precedence, first proposal wins:
//! 1. [`pattern::PatternCorrector`]: deterministic rules
//! 2. [`similarity::SimilarityCorrector`]: nearest reinforced correction
//! 3. [`historical::HistoricalPatternCorrector`]: majority vote over past overrides

pub mod historical;
pub mod pattern;
pub mod similarity;

use crate::catalogue::SemanticType;
use crate::decision::CorrectionDecision;
use crate::document::Document;
use serde_json::Value;

pub use historical::{HistoricalEntry, HistoricalPatternCorrector, HistoryKey};
pub use pattern::PatternCorrector;
pub use similarity::{SimilarityCorrector, SuccessPattern};

/// Everything a strategy may look at for one field.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a> {
    pub field: &'a str,
    pub value: &'a Value,
    pub semantic_type: SemanticType,
    pub document: &'a Document,
}

impl<'a> FieldContext<'a> {
    pub fn new(
        field: &'a str,
        value: &'a Value,
        semantic_type: SemanticType,
        document: &'a Document,
    ) -> Self {
        Self {
            field,
            value,
            semantic_type,
            document,
        }
    }

    /// Other fields of the document, in document order.
    pub fn others(&self) -> impl Iterator<Item = (&'a String, &'a Value)> + 'a {
        let field = self.field;
        let document = self.document;
        document.iter().filter(move |(name, _)| name.as_str() != field)
    }
}

/// A proposal the engine considered but did not apply.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DeferredCandidate {
    pub decision: CorrectionDecision,
    pub threshold: f64,
}
