//! Correction decisions
//!
//! Every strategy and structural check speaks the same record: a [`CorrectionDecision`]
//! naming the field, the value before and after, a confidence in `[0, 1]`, a human
//! readable reason and the [`PatternId`] of the rule that produced it. Decisions are
//! immutable once built; the engine only ever replaces whole decisions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Category tag of the rule that produced a decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PatternId {
    FieldSwap,
    AccountingEquation,
    CumulativeTotal,
    Cumulative,
    DateSequence,
    CrossFieldIrr,
    TextToNumber,
    ChronologicalFix,
    DateFundSwap,
    FundDateSwap,
    /// Majority vote over the history of `<field>_<semantic type>`.
    Historical(String),
    /// Nearest reinforced correction, by success-pattern id.
    Similarity(String),
}

impl PatternId {
    /// Whether the tag comes from a structural (cross-field) rule rather than the
    /// per-field pass.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            PatternId::FieldSwap
                | PatternId::AccountingEquation
                | PatternId::CumulativeTotal
                | PatternId::Cumulative
                | PatternId::DateSequence
                | PatternId::CrossFieldIrr
        )
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternId::FieldSwap => f.write_str("field_swap"),
            PatternId::AccountingEquation => f.write_str("accounting_equation"),
            PatternId::CumulativeTotal => f.write_str("cumulative_total"),
            PatternId::Cumulative => f.write_str("cumulative"),
            PatternId::DateSequence => f.write_str("date_sequence"),
            PatternId::CrossFieldIrr => f.write_str("cross_field_irr"),
            PatternId::TextToNumber => f.write_str("text_to_number"),
            PatternId::ChronologicalFix => f.write_str("chronological_fix"),
            PatternId::DateFundSwap => f.write_str("date_fund_swap"),
            PatternId::FundDateSwap => f.write_str("fund_date_swap"),
            PatternId::Historical(key) => write!(f, "historical_{}", key),
            PatternId::Similarity(id) => write!(f, "ml_pattern_{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown pattern id '{0}'")]
pub struct UnknownPatternId(pub String);

impl FromStr for PatternId {
    type Err = UnknownPatternId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = match s {
            "field_swap" => PatternId::FieldSwap,
            "accounting_equation" => PatternId::AccountingEquation,
            "cumulative_total" => PatternId::CumulativeTotal,
            "cumulative" => PatternId::Cumulative,
            "date_sequence" => PatternId::DateSequence,
            "cross_field_irr" => PatternId::CrossFieldIrr,
            "text_to_number" => PatternId::TextToNumber,
            "chronological_fix" => PatternId::ChronologicalFix,
            "date_fund_swap" => PatternId::DateFundSwap,
            "fund_date_swap" => PatternId::FundDateSwap,
            other => {
                if let Some(key) = other.strip_prefix("historical_") {
                    PatternId::Historical(key.to_string())
                } else if let Some(id) = other.strip_prefix("ml_pattern_") {
                    PatternId::Similarity(id.to_string())
                } else {
                    return Err(UnknownPatternId(other.to_string()));
                }
            }
        };
        Ok(id)
    }
}

impl From<PatternId> for String {
    fn from(id: PatternId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for PatternId {
    type Error = UnknownPatternId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A single proposed (or applied) correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionDecision {
    field: String,
    original_value: Value,
    corrected_value: Value,
    confidence: f64,
    reasoning: String,
    pattern_id: PatternId,
    /// For linked decisions (field swaps): the partner field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    linked_field: Option<String>,
}

impl CorrectionDecision {
    pub fn new(
        field: impl Into<String>,
        original_value: Value,
        corrected_value: Value,
        confidence: f64,
        reasoning: impl Into<String>,
        pattern_id: PatternId,
    ) -> Self {
        Self {
            field: field.into(),
            original_value,
            corrected_value,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: reasoning.into(),
            pattern_id,
            linked_field: None,
        }
    }

    /// Mark this decision as one half of a linked pair.
    pub fn linked_to(mut self, field: impl Into<String>) -> Self {
        self.linked_field = Some(field.into());
        self
    }

    /// Same decision, measured against a different "before" value.
    pub fn rebased(mut self, original_value: Value) -> Self {
        self.original_value = original_value;
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn original_value(&self) -> &Value {
        &self.original_value
    }

    pub fn corrected_value(&self) -> &Value {
        &self.corrected_value
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn pattern_id(&self) -> &PatternId {
        &self.pattern_id
    }

    pub fn linked_field(&self) -> Option<&str> {
        self.linked_field.as_deref()
    }
}
