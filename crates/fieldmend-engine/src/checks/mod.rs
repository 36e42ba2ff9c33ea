//! Cross-field checks
//!
//! Rules that look at relationships between fields rather than at one field's type:
//! arithmetic identities (accounting equation, totals, quarterly sums, IRR against
//! multiple) and value transpositions between field pairs. They run after the
//! per-field pass and may override it.
//!
//! A check never fails. It reports a [`CheckOutcome`]; a value it could not read turns
//! into [`CheckOutcome::Skipped`] with the reason attached so tests can see it.

pub mod arithmetic;
pub mod swap;

use crate::decision::CorrectionDecision;
use crate::validate::ParseError;

pub use arithmetic::ArithmeticChecker;
pub use swap::{SwapDetector, SwapPair};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SkipReason {
    #[error("field '{field}' is unreadable: {source}")]
    Unparseable {
        field: String,
        #[source]
        source: ParseError,
    },
    #[error("holding period is not positive ({years:.2} years)")]
    NonPositivePeriod { years: f64 },
    #[error("computed value is not finite")]
    NonFinite,
}

impl SkipReason {
    pub fn unparseable(field: impl Into<String>, source: ParseError) -> Self {
        SkipReason::Unparseable {
            field: field.into(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// The relationship is violated; this decision repairs it.
    Propose(CorrectionDecision),
    /// All inputs are present and the relationship holds.
    Consistent,
    /// The document does not carry the fields this check needs.
    NotApplicable,
    /// Inputs are present but could not be used.
    Skipped(SkipReason),
}

impl CheckOutcome {
    pub fn into_decision(self) -> Option<CorrectionDecision> {
        match self {
            CheckOutcome::Propose(d) => Some(d),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, CheckOutcome::Skipped(_))
    }
}
