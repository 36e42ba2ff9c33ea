//! Fieldmend Engine: Correction Decisions for Extracted Financial Records
//!
//! Repairs field-level errors in flat records produced by an upstream extraction
//! pipeline (swapped fields, text-encoded numbers, broken totals, inconsistent IRR)
//! and reports every edit as an auditable [`CorrectionDecision`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                      CORRECTION ENGINE                               │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                                                                      │
//! │  Document ──► FieldTypeClassifier ──► per-field strategies ──┐      │
//! │                 (Embedder)             pattern rules          │      │
//! │                                        similarity             │      │
//! │                                        history                ▼      │
//! │                                                      ConfidenceGate  │
//! │                                                               │      │
//! │               structural checks ◄─────────────────────────────┘      │
//! │               accounting · totals · quarters · swaps · IRR           │
//! │                       │                                              │
//! │                       ▼                                              │
//! │               DetectionOutcome (corrected doc + decisions)           │
//! │                                                                      │
//! │  validation ──► LearningState (pattern weights, epsilon)            │
//! │             ──► override history / confirmed corrections            │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Learning
//! - Documents are grouped by structural pattern (field names + value kinds)
//! - Accepted validations raise the pattern's weight, rejections lower it
//! - The weight adjusts the acceptance threshold for later documents

pub mod catalogue;
pub mod checks;
pub mod classifier;
pub mod config;
pub mod decision;
pub mod document;
pub mod embedding;
pub mod engine;
pub mod gate;
pub mod learning;
pub mod state;
pub mod strategies;
pub mod validate;

pub use catalogue::SemanticType;
pub use checks::{CheckOutcome, SkipReason};
pub use classifier::{Classification, FieldMatch, FieldTypeClassifier};
pub use config::{EngineConfig, LearningConfig};
pub use decision::{CorrectionDecision, PatternId};
pub use document::{values_match, Document, DocumentError, ValueKind};
pub use embedding::{cosine_similarity, Embedder, EmbeddingError, TokenHashEmbedder};
pub use engine::{CorrectionEngine, DetectionOutcome};
pub use gate::ConfidenceGate;
pub use learning::{
    LearningCurvePoint, LearningState, LearningStep, PatternStats, ProcessingMode,
    StructuralPattern,
};
pub use state::LearningSnapshot;
pub use strategies::DeferredCandidate;
pub use validate::ParseError;
