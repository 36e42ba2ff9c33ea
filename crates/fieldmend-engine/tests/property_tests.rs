//! Property-Based Tests for the Correction Engine
//!
//! 1. Pattern weights move monotonically under repeated outcomes
//! 2. Epsilon never increases
//! 3. Date and entity-name validators never both accept a value
//! 4. The accounting equation is always restored
//! 5. Decision confidences stay in [0, 1]

use fieldmend_engine::learning::LearningState;
use fieldmend_engine::validate::{is_date_like, is_entity_name};
use fieldmend_engine::{
    CorrectionDecision, CorrectionEngine, Document, EngineConfig, LearningConfig, PatternId,
    StructuralPattern,
};
use proptest::prelude::*;
use serde_json::{json, Value};

// ============================================================================
// Strategies
// ============================================================================

fn pattern() -> StructuralPattern {
    StructuralPattern::of(&Document::from_json(json!({"irr": "12%", "multiple": "2x"})).unwrap())
}

fn learning_state() -> LearningState {
    LearningState::new(LearningConfig {
        seed: Some(3),
        ..LearningConfig::default()
    })
}

/// Dates in several layouts plus free text that may look like names.
fn scalar_text_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        (1990i32..2040, 1u32..13, 1u32..29).prop_map(|(y, m, d)| format!("{:04}-{:02}-{:02}", y, m, d)),
        (1990i32..2040, 1u32..13, 1u32..29).prop_map(|(y, m, d)| format!("{:02}/{:02}/{:04}", m, d, y)),
        "[A-Z][a-z]{2,10}( [A-Z][a-z]{2,10}){0,3}",
        "[a-z0-9 ,./-]{0,20}",
    ]
}

// ============================================================================
// Learning
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn weight_grows_under_acceptance(n in 1usize..40) {
        let state = learning_state();
        let p = pattern();
        let mut previous = state.weight(&p);
        for _ in 0..n {
            state.update(&p, true);
            let w = state.weight(&p);
            prop_assert!(w > previous);
            previous = w;
        }
    }

    #[test]
    fn weight_shrinks_under_rejection(n in 1usize..40) {
        let state = learning_state();
        let p = pattern();
        let mut previous = state.weight(&p);
        for _ in 0..n {
            state.update(&p, false);
            let w = state.weight(&p);
            prop_assert!(w < previous);
            previous = w;
        }
    }

    #[test]
    fn weight_stays_bounded(outcomes in prop::collection::vec(any::<bool>(), 0..300)) {
        let state = learning_state();
        let p = pattern();
        for accepted in outcomes {
            state.update(&p, accepted);
            let w = state.weight(&p);
            prop_assert!((0.1..=10.0).contains(&w));
        }
    }

    #[test]
    fn epsilon_never_increases(outcomes in prop::collection::vec(any::<bool>(), 0..200)) {
        let state = learning_state();
        let p = pattern();
        let mut previous = state.epsilon();
        for accepted in outcomes {
            state.update(&p, accepted);
            let e = state.epsilon();
            prop_assert!(e <= previous);
            prop_assert!(e >= 0.01);
            previous = e;
        }
    }
}

// ============================================================================
// Validators and decisions
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn date_and_entity_are_exclusive(text in scalar_text_strategy()) {
        let v = Value::String(text);
        prop_assert!(!(is_date_like(&v) && is_entity_name(&v)));
    }

    #[test]
    fn confidence_is_clamped(c in -10.0f64..10.0) {
        let d = CorrectionDecision::new("f", json!(1), json!(2), c, "r", PatternId::TextToNumber);
        prop_assert!((0.0..=1.0).contains(&d.confidence()));
    }
}

// ============================================================================
// Accounting invariant
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn accounting_equation_is_restored(
        assets in 0i64..1_000_000_000,
        liabilities in 0i64..1_000_000_000,
        offset in prop_oneof![-1_000_000i64..-1, 1i64..1_000_000],
    ) {
        let equity = assets - liabilities + offset;
        let input = Document::from_json(json!({
            "assets": assets,
            "liabilities": liabilities,
            "equity": equity,
        }))
        .unwrap();

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let engine = CorrectionEngine::with_token_hash_embedder(EngineConfig::default());
        let outcome = runtime.block_on(engine.detect_and_correct(&input));

        let decision = outcome.decision_for("equity").unwrap();
        prop_assert_eq!(decision.corrected_value(), &json!(assets - liabilities));
        prop_assert_eq!(decision.confidence(), 0.95);
        prop_assert_eq!(outcome.corrected.get("equity"), Some(&json!(assets - liabilities)));
    }
}
