//! Feedback loop tests: pending lifecycle, reconciliation and metrics.

use approx::assert_relative_eq;
use fieldmend_engine::{CorrectionEngine, Document, EngineConfig, PatternId};
use fieldmend_feedback::FeedbackLoop;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

fn feedback_loop() -> FeedbackLoop {
    let mut config = EngineConfig::default();
    config.learning.seed = Some(5);
    FeedbackLoop::new(Arc::new(CorrectionEngine::with_token_hash_embedder(config)))
}

fn doc(v: Value) -> Document {
    Document::from_json(v).unwrap()
}

// ============================================================================
// Pending lifecycle
// ============================================================================

#[tokio::test]
async fn test_pending_until_validated() {
    let fl = feedback_loop();
    fl.process(doc(json!({"fund_name": "Alpha Capital Fund"})), "a")
        .await;
    fl.process(doc(json!({"fund_name": "Beta Capital Fund"})), "b")
        .await;
    assert_eq!(fl.pending_count(), 2);

    let report = fl
        .receive_validation("a", &doc(json!({"fund_name": "Alpha Capital Fund"})))
        .await
        .unwrap();
    assert!(report.accepted);
    assert_eq!(fl.pending_count(), 1);
    assert!(fl.pending("a").is_none());
    assert!(fl.pending("b").is_some());

    // A second validation for the same id finds nothing.
    assert!(fl
        .receive_validation("a", &doc(json!({"fund_name": "Alpha Capital Fund"})))
        .await
        .is_none());
}

#[tokio::test]
async fn test_reprocessing_replaces_pending() {
    let fl = feedback_loop();
    fl.process(doc(json!({"investment_amount": "ten million"})), "a")
        .await;
    fl.process(doc(json!({"investment_amount": 5})), "a").await;
    assert_eq!(fl.pending_count(), 1);
    assert!(fl.pending("a").unwrap().decisions.is_empty());
}

#[tokio::test]
async fn test_unknown_id_changes_nothing() {
    let fl = feedback_loop();
    fl.process(doc(json!({"investment_amount": "ten million"})), "a")
        .await;
    let before = fl.metrics();
    assert!(fl
        .receive_validation("missing", &doc(json!({"investment_amount": 1})))
        .await
        .is_none());
    assert_eq!(fl.metrics(), before);
    assert_eq!(fl.pending_count(), 1);
    assert_eq!(fl.engine().history_len(), 0);
}

// ============================================================================
// Reconciliation
// ============================================================================

#[tokio::test]
async fn test_fields_absent_from_truth_are_not_judged() {
    let fl = feedback_loop();
    fl.process(doc(json!({"investment_amount": "ten million", "nav": 12})), "a")
        .await;
    let report = fl
        .receive_validation("a", &doc(json!({"nav": 12})))
        .await
        .unwrap();
    assert_eq!((report.correct, report.incorrect, report.missed), (0, 0, 0));
    assert!(report.accepted);
    assert_eq!(report.reinforced, 0);
}

#[tokio::test]
async fn test_outcome_moves_pattern_weight() {
    let fl = feedback_loop();
    let input = doc(json!({"investment_amount": "ten million"}));
    let summary = fl.process(input.clone(), "a").await;
    assert_eq!(summary.corrected_data.get("investment_amount"), Some(&json!(10000000)));

    let report = fl
        .receive_validation("a", &doc(json!({"investment_amount": 10000000})))
        .await
        .unwrap();
    assert_relative_eq!(report.learning.weight_before, 1.0);
    assert_relative_eq!(report.learning.weight_after, 1.05);
    assert_eq!(report.learning.reward, 1);

    fl.process(input, "b").await;
    let report = fl
        .receive_validation("b", &doc(json!({"investment_amount": 9})))
        .await
        .unwrap();
    assert!(!report.accepted);
    assert_relative_eq!(report.learning.weight_after, 1.05 * 0.95);
    assert_eq!(report.learning.reward, -1);
}

#[tokio::test]
async fn test_repeated_misses_become_history_correction() {
    let fl = feedback_loop();
    let input = doc(json!({"fund_name": "Alpha Capital Fund", "exit_date": "TBD"}));
    let truth = doc(json!({"fund_name": "Alpha Capital Fund", "exit_date": "2024-06-30"}));

    for i in 0..6 {
        let id = format!("doc-{}", i);
        let summary = fl.process(input.clone(), id.clone()).await;
        assert_eq!(summary.corrections_made, 0);
        let report = fl.receive_validation(&id, &truth).await.unwrap();
        assert_eq!(report.missed, 1);
    }
    assert_eq!(fl.engine().history_len(), 6);

    let summary = fl.process(input.clone(), "doc-6").await;
    assert_eq!(summary.corrections_made, 1);
    assert_eq!(summary.corrected_data.get("exit_date"), Some(&json!("2024-06-30")));
    let pending = fl.pending("doc-6").unwrap();
    assert!(matches!(pending.decisions[0].pattern_id(), PatternId::Historical(_)));
}

// ============================================================================
// Metrics
// ============================================================================

#[tokio::test]
async fn test_metrics_accumulate_across_documents() {
    let fl = feedback_loop();
    fl.process(doc(json!({"investment_amount": "ten million"})), "a")
        .await;
    fl.process(doc(json!({"investment_amount": "ten million", "nav": 3})), "b")
        .await;
    assert_eq!(fl.metrics().total_corrections, 2);

    fl.receive_validation("a", &doc(json!({"investment_amount": 10000000})))
        .await;
    fl.receive_validation("b", &doc(json!({"investment_amount": 10000000, "nav": 4})))
        .await;

    let m = fl.metrics();
    assert_eq!(m.accepted_corrections, 2);
    assert_eq!(m.rejected_corrections, 1);
    assert_eq!(m.correction_breakdown.missed, 1);
    assert_relative_eq!(m.accuracy, 2.0 / 3.0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn accuracy_matches_counts(verdicts in prop::collection::vec(any::<bool>(), 1..12)) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let fl = feedback_loop();
        runtime.block_on(async {
            for (i, confirm) in verdicts.iter().enumerate() {
                let id = format!("doc-{}", i);
                // A distinct reference field per document keeps every pattern at its
                // initial weight.
                let mut input = doc(json!({"investment_amount": "ten million"}));
                input.insert(format!("ref_{}", i), json!("r")).unwrap();
                fl.process(input, id.clone()).await;
                let truth = if *confirm { 10_000_000 } else { 7 };
                fl.receive_validation(&id, &doc(json!({"investment_amount": truth}))).await;
            }
        });

        let m = fl.metrics();
        let validated = m.accepted_corrections + m.rejected_corrections;
        prop_assert_eq!(validated, verdicts.len() as u64);
        prop_assert_eq!(m.accepted_corrections, verdicts.iter().filter(|c| **c).count() as u64);
        prop_assert!((m.accuracy - m.accepted_corrections as f64 / validated as f64).abs() < 1e-12);
        prop_assert_eq!(fl.pending_count(), 0);
    }
}
