//! End-to-end behaviour of the correction engine on representative records.

use fieldmend_engine::{
    CorrectionEngine, Document, EngineConfig, PatternId, ProcessingMode, SemanticType,
    StructuralPattern,
};
use serde_json::{json, Value};

fn engine() -> CorrectionEngine {
    let mut config = EngineConfig::default();
    config.learning.seed = Some(1);
    CorrectionEngine::with_token_hash_embedder(config)
}

fn doc(v: Value) -> Document {
    Document::from_json(v).unwrap()
}

// ============================================================================
// Field swaps
// ============================================================================

#[tokio::test]
async fn test_fund_date_swap_is_symmetric_and_idempotent() {
    let engine = engine();
    let outcome = engine
        .detect_and_correct(&doc(json!({
            "fund_name": "2022-03-15",
            "investment_date": "Blackstone Capital Partners VII",
        })))
        .await;

    assert_eq!(outcome.decisions.len(), 2);
    let fund = outcome.decision_for("fund_name").unwrap();
    let date = outcome.decision_for("investment_date").unwrap();
    assert_eq!(fund.pattern_id(), &PatternId::FieldSwap);
    assert_eq!(date.pattern_id(), &PatternId::FieldSwap);
    assert!(fund.reasoning().contains("investment_date"));
    assert!(date.reasoning().contains("fund_name"));
    assert_eq!(fund.linked_field(), Some("investment_date"));
    assert_eq!(date.linked_field(), Some("fund_name"));

    let again = engine.detect_and_correct(&outcome.corrected).await;
    assert!(again.decisions.is_empty());
    assert_eq!(again.corrected, outcome.corrected);
}

#[tokio::test]
async fn test_reversed_period_is_swapped() {
    let engine = engine();
    let outcome = engine
        .detect_and_correct(&doc(json!({
            "period_start": "2023-12-31",
            "period_end": "2023-01-01",
        })))
        .await;
    assert_eq!(outcome.decisions.len(), 2);
    assert_eq!(outcome.corrected.get("period_start"), Some(&json!("2023-01-01")));
    assert_eq!(outcome.corrected.get("period_end"), Some(&json!("2023-12-31")));
}

// ============================================================================
// Arithmetic
// ============================================================================

#[tokio::test]
async fn test_irr_consistency() {
    let engine = engine();
    let outcome = engine
        .detect_and_correct(&doc(json!({
            "investment_date": "2020-01-01",
            "exit_date": "2024-01-01",
            "multiple": "2.0x",
            "irr": "50%",
        })))
        .await;
    assert_eq!(outcome.decisions.len(), 1);
    let irr = outcome.decision_for("irr").unwrap();
    assert_eq!(irr.corrected_value(), &json!("18.9%"));
    assert!(irr.confidence() > 0.9);
    assert_eq!(irr.pattern_id(), &PatternId::CrossFieldIrr);

    let again = engine.detect_and_correct(&outcome.corrected).await;
    assert!(again.decisions.is_empty());
}

#[tokio::test]
async fn test_cumulative_quarters() {
    let engine = engine();
    let outcome = engine
        .detect_and_correct(&doc(json!({
            "q1": 100000,
            "q2": 150000,
            "q3": 200000,
            "q4": 400000,
        })))
        .await;
    assert_eq!(outcome.decisions.len(), 1);
    let q4 = outcome.decision_for("q4").unwrap();
    assert_eq!(q4.corrected_value(), &json!(450000));
    assert_eq!(q4.confidence(), 0.99);
    assert_eq!(q4.pattern_id().to_string(), "cumulative");

    let again = engine.detect_and_correct(&outcome.corrected).await;
    assert!(again.decisions.is_empty());
}

#[tokio::test]
async fn test_total_of_components() {
    let engine = engine();
    let outcome = engine
        .detect_and_correct(&doc(json!({
            "revenue_north": 100,
            "revenue_south": 250,
            "total_revenue": 300,
        })))
        .await;
    assert_eq!(outcome.decisions.len(), 1);
    let total = outcome.decision_for("total_revenue").unwrap();
    assert_eq!(total.corrected_value(), &json!(350));
    assert_eq!(total.pattern_id(), &PatternId::CumulativeTotal);
}

#[tokio::test]
async fn test_accounting_equation() {
    let engine = engine();
    let outcome = engine
        .detect_and_correct(&doc(json!({
            "assets": 1000000,
            "liabilities": 600000,
            "equity": 500000,
        })))
        .await;
    assert_eq!(outcome.decisions.len(), 1);
    let equity = outcome.decision_for("equity").unwrap();
    assert_eq!(equity.corrected_value(), &json!(400000));
    assert_eq!(equity.original_value(), &json!(500000));
    assert_eq!(equity.confidence(), 0.95);
}

// ============================================================================
// Per-field
// ============================================================================

#[tokio::test]
async fn test_text_to_number_in_amount_field() {
    let engine = engine();
    let outcome = engine
        .detect_and_correct(&doc(json!({
            "fund_name": "Alpha Capital Fund",
            "investment_amount": "ten million",
            "notes": "ten million",
        })))
        .await;
    assert_eq!(outcome.decisions.len(), 1);
    let d = outcome.decision_for("investment_amount").unwrap();
    assert_eq!(d.corrected_value(), &json!(10000000));
    assert_eq!(d.confidence(), 0.95);
    assert_eq!(outcome.corrected.get("notes"), Some(&json!("ten million")));
}

#[tokio::test]
async fn test_learned_weight_raises_threshold() {
    let engine = engine();
    let input = doc(json!({"exit_value": "Twenty-Five Million"}));
    let pattern = StructuralPattern::of(&input);

    let outcome = engine.detect_and_correct(&input).await;
    assert!(outcome.uncertain);
    assert_eq!(outcome.decisions.len(), 1);
    assert_eq!(outcome.decisions[0].confidence(), 0.9);

    // 0.8 * 1.05^3 > 0.9: the scanned conversion no longer clears the bar.
    for _ in 0..3 {
        engine.record_outcome(&pattern, true);
    }
    let outcome = engine.detect_and_correct(&input).await;
    assert!(!outcome.uncertain);
    assert!(outcome.threshold > 0.9);
    assert!(outcome.decisions.is_empty());
    assert_eq!(outcome.deferred.len(), 1);
    assert_eq!(outcome.deferred[0].decision.field(), "exit_value");
}

#[tokio::test]
async fn test_classifications_are_reported() {
    let engine = engine();
    let outcome = engine
        .detect_and_correct(&doc(json!({
            "fund_name": "Alpha Capital Fund",
            "closing_date": "2023-12-31",
            "q1": 5,
        })))
        .await;
    assert_eq!(outcome.classifications.type_of("fund_name"), SemanticType::EntityName);
    assert_eq!(outcome.classifications.type_of("closing_date"), SemanticType::Date);
    assert_eq!(outcome.classifications.type_of("q1"), SemanticType::Unknown);
    assert!(matches!(
        outcome.mode,
        ProcessingMode::Explore | ProcessingMode::Exploit
    ));
}

#[test]
fn test_nested_input_is_rejected() {
    let err = Document::from_json(json!({"fund": {"name": "Alpha", "date": "2022-01-01"}}))
        .unwrap_err();
    assert!(err.to_string().contains("fund"));
}
