//! Pairwise transposition detection
//!
//! Every unordered pair of fields gets a swap score from a few heuristic signals
//! (the strongest signal wins):
//!
//! - a date sitting in a name field while a name sits in a date field: 0.92 to 0.95
//! - two positive amounts: 0.85
//! - exchanging two dates repairs a start/end or investment/exit ordering: 0.95
//!
//! A pair scoring above the swap threshold is exchanged when both values then fit
//! their field's classified type, or when the score alone clears the override.

use crate::catalogue::SemanticType;
use crate::classifier::Classification;
use crate::decision::{CorrectionDecision, PatternId};
use crate::document::Document;
use crate::embedding::tokenize;
use crate::validate::{is_date_like, is_entity_name_like, is_positive_amount, parse_date};
use serde_json::Value;
use std::collections::HashSet;

const DATE_KEYWORDS: &[&str] = &["date", "time", "period", "start", "end"];
const NAME_KEYWORDS: &[&str] = &["fund", "name", "company", "investment"];

/// Ordering constraints as (earlier, later) field-name fragments.
const ORDERED_PAIRS: &[(&str, &str)] = &[("start", "end"), ("investment", "exit")];

const EXACT_MISMATCH_SCORE: f64 = 0.95;
const KEYWORD_MISMATCH_SCORE: f64 = 0.92;
const AMOUNT_PAIR_SCORE: f64 = 0.85;
const CHRONOLOGY_SCORE: f64 = 0.95;

fn has_any(field: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| field.contains(k))
}

/// Two linked `field_swap` decisions.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapPair {
    pub first: CorrectionDecision,
    pub second: CorrectionDecision,
    pub score: f64,
}

impl SwapPair {
    pub fn into_decisions(self) -> [CorrectionDecision; 2] {
        [self.first, self.second]
    }
}

#[derive(Debug, Clone)]
pub struct SwapDetector {
    threshold: f64,
    override_threshold: f64,
}

impl SwapDetector {
    pub fn new(threshold: f64, override_threshold: f64) -> Self {
        Self {
            threshold,
            override_threshold,
        }
    }

    /// Score for exchanging the values of `f1` and `f2`.
    pub fn swap_confidence(
        &self,
        (f1, v1, t1): (&str, &Value, SemanticType),
        (f2, v2, t2): (&str, &Value, SemanticType),
    ) -> f64 {
        let (n1, n2) = (f1.to_lowercase(), f2.to_lowercase());
        let mut score: f64 = 0.0;

        // A name field holding a date next to a date field holding a name.
        let misplaced = |name_field: &str, date_field: &str, in_name: &Value, in_date: &Value| {
            if !(is_date_like(in_name) && is_entity_name_like(in_date)) {
                return 0.0;
            }
            if date_field.contains("date") && (name_field.contains("fund") || name_field.contains("name")) {
                EXACT_MISMATCH_SCORE
            } else if has_any(date_field, DATE_KEYWORDS) && has_any(name_field, NAME_KEYWORDS) {
                KEYWORD_MISMATCH_SCORE
            } else {
                0.0
            }
        };
        score = score.max(misplaced(&n1, &n2, v1, v2));
        score = score.max(misplaced(&n2, &n1, v2, v1));

        if t1 == SemanticType::Amount
            && t2 == SemanticType::Amount
            && is_positive_amount(v1)
            && is_positive_amount(v2)
        {
            score = score.max(AMOUNT_PAIR_SCORE);
        }

        if let (Ok(d1), Ok(d2)) = (parse_date(v1), parse_date(v2)) {
            let (s1, s2) = (tokenize(&n1), tokenize(&n2));
            let has = |segments: &[String], name: &str| segments.iter().any(|s| s == name);
            let violated = ORDERED_PAIRS.iter().any(|&(earlier, later)| {
                (has(&s1, earlier) && has(&s2, later) && d1 > d2)
                    || (has(&s2, earlier) && has(&s1, later) && d2 > d1)
            });
            if violated {
                score = score.max(CHRONOLOGY_SCORE);
            }
        }

        score
    }

    /// Scan every pair of fields of `doc`. A field takes part in at most one swap;
    /// the first qualifying pair wins.
    pub fn scan(&self, doc: &Document, classification: &Classification) -> Vec<SwapPair> {
        let fields: Vec<(&String, &Value)> = doc.iter().collect();
        let mut swapped: HashSet<&str> = HashSet::new();
        let mut pairs = Vec::new();

        for (i, (f1, v1)) in fields.iter().enumerate() {
            if swapped.contains(f1.as_str()) {
                continue;
            }
            let t1 = classification.type_of(f1);
            for (f2, v2) in fields.iter().skip(i + 1) {
                if swapped.contains(f2.as_str()) {
                    continue;
                }
                let t2 = classification.type_of(f2);
                let score = self.swap_confidence((f1.as_str(), *v1, t1), (f2.as_str(), *v2, t2));
                if score <= self.threshold {
                    continue;
                }

                let fits = t1 != SemanticType::Unknown
                    && t2 != SemanticType::Unknown
                    && t1.validate(v2)
                    && t2.validate(v1);
                if !fits && score <= self.override_threshold {
                    tracing::debug!(first = %f1, second = %f2, score, "swap not confirmed by types");
                    continue;
                }

                pairs.push(SwapPair {
                    first: CorrectionDecision::new(
                        f1.as_str(),
                        (*v1).clone(),
                        (*v2).clone(),
                        score,
                        format!("Field swap detected with {}", f2),
                        PatternId::FieldSwap,
                    )
                    .linked_to(f2.as_str()),
                    second: CorrectionDecision::new(
                        f2.as_str(),
                        (*v2).clone(),
                        (*v1).clone(),
                        score,
                        format!("Field swap detected with {}", f1),
                        PatternId::FieldSwap,
                    )
                    .linked_to(f1.as_str()),
                    score,
                });
                swapped.insert(f1.as_str());
                swapped.insert(f2.as_str());
                break;
            }
        }
        pairs
    }
}

impl Default for SwapDetector {
    fn default() -> Self {
        Self::new(0.85, 0.95)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::FieldMatch;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn classification(types: &[(&str, SemanticType)]) -> Classification {
        let mut c = Classification::default();
        for (field, ty) in types {
            c.insert(
                *field,
                FieldMatch {
                    semantic_type: *ty,
                    score: 1.0,
                    exemplar: None,
                },
            );
        }
        c
    }

    #[test]
    fn test_fund_date_transposition() {
        let doc = Document::from_json(json!({
            "fund_name": "2022-03-15",
            "investment_date": "Blackstone Capital Partners VII",
        }))
        .unwrap();
        let c = classification(&[
            ("fund_name", SemanticType::EntityName),
            ("investment_date", SemanticType::Date),
        ]);

        let pairs = SwapDetector::default().scan(&doc, &c);
        assert_eq!(pairs.len(), 1);
        let [first, second] = pairs[0].clone().into_decisions();
        assert_eq!(first.field(), "fund_name");
        assert_eq!(first.corrected_value(), &json!("Blackstone Capital Partners VII"));
        assert_eq!(first.linked_field(), Some("investment_date"));
        assert!(first.reasoning().contains("investment_date"));
        assert_eq!(second.corrected_value(), &json!("2022-03-15"));
        assert!(second.reasoning().contains("fund_name"));
        assert_relative_eq!(first.confidence(), 0.95);
    }

    #[test]
    fn test_reversed_period() {
        let doc = Document::from_json(json!({
            "period_start": "2023-12-31",
            "period_end": "2023-01-01",
        }))
        .unwrap();
        let c = classification(&[
            ("period_start", SemanticType::Date),
            ("period_end", SemanticType::Date),
        ]);
        let pairs = SwapDetector::default().scan(&doc, &c);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].first.corrected_value(), &json!("2023-01-01"));
    }

    #[test]
    fn test_date_order_needs_whole_name_segments() {
        let detector = SwapDetector::default();
        let score = detector.swap_confidence(
            ("period_start", &json!("2023-12-31"), SemanticType::Date),
            ("dividend_date", &json!("2023-01-01"), SemanticType::Date),
        );
        assert!(score < 0.95);
        let score = detector.swap_confidence(
            ("start_date", &json!("2023-12-31"), SemanticType::Date),
            ("end_date", &json!("2023-01-01"), SemanticType::Date),
        );
        assert_relative_eq!(score, 0.95);
    }

    #[test]
    fn test_amount_pair_alone_does_not_swap() {
        let doc = Document::from_json(json!({"assets": 100, "liabilities": 200})).unwrap();
        let c = classification(&[
            ("assets", SemanticType::Amount),
            ("liabilities", SemanticType::Amount),
        ]);
        let detector = SwapDetector::default();
        let score = detector.swap_confidence(
            ("assets", &json!(100), SemanticType::Amount),
            ("liabilities", &json!(200), SemanticType::Amount),
        );
        assert_relative_eq!(score, 0.85);
        assert!(detector.scan(&doc, &c).is_empty());
    }

    #[test]
    fn test_field_swaps_at_most_once() {
        let doc = Document::from_json(json!({
            "fund_name": "2022-03-15",
            "investment_date": "Blackstone Capital Partners VII",
            "exit_date": "Apollo Global Management",
        }))
        .unwrap();
        let c = classification(&[
            ("fund_name", SemanticType::EntityName),
            ("investment_date", SemanticType::Date),
            ("exit_date", SemanticType::Date),
        ]);
        let pairs = SwapDetector::default().scan(&doc, &c);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].second.field(), "investment_date");
    }

    #[test]
    fn test_consistent_document_has_no_swaps() {
        let doc = Document::from_json(json!({
            "fund_name": "Blackstone Capital Partners VII",
            "investment_date": "2022-03-15",
        }))
        .unwrap();
        let c = classification(&[
            ("fund_name", SemanticType::EntityName),
            ("investment_date", SemanticType::Date),
        ]);
        assert!(SwapDetector::default().scan(&doc, &c).is_empty());
    }
}
