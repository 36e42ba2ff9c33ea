//! Arithmetic consistency rules
//!
//! | rule                   | fields                                     | confidence |
//! |------------------------|--------------------------------------------|------------|
//! | accounting equation    | `assets`, `liabilities`, `equity`          | 0.95       |
//! | cumulative total       | `*total*` and its components               | 0.95       |
//! | quarterly sum          | `q1`..`q4`                                 | 0.99       |
//! | quarterly dates        | `q1`..`q4`                                 | 0.98       |
//! | IRR vs multiple        | `irr`, `investment_date`, `exit_date`, `multiple` | 0.92 |

use super::{CheckOutcome, SkipReason};
use crate::decision::{CorrectionDecision, PatternId};
use crate::document::{number_value, value_text, Document};
use crate::validate::{
    is_date_like, parse_date, parse_multiple, parse_number, parse_percentage, ParseError,
};
use chrono::Months;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

const ACCOUNTING_CONFIDENCE: f64 = 0.95;
const TOTAL_CONFIDENCE: f64 = 0.95;
const QUARTER_SUM_CONFIDENCE: f64 = 0.99;
const QUARTER_DATE_CONFIDENCE: f64 = 0.98;
const IRR_CONFIDENCE: f64 = 0.92;

const MONEY_TOLERANCE: f64 = 0.01;
const QUARTER_TOLERANCE: f64 = 1e-3;
const DAYS_PER_YEAR: f64 = 365.25;

fn quarter_regex() -> &'static Regex {
    static QUARTER: OnceLock<Regex> = OnceLock::new();
    QUARTER.get_or_init(|| Regex::new(r"(?i)^q([1-4])(?:[_\-\s]|$)").expect("static regex"))
}

fn number(doc: &Document, field: &str) -> Result<f64, SkipReason> {
    let value = doc.get(field).unwrap_or(&Value::Null);
    parse_number(value).map_err(|e| SkipReason::unparseable(field, e))
}

#[derive(Debug, Clone)]
pub struct ArithmeticChecker {
    irr_tolerance: f64,
}

impl ArithmeticChecker {
    /// `irr_tolerance` is in percentage points.
    pub fn new(irr_tolerance: f64) -> Self {
        Self { irr_tolerance }
    }

    /// `equity == assets - liabilities`.
    pub fn accounting_equation(&self, doc: &Document) -> CheckOutcome {
        let (Some(equity_raw), true, true) = (
            doc.get("equity"),
            doc.contains("assets"),
            doc.contains("liabilities"),
        ) else {
            return CheckOutcome::NotApplicable;
        };

        let read = || -> Result<(f64, f64, f64), SkipReason> {
            Ok((
                number(doc, "assets")?,
                number(doc, "liabilities")?,
                number(doc, "equity")?,
            ))
        };
        let (assets, liabilities, equity) = match read() {
            Ok(v) => v,
            Err(reason) => return CheckOutcome::Skipped(reason),
        };

        let expected = assets - liabilities;
        if !expected.is_finite() {
            return CheckOutcome::Skipped(SkipReason::NonFinite);
        }
        if (equity - expected).abs() <= MONEY_TOLERANCE {
            return CheckOutcome::Consistent;
        }
        CheckOutcome::Propose(CorrectionDecision::new(
            "equity",
            equity_raw.clone(),
            number_value(expected),
            ACCOUNTING_CONFIDENCE,
            format!(
                "Equity should equal Assets ({}) - Liabilities ({})",
                assets, liabilities
            ),
            PatternId::AccountingEquation,
        ))
    }

    /// Every `*total*` field with at least two components must equal their sum.
    /// Components are the other non-total fields whose name contains the total's base name.
    pub fn cumulative_totals(&self, doc: &Document) -> Vec<CheckOutcome> {
        let mut outcomes = Vec::new();
        for (field, value) in doc.iter() {
            let lower = field.to_lowercase();
            if !lower.contains("total") {
                continue;
            }
            let base = lower
                .trim_start_matches("total")
                .trim_end_matches("total")
                .trim_matches(|c: char| c == '_' || c == '-' || c.is_whitespace());
            if base.is_empty() {
                outcomes.push(CheckOutcome::NotApplicable);
                continue;
            }

            let components: Vec<&String> = doc
                .field_names()
                .filter(|name| {
                    let name = name.to_lowercase();
                    name != lower && name.contains(base) && !name.contains("total")
                })
                .collect();
            if components.len() < 2 {
                outcomes.push(CheckOutcome::NotApplicable);
                continue;
            }

            let read = || -> Result<(f64, f64), SkipReason> {
                let mut sum = 0.0;
                for c in &components {
                    sum += number(doc, c)?;
                }
                Ok((sum, number(doc, field)?))
            };
            let (sum, total) = match read() {
                Ok(v) => v,
                Err(reason) => {
                    outcomes.push(CheckOutcome::Skipped(reason));
                    continue;
                }
            };

            if (sum - total).abs() <= MONEY_TOLERANCE {
                outcomes.push(CheckOutcome::Consistent);
                continue;
            }
            let names: Vec<&str> = components.iter().map(|c| c.as_str()).collect();
            outcomes.push(CheckOutcome::Propose(CorrectionDecision::new(
                field.clone(),
                value.clone(),
                number_value(sum),
                TOTAL_CONFIDENCE,
                format!("Total should equal sum of {}", names.join(", ")),
                PatternId::CumulativeTotal,
            )));
        }
        outcomes
    }

    /// Fields for quarters 1..=4, when each quarter appears exactly once.
    fn quarters<'a>(&self, doc: &'a Document) -> Option<[(&'a String, &'a Value); 4]> {
        let mut slots: [Vec<(&String, &Value)>; 4] = Default::default();
        for (field, value) in doc.iter() {
            let Some(caps) = quarter_regex().captures(field) else {
                continue;
            };
            let idx: usize = caps[1].parse().ok()?;
            slots[idx - 1].push((field, value));
        }
        if slots.iter().any(|s| s.len() != 1) {
            return None;
        }
        Some([slots[0][0], slots[1][0], slots[2][0], slots[3][0]])
    }

    /// `q4 == q1 + q2 + q3`.
    pub fn quarterly_sum(&self, doc: &Document) -> CheckOutcome {
        let Some(q) = self.quarters(doc) else {
            return CheckOutcome::NotApplicable;
        };
        let mut values = [0.0; 4];
        for (slot, (field, value)) in values.iter_mut().zip(q) {
            match parse_number(value) {
                Ok(x) => *slot = x,
                Err(e) => return CheckOutcome::Skipped(SkipReason::unparseable(field.as_str(), e)),
            }
        }

        let expected = values[0] + values[1] + values[2];
        if (values[3] - expected).abs() <= QUARTER_TOLERANCE {
            return CheckOutcome::Consistent;
        }
        let (q4_field, q4_value) = q[3];
        CheckOutcome::Propose(CorrectionDecision::new(
            q4_field.clone(),
            q4_value.clone(),
            number_value(expected),
            QUARTER_SUM_CONFIDENCE,
            format!(
                "{} should be the cumulative sum of {}, {} and {}",
                q4_field, q[0].0, q[1].0, q[2].0
            ),
            PatternId::Cumulative,
        ))
    }

    /// When q1..q3 are dates and q4 is not, q4 is one year after q3.
    pub fn quarterly_dates(&self, doc: &Document) -> CheckOutcome {
        let Some(q) = self.quarters(doc) else {
            return CheckOutcome::NotApplicable;
        };
        if !q[..3].iter().all(|(_, v)| is_date_like(v)) {
            return CheckOutcome::NotApplicable;
        }
        let (q4_field, q4_value) = q[3];
        if is_date_like(q4_value) {
            return CheckOutcome::Consistent;
        }

        let (q3_field, q3_value) = q[2];
        let last = match parse_date(q3_value) {
            Ok(d) => d,
            Err(e) => return CheckOutcome::Skipped(SkipReason::unparseable(q3_field.as_str(), e)),
        };
        let Some(next) = last.checked_add_months(Months::new(12)) else {
            return CheckOutcome::Skipped(SkipReason::NonFinite);
        };
        CheckOutcome::Propose(CorrectionDecision::new(
            q4_field.clone(),
            q4_value.clone(),
            Value::String(next.format("%Y-%m-%d").to_string()),
            QUARTER_DATE_CONFIDENCE,
            "Pattern consistency: expected date sequence",
            PatternId::DateSequence,
        ))
    }

    /// Stated IRR against the IRR implied by the multiple over the holding period.
    pub fn irr_consistency(&self, doc: &Document) -> CheckOutcome {
        let (Some(irr_raw), Some(inv), Some(exit), Some(multiple_raw)) = (
            doc.get("irr"),
            doc.get("investment_date"),
            doc.get("exit_date"),
            doc.get("multiple"),
        ) else {
            return CheckOutcome::NotApplicable;
        };

        let read = || -> Result<(f64, f64, f64), SkipReason> {
            let inv = parse_date(inv).map_err(|e| SkipReason::unparseable("investment_date", e))?;
            let exit = parse_date(exit).map_err(|e| SkipReason::unparseable("exit_date", e))?;
            let years = (exit - inv).num_days() as f64 / DAYS_PER_YEAR;
            let multiple =
                parse_multiple(multiple_raw).map_err(|e| SkipReason::unparseable("multiple", e))?;
            let irr = parse_percentage(irr_raw).map_err(|e| SkipReason::unparseable("irr", e))?;
            Ok((years, multiple, irr))
        };
        let (years, multiple, irr) = match read() {
            Ok(v) => v,
            Err(reason) => return CheckOutcome::Skipped(reason),
        };
        if years <= 0.0 {
            return CheckOutcome::Skipped(SkipReason::NonPositivePeriod { years });
        }
        if multiple <= 0.0 {
            return CheckOutcome::Skipped(SkipReason::unparseable(
                "multiple",
                ParseError::OutOfRange {
                    value: multiple,
                    min: 0.0,
                    max: f64::INFINITY,
                },
            ));
        }

        let expected = (multiple.powf(1.0 / years) - 1.0) * 100.0;
        if !expected.is_finite() {
            return CheckOutcome::Skipped(SkipReason::NonFinite);
        }
        if (expected - irr).abs() <= self.irr_tolerance {
            return CheckOutcome::Consistent;
        }
        CheckOutcome::Propose(CorrectionDecision::new(
            "irr",
            irr_raw.clone(),
            Value::String(format!("{:.1}%", expected)),
            IRR_CONFIDENCE,
            format!(
                "IRR inconsistent with {}x over {:.1} years",
                value_text(multiple_raw).trim_end_matches(['x', 'X']),
                years
            ),
            PatternId::CrossFieldIrr,
        ))
    }
}

impl Default for ArithmeticChecker {
    fn default() -> Self {
        Self::new(5.0)
    }
}
