//! Rule-based corrections
//!
//! Three deterministic rules, tried in order:
//!
//! - **Text to number**: `"ten million"` in an amount-like field becomes `10000000`.
//! - **Chronological repair**: an exit date on or before the investment date, or a
//!   period end before its start, is moved to a plausible date.
//! - **Type/date swap repair**: a date field holding a name (or a name field holding a
//!   date) borrows the matching value from another field.

use super::FieldContext;
use crate::catalogue::SemanticType;
use crate::decision::{CorrectionDecision, PatternId};
use crate::document::number_value;
use crate::embedding::tokenize;
use crate::validate::{is_date_like, is_entity_name_like, parse_date};
use chrono::{Datelike, Months, NaiveDate};
use serde_json::Value;

/// Field-name fragments that mark a field as holding a monetary amount.
const AMOUNT_KEYWORDS: &[&str] = &["amount", "value", "price", "investment"];

/// Whole-value phrases converted with the highest confidence.
const DIRECT_PHRASES: &[(&str, i64)] = &[
    ("ten million", 10_000_000),
    ("seventy five million", 75_000_000),
    ("five million", 5_000_000),
];

const DIRECT_PHRASE_CONFIDENCE: f64 = 0.95;
const SCAN_CONFIDENCE: f64 = 0.9;
const CHRONOLOGICAL_CONFIDENCE: f64 = 0.85;
const SWAP_REPAIR_CONFIDENCE: f64 = 0.95;

/// Years added to the investment date when an exit date must be moved.
const DEFAULT_HOLDING_YEARS: u32 = 3;

fn small_number(word: &str) -> Option<f64> {
    let n = match word {
        "zero" => 0,
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "thirteen" => 13,
        "fourteen" => 14,
        "fifteen" => 15,
        "sixteen" => 16,
        "seventeen" => 17,
        "eighteen" => 18,
        "nineteen" => 19,
        "twenty" => 20,
        "thirty" => 30,
        "forty" => 40,
        "fifty" => 50,
        "sixty" => 60,
        "seventy" => 70,
        "eighty" => 80,
        "ninety" => 90,
        _ => return None,
    };
    Some(n as f64)
}

fn magnitude(word: &str) -> Option<f64> {
    match word {
        "thousand" => Some(1e3),
        "million" => Some(1e6),
        "billion" => Some(1e9),
        _ => None,
    }
}

/// Read a run of number words like `"seventy five million"` or `"2.5 billion"`.
///
/// Leading non-number words are skipped; the run ends at the first non-number word
/// after it started. Returns `None` unless the run contains a magnitude word.
fn scan_number_words(words: &[&str]) -> Option<f64> {
    let mut total = 0.0;
    let mut current = 0.0;
    let mut started = false;
    let mut saw_magnitude = false;

    for word in words {
        if let Some(n) = small_number(word) {
            current += n;
            started = true;
        } else if *word == "hundred" && started {
            current *= 100.0;
        } else if let Some(m) = magnitude(word) {
            if !started {
                continue;
            }
            total += current * m;
            current = 0.0;
            saw_magnitude = true;
        } else if let Ok(n) = word.parse::<f64>() {
            if started {
                break;
            }
            current = n;
            started = true;
        } else if *word == "and" && started {
            continue;
        } else if started {
            break;
        }
    }

    let n = total + current;
    (saw_magnitude && n.is_finite()).then_some(n)
}

fn has_segment(segments: &[String], name: &str) -> bool {
    segments.iter().any(|s| s == name)
}

fn is_number_word(word: &str) -> bool {
    small_number(word).is_some()
        || magnitude(word).is_some()
        || word == "hundred"
        || word.parse::<f64>().is_ok()
}

/// Find a direct phrase as whole words anywhere in the value, longest phrase first.
///
/// A match that is only the tail or head of a longer number (`"twenty five million"`
/// against `"five million"`) does not count.
fn direct_phrase(words: &[&str]) -> Option<(&'static str, i64)> {
    DIRECT_PHRASES
        .iter()
        .filter(|(text, _)| {
            let phrase: Vec<&str> = text.split(' ').collect();
            words.windows(phrase.len()).enumerate().any(|(start, window)| {
                let end = start + phrase.len();
                let joined_before = start > 0 && {
                    let prev = words[start - 1];
                    is_number_word(prev) || prev == "and"
                };
                let joined_after = words.get(end).is_some_and(|next| is_number_word(next));
                window == phrase.as_slice() && !joined_before && !joined_after
            })
        })
        .max_by_key(|(text, _)| text.split(' ').count())
        .copied()
}

#[derive(Debug, Clone, Default)]
pub struct PatternCorrector;

impl PatternCorrector {
    pub fn new() -> Self {
        Self
    }

    pub fn propose(&self, ctx: &FieldContext<'_>) -> Option<CorrectionDecision> {
        self.text_to_number(ctx)
            .or_else(|| self.chronological_fix(ctx))
            .or_else(|| self.swap_repair(ctx))
    }

    pub fn text_to_number(&self, ctx: &FieldContext<'_>) -> Option<CorrectionDecision> {
        let Value::String(raw) = ctx.value else {
            return None;
        };
        let field = ctx.field.to_lowercase();
        if !AMOUNT_KEYWORDS.iter().any(|kw| field.contains(kw)) {
            return None;
        }

        let normalized = raw.to_lowercase().replace(',', "").replace('-', " ");
        let words: Vec<&str> = normalized.split_whitespace().collect();
        let phrase = words.join(" ");

        if let Some((text, n)) = direct_phrase(&words) {
            return Some(CorrectionDecision::new(
                ctx.field,
                ctx.value.clone(),
                Value::from(n),
                DIRECT_PHRASE_CONFIDENCE,
                format!("Converted '{}' to {}", text, n),
                PatternId::TextToNumber,
            ));
        }

        if let Some(n) = scan_number_words(&words) {
            let corrected = number_value(n);
            return Some(CorrectionDecision::new(
                ctx.field,
                ctx.value.clone(),
                corrected.clone(),
                SCAN_CONFIDENCE,
                format!("Converted '{}' to {}", raw, corrected),
                PatternId::TextToNumber,
            ));
        }

        let single = small_number(&phrase).or_else(|| magnitude(&phrase))?;
        let corrected = number_value(single);
        Some(CorrectionDecision::new(
            ctx.field,
            ctx.value.clone(),
            corrected.clone(),
            SCAN_CONFIDENCE,
            format!("Converted text number '{}' to {}", raw, corrected),
            PatternId::TextToNumber,
        ))
    }

    pub fn chronological_fix(&self, ctx: &FieldContext<'_>) -> Option<CorrectionDecision> {
        let current = parse_date(ctx.value).ok()?;
        let field = tokenize(ctx.field);

        for (other_field, other_value) in ctx.others() {
            let Ok(other) = parse_date(other_value) else {
                continue;
            };
            let other_field = tokenize(other_field);

            if has_segment(&field, "exit") && has_segment(&other_field, "investment") {
                if current <= other {
                    let suggested = other.checked_add_months(Months::new(12 * DEFAULT_HOLDING_YEARS))?;
                    return Some(self.date_fix(ctx, suggested, "Exit date should be after investment date"));
                }
            } else if has_segment(&field, "end")
                && has_segment(&other_field, "start")
                && current < other
            {
                let suggested = NaiveDate::from_ymd_opt(other.year(), 12, 31)?;
                return Some(self.date_fix(ctx, suggested, "End date should be after start date"));
            }
        }
        None
    }

    fn date_fix(&self, ctx: &FieldContext<'_>, date: NaiveDate, reason: &str) -> CorrectionDecision {
        CorrectionDecision::new(
            ctx.field,
            ctx.value.clone(),
            Value::String(date.format("%Y-%m-%d").to_string()),
            CHRONOLOGICAL_CONFIDENCE,
            reason,
            PatternId::ChronologicalFix,
        )
    }

    pub fn swap_repair(&self, ctx: &FieldContext<'_>) -> Option<CorrectionDecision> {
        match ctx.semantic_type {
            SemanticType::Date if is_entity_name_like(ctx.value) => {
                let (other_field, other_value) = ctx.others().find(|(_, v)| is_date_like(v))?;
                Some(CorrectionDecision::new(
                    ctx.field,
                    ctx.value.clone(),
                    other_value.clone(),
                    SWAP_REPAIR_CONFIDENCE,
                    format!("Value appears to be an entity name, found date in {}", other_field),
                    PatternId::DateFundSwap,
                ))
            }
            SemanticType::EntityName if is_date_like(ctx.value) => {
                let (other_field, other_value) =
                    ctx.others().find(|(_, v)| is_entity_name_like(v))?;
                Some(CorrectionDecision::new(
                    ctx.field,
                    ctx.value.clone(),
                    other_value.clone(),
                    SWAP_REPAIR_CONFIDENCE,
                    format!("Value appears to be a date, found entity name in {}", other_field),
                    PatternId::FundDateSwap,
                ))
            }
            _ => None,
        }
    }
}
