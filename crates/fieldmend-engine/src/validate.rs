//! Value validation and parsing
//!
//! Pure functions deciding whether a scalar is plausibly a date, an entity name, an
//! amount, a percentage or a multiple. All numeric and date parsing in the engine goes
//! through the `parse_*` functions here, which return [`ParseError`] instead of
//! panicking; validators simply map an error to `false`.
//!
//! Date-likeness and entity-name-likeness are mutually exclusive: anything that parses
//! as a date is never an entity name.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Why a scalar could not be read as the requested kind.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("value is empty")]
    Empty,
    #[error("'{raw}' is not numeric")]
    NotNumeric { raw: String },
    #[error("'{raw}' is not a calendar date")]
    NotDate { raw: String },
    #[error("{value} is outside [{min}, {max}]")]
    OutOfRange { value: f64, min: f64, max: f64 },
    #[error("value is not text")]
    NotText,
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Words that mark a string as the name of a fund, firm or vehicle.
const ENTITY_INDICATORS: &[&str] = &[
    "fund",
    "capital",
    "partners",
    "lp",
    "llc",
    "inc",
    "ventures",
    "management",
    "equity",
    "group",
    "holdings",
];

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥'];

// ============================================================================
// Parsing
// ============================================================================

fn text(value: &Value) -> Result<&str, ParseError> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                Err(ParseError::Empty)
            } else {
                Ok(s)
            }
        }
        Value::Null => Err(ParseError::Empty),
        _ => Err(ParseError::NotText),
    }
}

/// Parse a calendar date from a text value in any of the accepted layouts.
pub fn parse_date(value: &Value) -> Result<NaiveDate, ParseError> {
    let raw = text(value)?;
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Ok(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.date_naive());
    }
    Err(ParseError::NotDate {
        raw: raw.to_string(),
    })
}

/// Parse a plain number. Strings may carry currency symbols, thousands separators
/// and surrounding whitespace.
pub fn parse_number(value: &Value) -> Result<f64, ParseError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| ParseError::NotNumeric {
            raw: n.to_string(),
        }),
        Value::String(_) | Value::Null => {
            let raw = text(value)?;
            parse_numeric_str(raw, raw)
        }
        other => Err(ParseError::NotNumeric {
            raw: other.to_string(),
        }),
    }
}

fn parse_numeric_str(cleaned: &str, raw: &str) -> Result<f64, ParseError> {
    let cleaned: String = cleaned
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c) && *c != ',' && *c != '_' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return Err(ParseError::Empty);
    }
    match cleaned.parse::<f64>() {
        Ok(x) if x.is_finite() => Ok(x),
        _ => Err(ParseError::NotNumeric {
            raw: raw.to_string(),
        }),
    }
}

/// Monetary amount: a number after stripping currency symbols and separators.
pub fn parse_amount(value: &Value) -> Result<f64, ParseError> {
    parse_number(value)
}

/// Percentage in percentage points (`"45.2%"` → `45.2`). No range check.
pub fn parse_percentage(value: &Value) -> Result<f64, ParseError> {
    match value {
        Value::String(_) => {
            let raw = text(value)?;
            parse_numeric_str(raw.trim_end_matches('%'), raw)
        }
        other => parse_number(other),
    }
}

/// Multiple of invested capital (`"2.8x"` → `2.8`). No range check.
pub fn parse_multiple(value: &Value) -> Result<f64, ParseError> {
    match value {
        Value::String(_) => {
            let raw = text(value)?;
            parse_numeric_str(raw.trim_end_matches(['x', 'X']), raw)
        }
        other => parse_number(other),
    }
}

/// Inclusive range check.
pub fn within(x: f64, min: f64, max: f64) -> Result<f64, ParseError> {
    if (min..=max).contains(&x) {
        Ok(x)
    } else {
        Err(ParseError::OutOfRange { value: x, min, max })
    }
}

/// Multiples outside (0, 20) are not economically plausible.
pub fn plausible_multiple(x: f64) -> Result<f64, ParseError> {
    if x > 0.0 && x < 20.0 {
        Ok(x)
    } else {
        Err(ParseError::OutOfRange {
            value: x,
            min: 0.0,
            max: 20.0,
        })
    }
}

// ============================================================================
// Predicates
// ============================================================================

pub fn is_date_like(value: &Value) -> bool {
    parse_date(value).is_ok()
}

/// Entity-name type check: text longer than three characters that is not a date.
pub fn is_entity_name(value: &Value) -> bool {
    match value {
        Value::String(s) => s.trim().chars().count() > 3 && !is_date_like(value),
        _ => false,
    }
}

/// Stronger heuristic used by swap detection: the value *reads* like a fund or
/// company name (indicator word, or a long capitalised multi-word phrase).
pub fn is_entity_name_like(value: &Value) -> bool {
    let Value::String(s) = value else {
        return false;
    };
    if is_date_like(value) {
        return false;
    }
    let s = s.trim();
    let lower = s.to_lowercase();
    let has_indicator = lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| ENTITY_INDICATORS.contains(&w));
    let has_capital = s.chars().next().is_some_and(char::is_uppercase);
    let multi_word = s.split_whitespace().count() > 1;
    has_indicator || (has_capital && multi_word && s.chars().count() > 10)
}

/// Positive numeric amount, used by the amount-pair swap signal.
pub fn is_positive_amount(value: &Value) -> bool {
    parse_amount(value).is_ok_and(|x| x > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2022, 3, 15).unwrap();
        for raw in ["2022-03-15", "03/15/2022", "15-03-2022", "March 15, 2022", "2022-03-15T10:00:00"] {
            assert_eq!(parse_date(&json!(raw)).unwrap(), expected, "{raw}");
        }
        assert!(matches!(
            parse_date(&json!("Not a date")),
            Err(ParseError::NotDate { .. })
        ));
        assert_eq!(parse_date(&json!(20220315)), Err(ParseError::NotText));
        assert_eq!(parse_date(&json!("  ")), Err(ParseError::Empty));
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_amount(&json!("$1,000,000")).unwrap(), 1_000_000.0);
        assert_eq!(parse_amount(&json!(250000)).unwrap(), 250_000.0);
        assert_eq!(parse_percentage(&json!("45.2%")).unwrap(), 45.2);
        assert_eq!(parse_multiple(&json!("2.8x")).unwrap(), 2.8);
        assert!(matches!(
            parse_amount(&json!("ten million")),
            Err(ParseError::NotNumeric { .. })
        ));
        assert!(parse_amount(&json!("inf")).is_err());
        assert!(parse_amount(&json!(true)).is_err());
    }

    #[test]
    fn test_ranges() {
        assert!(within(50.0, 0.0, 100.0).is_ok());
        assert!(matches!(
            within(150.0, 0.0, 100.0),
            Err(ParseError::OutOfRange { .. })
        ));
        assert!(plausible_multiple(2.0).is_ok());
        assert!(plausible_multiple(20.0).is_err());
        assert!(plausible_multiple(0.0).is_err());
    }

    #[test]
    fn test_entity_name_heuristics() {
        assert!(is_entity_name_like(&json!("Blackstone Capital Partners VII")));
        assert!(is_entity_name_like(&json!("Fund ABC 3")));
        assert!(is_entity_name_like(&json!("Apollo Global Management")));
        assert!(!is_entity_name_like(&json!("2022-03-15")));
        assert!(!is_entity_name_like(&json!("March 15, 2022")));
        assert!(!is_entity_name_like(&json!(42)));
    }

    #[test]
    fn test_date_and_entity_exclusive() {
        for raw in ["2022-03-15", "March 15, 2022", "Apollo Global", "Not a date", "abcd"] {
            let v = json!(raw);
            assert!(!(is_date_like(&v) && is_entity_name(&v)), "{raw}");
        }
    }
}
