//! Flat field → scalar documents
//!
//! A [`Document`] is the unit the engine consumes and produces: an ordered map from
//! field name to a scalar JSON value (string, number, boolean or null). Field order is
//! the order fields were extracted in and is preserved through correction, since the
//! swap scan and several tie-breaks depend on it.
//!
//! Nested objects and arrays are rejected at construction time with
//! [`DocumentError::NestedValue`]; the engine does not guess a flattening scheme.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

/// Errors raised when building a [`Document`] from arbitrary JSON.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("field '{field}' holds a nested value; only flat scalar documents are supported")]
    NestedValue { field: String },
    #[error("document must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Runtime kind of a scalar value. Part of the structural pattern fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Text,
    Integer,
    Float,
    Bool,
    Null,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => ValueKind::Text,
            Value::Number(n) if n.is_i64() || n.is_u64() => ValueKind::Integer,
            Value::Number(_) => ValueKind::Float,
            Value::Bool(_) => ValueKind::Bool,
            // Arrays/objects never make it into a Document.
            Value::Null | Value::Array(_) | Value::Object(_) => ValueKind::Null,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Text => "str",
            ValueKind::Integer => "int",
            ValueKind::Float => "float",
            ValueKind::Bool => "bool",
            ValueKind::Null => "null",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered, flat mapping from field name to scalar value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Self { fields: Map::new() }
    }

    /// Build a document from a JSON value, rejecting non-objects and nested values.
    pub fn from_json(value: Value) -> Result<Self, DocumentError> {
        match value {
            Value::Object(map) => Self::try_from(map),
            Value::Array(_) => Err(DocumentError::NotAnObject("array")),
            Value::String(_) => Err(DocumentError::NotAnObject("string")),
            Value::Number(_) => Err(DocumentError::NotAnObject("number")),
            Value::Bool(_) => Err(DocumentError::NotAnObject("bool")),
            Value::Null => Err(DocumentError::NotAnObject("null")),
        }
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Set a field. Existing fields keep their position.
    ///
    /// Nested values are rejected so the flat invariant holds after correction too.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Result<(), DocumentError> {
        let field = field.into();
        if value.is_object() || value.is_array() {
            return Err(DocumentError::NestedValue { field });
        }
        self.fields.insert(field, value);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Compact JSON rendering used as the document-level embedding context.
    pub fn context_string(&self) -> String {
        self.to_json().to_string()
    }
}

impl TryFrom<Map<String, Value>> for Document {
    type Error = DocumentError;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        if let Some((field, _)) = fields.iter().find(|(_, v)| v.is_object() || v.is_array()) {
            return Err(DocumentError::NestedValue {
                field: field.clone(),
            });
        }
        Ok(Self { fields })
    }
}

impl From<Document> for Map<String, Value> {
    fn from(doc: Document) -> Self {
        doc.fields
    }
}

// ============================================================================
// Value helpers
// ============================================================================

/// Textual form of a scalar, as used in context strings and reasoning.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Equality used when comparing engine output against ground truth.
///
/// Numbers compare numerically so `100000` and `100000.0` agree; everything else
/// compares exactly.
pub fn values_match(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => {
                let scale = x.abs().max(y.abs()).max(1.0);
                (x - y).abs() <= f64::EPSILON * scale
            }
            _ => x == y,
        },
        _ => a == b,
    }
}

/// JSON number for a computed value: integral results become integers.
pub fn number_value(x: f64) -> Value {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 9.0e15 {
        Value::from(x as i64)
    } else {
        Number::from_f64(x).map(Value::Number).unwrap_or(Value::Null)
    }
}
