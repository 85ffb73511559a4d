//! Typed column default values.
//!
//! Defaults are persisted in migration files as `{"kind": .., "value": ..}`
//! so that an ambiguous JSON value (a string that is really a timestamp, an
//! integer that is really a float) decodes back into the same typed value.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// A column default value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DefaultValue {
    /// SQL `NULL`.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// Floating point literal.
    Float(f64),
    /// String literal.
    Text(String),
    /// Binary literal.
    Bytes(Vec<u8>),
    /// Point in time.
    Timestamp(DateTime<FixedOffset>),
    /// Calendar date.
    Date(NaiveDate),
    /// JSON document.
    Json(serde_json::Value),
    /// Raw SQL expression such as `CURRENT_TIMESTAMP`.
    Expression(String),
}

impl DefaultValue {
    /// The `CURRENT_TIMESTAMP` expression.
    pub fn now() -> Self {
        Self::Expression("CURRENT_TIMESTAMP".to_string())
    }

    /// Create a raw SQL expression default.
    pub fn expression(expr: impl Into<String>) -> Self {
        Self::Expression(expr.into())
    }

    /// Get the kind tag used in the serialized form.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Timestamp(_) => "timestamp",
            Self::Date(_) => "date",
            Self::Json(_) => "json",
            Self::Expression(_) => "expression",
        }
    }

    /// Check if this is the zero value of its kind.
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(b) => !b,
            Self::Int(i) => *i == 0,
            Self::Float(f) => *f == 0.0,
            Self::Text(s) | Self::Expression(s) => s.is_empty(),
            Self::Bytes(b) => b.is_empty(),
            Self::Json(v) => v.is_null(),
            Self::Timestamp(_) | Self::Date(_) => false,
        }
    }

    fn canonical(&self) -> Option<serde_json::Value> {
        serde_json::to_value(self).ok()
    }
}

impl PartialEq for DefaultValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // Offsets differ in JSON but not as instants.
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            _ => match (self.canonical(), other.canonical()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl From<bool> for DefaultValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for DefaultValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for DefaultValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for DefaultValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for DefaultValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for DefaultValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<DateTime<FixedOffset>> for DefaultValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<NaiveDate> for DefaultValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<serde_json::Value> for DefaultValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}
