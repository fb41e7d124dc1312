//! Scalar value representation
//!
//! This module provides the variant scalar stored in record columns. The
//! engine is schema-driven rather than statically typed per table, so every
//! cell holds one of these variants; the declared column types only matter
//! when the rows are persisted to the store.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Value in a record column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Absent value
    Null,

    /// Integer (64-bit)
    Int(i64),

    /// Floating point (64-bit)
    Float(f64),

    /// Text string (also carries TIME columns as `HH:MM:SS`)
    Text(String),
}

impl Value {
    /// Interpret this value as a synthetic key.
    ///
    /// Keys live in the engine as integers, but callers routinely hand them
    /// around as text (form fields), so numeric text coerces too. Returns
    /// `None` for anything that cannot name a key.
    pub fn as_key(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns true if the value is `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}
