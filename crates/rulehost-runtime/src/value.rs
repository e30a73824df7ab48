//! Host-side value model
//!
//! `HostValue` is what callers hand to the rule host and what they get back.
//! Records are open string-keyed maps: scripts may add, remove or overwrite
//! fields, and no schema is enforced at this layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An open, schema-less record of named host values
pub type Record = BTreeMap<String, HostValue>;

/// A value in the host's native type set
///
/// Variant order matters for untagged deserialization: integers are tried
/// before floats so `42` stays an `Integer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum HostValue {
    /// The value of a script that produced nothing
    #[default]
    Unit,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Record(Record),
}

impl HostValue {
    /// Variant name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Unit => "unit",
            HostValue::Boolean(_) => "boolean",
            HostValue::Integer(_) => "integer",
            HostValue::Float(_) => "float",
            HostValue::String(_) => "string",
            HostValue::Record(_) => "record",
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, HostValue::Unit)
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            HostValue::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            HostValue::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Look up a record field; `None` for missing fields and non-records
    pub fn get(&self, field: &str) -> Option<&HostValue> {
        self.as_record().and_then(|record| record.get(field))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Unit => write!(f, "()"),
            HostValue::Boolean(b) => write!(f, "{}", b),
            HostValue::Integer(i) => write!(f, "{}", i),
            HostValue::Float(n) => write!(f, "{:?}", n),
            HostValue::String(s) => write!(f, "{:?}", s),
            HostValue::Record(record) => {
                write!(f, "#{{")?;
                for (i, (key, value)) in record.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Error type for extracting Rust values out of a `HostValue`
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    /// Type mismatch during conversion
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

fn mismatch(expected: &'static str, value: &HostValue) -> ConversionError {
    ConversionError::TypeMismatch {
        expected,
        found: value.type_name(),
    }
}

// Rust to host

impl From<()> for HostValue {
    fn from(_: ()) -> Self {
        HostValue::Unit
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Boolean(value)
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        HostValue::Integer(value)
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        HostValue::Integer(i64::from(value))
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Float(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::String(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::String(value)
    }
}

impl From<Record> for HostValue {
    fn from(value: Record) -> Self {
        HostValue::Record(value)
    }
}

impl<K: Into<String>, V: Into<HostValue>> FromIterator<(K, V)> for HostValue {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        HostValue::Record(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

// Host to Rust

impl TryFrom<&HostValue> for bool {
    type Error = ConversionError;

    fn try_from(value: &HostValue) -> Result<Self, Self::Error> {
        match value {
            HostValue::Boolean(b) => Ok(*b),
            _ => Err(mismatch("boolean", value)),
        }
    }
}

impl TryFrom<&HostValue> for i64 {
    type Error = ConversionError;

    fn try_from(value: &HostValue) -> Result<Self, Self::Error> {
        match value {
            HostValue::Integer(i) => Ok(*i),
            _ => Err(mismatch("integer", value)),
        }
    }
}

impl TryFrom<&HostValue> for f64 {
    type Error = ConversionError;

    /// Integers widen to floats; nothing else converts.
    fn try_from(value: &HostValue) -> Result<Self, Self::Error> {
        match value {
            HostValue::Float(n) => Ok(*n),
            HostValue::Integer(i) => Ok(*i as f64),
            _ => Err(mismatch("float", value)),
        }
    }
}

impl TryFrom<&HostValue> for String {
    type Error = ConversionError;

    fn try_from(value: &HostValue) -> Result<Self, Self::Error> {
        match value {
            HostValue::String(s) => Ok(s.clone()),
            _ => Err(mismatch("string", value)),
        }
    }
}
