//! Value marshaling between host values and script values
//!
//! The [`Marshaler`] converts a [`HostValue`] into the interpreter's
//! [`Dynamic`] representation and back:
//! - integers, floats, strings and booleans convert losslessly
//! - records become object maps and object maps become records
//! - unit converts to `()` and back
//!
//! Anything else a script can produce (arrays, function pointers, custom
//! types) is rejected with [`UnsupportedType`]. Nesting is bounded by
//! `max_depth`, which also stops cyclic shared maps.
//!
//! # Examples
//!
//! ```
//! use rulehost_runtime::api::Marshaler;
//! use rulehost_runtime::HostValue;
//!
//! let marshaler = Marshaler::default();
//! let script_value = marshaler.to_script(&HostValue::Integer(42)).unwrap();
//! assert_eq!(marshaler.from_script(&script_value).unwrap(), HostValue::Integer(42));
//! ```

use crate::value::{HostValue, Record};
use rhai::{Dynamic, ImmutableString, Map, FLOAT, INT};
use thiserror::Error;

/// Default maximum record nesting depth
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// A value shape the marshaling boundary cannot represent
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnsupportedType {
    /// The script produced a value with no host counterpart
    #[error("unsupported script value of type '{type_name}' at {path}")]
    ScriptType { type_name: String, path: String },
    /// Records nested deeper than the configured limit (or cyclic)
    #[error("value nesting exceeds {max_depth} levels at {path}")]
    TooDeep { max_depth: usize, path: String },
}

/// Bidirectional converter between host values and script values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marshaler {
    max_depth: usize,
}

impl Default for Marshaler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl Marshaler {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Convert a host value into a script value
    pub fn to_script(&self, value: &HostValue) -> Result<Dynamic, UnsupportedType> {
        let mut path = FieldPath::default();
        self.to_script_at(value, &mut path)
    }

    /// Convert a script value into a host value
    pub fn from_script(&self, value: &Dynamic) -> Result<HostValue, UnsupportedType> {
        let mut path = FieldPath::default();
        self.from_script_at(value, &mut path)
    }

    fn to_script_at(
        &self,
        value: &HostValue,
        path: &mut FieldPath,
    ) -> Result<Dynamic, UnsupportedType> {
        self.check_depth(path)?;

        Ok(match value {
            HostValue::Unit => Dynamic::UNIT,
            HostValue::Boolean(b) => Dynamic::from_bool(*b),
            HostValue::Integer(i) => Dynamic::from_int(*i),
            HostValue::Float(n) => Dynamic::from_float(*n),
            HostValue::String(s) => Dynamic::from(ImmutableString::from(s.as_str())),
            HostValue::Record(record) => {
                let mut map = Map::new();
                for (key, field) in record {
                    path.push(key);
                    let converted = self.to_script_at(field, path);
                    path.pop();
                    map.insert(key.as_str().into(), converted?);
                }
                Dynamic::from_map(map)
            }
        })
    }

    fn from_script_at(
        &self,
        value: &Dynamic,
        path: &mut FieldPath,
    ) -> Result<HostValue, UnsupportedType> {
        self.check_depth(path)?;

        // read_lock sees through shared (closure-captured) values
        if value.is::<()>() {
            return Ok(HostValue::Unit);
        }
        if let Some(b) = value.read_lock::<bool>() {
            return Ok(HostValue::Boolean(*b));
        }
        if let Some(i) = value.read_lock::<INT>() {
            return Ok(HostValue::Integer(*i));
        }
        if let Some(n) = value.read_lock::<FLOAT>() {
            return Ok(HostValue::Float(*n));
        }
        if let Some(s) = value.read_lock::<ImmutableString>() {
            return Ok(HostValue::String(s.to_string()));
        }
        if let Some(c) = value.read_lock::<char>() {
            return Ok(HostValue::String(c.to_string()));
        }
        if let Some(map) = value.read_lock::<Map>() {
            let mut record = Record::new();
            for (key, field) in map.iter() {
                path.push(key.as_str());
                let converted = self.from_script_at(field, path);
                path.pop();
                record.insert(key.to_string(), converted?);
            }
            return Ok(HostValue::Record(record));
        }

        Err(UnsupportedType::ScriptType {
            type_name: value.type_name().to_string(),
            path: path.to_string(),
        })
    }

    fn check_depth(&self, path: &FieldPath) -> Result<(), UnsupportedType> {
        if path.depth() > self.max_depth {
            return Err(UnsupportedType::TooDeep {
                max_depth: self.max_depth,
                path: path.to_string(),
            });
        }
        Ok(())
    }
}

/// Field names from the root value down to the value being converted
#[derive(Debug, Default)]
struct FieldPath(Vec<String>);

impl FieldPath {
    fn push(&mut self, field: &str) {
        self.0.push(field.to_string());
    }

    fn pop(&mut self) {
        self.0.pop();
    }

    fn depth(&self) -> usize {
        self.0.len()
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        write!(f, "{}", self.0.join("."))
    }
}
