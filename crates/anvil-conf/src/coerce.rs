//! Type coercion from a resolved [`crate::Value`] into the Rust types
//! `Config::get` callers actually want.

use std::time::Duration;

use crate::duration::parse_duration;
use crate::error::{Error, Result};
use crate::value::Value;

/// Implemented for every type `Config::get::<T>` can produce. Kept as a
/// closed, hand-written set (rather than a blanket `serde::Deserialize`
/// impl over `Value`) so each coercion's failure mode is a specific,
/// readable `Error::TypeMismatch` reason.
pub trait FromValue: Sized {
    fn from_value(path: &str, value: &Value) -> Result<Self>;
}

fn mismatch<T>(path: &str, expected: &str, value: &Value) -> Result<T> {
    Err(Error::TypeMismatch {
        path: path.to_string(),
        reason: format!("expected {expected}, found {value:?}"),
    })
}

impl FromValue for bool {
    fn from_value(path: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            _ => mismatch(path, "bool", value),
        }
    }
}

impl FromValue for i64 {
    fn from_value(path: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Int(i) => Ok(*i),
            Value::Float(f) => Ok(*f as i64),
            _ => mismatch(path, "int", value),
        }
    }
}

impl FromValue for u64 {
    fn from_value(path: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Int(i) if *i >= 0 => Ok(*i as u64),
            _ => mismatch(path, "non-negative int", value),
        }
    }
}

impl FromValue for f64 {
    fn from_value(path: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            _ => mismatch(path, "float", value),
        }
    }
}

impl FromValue for String {
    fn from_value(path: &str, value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            _ => mismatch(path, "string", value),
        }
    }
}

impl FromValue for Duration {
    fn from_value(path: &str, value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => parse_duration(s),
            Value::Int(i) if *i >= 0 => Ok(Duration::from_secs(*i as u64)),
            _ => mismatch(path, "duration", value),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(path: &str, value: &Value) -> Result<Self> {
        match value {
            Value::List(items) => items.iter().map(|item| T::from_value(path, item)).collect(),
            _ => mismatch(path, "list", value),
        }
    }
}

impl FromValue for std::collections::HashMap<String, String> {
    fn from_value(path: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Map(map) => map
                .iter()
                .map(|(k, v)| Ok((k.clone(), String::from_value(path, v)?)))
                .collect(),
            _ => mismatch(path, "map<string,string>", value),
        }
    }
}
