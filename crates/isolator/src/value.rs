//! Dynamically typed host values.
//!
//! Every argument and return value that crosses the proxy boundary is a
//! [`Value`]. Conversions follow the host's loose rules: `null` stringifies to
//! the empty string, booleans to `"1"`/`""`, arrays to `"Array"`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A host value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    /// Instance produced by dynamic construction (`new`).
    Object {
        class: String,
        properties: BTreeMap<String, Value>,
    },
}

impl Value {
    /// Host string conversion.
    #[must_use]
    pub fn to_host_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(true) => "1".to_string(),
            Self::Bool(false) => String::new(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => format_float(*f),
            Self::Str(s) => s.clone(),
            Self::Array(_) => "Array".to_string(),
            Self::Object { class, .. } => class.clone(),
        }
    }

    /// Host truthiness: `null`, `false`, `0`, `0.0`, `""`, `"0"` and `[]` are falsy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty() && s != "0",
            Self::Array(items) => !items.is_empty(),
            Self::Object { .. } => true,
        }
    }

    /// Loose integer conversion. Numeric strings parse by their leading digits.
    #[must_use]
    pub fn to_int(&self) -> i64 {
        match self {
            Self::Null => 0,
            Self::Bool(b) => i64::from(*b),
            Self::Int(i) => *i,
            Self::Float(f) => *f as i64,
            Self::Str(s) => leading_int(s),
            Self::Array(items) => i64::from(!items.is_empty()),
            Self::Object { .. } => 1,
        }
    }

    /// Loose float conversion.
    #[must_use]
    pub fn to_float(&self) -> f64 {
        match self {
            Self::Float(f) => *f,
            Self::Str(s) => s.trim().parse().unwrap_or_else(|_| leading_int(s) as f64),
            other => other.to_int() as f64,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short type name used in diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Array(_) => "array",
            Self::Object { .. } => "object",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_host_string())
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{f}")
    }
}

fn leading_int(s: &str) -> i64 {
    let trimmed = s.trim_start();
    let mut end = 0;
    for (idx, ch) in trimmed.char_indices() {
        if ch.is_ascii_digit() || (idx == 0 && (ch == '-' || ch == '+')) {
            end = idx + ch.len_utf8();
        } else {
            break;
        }
    }
    trimmed[..end].parse().unwrap_or(0)
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_string_conversion() {
        assert_eq!(Value::Null.to_host_string(), "");
        assert_eq!(Value::Bool(true).to_host_string(), "1");
        assert_eq!(Value::Bool(false).to_host_string(), "");
        assert_eq!(Value::Int(-4).to_host_string(), "-4");
        assert_eq!(Value::Float(2.0).to_host_string(), "2");
        assert_eq!(Value::Float(2.5).to_host_string(), "2.5");
        assert_eq!(Value::from(vec![1, 2]).to_host_string(), "Array");
    }

    #[test]
    fn truthiness_matches_host_rules() {
        assert!(!Value::from("0").is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("0.0").is_truthy());
        assert!(!Value::Array(Vec::new()).is_truthy());
        assert!(Value::Int(-1).is_truthy());
    }

    #[test]
    fn loose_numeric_conversion() {
        assert_eq!(Value::from("42abc").to_int(), 42);
        assert_eq!(Value::from("  -7").to_int(), -7);
        assert_eq!(Value::from("abc").to_int(), 0);
        assert_eq!(Value::from("1.5").to_float(), 1.5);
    }

    #[test]
    fn untagged_json_round_trip() {
        let value: Value = serde_json::from_str(r#"[null, true, 3, 1.5, "x"]"#).unwrap();
        assert_eq!(
            value,
            Value::Array(vec![
                Value::Null,
                Value::Bool(true),
                Value::Int(3),
                Value::Float(1.5),
                Value::from("x"),
            ])
        );
    }
}
