//! Field values and query results.

use std::collections::BTreeMap;
use std::fmt::{self, Write};

/// A field value read from the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing or explicitly null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// String.
    Str(String),
    /// Ordered list.
    List(Vec<Value>),
    /// Object with ordered keys.
    Object(BTreeMap<String, Value>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

fn write_json_str(f: &mut impl Write, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

fn write_object(f: &mut impl Write, fields: &BTreeMap<String, Value>) -> fmt::Result {
    f.write_char('{')?;
    for (i, (name, value)) in fields.iter().enumerate() {
        if i > 0 {
            f.write_char(',')?;
        }
        write_json_str(f, name)?;
        write!(f, ":{value}")?;
    }
    f.write_char('}')
}

/// Renders the value as compact JSON.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write_json_str(f, s),
            Self::List(items) => {
                f.write_char('[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_char(',')?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_char(']')
            }
            Self::Object(fields) => write_object(f, fields),
        }
    }
}

/// The data produced by reading a query from the cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Field values by field name.
    pub data: BTreeMap<String, Value>,
    /// Fields the cache could not produce.
    pub missing: Vec<String>,
}

impl QueryResult {
    /// Returns `true` when every requested field was produced.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Returns the value of `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Renders the data as compact JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = write_object(&mut out, &self.data);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_rendering() {
        let mut result = QueryResult::default();
        result.data.insert("__typename".into(), "Query".into());
        result.data.insert("local".into(), 123.into());
        result.data.insert("tags".into(), vec!["a", "b\"c"].into());
        assert_eq!(
            result.to_json(),
            r#"{"__typename":"Query","local":123,"tags":["a","b\"c"]}"#
        );
    }

    #[test]
    fn test_completeness() {
        let mut result = QueryResult::default();
        assert!(result.is_complete());
        result.missing.push("local".into());
        assert!(!result.is_complete());
    }
}
