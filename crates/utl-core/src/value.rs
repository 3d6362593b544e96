//! Attribute values.
//!
//! [`Value`] is the closed set of things a node attribute may hold. Values are
//! immutable and hashable so that attribute maps and frozen nodes can be used
//! as set members and map keys.

use std::{
    fmt,
    hash::{Hash, Hasher},
};

use crate::{attrs::AttrMap, frozen::FrozenNode, view::NodeView};

/// A node attribute value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Node(FrozenNode),
    Map(AttrMap),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as an unsigned offset or count.
    ///
    /// Only non-negative integers convert.
    pub fn as_usize(&self) -> Option<usize> {
        self.as_int().and_then(|i| usize::try_from(i).ok())
    }

    /// Returns the numeric payload as `f64`, widening integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the boolean payload, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the nested node, if this holds one.
    pub fn as_node(&self) -> Option<&FrozenNode> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Returns the nested map, if this holds one.
    pub fn as_map(&self) -> Option<&AttrMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Writes the value without quoting strings.
    ///
    /// Used for the short one-line node forms such as `id: abcd`.
    pub fn fmt_plain(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            other => fmt::Display::fmt(other, f),
        }
    }
}

/// Formats a float the way the toolkit prints numbers: integral values keep a
/// trailing `.0`.
pub(crate) fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Node(node) => node.hash(state),
            Value::Map(map) => map.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::String(s) => write!(f, "'{s}'"),
            Value::Node(node) => f.write_str(&node.display_line()),
            Value::Map(map) => fmt::Display::fmt(map, f),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<FrozenNode> for Value {
    fn from(value: FrozenNode) -> Self {
        Value::Node(value)
    }
}

impl From<AttrMap> for Value {
    fn from(value: AttrMap) -> Self {
        Value::Map(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use float_cmp::approx_eq;

    use super::*;

    #[test]
    fn test_accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::from("abc").as_str(), Some("abc"));
        assert_eq!(Value::from(7).as_int(), Some(7));
        assert_eq!(Value::from(7usize).as_usize(), Some(7));
        assert_eq!(Value::from(-1).as_usize(), None);
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert!(approx_eq!(f64, Value::from(2).as_float().unwrap(), 2.0));
        assert!(approx_eq!(f64, Value::from(2.5).as_float().unwrap(), 2.5));
        assert_eq!(Value::from(Option::<&str>::None), Value::Null);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::from(12.0).to_string(), "12.0");
        assert_eq!(Value::from(2.3).to_string(), "2.3");
        assert_eq!(Value::from(5).to_string(), "5");
        assert_eq!(Value::from("test").to_string(), "'test'");
        assert_eq!(Value::from(false).to_string(), "false");
    }

    #[test]
    fn test_int_and_float_are_distinct() {
        assert_ne!(Value::from(3), Value::from(3.0));
    }

    #[test]
    fn test_hash_matches_equality() {
        let mut set = HashSet::new();
        set.insert(Value::from("a"));
        set.insert(Value::from("a"));
        set.insert(Value::from(1.5));
        set.insert(Value::from(1.5));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(23.0), "23.0");
        assert_eq!(format_float(-4.0), "-4.0");
        assert_eq!(format_float(0.25), "0.25");
    }
}
