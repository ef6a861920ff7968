//! Kind-tagged primitive values.
//!
//! Envelope payloads are heterogeneous maps. Every value carries its
//! primitive kind on the wire so that a receiver can check it against the
//! kind a [`StatusType`](crate::StatusType) declares before applying it:
//!
//! ```json
//! {"kind":"float","value":14.0}
//! {"kind":"bool","value":true}
//! {"kind":"null"}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Primitive kind of a [`StatusValue`], or the "any" wildcard a status type
/// may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `true` / `false`.
    Bool,
    /// Signed 64-bit integer.
    Int,
    /// 64-bit float.
    Float,
    /// UTF-8 string.
    Str,
    /// Explicit "no opinion".
    Null,
    /// Wildcard: accepts every kind.
    Any,
}

impl ValueKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "string",
            Self::Null => "null",
            Self::Any => "any",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tagged primitive value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum StatusValue {
    /// Boolean flag.
    #[serde(rename = "bool")]
    Bool(bool),
    /// Integer counter (food level, experience level).
    #[serde(rename = "int")]
    Int(i64),
    /// Floating point measure (health).
    #[serde(rename = "float")]
    Float(f64),
    /// Free text (game mode, reasons, names).
    #[serde(rename = "string")]
    Str(String),
    /// No opinion. Writing it clears the attribute.
    #[serde(rename = "null")]
    Null,
}

impl StatusValue {
    /// The primitive kind of this value. Never [`ValueKind::Any`].
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Str(_) => ValueKind::Str,
            Self::Null => ValueKind::Null,
        }
    }

    /// Whether this is [`StatusValue::Null`].
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Boolean payload, if this is a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer payload, if this is an int.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric payload widened to `f64`. Ints are accepted.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// String payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for StatusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(s) => f.write_str(s),
            Self::Null => f.write_str("null"),
        }
    }
}

impl From<bool> for StatusValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for StatusValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for StatusValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for StatusValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for StatusValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for StatusValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl<T: Into<StatusValue>> From<Option<T>> for StatusValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_wire_form() {
        let json = serde_json::to_string(&StatusValue::Float(14.0)).unwrap();
        assert_eq!(json, r#"{"kind":"float","value":14.0}"#);

        let json = serde_json::to_string(&StatusValue::Null).unwrap();
        assert_eq!(json, r#"{"kind":"null"}"#);

        let json = serde_json::to_string(&StatusValue::from("SURVIVAL")).unwrap();
        assert_eq!(json, r#"{"kind":"string","value":"SURVIVAL"}"#);
    }

    #[test]
    fn tag_decides_kind_not_shape() {
        // An integral float stays a float once tagged.
        let v: StatusValue = serde_json::from_str(r#"{"kind":"float","value":20}"#).unwrap();
        assert_eq!(v.kind(), ValueKind::Float);
        assert_eq!(v.as_f64(), Some(20.0));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let res: Result<StatusValue, _> = serde_json::from_str(r#"{"kind":"list","value":[]}"#);
        assert!(res.is_err());
    }

    #[test]
    fn as_f64_widens_ints_only() {
        assert_eq!(StatusValue::Int(7).as_f64(), Some(7.0));
        assert_eq!(StatusValue::Bool(true).as_f64(), None);
    }

    #[test]
    fn option_maps_to_null() {
        assert_eq!(StatusValue::from(None::<bool>), StatusValue::Null);
        assert_eq!(StatusValue::from(Some(3)), StatusValue::Int(3));
    }
}
