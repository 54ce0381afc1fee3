//! Value kernel
//!
//! Typed scalar values carried in object slots, the backing kinds data types
//! are parameterized by, the default-value policy per kind, and the default
//! string codecs used when a data type does not supply its own.

use std::hash::{Hash, Hasher};

use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::errors::{ModelError, Result};
use crate::meta::EEnumLiteral;
use crate::model::ObjectId;

/// Backing kind of a data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Int,
    Bool,
    Float,
    Bytes,
    Enum,
    Date,
    /// Opaque payload, carried as JSON
    Object,
}

impl ValueKind {
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Int => "int",
            ValueKind::Bool => "bool",
            ValueKind::Float => "float",
            ValueKind::Bytes => "bytes",
            ValueKind::Enum => "enum",
            ValueKind::Date => "date",
            ValueKind::Object => "object",
        }
    }

    /// Default value of an unset single-valued feature of this kind
    ///
    /// Primitive kinds read as their zero; reference-like kinds (strings,
    /// bytes, dates, opaque objects) read as `Null`. Enum defaults are
    /// resolved by the data type (first literal), so this returns `Null` for
    /// `Enum`.
    pub fn default_value(&self) -> Value {
        match self {
            ValueKind::Int => Value::Int(0),
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Float => Value::Float(0.0),
            ValueKind::String | ValueKind::Bytes | ValueKind::Enum | ValueKind::Date | ValueKind::Object => Value::Null,
        }
    }
}

/// A value held by (or written to) an object slot
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    Date(DateTime<Utc>),
    Literal(EEnumLiteral),
    Json(serde_json::Value),
    Object(ObjectId),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&EEnumLiteral> {
        match self {
            Value::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Object handles held by this value (the value itself or list members)
    pub fn objects(&self) -> Vec<ObjectId> {
        match self {
            Value::Object(id) => vec![*id],
            Value::List(items) => items.iter().filter_map(Value::as_object).collect(),
            _ => Vec::new(),
        }
    }

    /// Short name of the variant, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::String(_) => "string",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
            Value::Literal(_) => "enum literal",
            Value::Json(_) => "object",
            Value::Object(_) => "model object",
            Value::List(_) => "list",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Literal(a), Value::Literal(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
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
            Value::String(s) => s.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::Date(d) => d.hash(state),
            Value::Literal(lit) => lit.hash(state),
            Value::Json(j) => j.to_string().hash(state),
            Value::Object(id) => id.hash(state),
            Value::List(items) => items.hash(state),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Object(id)
    }
}

impl From<Option<ObjectId>> for Value {
    fn from(id: Option<ObjectId>) -> Self {
        id.map(Value::Object).unwrap_or(Value::Null)
    }
}

impl From<EEnumLiteral> for Value {
    fn from(lit: EEnumLiteral) -> Self {
        Value::Literal(lit)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Vec<ObjectId>> for Value {
    fn from(ids: Vec<ObjectId>) -> Self {
        Value::List(ids.into_iter().map(Value::Object).collect())
    }
}

/// Check a scalar against a backing kind, coercing where lossless
///
/// Enum values are checked by the owning data type, not here.
pub fn coerce(kind: ValueKind, value: Value, feature: &str) -> Result<Value> {
    let mismatch = |v: &Value| {
        ModelError::bad_value(
            feature,
            format!("expected {} but got {}", kind.name(), v.type_name()),
        )
    };
    match (kind, value) {
        (_, Value::Null) => Ok(Value::Null),
        (ValueKind::String, v @ Value::String(_)) => Ok(v),
        (ValueKind::Int, v @ Value::Int(_)) => Ok(v),
        (ValueKind::Bool, v @ Value::Bool(_)) => Ok(v),
        (ValueKind::Float, v @ Value::Float(_)) => Ok(v),
        (ValueKind::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
        (ValueKind::Bytes, v @ Value::Bytes(_)) => Ok(v),
        (ValueKind::Date, v @ Value::Date(_)) => Ok(v),
        (ValueKind::Object, v @ (Value::Object(_) | Value::List(_))) => Err(mismatch(&v)),
        (ValueKind::Object, Value::Json(j)) => Ok(Value::Json(j)),
        (ValueKind::Object, v) => Ok(v),
        (_, v) => Err(mismatch(&v)),
    }
}

/// Default string encoding of a scalar of the given kind
pub fn encode(kind: ValueKind, value: &Value) -> Result<String> {
    let text = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Bytes(b) => base64::engine::general_purpose::STANDARD.encode(b),
        Value::Date(d) => d.to_rfc3339_opts(SecondsFormat::Millis, true),
        Value::Literal(lit) => lit.name(),
        Value::Json(j) => serde_json::to_string(j)?,
        Value::Object(_) | Value::List(_) => {
            return Err(ModelError::bad_value(
                kind.name(),
                format!("{} values have no string form", value.type_name()),
            ))
        }
    };
    Ok(text)
}

/// Default string decoding for the given kind
///
/// Enum literals are decoded by the owning data type.
pub fn decode(kind: ValueKind, text: &str) -> Result<Value> {
    let bad = |reason: String| ModelError::bad_value(kind.name(), reason);
    match kind {
        ValueKind::String => Ok(Value::String(text.to_string())),
        ValueKind::Int => text
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| bad(format!("'{}' is not an integer: {}", text, e))),
        ValueKind::Float => text
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| bad(format!("'{}' is not a number: {}", text, e))),
        ValueKind::Bool => match text.trim() {
            "true" | "True" | "1" => Ok(Value::Bool(true)),
            "false" | "False" | "0" => Ok(Value::Bool(false)),
            other => Err(bad(format!("'{}' is not a boolean", other))),
        },
        ValueKind::Bytes => base64::engine::general_purpose::STANDARD
            .decode(text.trim())
            .map(Value::Bytes)
            .map_err(|e| bad(format!("invalid base64: {}", e))),
        ValueKind::Date => parse_date(text.trim())
            .map(Value::Date)
            .ok_or_else(|| bad(format!("'{}' is not a date", text))),
        ValueKind::Object => Ok(serde_json::from_str::<serde_json::Value>(text)
            .map(Value::Json)
            .unwrap_or_else(|_| Value::Json(serde_json::Value::String(text.to_string())))),
        ValueKind::Enum => Err(bad("enum literals are decoded by their data type".into())),
    }
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(text) {
        return Some(d.with_timezone(&Utc));
    }
    DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%z")
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_defaults() {
        assert!(ValueKind::String.default_value().is_null());
        assert!(ValueKind::Bytes.default_value().is_null());
        assert_eq!(ValueKind::Int.default_value(), Value::Int(0));
        assert_eq!(ValueKind::Bool.default_value(), Value::Bool(false));
        assert!(ValueKind::Date.default_value().is_null());
    }

    #[test]
    fn test_coerce_int_to_float() {
        let v = coerce(ValueKind::Float, Value::Int(3), "ratio").unwrap();
        assert_eq!(v, Value::Float(3.0));
    }

    #[test]
    fn test_coerce_rejects_kind_mismatch() {
        let err = coerce(ValueKind::Int, Value::from("three"), "count").unwrap_err();
        assert!(matches!(err, ModelError::BadValue { .. }));
    }

    #[test]
    fn test_decode_bool_and_int() {
        assert_eq!(decode(ValueKind::Bool, "true").unwrap(), Value::Bool(true));
        assert_eq!(decode(ValueKind::Int, " -12 ").unwrap(), Value::Int(-12));
        assert!(decode(ValueKind::Int, "x").is_err());
    }

    #[test]
    fn test_bytes_codec() {
        let text = encode(ValueKind::Bytes, &Value::Bytes(vec![1, 2, 3])).unwrap();
        assert_eq!(decode(ValueKind::Bytes, &text).unwrap(), Value::Bytes(vec![1, 2, 3]));
    }

    #[test]
    fn test_date_codec() {
        let value = decode(ValueKind::Date, "2024-02-29T10:00:00.000Z").unwrap();
        let text = encode(ValueKind::Date, &value).unwrap();
        assert_eq!(text, "2024-02-29T10:00:00.000Z");
    }

    #[test]
    fn test_float_equality_is_bitwise() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
    }
}
