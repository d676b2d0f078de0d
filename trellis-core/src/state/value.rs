//! Dynamic Values
//!
//! [`Value`] is the data model stored inside tracked state. Scalars are held
//! inline; composites are held by identity as [`RawObject`]s. Reading a
//! composite through a deep [`Tracked`] handle yields `Value::Tracked`, so
//! nested reads stay reactive.
//!
//! # Change Detection
//!
//! Writes only trigger when the value actually changed under "same value"
//! semantics: composites compare by identity (a `Tracked` and the
//! `RawObject` it wraps are the same value) and `NaN` equals `NaN`.

use std::fmt;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use super::object::{RawObject, Shape};
use super::tracked::Tracked;

/// A value held in tracked state.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    /// A raw composite, not tracked when read through.
    Object(RawObject),
    /// A reactive handle to a composite.
    Tracked(Tracked),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&RawObject> {
        match self {
            Value::Object(raw) => Some(raw),
            _ => None,
        }
    }

    pub fn as_tracked(&self) -> Option<&Tracked> {
        match self {
            Value::Tracked(tracked) => Some(tracked),
            _ => None,
        }
    }

    pub fn into_tracked(self) -> Option<Tracked> {
        match self {
            Value::Tracked(tracked) => Some(tracked),
            _ => None,
        }
    }

    /// The raw object behind a composite, tracked or not.
    pub fn identity(&self) -> Option<&RawObject> {
        match self {
            Value::Object(raw) => Some(raw),
            Value::Tracked(tracked) => Some(tracked.raw()),
            _ => None,
        }
    }

    /// Strip any reactive wrapper, leaving what gets stored in raw state.
    pub fn into_raw(self) -> Value {
        match self {
            Value::Tracked(tracked) => Value::Object(tracked.raw().clone()),
            other => other,
        }
    }

    /// "Same value" comparison used for change detection.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => match (self.identity(), other.identity()) {
                (Some(a), Some(b)) => a.ptr_eq(b),
                _ => false,
            },
        }
    }
}

/// Whether a write of `new` over `old` is an observable change.
pub(crate) fn has_changed(old: &Value, new: &Value) -> bool {
    !old.same_value(new)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

impl From<RawObject> for Value {
    fn from(raw: RawObject) -> Self {
        Value::Object(raw)
    }
}

impl From<Tracked> for Value {
    fn from(tracked: Tracked) -> Self {
        Value::Tracked(tracked)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s.into()),
            serde_json::Value::Array(items) => {
                Value::Object(RawObject::list(items.into_iter().map(Value::from)))
            }
            serde_json::Value::Object(fields) => Value::Object(RawObject::record(
                fields.into_iter().map(|(k, v)| (k, Value::from(v))),
            )),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Str(s) => serializer.serialize_str(s),
            // Snapshots never track. Cyclic graphs are not supported.
            Value::Object(raw) => raw.read(|shape| serialize_shape(shape, serializer)),
            Value::Tracked(tracked) => tracked.raw().read(|shape| serialize_shape(shape, serializer)),
        }
    }
}

fn serialize_shape<S: Serializer>(shape: &Shape, serializer: S) -> Result<S::Ok, S::Error> {
    match shape {
        Shape::Record(fields) => {
            let mut map = serializer.serialize_map(Some(fields.len()))?;
            for (k, v) in fields {
                map.serialize_entry(k, v)?;
            }
            map.end()
        }
        Shape::List(items) => {
            let mut seq = serializer.serialize_seq(Some(items.len()))?;
            for item in items {
                seq.serialize_element(item)?;
            }
            seq.end()
        }
        Shape::Map(entries) => {
            let mut seq = serializer.serialize_seq(Some(entries.len()))?;
            for (k, v) in entries {
                seq.serialize_element(&(k, v))?;
            }
            seq.end()
        }
        Shape::Set(members) => {
            let mut seq = serializer.serialize_seq(Some(members.len()))?;
            for member in members {
                seq.serialize_element(member)?;
            }
            seq.end()
        }
    }
}

/// A hashable key of a map entry or set member.
///
/// Object keys hash and compare by identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntryKey {
    Bool(bool),
    Int(i64),
    Str(Arc<str>),
    Object(RawObject),
}

impl EntryKey {
    /// Convert a value into a key. Floats and `Null` are not hashable.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(EntryKey::Bool(*b)),
            Value::Int(n) => Some(EntryKey::Int(*n)),
            Value::Str(s) => Some(EntryKey::Str(s.clone())),
            Value::Object(raw) => Some(EntryKey::Object(raw.clone())),
            Value::Tracked(tracked) => Some(EntryKey::Object(tracked.raw().clone())),
            Value::Null | Value::Float(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            EntryKey::Bool(b) => Value::Bool(*b),
            EntryKey::Int(n) => Value::Int(*n),
            EntryKey::Str(s) => Value::Str(s.clone()),
            EntryKey::Object(raw) => Value::Object(raw.clone()),
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKey::Bool(b) => write!(f, "{b}"),
            EntryKey::Int(n) => write!(f, "{n}"),
            EntryKey::Str(s) => write!(f, "{s}"),
            EntryKey::Object(raw) => write!(f, "{}", raw.id()),
        }
    }
}

impl From<bool> for EntryKey {
    fn from(b: bool) -> Self {
        EntryKey::Bool(b)
    }
}

impl From<i32> for EntryKey {
    fn from(n: i32) -> Self {
        EntryKey::Int(n.into())
    }
}

impl From<i64> for EntryKey {
    fn from(n: i64) -> Self {
        EntryKey::Int(n)
    }
}

impl From<&str> for EntryKey {
    fn from(s: &str) -> Self {
        EntryKey::Str(s.into())
    }
}

impl From<String> for EntryKey {
    fn from(s: String) -> Self {
        EntryKey::Str(s.into())
    }
}

impl From<RawObject> for EntryKey {
    fn from(raw: RawObject) -> Self {
        EntryKey::Object(raw)
    }
}

impl From<&Tracked> for EntryKey {
    fn from(tracked: &Tracked) -> Self {
        EntryKey::Object(tracked.raw().clone())
    }
}

impl Serialize for EntryKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}
