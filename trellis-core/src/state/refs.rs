//! Refs
//!
//! A [`Ref`] is a single reactive value: one field of a tracked record.
//! [`Runtime::new_ref`] creates a fresh `{ value }` record;
//! [`TrackedRecord::to_ref`] aliases a field of an existing one, so writes
//! through the ref are writes to the record.
//!
//! Pulling a plain [`Value`] out of a record loses reactivity; a `Ref` keeps
//! it, and the distinct type makes the difference visible at every call
//! site.

use std::fmt;
use std::sync::Arc;

use super::object::RawObject;
use super::record::TrackedRecord;
use super::value::Value;
use crate::reactive::Runtime;

const REF_FIELD: &str = "value";

/// A reactive handle to one field of a record.
#[derive(Clone, PartialEq)]
pub struct Ref {
    target: TrackedRecord,
    field: Arc<str>,
}

impl Ref {
    pub(crate) fn new(target: TrackedRecord, field: &str) -> Self {
        Self {
            target,
            field: field.into(),
        }
    }

    /// Read the value, tracking it.
    pub fn get(&self) -> Value {
        self.target.get(&self.field)
    }

    /// Write the value, triggering readers if it changed.
    pub fn set(&self, value: impl Into<Value>) -> bool {
        self.target.set(&self.field, value)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// The record this ref reads and writes.
    pub fn target(&self) -> &TrackedRecord {
        &self.target
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("target", &self.target.tracked().raw().id())
            .field("field", &self.field)
            .finish()
    }
}

impl Runtime {
    /// A new reactive single value.
    pub fn new_ref(&self, value: impl Into<Value>) -> Ref {
        let raw = RawObject::record([(REF_FIELD, value.into())]);
        let record = TrackedRecord::new(self.reactive(raw));
        Ref::new(record, REF_FIELD)
    }
}
