//! Tracked Handles
//!
//! A [`Tracked`] is the reactive wrapper around a [`RawObject`]. All reads
//! and writes of tracked state go through it (or one of its typed views,
//! see [`Tracked::as_record`] and friends): reads register dependencies,
//! writes trigger them. Mutating the raw object directly bypasses tracking.
//!
//! # Identity
//!
//! A runtime keeps at most one live wrapper per `(object, options)` pair,
//! so wrapping the same object twice returns the same handle for as long
//! as any handle is alive. Nested composites read through a deep wrapper
//! are wrapped with the same options, and so hit the same cache.
//!
//! # Options
//!
//! - `shallow`: nested composites are returned raw instead of wrapped.
//! - `readonly`: reads are not tracked (nothing can change through this
//!   handle) and writes are suppressed with a warning.

use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;

use super::collection::{TrackedMap, TrackedSet};
use super::list::TrackedList;
use super::object::{RawObject, ShapeKind};
use super::record::TrackedRecord;
use super::value::Value;
use crate::error::Warning;
use crate::reactive::{Key, Runtime};

/// How a [`Tracked`] handle treats nested values and writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WrapOptions {
    pub shallow: bool,
    pub readonly: bool,
}

impl WrapOptions {
    pub const REACTIVE: Self = Self {
        shallow: false,
        readonly: false,
    };
    pub const SHALLOW_REACTIVE: Self = Self {
        shallow: true,
        readonly: false,
    };
    pub const READONLY: Self = Self {
        shallow: false,
        readonly: true,
    };
    pub const SHALLOW_READONLY: Self = Self {
        shallow: true,
        readonly: true,
    };
}

pub(crate) struct TrackedInner {
    raw: RawObject,
    options: WrapOptions,
    runtime: Runtime,
}

/// Reactive handle to a composite.
///
/// Clones share identity; equality is handle identity.
#[derive(Clone)]
pub struct Tracked {
    inner: Arc<TrackedInner>,
}

impl Tracked {
    /// The untracked object behind this handle.
    pub fn raw(&self) -> &RawObject {
        &self.inner.raw
    }

    pub fn options(&self) -> WrapOptions {
        self.inner.options
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.options.readonly
    }

    pub fn is_shallow(&self) -> bool {
        self.inner.options.shallow
    }

    pub fn kind(&self) -> ShapeKind {
        self.inner.raw.kind()
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// Check whether two handles are the same wrapper.
    pub fn ptr_eq(&self, other: &Tracked) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn as_record(&self) -> Option<TrackedRecord> {
        (self.kind() == ShapeKind::Record).then(|| TrackedRecord::new(self.clone()))
    }

    pub fn as_list(&self) -> Option<TrackedList> {
        (self.kind() == ShapeKind::List).then(|| TrackedList::new(self.clone()))
    }

    pub fn as_map(&self) -> Option<TrackedMap> {
        (self.kind() == ShapeKind::Map).then(|| TrackedMap::new(self.clone()))
    }

    pub fn as_set(&self) -> Option<TrackedSet> {
        (self.kind() == ShapeKind::Set).then(|| TrackedSet::new(self.clone()))
    }

    /// Register a read of `key`. Read-only handles never track.
    pub(crate) fn track(&self, key: Key) {
        if !self.inner.options.readonly {
            self.inner.runtime.track(&self.inner.raw, key);
        }
    }

    /// Wrap a value read out of this object, per this handle's options.
    pub(crate) fn wrap_child(&self, value: Value) -> Value {
        if self.inner.options.shallow {
            return value;
        }
        match value {
            Value::Object(raw) => Value::Tracked(self.inner.runtime.wrap_raw(raw, self.inner.options)),
            other => other,
        }
    }

    /// Suppress a write through a read-only handle. Returns true if the
    /// write must not be applied.
    pub(crate) fn reject_write(&self, warning: impl FnOnce() -> Warning) -> bool {
        if self.inner.options.readonly {
            self.inner.runtime.warn(warning());
            true
        } else {
            false
        }
    }

    /// Read every nested value, tracked, and return them.
    ///
    /// Records read their key set and each field, lists their length and
    /// each index, maps and sets their iteration. Used by deep watchers.
    pub fn children(&self) -> Vec<Value> {
        match self.kind() {
            ShapeKind::Record => TrackedRecord::new(self.clone())
                .entries()
                .into_iter()
                .map(|(_, value)| value)
                .collect(),
            ShapeKind::List => TrackedList::new(self.clone()).iter(),
            ShapeKind::Map => TrackedMap::new(self.clone())
                .entries()
                .into_iter()
                .flat_map(|(key, value)| [key, value])
                .collect(),
            ShapeKind::Set => TrackedSet::new(self.clone()).values(),
        }
    }
}

impl PartialEq for Tracked {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Tracked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("raw", &self.inner.raw)
            .field("options", &self.inner.options)
            .finish()
    }
}

impl Runtime {
    /// Wrap `value` for tracking.
    ///
    /// Composites become [`Value::Tracked`]; scalars pass through unchanged.
    /// A value already tracked by this runtime with the same options is
    /// returned as is, one with other options is rewrapped.
    pub fn wrap(&self, value: Value, options: WrapOptions) -> Value {
        match value {
            Value::Object(raw) => Value::Tracked(self.wrap_raw(raw, options)),
            Value::Tracked(tracked)
                if tracked.options() == options && tracked.runtime().ptr_eq(self) =>
            {
                Value::Tracked(tracked)
            }
            Value::Tracked(tracked) => Value::Tracked(self.wrap_raw(tracked.raw().clone(), options)),
            other => other,
        }
    }

    /// Deep, writable wrapper.
    pub fn reactive(&self, raw: RawObject) -> Tracked {
        self.wrap_raw(raw, WrapOptions::REACTIVE)
    }

    /// Writable wrapper whose nested composites are returned raw.
    pub fn shallow_reactive(&self, raw: RawObject) -> Tracked {
        self.wrap_raw(raw, WrapOptions::SHALLOW_REACTIVE)
    }

    /// Deep, read-only wrapper.
    pub fn readonly(&self, raw: RawObject) -> Tracked {
        self.wrap_raw(raw, WrapOptions::READONLY)
    }

    pub fn shallow_readonly(&self, raw: RawObject) -> Tracked {
        self.wrap_raw(raw, WrapOptions::SHALLOW_READONLY)
    }

    /// Get or create the one live wrapper for `(raw, options)`.
    pub(crate) fn wrap_raw(&self, raw: RawObject, options: WrapOptions) -> Tracked {
        let fresh = |raw: RawObject| Tracked {
            inner: Arc::new(TrackedInner {
                raw,
                options,
                runtime: self.clone(),
            }),
        };

        match self.inner.wrappers.entry((raw.id(), options)) {
            Entry::Occupied(mut entry) => {
                let live = entry.get().upgrade();
                match live {
                    Some(inner) => Tracked { inner },
                    None => {
                        let tracked = fresh(raw);
                        entry.insert(Arc::downgrade(&tracked.inner));
                        tracked
                    }
                }
            }
            Entry::Vacant(entry) => {
                let tracked = fresh(raw);
                entry.insert(Arc::downgrade(&tracked.inner));
                tracked
            }
        }
    }
}
