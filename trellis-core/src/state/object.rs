//! Raw State Objects
//!
//! A [`RawObject`] is the untracked storage behind every piece of reactive
//! state. Dependencies are keyed by the object's identity ([`ObjectId`]),
//! never by its contents, so two structurally equal objects are tracked
//! independently.
//!
//! Raw objects are engine-agnostic: the same object can be wrapped by
//! several runtimes. Reads and writes through a raw object bypass tracking
//! entirely; go through a [`Tracked`](super::Tracked) handle instead.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;

use super::value::{EntryKey, Value};
use crate::reactive::Target;

/// Process-unique identity of a trackable object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Allocate a fresh identity.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of composite a trackable object is.
///
/// The kind decides which structural buckets a mutation notifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// String-keyed fields in insertion order.
    Record,
    /// An ordered list addressed by index.
    List,
    /// An associative map with insertion-ordered keys.
    Map,
    /// An insertion-ordered set of members.
    Set,
}

/// The contents of a raw object.
#[derive(Debug, Clone)]
pub enum Shape {
    Record(IndexMap<String, Value>),
    List(Vec<Value>),
    Map(IndexMap<EntryKey, Value>),
    Set(IndexSet<EntryKey>),
}

impl Shape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Record(_) => ShapeKind::Record,
            Shape::List(_) => ShapeKind::List,
            Shape::Map(_) => ShapeKind::Map,
            Shape::Set(_) => ShapeKind::Set,
        }
    }
}

struct RawInner {
    id: ObjectId,
    kind: ShapeKind,
    data: RwLock<Shape>,
}

/// Shared, identity-keyed composite state.
///
/// Cloning a `RawObject` clones the handle, not the data.
#[derive(Clone)]
pub struct RawObject {
    inner: Arc<RawInner>,
}

impl RawObject {
    /// Create a raw object holding the given contents.
    pub fn new(shape: Shape) -> Self {
        Self {
            inner: Arc::new(RawInner {
                id: ObjectId::next(),
                kind: shape.kind(),
                data: RwLock::new(shape),
            }),
        }
    }

    /// Create a record from `(field, value)` pairs.
    pub fn record<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into().into_raw()))
            .collect();
        Self::new(Shape::Record(fields))
    }

    /// Create a list from its elements.
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let items = items.into_iter().map(|v| v.into().into_raw()).collect();
        Self::new(Shape::List(items))
    }

    /// Create a map from `(key, value)` pairs.
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<EntryKey>,
        V: Into<Value>,
    {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into().into_raw()))
            .collect();
        Self::new(Shape::Map(entries))
    }

    /// Create a set from its members.
    pub fn set<I, K>(members: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<EntryKey>,
    {
        Self::new(Shape::Set(members.into_iter().map(Into::into).collect()))
    }

    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    pub fn kind(&self) -> ShapeKind {
        self.inner.kind
    }

    /// Check whether two handles refer to the same object.
    pub fn ptr_eq(&self, other: &RawObject) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Inspect the contents without tracking.
    pub fn read<R>(&self, f: impl FnOnce(&Shape) -> R) -> R {
        f(&self.inner.data.read())
    }

    /// Clone the current contents without tracking.
    pub fn snapshot(&self) -> Shape {
        self.inner.data.read().clone()
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut Shape) -> R) -> R {
        f(&mut self.inner.data.write())
    }

    pub(crate) fn read_record<R>(&self, f: impl FnOnce(&IndexMap<String, Value>) -> R) -> Option<R> {
        self.read(|shape| match shape {
            Shape::Record(fields) => Some(f(fields)),
            _ => None,
        })
    }

    pub(crate) fn write_record<R>(
        &self,
        f: impl FnOnce(&mut IndexMap<String, Value>) -> R,
    ) -> Option<R> {
        self.write(|shape| match shape {
            Shape::Record(fields) => Some(f(fields)),
            _ => None,
        })
    }

    pub(crate) fn read_list<R>(&self, f: impl FnOnce(&Vec<Value>) -> R) -> Option<R> {
        self.read(|shape| match shape {
            Shape::List(items) => Some(f(items)),
            _ => None,
        })
    }

    pub(crate) fn write_list<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> Option<R> {
        self.write(|shape| match shape {
            Shape::List(items) => Some(f(items)),
            _ => None,
        })
    }

    pub(crate) fn read_map<R>(&self, f: impl FnOnce(&IndexMap<EntryKey, Value>) -> R) -> Option<R> {
        self.read(|shape| match shape {
            Shape::Map(entries) => Some(f(entries)),
            _ => None,
        })
    }

    pub(crate) fn write_map<R>(
        &self,
        f: impl FnOnce(&mut IndexMap<EntryKey, Value>) -> R,
    ) -> Option<R> {
        self.write(|shape| match shape {
            Shape::Map(entries) => Some(f(entries)),
            _ => None,
        })
    }

    pub(crate) fn read_set<R>(&self, f: impl FnOnce(&IndexSet<EntryKey>) -> R) -> Option<R> {
        self.read(|shape| match shape {
            Shape::Set(members) => Some(f(members)),
            _ => None,
        })
    }

    pub(crate) fn write_set<R>(&self, f: impl FnOnce(&mut IndexSet<EntryKey>) -> R) -> Option<R> {
        self.write(|shape| match shape {
            Shape::Set(members) => Some(f(members)),
            _ => None,
        })
    }
}

impl Target for RawObject {
    fn target_id(&self) -> ObjectId {
        self.inner.id
    }

    fn target_kind(&self) -> ShapeKind {
        self.inner.kind
    }

    fn anchor(&self) -> Weak<dyn Any + Send + Sync> {
        let weak: Weak<RawInner> = Arc::downgrade(&self.inner);
        weak
    }
}

impl PartialEq for RawObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for RawObject {}

impl Hash for RawObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for RawObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawObject")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .finish()
    }
}
