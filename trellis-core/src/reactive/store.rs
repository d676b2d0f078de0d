//! Dependency Store
//!
//! A two-level table mapping `(target, key)` to the [`Bucket`] of
//! subscribers that read that key. Targets are keyed by [`ObjectId`] and
//! held only through a weak anchor, so a target that is dropped leaves
//! behind an entry that the next [`DependencyStore::sweep`] reclaims.
//!
//! Buckets are created lazily on first read and never removed explicitly.
//! Subscribers hold weak references to the buckets they joined, so cleanup
//! never keeps a swept bucket alive.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::subscriber::{Subscriber, SubscriberId};
use crate::state::{EntryKey, ObjectId, ShapeKind};

/// Something whose reads and writes can be tracked.
///
/// Implemented by raw state objects and by computed values, which behave as
/// a single-field record whose only key is `"value"`.
pub trait Target {
    /// Identity used as the first-level store key.
    fn target_id(&self) -> ObjectId;

    /// The kind of composite, which selects the propagation rules.
    fn target_kind(&self) -> ShapeKind;

    /// Liveness token. The store entry is swept once this no longer upgrades.
    fn anchor(&self) -> Weak<dyn Any + Send + Sync>;
}

/// A property key within a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A named record field.
    Field(Arc<str>),
    /// A list index.
    Index(usize),
    /// The synthetic length of a list.
    Length,
    /// A map key or set member.
    Entry(EntryKey),
    /// The shape or membership of the target was observed.
    Iterate,
    /// The key set of a map was observed, independently of its values.
    MapKeyIterate,
}

impl Key {
    pub fn field(name: &str) -> Self {
        Key::Field(name.into())
    }

    /// Whether this is one of the reserved structural markers.
    pub fn is_structural(&self) -> bool {
        matches!(self, Key::Iterate | Key::MapKeyIterate)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::field(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Field(name) => write!(f, "{name}"),
            Key::Index(i) => write!(f, "{i}"),
            Key::Length => write!(f, "length"),
            Key::Entry(key) => write!(f, "{key}"),
            Key::Iterate => write!(f, "<iterate>"),
            Key::MapKeyIterate => write!(f, "<map-key-iterate>"),
        }
    }
}

/// The subscribers registered against one `(target, key)` pair.
///
/// Insertion-ordered, so dispatch order is deterministic.
#[derive(Default)]
pub(crate) struct Bucket {
    subscribers: Mutex<IndexMap<SubscriberId, Arc<dyn Subscriber>>>,
}

impl Bucket {
    /// Add a subscriber. Returns false if it was already a member.
    pub(crate) fn insert(&self, subscriber: Arc<dyn Subscriber>) -> bool {
        let mut subscribers = self.subscribers.lock();
        let id = subscriber.id();
        if subscribers.contains_key(&id) {
            return false;
        }
        subscribers.insert(id, subscriber);
        true
    }

    pub(crate) fn remove(&self, id: SubscriberId) {
        self.subscribers.lock().shift_remove(&id);
    }

    /// Current members, in registration order.
    pub(crate) fn ids(&self) -> Vec<SubscriberId> {
        self.subscribers.lock().keys().copied().collect()
    }

    /// Copy members into `out`, skipping `skip` and anything already present.
    pub(crate) fn snapshot_into(
        &self,
        out: &mut IndexMap<SubscriberId, Arc<dyn Subscriber>>,
        skip: Option<SubscriberId>,
    ) {
        for (id, subscriber) in self.subscribers.lock().iter() {
            if Some(*id) == skip || out.contains_key(id) {
                continue;
            }
            out.insert(*id, Arc::clone(subscriber));
        }
    }
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket").field("subscribers", &self.ids()).finish()
    }
}

/// Per-target key table.
pub(crate) struct TargetDeps {
    anchor: Weak<dyn Any + Send + Sync>,
    keys: IndexMap<Key, Arc<Bucket>>,
}

impl TargetDeps {
    pub(crate) fn get(&self, key: &Key) -> Option<&Arc<Bucket>> {
        self.keys.get(key)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&Key, &Arc<Bucket>)> {
        self.keys.iter()
    }
}

/// The global `(target, key) -> bucket` table of one runtime.
#[derive(Default)]
pub(crate) struct DependencyStore {
    targets: HashMap<ObjectId, TargetDeps>,
    registered_since_sweep: usize,
}

impl DependencyStore {
    /// Get or lazily create the bucket for `(target, key)`.
    pub(crate) fn bucket_or_insert(&mut self, target: &dyn Target, key: Key) -> Arc<Bucket> {
        let registered = &mut self.registered_since_sweep;
        let deps = self.targets.entry(target.target_id()).or_insert_with(|| {
            *registered += 1;
            TargetDeps {
                anchor: target.anchor(),
                keys: IndexMap::new(),
            }
        });
        Arc::clone(deps.keys.entry(key).or_default())
    }

    pub(crate) fn bucket(&self, id: ObjectId, key: &Key) -> Option<Arc<Bucket>> {
        self.targets.get(&id)?.keys.get(key).cloned()
    }

    pub(crate) fn target(&self, id: ObjectId) -> Option<&TargetDeps> {
        self.targets.get(&id)
    }

    pub(crate) fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Targets registered since the last sweep.
    pub(crate) fn registered_since_sweep(&self) -> usize {
        self.registered_since_sweep
    }

    /// Drop entries whose target is gone. Returns the number removed.
    pub(crate) fn sweep(&mut self) -> usize {
        let before = self.targets.len();
        self.targets.retain(|_, deps| deps.anchor.strong_count() > 0);
        self.registered_since_sweep = 0;
        before - self.targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RawObject;

    #[test]
    fn buckets_are_created_lazily_and_reused() {
        let mut store = DependencyStore::default();
        let obj = RawObject::record([("a", 1)]);

        assert!(store.bucket(obj.id(), &Key::field("a")).is_none());

        let first = store.bucket_or_insert(&obj, Key::field("a"));
        let second = store.bucket_or_insert(&obj, Key::field("a"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.target_count(), 1);
        assert_eq!(store.registered_since_sweep(), 1);
    }

    #[test]
    fn keys_are_distinct_per_target() {
        let mut store = DependencyStore::default();
        let a = RawObject::list([1]);
        let b = RawObject::list([1]);

        let bucket_a = store.bucket_or_insert(&a, Key::Index(0));
        let bucket_b = store.bucket_or_insert(&b, Key::Index(0));
        assert!(!Arc::ptr_eq(&bucket_a, &bucket_b));
        assert_ne!(Key::Iterate, Key::MapKeyIterate);
    }

    #[test]
    fn sweep_removes_dropped_targets() {
        let mut store = DependencyStore::default();
        let kept = RawObject::set([1]);
        let dropped = RawObject::set([2]);

        store.bucket_or_insert(&kept, Key::Iterate);
        store.bucket_or_insert(&dropped, Key::Iterate);
        drop(dropped);

        assert_eq!(store.sweep(), 1);
        assert_eq!(store.target_count(), 1);
        assert!(store.bucket(kept.id(), &Key::Iterate).is_some());
        assert_eq!(store.registered_since_sweep(), 0);
    }

    #[test]
    fn key_display() {
        assert_eq!(Key::field("name").to_string(), "name");
        assert_eq!(Key::Index(3).to_string(), "3");
        assert_eq!(Key::Length.to_string(), "length");
        assert!(Key::Iterate.is_structural());
        assert!(!Key::Length.is_structural());
    }
}
