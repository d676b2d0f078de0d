//! Trigger Propagation
//!
//! Every mutation of tracked state is classified into a [`TriggerKind`] and
//! turned into the set of buckets that must be notified. The rules are:
//!
//! 1. The bucket for the exact `(target, key)` is always notified.
//! 2. An added or removed key also notifies [`Key::Iterate`].
//! 3. Lists: an added index notifies [`Key::Length`]. A change of the
//!    length notifies every tracked index at or past the new length, and a
//!    shrink (or a change whose old length is unknown) additionally
//!    notifies [`Key::Iterate`].
//! 4. Maps: a changed value notifies [`Key::Iterate`] (value iteration saw
//!    it), an added or removed key notifies [`Key::MapKeyIterate`].
//!
//! Subscribers from all affected buckets are collected into one
//! deduplicated snapshot before anything runs. The subscriber that caused
//! the mutation is never part of that snapshot.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use super::store::{Bucket, Key, TargetDeps};
use super::subscriber::{Subscriber, SubscriberId};
use crate::state::ShapeKind;

/// Classification of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// An existing key now holds a different value.
    ValueChanged,
    /// A key that did not exist before was added.
    KeyAdded,
    /// An existing key was removed.
    KeyRemoved,
}

impl TriggerKind {
    /// Whether the mutation changed the key set of the target.
    pub fn is_structural(self) -> bool {
        matches!(self, TriggerKind::KeyAdded | TriggerKind::KeyRemoved)
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TriggerKind::ValueChanged => "value-changed",
            TriggerKind::KeyAdded => "key-added",
            TriggerKind::KeyRemoved => "key-removed",
        };
        f.write_str(name)
    }
}

/// One classified mutation of a target.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Change {
    pub(crate) key: Key,
    pub(crate) kind: TriggerKind,
    /// The list length after the change, when `key` is [`Key::Length`].
    pub(crate) new_len: Option<usize>,
    /// The list length before the change, if known.
    pub(crate) old_len: Option<usize>,
}

impl Change {
    pub(crate) fn new(key: Key, kind: TriggerKind) -> Self {
        Self {
            key,
            kind,
            new_len: None,
            old_len: None,
        }
    }

    pub(crate) fn value(key: Key) -> Self {
        Self::new(key, TriggerKind::ValueChanged)
    }

    pub(crate) fn added(key: Key) -> Self {
        Self::new(key, TriggerKind::KeyAdded)
    }

    pub(crate) fn removed(key: Key) -> Self {
        Self::new(key, TriggerKind::KeyRemoved)
    }

    pub(crate) fn length(old: usize, new: usize) -> Self {
        Self {
            key: Key::Length,
            kind: TriggerKind::ValueChanged,
            new_len: Some(new),
            old_len: Some(old),
        }
    }
}

/// The deduplicated set of subscribers one trigger call will dispatch.
pub(crate) struct Propagation {
    subscribers: IndexMap<SubscriberId, Arc<dyn Subscriber>>,
    skip: Option<SubscriberId>,
}

impl Propagation {
    /// Start collecting, ignoring `skip` (the subscriber currently running).
    pub(crate) fn new(skip: Option<SubscriberId>) -> Self {
        Self {
            subscribers: IndexMap::new(),
            skip,
        }
    }

    fn add_bucket(&mut self, bucket: Option<&Arc<Bucket>>) {
        if let Some(bucket) = bucket {
            bucket.snapshot_into(&mut self.subscribers, self.skip);
        }
    }

    /// Collect the subscribers affected by one change of a target of `shape`.
    pub(crate) fn add_change(&mut self, deps: &TargetDeps, shape: ShapeKind, change: &Change) {
        self.add_bucket(deps.get(&change.key));

        if change.kind.is_structural() {
            self.add_bucket(deps.get(&Key::Iterate));
        }

        match shape {
            ShapeKind::List => {
                if change.kind == TriggerKind::KeyAdded && matches!(change.key, Key::Index(_)) {
                    self.add_bucket(deps.get(&Key::Length));
                }
                if let (Key::Length, Some(new)) = (&change.key, change.new_len) {
                    // Every tracked index is scanned, not only the dropped range.
                    for (key, bucket) in deps.iter() {
                        if let Key::Index(i) = key {
                            if *i >= new {
                                bucket.snapshot_into(&mut self.subscribers, self.skip);
                            }
                        }
                    }
                    // Without the old length the list may have shrunk.
                    if change.old_len.map_or(true, |old| new < old) {
                        self.add_bucket(deps.get(&Key::Iterate));
                    }
                }
            }
            ShapeKind::Map => {
                if change.kind == TriggerKind::ValueChanged {
                    self.add_bucket(deps.get(&Key::Iterate));
                } else {
                    self.add_bucket(deps.get(&Key::MapKeyIterate));
                }
            }
            ShapeKind::Record | ShapeKind::Set => {}
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// The collected subscribers, in first-seen order.
    pub(crate) fn into_subscribers(self) -> impl Iterator<Item = Arc<dyn Subscriber>> {
        self.subscribers.into_values()
    }
}
