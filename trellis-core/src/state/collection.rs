//! Map and Set Access
//!
//! Maps keep two structural buckets apart: value iteration (`values`,
//! `entries`, `for_each`, `len`) tracks [`Key::Iterate`], which every
//! change notifies, while key iteration (`keys`) tracks
//! [`Key::MapKeyIterate`], which only adding or removing a key notifies.
//! Sets have only membership, tracked through [`Key::Iterate`].

use super::tracked::Tracked;
use super::value::{has_changed, EntryKey, Value};
use crate::error::Warning;
use crate::reactive::trigger::Change;
use crate::reactive::{Key, TriggerKind};

/// Typed view of a tracked map.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedMap {
    tracked: Tracked,
}

impl TrackedMap {
    pub(crate) fn new(tracked: Tracked) -> Self {
        Self { tracked }
    }

    pub fn tracked(&self) -> &Tracked {
        &self.tracked
    }

    pub fn get(&self, key: impl Into<EntryKey>) -> Value {
        let key = key.into();
        let value = self
            .tracked
            .raw()
            .read_map(|entries| entries.get(&key).cloned())
            .flatten()
            .unwrap_or_default();
        self.tracked.track(Key::Entry(key));
        self.tracked.wrap_child(value)
    }

    pub fn has(&self, key: impl Into<EntryKey>) -> bool {
        let key = key.into();
        let present = self
            .tracked
            .raw()
            .read_map(|entries| entries.contains_key(&key))
            .unwrap_or(false);
        self.tracked.track(Key::Entry(key));
        present
    }

    /// Insert or overwrite an entry. Returns true; a read-only handle warns
    /// and drops the write.
    pub fn set(&self, key: impl Into<EntryKey>, value: impl Into<Value>) -> bool {
        let key = key.into();
        if self.tracked.reject_write(|| Warning::ReadonlyWrite {
            target: self.tracked.raw().id(),
            key: key.to_string(),
        }) {
            return true;
        }

        let value = value.into().into_raw();
        let old = self
            .tracked
            .raw()
            .write_map(|entries| entries.insert(key.clone(), value.clone()))
            .flatten();

        let kind = match &old {
            None => TriggerKind::KeyAdded,
            Some(old) if has_changed(old, &value) => TriggerKind::ValueChanged,
            Some(_) => return true,
        };
        self.tracked.runtime().trigger(
            self.tracked.raw(),
            Key::Entry(key),
            kind,
            Some(&value),
            old.as_ref(),
        );
        true
    }

    /// Remove an entry. Returns whether it existed.
    pub fn delete(&self, key: impl Into<EntryKey>) -> bool {
        let key = key.into();
        if self.tracked.reject_write(|| Warning::ReadonlyDelete {
            target: self.tracked.raw().id(),
            key: key.to_string(),
        }) {
            return true;
        }

        let old = self
            .tracked
            .raw()
            .write_map(|entries| entries.shift_remove(&key))
            .flatten();
        if old.is_none() {
            return false;
        }
        self.tracked.runtime().trigger(
            self.tracked.raw(),
            Key::Entry(key),
            TriggerKind::KeyRemoved,
            None,
            old.as_ref(),
        );
        true
    }

    /// Remove every entry, notifying each removed key in one round.
    pub fn clear(&self) {
        if reject_clear(&self.tracked) {
            return;
        }
        let removed: Vec<EntryKey> = self
            .tracked
            .raw()
            .write_map(|entries| entries.drain(..).map(|(key, _)| key).collect())
            .unwrap_or_default();
        trigger_cleared(&self.tracked, removed);
    }

    /// The keys; tracks key iteration only.
    pub fn keys(&self) -> Vec<Value> {
        let keys: Vec<EntryKey> = self
            .tracked
            .raw()
            .read_map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        self.tracked.track(Key::MapKeyIterate);
        keys.into_iter()
            .map(|key| self.tracked.wrap_child(key.to_value()))
            .collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries().into_iter().map(|(_, value)| value).collect()
    }

    pub fn entries(&self) -> Vec<(Value, Value)> {
        let entries: Vec<(EntryKey, Value)> = self
            .tracked
            .raw()
            .read_map(|entries| entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        self.tracked.track(Key::Iterate);
        entries
            .into_iter()
            .map(|(key, value)| {
                (
                    self.tracked.wrap_child(key.to_value()),
                    self.tracked.wrap_child(value),
                )
            })
            .collect()
    }

    /// Call `f(key, value)` for every entry, in insertion order.
    pub fn for_each(&self, mut f: impl FnMut(&Value, &Value)) {
        for (key, value) in self.entries() {
            f(&key, &value);
        }
    }

    pub fn len(&self) -> usize {
        let len = self.tracked.raw().read_map(|entries| entries.len()).unwrap_or(0);
        self.tracked.track(Key::Iterate);
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Typed view of a tracked set.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedSet {
    tracked: Tracked,
}

impl TrackedSet {
    pub(crate) fn new(tracked: Tracked) -> Self {
        Self { tracked }
    }

    pub fn tracked(&self) -> &Tracked {
        &self.tracked
    }

    pub fn has(&self, member: impl Into<EntryKey>) -> bool {
        let member = member.into();
        let present = self
            .tracked
            .raw()
            .read_set(|members| members.contains(&member))
            .unwrap_or(false);
        self.tracked.track(Key::Entry(member));
        present
    }

    /// Add a member. Returns whether it was new; a read-only handle warns
    /// and reports true.
    pub fn add(&self, member: impl Into<EntryKey>) -> bool {
        let member = member.into();
        if self.tracked.reject_write(|| Warning::ReadonlyWrite {
            target: self.tracked.raw().id(),
            key: member.to_string(),
        }) {
            return true;
        }

        let added = self
            .tracked
            .raw()
            .write_set(|members| members.insert(member.clone()))
            .unwrap_or(false);
        if added {
            let value = member.to_value();
            self.tracked.runtime().trigger(
                self.tracked.raw(),
                Key::Entry(member),
                TriggerKind::KeyAdded,
                Some(&value),
                None,
            );
        }
        added
    }

    /// Remove a member. Returns whether it was present.
    pub fn delete(&self, member: impl Into<EntryKey>) -> bool {
        let member = member.into();
        if self.tracked.reject_write(|| Warning::ReadonlyDelete {
            target: self.tracked.raw().id(),
            key: member.to_string(),
        }) {
            return true;
        }

        let removed = self
            .tracked
            .raw()
            .write_set(|members| members.shift_remove(&member))
            .unwrap_or(false);
        if removed {
            self.tracked.runtime().trigger(
                self.tracked.raw(),
                Key::Entry(member),
                TriggerKind::KeyRemoved,
                None,
                None,
            );
        }
        removed
    }

    pub fn clear(&self) {
        if reject_clear(&self.tracked) {
            return;
        }
        let removed: Vec<EntryKey> = self
            .tracked
            .raw()
            .write_set(|members| members.drain(..).collect())
            .unwrap_or_default();
        trigger_cleared(&self.tracked, removed);
    }

    /// The members, in insertion order.
    pub fn values(&self) -> Vec<Value> {
        let members: Vec<EntryKey> = self
            .tracked
            .raw()
            .read_set(|members| members.iter().cloned().collect())
            .unwrap_or_default();
        self.tracked.track(Key::Iterate);
        members
            .into_iter()
            .map(|member| self.tracked.wrap_child(member.to_value()))
            .collect()
    }

    pub fn iter(&self) -> Vec<Value> {
        self.values()
    }

    /// Same as [`values`](Self::values); sets have no separate key view.
    pub fn keys(&self) -> Vec<Value> {
        self.values()
    }

    pub fn len(&self) -> usize {
        let len = self.tracked.raw().read_set(|members| members.len()).unwrap_or(0);
        self.tracked.track(Key::Iterate);
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn reject_clear(tracked: &Tracked) -> bool {
    tracked.reject_write(|| Warning::ReadonlyClear {
        target: tracked.raw().id(),
    })
}

fn trigger_cleared(tracked: &Tracked, removed: Vec<EntryKey>) {
    let changes: Vec<Change> = removed
        .into_iter()
        .map(|key| Change::removed(Key::Entry(key)))
        .collect();
    tracked.runtime().trigger_all(tracked.raw(), &changes);
}
