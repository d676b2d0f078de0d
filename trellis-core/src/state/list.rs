//! List Access
//!
//! Index reads track the index; length reads and key listing track
//! [`Key::Length`]. Appending past the end notifies length readers;
//! shrinking the list notifies every tracked index at or past the new
//! length, plus anything that enumerated the list.
//!
//! Structural operations (`push`, `splice`, `shift`, ...) never track.
//! Each applies its mutation and then propagates the element-wise diff of
//! the range it touched as one trigger round, so a subscriber runs at most
//! once per operation.

use super::tracked::Tracked;
use super::value::{has_changed, Value};
use crate::error::Warning;
use crate::reactive::trigger::Change;
use crate::reactive::{Key, TriggerKind};

/// Typed view of a tracked list.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedList {
    tracked: Tracked,
}

impl TrackedList {
    pub(crate) fn new(tracked: Tracked) -> Self {
        Self { tracked }
    }

    pub fn tracked(&self) -> &Tracked {
        &self.tracked
    }

    fn raw_len(&self) -> usize {
        self.tracked.raw().read_list(Vec::len).unwrap_or(0)
    }

    fn raw_get(&self, index: usize) -> Value {
        self.tracked
            .raw()
            .read_list(|items| items.get(index).cloned())
            .flatten()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        let len = self.raw_len();
        self.tracked.track(Key::Length);
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read an element. Out-of-range reads give `Null`.
    pub fn get(&self, index: usize) -> Value {
        let value = self.raw_get(index);
        self.tracked.track(Key::Index(index));
        self.tracked.wrap_child(value)
    }

    /// Every element; tracks the length and each index.
    pub fn iter(&self) -> Vec<Value> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }

    /// The valid indices. Tracks the length, which every change to the
    /// index set goes through.
    pub fn keys(&self) -> Vec<usize> {
        (0..self.len()).collect()
    }

    /// Position of the first element that is the same value as `needle`.
    ///
    /// A tracked needle matches the raw object it wraps.
    pub fn index_of(&self, needle: &Value) -> Option<usize> {
        (0..self.len()).find(|&i| self.scan(i, needle))
    }

    pub fn last_index_of(&self, needle: &Value) -> Option<usize> {
        (0..self.len()).rev().find(|&i| self.scan(i, needle))
    }

    pub fn contains(&self, needle: &Value) -> bool {
        self.index_of(needle).is_some()
    }

    fn scan(&self, index: usize, needle: &Value) -> bool {
        self.tracked.track(Key::Index(index));
        self.raw_get(index).same_value(needle)
    }

    /// Write an element. Writing past the end pads with `Null`.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> bool {
        if self.reject(|| Key::Index(index)) {
            return true;
        }

        let value = value.into().into_raw();
        let old = self
            .tracked
            .raw()
            .write_list(|items| {
                if index < items.len() {
                    Some(std::mem::replace(&mut items[index], value.clone()))
                } else {
                    items.resize(index, Value::Null);
                    items.push(value.clone());
                    None
                }
            })
            .flatten();

        let kind = match &old {
            None => TriggerKind::KeyAdded,
            Some(old) if has_changed(old, &value) => TriggerKind::ValueChanged,
            Some(_) => return true,
        };
        self.tracked.runtime().trigger(
            self.tracked.raw(),
            Key::Index(index),
            kind,
            Some(&value),
            old.as_ref(),
        );
        true
    }

    /// Truncate or pad (with `Null`) to `len` elements.
    pub fn set_len(&self, len: usize) -> bool {
        if self.reject(|| Key::Length) {
            return true;
        }

        let old = self
            .tracked
            .raw()
            .write_list(|items| {
                let old = items.len();
                items.resize(len, Value::Null);
                old
            })
            .unwrap_or(0);

        if old != len {
            self.tracked
                .runtime()
                .trigger_all(self.tracked.raw(), &[Change::length(old, len)]);
        }
        true
    }

    /// Append an element. Returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        let value = value.into().into_raw();
        self.mutate(usize::MAX, |items| {
            items.push(value);
            items.len()
        })
        .unwrap_or_else(|| self.raw_len())
    }

    pub fn pop(&self) -> Option<Value> {
        self.mutate(usize::MAX, Vec::pop)
            .flatten()
            .map(|value| self.tracked.wrap_child(value))
    }

    /// Remove the first element.
    pub fn shift(&self) -> Option<Value> {
        self.remove(0)
    }

    /// Prepend an element. Returns the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> usize {
        let value = value.into().into_raw();
        self.mutate(0, |items| {
            items.insert(0, value);
            items.len()
        })
        .unwrap_or_else(|| self.raw_len())
    }

    /// Insert at `index`, clamped to the end.
    pub fn insert(&self, index: usize, value: impl Into<Value>) {
        let value = value.into().into_raw();
        self.mutate(index, |items| {
            let index = index.min(items.len());
            items.insert(index, value);
        });
    }

    pub fn remove(&self, index: usize) -> Option<Value> {
        self.mutate(index, |items| (index < items.len()).then(|| items.remove(index)))
            .flatten()
            .map(|value| self.tracked.wrap_child(value))
    }

    /// Replace `delete_count` elements from `start` with `items`.
    ///
    /// Returns the removed elements.
    pub fn splice<I>(&self, start: usize, delete_count: usize, items: I) -> Vec<Value>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let inserted: Vec<Value> = items.into_iter().map(|v| v.into().into_raw()).collect();
        self.mutate(start, |list| {
            let start = start.min(list.len());
            let end = start.saturating_add(delete_count).min(list.len());
            list.splice(start..end, inserted).collect::<Vec<_>>()
        })
        .unwrap_or_default()
        .into_iter()
        .map(|value| self.tracked.wrap_child(value))
        .collect()
    }

    pub fn clear(&self) {
        self.mutate(usize::MAX, Vec::clear);
    }

    /// Warn and refuse if read-only.
    fn reject(&self, key: impl FnOnce() -> Key) -> bool {
        self.tracked.reject_write(|| Warning::ReadonlyWrite {
            target: self.tracked.raw().id(),
            key: key().to_string(),
        })
    }

    /// Apply a structural mutation and trigger its diff as one round.
    ///
    /// `f` must leave every element before `from` in place; only the tail
    /// from there (clamped to the length) is compared. Returns `None` (and
    /// changes nothing) through a read-only handle.
    fn mutate<R>(&self, from: usize, f: impl FnOnce(&mut Vec<Value>) -> R) -> Option<R> {
        if self.reject(|| Key::Length) {
            return None;
        }

        let (result, changes) = self.tracked.raw().write_list(|items| {
            let from = from.min(items.len());
            let before = items[from..].to_vec();
            let result = f(&mut *items);
            let after = items.get(from..).unwrap_or_default();
            (result, diff(from, &before, after, items.len()))
        })?;

        self.tracked
            .runtime()
            .trigger_all(self.tracked.raw(), &changes);
        Some(result)
    }
}

/// The changes that turn the tail `before` (starting at index `from`) into
/// `after`, for a list that is `new_len` long afterwards.
fn diff(from: usize, before: &[Value], after: &[Value], new_len: usize) -> Vec<Change> {
    let old_len = from + before.len();
    let mut changes: Vec<Change> = before
        .iter()
        .zip(after)
        .enumerate()
        .filter(|(_, (old, new))| has_changed(old, new))
        .map(|(i, _)| Change::value(Key::Index(from + i)))
        .collect();

    changes.extend((old_len..new_len).map(|i| Change::added(Key::Index(i))));

    if new_len < old_len {
        changes.push(Change::length(old_len, new_len));
    }
    changes
}
