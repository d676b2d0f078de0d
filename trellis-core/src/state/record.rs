//! Record Access
//!
//! Reads and writes of string-keyed records. Field reads track the field;
//! enumerating the key set tracks [`Key::Iterate`], which only adding or
//! deleting a field triggers.

use indexmap::IndexMap;

use super::refs::Ref;
use super::tracked::Tracked;
use super::value::{has_changed, Value};
use crate::error::Warning;
use crate::reactive::{Key, TriggerKind};

/// Typed view of a tracked record.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedRecord {
    tracked: Tracked,
}

impl TrackedRecord {
    pub(crate) fn new(tracked: Tracked) -> Self {
        Self { tracked }
    }

    pub fn tracked(&self) -> &Tracked {
        &self.tracked
    }

    /// Read a field. Missing fields read as `Null`.
    pub fn get(&self, field: &str) -> Value {
        let value = self
            .tracked
            .raw()
            .read_record(|fields| fields.get(field).cloned())
            .flatten()
            .unwrap_or_default();
        self.tracked.track(Key::field(field));
        self.tracked.wrap_child(value)
    }

    pub fn has(&self, field: &str) -> bool {
        let present = self
            .tracked
            .raw()
            .read_record(|fields| fields.contains_key(field))
            .unwrap_or(false);
        self.tracked.track(Key::field(field));
        present
    }

    /// Write a field. Returns true; a read-only handle warns and drops the
    /// write.
    pub fn set(&self, field: &str, value: impl Into<Value>) -> bool {
        if self.tracked.reject_write(|| Warning::ReadonlyWrite {
            target: self.tracked.raw().id(),
            key: field.to_string(),
        }) {
            return true;
        }

        let value = value.into().into_raw();
        let old = self
            .tracked
            .raw()
            .write_record(|fields| fields.insert(field.to_string(), value.clone()))
            .flatten();

        let kind = match &old {
            None => TriggerKind::KeyAdded,
            Some(old) if has_changed(old, &value) => TriggerKind::ValueChanged,
            Some(_) => return true,
        };
        self.tracked.runtime().trigger(
            self.tracked.raw(),
            Key::field(field),
            kind,
            Some(&value),
            old.as_ref(),
        );
        true
    }

    /// Remove a field. Returns whether it existed.
    pub fn delete(&self, field: &str) -> bool {
        if self.tracked.reject_write(|| Warning::ReadonlyDelete {
            target: self.tracked.raw().id(),
            key: field.to_string(),
        }) {
            return true;
        }

        let old = self
            .tracked
            .raw()
            .write_record(|fields| fields.shift_remove(field))
            .flatten();
        match old {
            Some(old) => {
                self.tracked.runtime().trigger(
                    self.tracked.raw(),
                    Key::field(field),
                    TriggerKind::KeyRemoved,
                    None,
                    Some(&old),
                );
                true
            }
            None => false,
        }
    }

    /// Field names in insertion order.
    pub fn keys(&self) -> Vec<String> {
        let keys = self
            .tracked
            .raw()
            .read_record(|fields| fields.keys().cloned().collect())
            .unwrap_or_default();
        self.tracked.track(Key::Iterate);
        keys
    }

    pub fn len(&self) -> usize {
        let len = self.tracked.raw().read_record(IndexMap::len).unwrap_or(0);
        self.tracked.track(Key::Iterate);
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every `(field, value)` pair; tracks the key set and each field.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.keys()
            .into_iter()
            .map(|field| {
                let value = self.get(&field);
                (field, value)
            })
            .collect()
    }

    /// A [`Ref`] aliasing `field` of this record.
    pub fn to_ref(&self, field: &str) -> Ref {
        Ref::new(self.clone(), field)
    }

    /// A [`Ref`] per current field.
    pub fn to_refs(&self) -> IndexMap<String, Ref> {
        let fields: Vec<String> = self
            .tracked
            .raw()
            .read_record(|fields| fields.keys().cloned().collect())
            .unwrap_or_default();
        fields
            .into_iter()
            .map(|field| {
                let r = self.to_ref(&field);
                (field, r)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Runtime;
    use crate::state::RawObject;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    fn record(rt: &Runtime) -> TrackedRecord {
        rt.reactive(RawObject::record([("a", 1), ("b", 2)]))
            .as_record()
            .unwrap()
    }

    #[test]
    fn keys_rerun_on_add_and_delete_only() {
        let rt = Runtime::new();
        let rec = record(&rt);
        let runs = Arc::new(AtomicI32::new(0));

        let reader = rec.clone();
        let runs_clone = runs.clone();
        let _effect = rt.effect(move || {
            reader.keys();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        rec.set("a", 10);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        rec.set("c", 3);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        assert!(rec.delete("c"));
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        // Deleting a missing field is silent
        assert!(!rec.delete("c"));
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn has_tracks_the_field() {
        let rt = Runtime::new();
        let rec = record(&rt);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let reader = rec.clone();
        let seen_clone = seen.clone();
        let _effect = rt.effect(move || seen_clone.lock().push(reader.has("z")));

        rec.set("z", 1);
        rec.delete("z");
        assert_eq!(*seen.lock(), vec![false, true, false]);
    }

    #[test]
    fn entries_rerun_on_value_change() {
        let rt = Runtime::new();
        let rec = record(&rt);
        let runs = Arc::new(AtomicI32::new(0));

        let reader = rec.clone();
        let runs_clone = runs.clone();
        let _effect = rt.effect(move || {
            reader.entries();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        rec.set("b", 20);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn readonly_write_is_suppressed_with_warning() {
        let warnings = Arc::new(Mutex::new(Vec::new()));
        let warnings_clone = warnings.clone();
        let rt = Runtime::builder()
            .on_warning(move |w| warnings_clone.lock().push(w.clone()))
            .build();
        let raw = RawObject::record([("a", 1)]);
        let readonly = rt.readonly(raw.clone()).as_record().unwrap();

        assert!(readonly.set("a", 2));
        assert!(readonly.delete("a"));
        assert_eq!(readonly.get("a"), Value::from(1));

        let warnings = warnings.lock();
        assert_eq!(warnings.len(), 2);
        assert!(matches!(warnings[0], Warning::ReadonlyWrite { .. }));
        assert!(matches!(warnings[1], Warning::ReadonlyDelete { .. }));
    }

    #[test]
    fn writes_store_raw_objects() {
        let rt = Runtime::new();
        let rec = record(&rt);
        let child = rt.reactive(RawObject::list([1]));

        rec.set("child", child.clone());
        let stored = rec
            .tracked()
            .raw()
            .read_record(|fields| fields.get("child").cloned())
            .flatten()
            .unwrap();
        assert!(stored.as_object().unwrap().ptr_eq(child.raw()));

        // Reading back through the deep wrapper gives the same handle
        assert!(rec.get("child").as_tracked().unwrap().ptr_eq(&child));
    }
}
