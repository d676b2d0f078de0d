//! Computed Values
//!
//! A Computed is a cached derived value that re-evaluates only when the
//! state it read last time changes.
//!
//! # How Computed Values Work
//!
//! 1. The getter is wrapped in a lazy effect. Nothing runs at creation.
//!
//! 2. On the first [`Computed::value`], the effect runs, the result is
//!    cached, and the computed is marked clean.
//!
//! 3. When a dependency changes, the effect's scheduler does not re-run
//!    the getter. It only marks the computed dirty and notifies whoever read
//!    the computed's own `"value"` key.
//!
//! 4. The next read of a dirty computed re-runs the getter exactly once.
//!
//! # Why This Matters
//!
//! This lazy approach avoids unnecessary recomputation:
//!
//! - A field changes
//! - 10 computed values depend on it
//! - Only the computed values actually read will recompute
//! - Computed values that are never read stay dirty (no wasted work)
//!
//! A computed is itself a [`Target`] shaped like a one-field record, so
//! effects reading it are tracked exactly like effects reading state.

use std::any::Any;
use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::effect::{Effect, EffectOptions};
use super::runtime::Runtime;
use super::store::{Key, Target};
use super::trigger::TriggerKind;
use crate::state::{ObjectId, ShapeKind};

/// The key effects track when they read a computed.
const VALUE_KEY: &str = "value";

/// Dirty state for a computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency changed (or nothing was computed yet).
    Dirty,
}

struct ComputedInner<T> {
    id: ObjectId,
    runtime: Runtime,
    effect: Effect<T>,
    value: Mutex<Option<T>>,
    dirty: AtomicBool,
    evaluations: AtomicUsize,
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.effect.stop();
    }
}

/// A lazily evaluated, cached derived value.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value. Must be Clone + Send + Sync.
pub struct Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a computed value with the given getter.
    ///
    /// The getter is not run immediately. It runs on first access.
    pub fn new<F>(runtime: &Runtime, getter: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let inner = Arc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            let options = EffectOptions::default().lazy().with_scheduler(move |_handle| {
                if let Some(inner) = weak.upgrade() {
                    Computed { inner }.invalidate();
                }
            });

            ComputedInner {
                id: ObjectId::next(),
                runtime: runtime.clone(),
                effect: runtime.effect_with(getter, options),
                value: Mutex::new(None),
                dirty: AtomicBool::new(true),
                evaluations: AtomicUsize::new(0),
            }
        });

        Self { inner }
    }

    /// Get the current value, recomputing if a dependency changed.
    ///
    /// Reading inside an effect makes that effect depend on this computed.
    pub fn value(&self) -> T {
        let cached = if self.inner.dirty.load(Ordering::SeqCst) {
            None
        } else {
            self.inner.value.lock().clone()
        };
        let value = match cached {
            Some(value) => value,
            None => self.recompute(),
        };

        self.inner.runtime.track(self, Key::field(VALUE_KEY));
        value
    }

    fn recompute(&self) -> T {
        // Cleared first so a change during the run leaves it dirty.
        self.inner.dirty.store(false, Ordering::SeqCst);
        let value = self.inner.effect.run();
        *self.inner.value.lock() = Some(value.clone());
        self.inner.evaluations.fetch_add(1, Ordering::Relaxed);
        value
    }

    /// Scheduler path: mark dirty and notify readers once per cycle.
    fn invalidate(&self) {
        if !self.inner.dirty.swap(true, Ordering::SeqCst) {
            self.inner.runtime.trigger(
                self,
                Key::field(VALUE_KEY),
                TriggerKind::ValueChanged,
                None,
                None,
            );
        }
    }

    /// Force a recomputation on the next read and notify readers.
    pub fn mark_dirty(&self) {
        self.invalidate();
    }

    /// Get the current dirty state.
    pub fn state(&self) -> ComputedState {
        if self.inner.dirty.load(Ordering::SeqCst) {
            ComputedState::Dirty
        } else {
            ComputedState::Clean
        }
    }

    /// Check if the computed has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.lock().is_some()
    }

    /// Number of times the getter has run.
    pub fn evaluations(&self) -> usize {
        self.inner.evaluations.load(Ordering::Relaxed)
    }

    /// Stop tracking dependencies. The cached value is kept and no longer
    /// invalidated.
    pub fn dispose(&self) {
        self.inner.effect.stop();
    }
}

impl<T> Target for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn target_id(&self) -> ObjectId {
        self.inner.id
    }

    fn target_kind(&self) -> ShapeKind {
        ShapeKind::Record
    }

    fn anchor(&self) -> Weak<dyn Any + Send + Sync> {
        let weak: Weak<ComputedInner<T>> = Arc::downgrade(&self.inner);
        weak
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("value", &*self.inner.value.lock())
            .field("evaluations", &self.evaluations())
            .finish()
    }
}

impl Runtime {
    /// Create a lazily evaluated, cached derived value.
    pub fn computed<T, F>(&self, getter: F) -> Computed<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Computed::new(self, getter)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RawObject;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn computed_computes_on_first_access() {
        let rt = Runtime::new();
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let computed = rt.computed(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            42
        });

        // Not computed yet
        assert!(!computed.has_value());
        assert_eq!(computed.state(), ComputedState::Dirty);
        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        // First access triggers computation
        assert_eq!(computed.value(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(computed.has_value());
        assert_eq!(computed.state(), ComputedState::Clean);
    }

    #[test]
    fn computed_caches_until_dependency_changes() {
        let rt = Runtime::new();
        let state = rt.reactive(RawObject::record([("x", 1), ("y", 2)]));
        let record = state.as_record().unwrap();

        let reader = record.clone();
        let sum = rt.computed(move || {
            reader.get("x").as_int().unwrap_or(0) + reader.get("y").as_int().unwrap_or(0)
        });

        assert_eq!(sum.value(), 3);
        assert_eq!(sum.value(), 3);
        assert_eq!(sum.value(), 3);
        assert_eq!(sum.evaluations(), 1);

        record.set("x", 10);
        assert_eq!(sum.state(), ComputedState::Dirty);
        assert_eq!(sum.evaluations(), 1);

        assert_eq!(sum.value(), 12);
        assert_eq!(sum.value(), 12);
        assert_eq!(sum.evaluations(), 2);
    }

    #[test]
    fn effects_reading_computed_rerun() {
        let rt = Runtime::new();
        let state = rt.reactive(RawObject::record([("n", 1)]));
        let record = state.as_record().unwrap();

        let reader = record.clone();
        let doubled = rt.computed(move || reader.get("n").as_int().unwrap_or(0) * 2);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let doubled_clone = doubled.clone();
        let _effect = rt.effect(move || seen_clone.lock().push(doubled_clone.value()));

        record.set("n", 2);
        record.set("n", 3);

        assert_eq!(*seen.lock(), vec![2, 4, 6]);
        assert_eq!(doubled.evaluations(), 3);
    }

    #[test]
    fn invalidation_notifies_once_per_cycle() {
        let rt = Runtime::new();
        let state = rt.reactive(RawObject::record([("n", 1)]));
        let record = state.as_record().unwrap();

        let reader = record.clone();
        let computed = rt.computed(move || reader.get("n"));
        computed.value();

        // Nobody reads it in between, so the second change finds it dirty.
        record.set("n", 2);
        record.set("n", 3);
        assert_eq!(computed.evaluations(), 1);
        assert_eq!(computed.value().as_int(), Some(3));
        assert_eq!(computed.evaluations(), 2);
    }

    #[test]
    fn computed_clone_shares_state() {
        let rt = Runtime::new();
        let computed1 = rt.computed(|| 42);

        // Force computation
        assert_eq!(computed1.value(), 42);

        let computed2 = computed1.clone();
        assert!(computed2.has_value());
        assert_eq!(computed2.value(), 42);

        // Marking one dirty affects both
        computed1.mark_dirty();
        assert_eq!(computed2.state(), ComputedState::Dirty);
        assert_eq!(computed2.value(), 42);
        assert_eq!(computed1.evaluations(), 2);
    }

    #[test]
    fn disposed_computed_keeps_last_value() {
        let rt = Runtime::new();
        let state = rt.reactive(RawObject::record([("n", 1)]));
        let record = state.as_record().unwrap();

        let reader = record.clone();
        let computed = rt.computed(move || reader.get("n").as_int());
        assert_eq!(computed.value(), Some(1));

        computed.dispose();
        record.set("n", 2);
        assert_eq!(computed.state(), ComputedState::Clean);
        assert_eq!(computed.value(), Some(1));
    }
}
