//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects tracked state,
//! effects, computed values, and watchers. It owns the dependency store,
//! the active-subscriber stack, the post-flush job queue, and the wrapper
//! cache that keeps `wrap(x)` idempotent.
//!
//! # How It Works
//!
//! 1. When a subscriber runs, it is pushed onto the runtime's context
//!    stack.
//!
//! 2. When tracked state is read, the accessor calls [`Runtime::track`],
//!    which registers the running subscriber in the bucket for the
//!    `(target, key)` pair that was read.
//!
//! 3. When tracked state is written, the accessor applies the change and
//!    calls [`Runtime::trigger`], which:
//!    a. Classifies the change and finds every affected bucket
//!    b. Snapshots their subscribers into one deduplicated set
//!    c. Hands each subscriber to its scheduler, or re-runs it directly
//!
//! # Instances
//!
//! There are no process-wide globals. Several runtimes may coexist (for
//! example one per test); state wrapped by one runtime is tracked by that
//! runtime only. A `Runtime` is a cheap, clonable handle.
//!
//! # Threads
//!
//! A runtime may be shared across threads. Each thread has its own stack
//! of running subscribers, so a read is only ever attributed to a
//! subscriber running on the same thread. A post-flush job drained on a
//! tokio worker (see [`Runtime::run_post_flush_loop`]) tracks its own reads
//! and never those of an effect running elsewhere at the same time.

use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;

use super::context::{ContextStack, TrackingPause};
use super::scheduler::JobQueue;
use super::store::{DependencyStore, Key, Target};
use super::subscriber::{EffectHandle, Subscriber, SubscriberId};
use super::trigger::{Change, Propagation, TriggerKind};
use crate::config::RuntimeConfig;
use crate::error::Warning;
use crate::state::tracked::TrackedInner;
use crate::state::{ObjectId, Value, WrapOptions};

/// Receives policy-violation warnings.
pub type WarningSink = Arc<dyn Fn(&Warning) + Send + Sync>;

pub(crate) struct RuntimeInner {
    pub(crate) store: Mutex<DependencyStore>,
    pub(crate) context: ContextStack,
    pub(crate) jobs: JobQueue,
    pub(crate) wrappers: DashMap<(ObjectId, WrapOptions), Weak<TrackedInner>>,
    config: RuntimeConfig,
    on_warning: Option<WarningSink>,
}

/// An independent reactive engine.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Arc<RuntimeInner>,
}

/// A non-owning reference to a [`Runtime`].
#[derive(Clone)]
pub struct WeakRuntime {
    inner: Weak<RuntimeInner>,
}

impl WeakRuntime {
    pub fn upgrade(&self) -> Option<Runtime> {
        self.inner.upgrade().map(|inner| Runtime { inner })
    }
}

/// Builder for a [`Runtime`] with a custom config or warning sink.
#[derive(Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    on_warning: Option<WarningSink>,
}

impl RuntimeBuilder {
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Route warnings to `sink` in addition to the `tracing` log.
    pub fn on_warning<F>(mut self, sink: F) -> Self
    where
        F: Fn(&Warning) + Send + Sync + 'static,
    {
        self.on_warning = Some(Arc::new(sink));
        self
    }

    pub fn build(self) -> Runtime {
        Runtime {
            inner: Arc::new(RuntimeInner {
                store: Mutex::new(DependencyStore::default()),
                context: ContextStack::default(),
                jobs: JobQueue::default(),
                wrappers: DashMap::new(),
                config: self.config,
                on_warning: self.on_warning,
            }),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Create a runtime with the default config.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn downgrade(&self) -> WeakRuntime {
        WeakRuntime {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Check whether two handles refer to the same runtime.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Record that the running subscriber read `key` of `target`.
    ///
    /// No-op outside a subscriber or while tracking is paused.
    pub fn track(&self, target: &dyn Target, key: Key) {
        let Some(subscriber) = self.inner.context.tracking_subscriber() else {
            return;
        };

        let (bucket, swept) = {
            let mut store = self.inner.store.lock();
            let bucket = store.bucket_or_insert(target, key.clone());
            let interval = self.inner.config.sweep_interval;
            let swept = if interval > 0 && store.registered_since_sweep() >= interval {
                Some(store.sweep())
            } else {
                None
            };
            (bucket, swept)
        };

        if bucket.insert(Arc::clone(&subscriber)) {
            subscriber.add_dependency(Arc::downgrade(&bucket));
            tracing::trace!(
                subscriber = %subscriber.id(),
                object = %target.target_id(),
                key = %key,
                "tracked dependency"
            );
        }

        if let Some(removed) = swept {
            self.inner.wrappers.retain(|_, wrapper| wrapper.strong_count() > 0);
            tracing::debug!(removed, "automatic sweep");
        }
    }

    /// Notify the subscribers of `key` of `target` after a mutation.
    ///
    /// `new` and `old` are only consulted for [`Key::Length`]: an integer
    /// `new` notifies every tracked index at or past it. `old` may be
    /// omitted.
    pub fn trigger(
        &self,
        target: &dyn Target,
        key: Key,
        kind: TriggerKind,
        new: Option<&Value>,
        old: Option<&Value>,
    ) {
        let mut change = Change::new(key, kind);
        if change.key == Key::Length {
            let as_len = |v: Option<&Value>| v.and_then(Value::as_int).map(|n| n.max(0) as usize);
            change.new_len = as_len(new);
            change.old_len = as_len(old);
        }
        self.trigger_all(target, &[change]);
    }

    /// Propagate several changes of one target as a single dispatch round.
    pub(crate) fn trigger_all(&self, target: &dyn Target, changes: &[Change]) {
        if changes.is_empty() {
            return;
        }

        let mut propagation = Propagation::new(self.inner.context.current_subscriber());
        {
            let store = self.inner.store.lock();
            let Some(deps) = store.target(target.target_id()) else {
                return;
            };
            for change in changes {
                propagation.add_change(deps, target.target_kind(), change);
            }
        }

        if propagation.is_empty() {
            return;
        }

        tracing::debug!(
            object = %target.target_id(),
            kind = %changes[0].kind,
            key = %changes[0].key,
            changes = changes.len(),
            fan_out = propagation.len(),
            "trigger"
        );

        // The store lock is released; subscribers may track and trigger freely.
        for subscriber in propagation.into_subscribers() {
            Self::dispatch(subscriber);
        }
    }

    fn dispatch(subscriber: Arc<dyn Subscriber>) {
        if !subscriber.is_active() {
            return;
        }
        match subscriber.scheduler() {
            Some(scheduler) => scheduler(EffectHandle::new(subscriber)),
            None => subscriber.rerun(),
        }
    }

    /// The subscribers currently registered for `key` of `target`.
    pub fn subscribers(&self, target: &dyn Target, key: &Key) -> Vec<SubscriberId> {
        self.inner
            .store
            .lock()
            .bucket(target.target_id(), key)
            .map(|bucket| bucket.ids())
            .unwrap_or_default()
    }

    /// Number of targets with at least one bucket.
    pub fn target_count(&self) -> usize {
        self.inner.store.lock().target_count()
    }

    /// Get the current subscriber being run, if any.
    pub fn current_subscriber(&self) -> Option<SubscriberId> {
        self.inner.context.current_subscriber()
    }

    /// Check if reads would currently be tracked.
    pub fn is_tracking(&self) -> bool {
        self.inner.context.is_tracking()
    }

    /// Pause tracking until the guard is dropped.
    pub fn pause_tracking(&self) -> TrackingPause<'_> {
        self.inner.context.pause()
    }

    /// Run `f` with tracking paused.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _pause = self.pause_tracking();
        f()
    }

    /// Drop store and wrapper-cache entries whose target is gone.
    ///
    /// Returns the number of store entries removed.
    pub fn sweep(&self) -> usize {
        let removed = self.inner.store.lock().sweep();
        self.inner.wrappers.retain(|_, wrapper| wrapper.strong_count() > 0);
        tracing::debug!(removed, "sweep");
        removed
    }

    /// Report a policy violation.
    pub(crate) fn warn(&self, warning: Warning) {
        if !self.inner.config.warn_readonly_writes {
            return;
        }
        tracing::warn!(object = %warning.target(), "{warning}");
        if let Some(sink) = &self.inner.on_warning {
            sink(&warning);
        }
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("targets", &self.target_count())
            .field("wrappers", &self.inner.wrappers.len())
            .field("pending_post_jobs", &self.pending_post_jobs())
            .finish()
    }
}
