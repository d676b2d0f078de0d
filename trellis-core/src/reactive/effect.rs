//! Effect Implementation
//!
//! An Effect is a computation that re-runs whenever the tracked state it
//! read during its last run changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its body immediately to establish
//!    initial dependencies (unless it is lazy).
//!
//! 2. When any dependency changes, the effect re-runs, or is handed to its
//!    scheduler if it has one.
//!
//! 3. Every run first removes the effect from all buckets it joined last
//!    time ("cleanup"), then rebuilds its dependencies from the reads of
//!    this run. A dependency on a branch that is no longer taken is dropped.
//!
//! # Use Cases
//!
//! Effects synchronize reactive state with the outside world:
//!
//! - Re-rendering a tree when its inputs change
//! - Logging state changes
//! - Backing computed values and watchers, via a scheduler
//!
//! # Lifetime
//!
//! An effect stays registered while any bucket holds it, even after every
//! `Effect` handle is dropped. Call [`Effect::stop`] to sever it.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::runtime::{Runtime, WeakRuntime};
use super::store::Bucket;
use super::subscriber::{EffectHandle, Scheduler, Subscriber, SubscriberId};

/// Options for [`Runtime::effect_with`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Called with the effect instead of re-running it on change.
    pub scheduler: Option<Scheduler>,
    /// Skip the initial run at creation.
    pub lazy: bool,
}

impl EffectOptions {
    pub fn with_scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn(EffectHandle) + Send + Sync + 'static,
    {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }

    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("scheduler", &self.scheduler.is_some())
            .field("lazy", &self.lazy)
            .finish()
    }
}

pub(crate) struct EffectCore<R> {
    id: SubscriberId,
    runtime: WeakRuntime,
    body: Box<dyn Fn() -> R + Send + Sync>,
    /// Buckets joined during the last run.
    deps: Mutex<SmallVec<[Weak<Bucket>; 4]>>,
    scheduler: Option<Scheduler>,
    active: AtomicBool,
    run_count: AtomicUsize,
}

impl<R> EffectCore<R> {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Leave every bucket joined by the previous run.
    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.deps.lock());
        for bucket in deps.iter().filter_map(Weak::upgrade) {
            bucket.remove(self.id);
        }
    }

    fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.cleanup();
            tracing::trace!(subscriber = %self.id, "effect stopped");
        }
    }
}

impl<R: 'static> EffectCore<R> {
    fn run(self: &Arc<Self>) -> R {
        self.run_count.fetch_add(1, Ordering::Relaxed);

        let runtime = match self.runtime.upgrade() {
            Some(runtime) if self.is_active() => runtime,
            Some(runtime) => return runtime.untracked(|| (self.body)()),
            None => return (self.body)(),
        };

        self.cleanup();
        let subscriber: Arc<dyn Subscriber> = Arc::clone(self) as Arc<dyn Subscriber>;
        let _ctx = runtime.inner.context.enter(subscriber);
        (self.body)()
    }
}

impl<R: 'static> Subscriber for EffectCore<R> {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn rerun(self: Arc<Self>) {
        self.run();
    }

    fn scheduler(&self) -> Option<Scheduler> {
        self.scheduler.clone()
    }

    fn is_active(&self) -> bool {
        EffectCore::is_active(self)
    }

    fn add_dependency(&self, bucket: Weak<Bucket>) {
        self.deps.lock().push(bucket);
    }
}

/// A computation that re-runs when its dependencies change.
///
/// `R` is the body's return type. Plain effects return `()`; computed
/// values and watchers use it to pull values out of a run.
///
/// # Example
///
/// ```rust,ignore
/// let rt = Runtime::new();
/// let state = rt.reactive(RawObject::record([("count", 0)]));
/// let record = state.as_record().unwrap();
///
/// let effect = rt.effect({
///     let record = record.clone();
///     move || println!("Count is: {:?}", record.get("count"))
/// });
///
/// record.set("count", 5);  // Prints: "Count is: Int(5)"
/// ```
pub struct Effect<R = ()> {
    core: Arc<EffectCore<R>>,
}

impl<R: 'static> Effect<R> {
    /// Create an effect on `runtime`, running it now unless `options.lazy`.
    pub fn new<F>(runtime: &Runtime, body: F, options: EffectOptions) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
    {
        let effect = Self {
            core: Arc::new(EffectCore {
                id: SubscriberId::new(),
                runtime: runtime.downgrade(),
                body: Box::new(body),
                deps: Mutex::new(SmallVec::new()),
                scheduler: options.scheduler,
                active: AtomicBool::new(true),
                run_count: AtomicUsize::new(0),
            }),
        };

        if !options.lazy {
            effect.run();
        }

        effect
    }

    /// Run the body now, re-collecting dependencies, and return its result.
    ///
    /// A stopped effect still runs its body, without tracking anything.
    pub fn run(&self) -> R {
        self.core.run()
    }

    /// The type-erased handle schedulers receive.
    pub fn handle(&self) -> EffectHandle {
        EffectHandle::new(Arc::clone(&self.core) as Arc<dyn Subscriber>)
    }
}

impl<R> Effect<R> {
    pub fn id(&self) -> SubscriberId {
        self.core.id
    }

    /// Sever the effect from every bucket. It will not be notified again.
    pub fn stop(&self) {
        self.core.stop();
    }

    pub fn is_active(&self) -> bool {
        self.core.is_active()
    }

    /// Get the number of times the body has run.
    pub fn run_count(&self) -> usize {
        self.core.run_count.load(Ordering::Relaxed)
    }

    /// Get the number of buckets joined by the last run.
    pub fn dependency_count(&self) -> usize {
        self.core
            .deps
            .lock()
            .iter()
            .filter(|bucket| bucket.strong_count() > 0)
            .count()
    }
}

impl<R> Clone for Effect<R> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<R> fmt::Debug for Effect<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.core.id)
            .field("run_count", &self.core.run_count.load(Ordering::Relaxed))
            .field("active", &self.core.active.load(Ordering::SeqCst))
            .finish()
    }
}

impl Runtime {
    /// Register an effect that runs now and on every relevant change.
    pub fn effect<R, F>(&self, body: F) -> Effect<R>
    where
        R: 'static,
        F: Fn() -> R + Send + Sync + 'static,
    {
        Effect::new(self, body, EffectOptions::default())
    }

    /// Register an effect with a scheduler and/or lazy start.
    pub fn effect_with<R, F>(&self, body: F, options: EffectOptions) -> Effect<R>
    where
        R: 'static,
        F: Fn() -> R + Send + Sync + 'static,
    {
        Effect::new(self, body, options)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
