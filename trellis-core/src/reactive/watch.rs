//! Watchers
//!
//! A watcher observes a getter (or a whole tracked tree, see
//! [`Runtime::watch_deep`]) and calls back with `(new, old)` whenever
//! something the getter read changes.
//!
//! Each change runs a job:
//!
//! 1. Re-run the getter to get the new value.
//! 2. Fire the invalidation hook registered by the previous callback, if any.
//! 3. Call the callback with `(new, old, on_invalidate)`.
//! 4. Remember `new` as the next `old`.
//!
//! The invalidation hook lets a callback that starts asynchronous work mark
//! that work stale once a newer job supersedes it:
//!
//! ```rust,ignore
//! rt.watch(getter, |new, _old, on_invalidate| {
//!     let expired = Arc::new(AtomicBool::new(false));
//!     on_invalidate.register({
//!         let expired = expired.clone();
//!         move || expired.store(true, Ordering::SeqCst)
//!     });
//!     spawn_request(new.clone(), expired);
//! }, WatchOptions::default());
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::effect::{Effect, EffectOptions};
use super::runtime::Runtime;
use super::subscriber::EffectHandle;
use crate::state::{ObjectId, Tracked, Value};

/// When a watcher's job runs relative to the mutation that caused it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flush {
    /// Inside the trigger, before the mutating call returns.
    #[default]
    Sync,
    /// On the runtime's post-flush queue.
    Post,
}

/// Options for [`Runtime::watch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Run the callback once at creation, with no old value.
    pub immediate: bool,
    /// Flush timing; `None` uses the runtime's `default_flush`.
    pub flush: Option<Flush>,
}

impl WatchOptions {
    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    pub fn flush(mut self, flush: Flush) -> Self {
        self.flush = Some(flush);
        self
    }
}

type Hook = Box<dyn FnOnce() + Send>;

/// Registration slot for a watcher's staleness hook.
///
/// A hook registered during one callback fires right before the next
/// callback, or when the watcher is stopped.
#[derive(Clone, Default)]
pub struct OnInvalidate {
    slot: Arc<Mutex<Option<Hook>>>,
}

impl OnInvalidate {
    /// Store `hook`, replacing any hook not yet fired.
    pub fn register<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        *self.slot.lock() = Some(Box::new(hook));
    }

    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }

    fn fire(&self) {
        // Taken out first; the hook may register again.
        let hook = self.slot.lock().take();
        if let Some(hook) = hook {
            hook();
        }
    }
}

impl fmt::Debug for OnInvalidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnInvalidate")
            .field("pending", &self.is_pending())
            .finish()
    }
}

type Callback<T> = Box<dyn Fn(&T, Option<&T>, &OnInvalidate) + Send + Sync>;

struct WatchCore<T> {
    effect: Effect<T>,
    callback: Callback<T>,
    old: Mutex<Option<T>>,
    on_invalidate: OnInvalidate,
    stopped: AtomicBool,
}

impl<T: Clone + Send + Sync + 'static> WatchCore<T> {
    fn job(&self) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        let new = self.effect.run();
        self.on_invalidate.fire();
        let old = self.old.lock().replace(new.clone());
        (self.callback)(&new, old.as_ref(), &self.on_invalidate);
    }
}

trait WatchControl: Send + Sync {
    fn stop(&self);
    fn is_stopped(&self) -> bool;
}

impl<T: Send + Sync + 'static> WatchControl for WatchCore<T> {
    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.effect.stop();
            self.on_invalidate.fire();
        }
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Handle to a registered watcher.
///
/// Dropping this handle stops the watcher.
pub struct WatchHandle {
    core: Arc<dyn WatchControl>,
}

impl WatchHandle {
    /// Stop the watcher: no further callbacks, queued jobs are discarded,
    /// and a pending invalidation hook fires.
    pub fn stop(&self) {
        self.core.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.core.is_stopped()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.core.stop();
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl Runtime {
    /// Watch the value returned by `getter`.
    pub fn watch<T, G, C>(&self, getter: G, callback: C, options: WatchOptions) -> WatchHandle
    where
        T: Clone + Send + Sync + 'static,
        G: Fn() -> T + Send + Sync + 'static,
        C: Fn(&T, Option<&T>, &OnInvalidate) + Send + Sync + 'static,
    {
        let flush = options.flush.unwrap_or(self.config().default_flush);
        let runtime = self.downgrade();

        let core = Arc::new_cyclic(|weak: &Weak<WatchCore<T>>| {
            let weak = weak.clone();
            let scheduler = move |_handle: EffectHandle| {
                let Some(core) = weak.upgrade() else {
                    return;
                };
                match flush {
                    Flush::Sync => core.job(),
                    Flush::Post => {
                        if let Some(runtime) = runtime.upgrade() {
                            let weak = Arc::downgrade(&core);
                            runtime.queue_post_job(move || {
                                if let Some(core) = weak.upgrade() {
                                    core.job();
                                }
                            });
                        }
                    }
                }
            };

            WatchCore {
                effect: self.effect_with(getter, EffectOptions::default().lazy().with_scheduler(scheduler)),
                callback: Box::new(callback),
                old: Mutex::new(None),
                on_invalidate: OnInvalidate::default(),
                stopped: AtomicBool::new(false),
            }
        });

        if options.immediate {
            core.job();
        } else {
            let baseline = core.effect.run();
            *core.old.lock() = Some(baseline);
        }

        WatchHandle { core }
    }

    /// Watch every value reachable from `source`.
    ///
    /// The callback receives `source` itself; any nested change fires it.
    pub fn watch_deep<C>(&self, source: &Tracked, callback: C, options: WatchOptions) -> WatchHandle
    where
        C: Fn(&Tracked, Option<&Tracked>, &OnInvalidate) + Send + Sync + 'static,
    {
        let source = source.clone();
        self.watch(
            move || {
                traverse(&source, &mut HashSet::new());
                source.clone()
            },
            callback,
            options,
        )
    }
}

/// Read everything reachable from `tracked`, so the running subscriber
/// depends on all of it.
fn traverse(tracked: &Tracked, seen: &mut HashSet<ObjectId>) {
    if !seen.insert(tracked.raw().id()) {
        return;
    }
    for child in tracked.children() {
        if let Value::Tracked(child) = child {
            traverse(&child, seen);
        }
    }
}
