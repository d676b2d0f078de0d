//! Subscriber types for the reactive system.
//!
//! A Subscriber represents any computation that depends on tracked state.
//! This includes plain effects, computed values, watchers, and render
//! functions registered by a renderer.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::store::Bucket;

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique ID when created. This ID is used to
/// deduplicate bucket membership and to recognise the active subscriber
/// during propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across runtimes.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// The type-erased face of an effect, as seen by buckets and dispatch.
pub(crate) trait Subscriber: Send + Sync {
    fn id(&self) -> SubscriberId;

    /// Re-run the body, discarding its result.
    fn rerun(self: Arc<Self>);

    /// The scheduler to hand this subscriber to instead of running it.
    fn scheduler(&self) -> Option<Scheduler>;

    /// Stopped subscribers are skipped by dispatch.
    fn is_active(&self) -> bool;

    /// Record a bucket this subscriber just joined.
    fn add_dependency(&self, bucket: Weak<Bucket>);
}

/// A scheduling function. Receives the subscriber it should eventually run.
pub type Scheduler = Arc<dyn Fn(EffectHandle) + Send + Sync>;

/// Handle passed to schedulers; running it re-runs the subscriber.
#[derive(Clone)]
pub struct EffectHandle {
    subscriber: Arc<dyn Subscriber>,
}

impl EffectHandle {
    pub(crate) fn new(subscriber: Arc<dyn Subscriber>) -> Self {
        Self { subscriber }
    }

    pub fn id(&self) -> SubscriberId {
        self.subscriber.id()
    }

    /// Re-run the subscriber now, with full dependency tracking.
    pub fn run(&self) {
        Arc::clone(&self.subscriber).rerun();
    }

    pub fn is_active(&self) -> bool {
        self.subscriber.is_active()
    }
}

impl fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectHandle").field("id", &self.id()).finish()
    }
}
