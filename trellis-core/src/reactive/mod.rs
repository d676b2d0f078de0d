//! Reactive Primitives
//!
//! This module implements the dependency-tracking core: the runtime,
//! effects, computed values, and watchers.
//!
//! # Concepts
//!
//! ## Tracking
//!
//! Every read of tracked state inside a running subscriber records a
//! `(target, key)` dependency. Every write looks those dependencies up and
//! notifies the subscribers that read what changed. Nothing is declared up
//! front; a subscriber's dependency set is whatever its last run read.
//!
//! ## Effects
//!
//! An Effect is a computation that re-runs whenever its dependencies
//! change. An optional scheduler receives the re-run instead, which is how
//! computed values and watchers are built on top of effects.
//!
//! ## Computed Values
//!
//! A Computed is a lazily evaluated, cached derivation. A change to one of
//! its inputs only marks it dirty; the getter runs again on the next read.
//!
//! ## Watchers
//!
//! A watcher runs a callback with the new and previous value of a getter,
//! either synchronously on every change or batched into the post-flush
//! queue.
//!
//! # Implementation Notes
//!
//! The active subscriber is a per-runtime stack rather than a thread-local,
//! so nested effects restore their parent on exit and separate runtimes do
//! not observe each other.

mod computed;
mod context;
mod effect;
mod runtime;
mod scheduler;
mod store;
mod subscriber;
pub(crate) mod trigger;
mod watch;

pub use computed::{Computed, ComputedState};
pub use context::TrackingPause;
pub use effect::{Effect, EffectOptions};
pub use runtime::{Runtime, RuntimeBuilder, WarningSink, WeakRuntime};
pub use store::{Key, Target};
pub use subscriber::{EffectHandle, Scheduler, SubscriberId};
pub use trigger::TriggerKind;
pub use watch::{Flush, OnInvalidate, WatchHandle, WatchOptions};
