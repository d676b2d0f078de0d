//! Trellis Core
//!
//! A fine-grained reactive dependency-tracking engine. Reads of tracked
//! state inside a running computation are recorded as dependencies; writes
//! re-run exactly the computations that read what changed.
//!
//! # Architecture
//!
//! The crate is organized into a few modules:
//!
//! - `state`: raw objects, values, and the tracked views over them
//! - `reactive`: the runtime, dependency store, effects, computed values,
//!   and watchers
//! - `config`: runtime configuration
//! - `error`: configuration errors and policy warnings
//!
//! # Example
//!
//! ```rust
//! use trellis_core::{RawObject, Runtime};
//!
//! let rt = Runtime::new();
//! let state = rt.reactive(RawObject::record([("count", 0)]));
//! let record = state.as_record().unwrap();
//!
//! // Derived value, evaluated lazily and cached
//! let reader = record.clone();
//! let doubled = rt.computed(move || reader.get("count").as_int().unwrap_or(0) * 2);
//!
//! // Effect that re-runs on change
//! let watched = doubled.clone();
//! let _effect = rt.effect(move || {
//!     println!("doubled: {}", watched.value());
//! });
//!
//! record.set("count", 5);
//! assert_eq!(doubled.value(), 10);
//! ```

pub mod config;
pub mod error;
pub mod reactive;
pub mod state;

pub use config::RuntimeConfig;
pub use error::{ConfigError, Warning};
pub use reactive::{
    Computed, Effect, EffectOptions, Flush, Key, Runtime, TriggerKind, WatchHandle, WatchOptions,
};
pub use state::{
    EntryKey, RawObject, Ref, Tracked, TrackedList, TrackedMap, TrackedRecord, TrackedSet, Value,
    WrapOptions,
};
