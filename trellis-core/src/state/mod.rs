//! Tracked State
//!
//! The data model that reactive reads and writes operate on. State lives in
//! [`RawObject`]s, shared, identity-bearing composites of four shapes:
//!
//! - Records: string-keyed fields
//! - Lists: indexed items with a synthetic length
//! - Maps: insertion-ordered entries keyed by [`EntryKey`]
//! - Sets: insertion-ordered members
//!
//! Wrapping a raw object with [`Runtime::reactive`](crate::reactive::Runtime::reactive)
//! (or one of its shallow and read-only siblings) gives a [`Tracked`]
//! handle. Typed views on that handle ([`TrackedRecord`], [`TrackedList`],
//! [`TrackedMap`], [`TrackedSet`]) register reads as dependencies and turn
//! writes into triggers.

mod collection;
mod list;
mod object;
mod record;
mod refs;
pub(crate) mod tracked;
mod value;

pub use collection::{TrackedMap, TrackedSet};
pub use list::TrackedList;
pub use object::{ObjectId, RawObject, Shape, ShapeKind};
pub use record::TrackedRecord;
pub use refs::Ref;
pub use tracked::{Tracked, WrapOptions};
pub use value::{EntryKey, Value};
