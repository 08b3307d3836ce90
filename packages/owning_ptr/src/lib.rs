#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Single-threaded owning pointers with deterministic destruction.
//!
//! This crate provides three ownership models:
//!
//! - [`UniquePtr<T, D>`] - exclusive ownership of a heap object, released through a pluggable
//!   [`Deleter`] when the pointer is dropped or reset.
//! - [`SharedPtr<T>`] and [`WeakPtr<T>`] - shared ownership tracked by an external control
//!   block. The value is destroyed when the last strong reference goes away; the control block
//!   itself lives on until the last weak reference is gone as well.
//! - [`IntrusivePtr<T>`] - shared ownership tracked by a counter embedded in the object itself
//!   (see [`RefCounted`]).
//!
//! # Key Features
//!
//! - **Co-allocated values**: [`SharedPtr::new()`] places the value and its reference counts in a
//!   single allocation. Existing boxes and raw pointers get a separate control block instead.
//! - **Custom destruction**: raw pointers can be adopted together with any [`Deleter`],
//!   including plain closures.
//! - **Aliasing views**: a [`SharedPtr`] can point at a part of the value it keeps alive, via
//!   [`SharedPtr::project()`] or [`SharedPtr::cast_with_fn()`].
//! - **Checked weak promotion**: [`WeakPtr::upgrade()`] reports [`Error::Expired`] once the value
//!   has been destroyed, while [`WeakPtr::lock()`] returns an empty pointer instead.
//!
//! # Example
//!
//! ```
//! use owning_ptr::{Error, SharedPtr};
//!
//! let shared = SharedPtr::new(vec![1, 2, 3]);
//! let weak = shared.downgrade();
//!
//! let another = weak.upgrade().unwrap();
//! assert_eq!(shared.use_count(), 2);
//! assert_eq!(another.len(), 3);
//!
//! drop(shared);
//! drop(another);
//!
//! assert!(weak.expired());
//! assert_eq!(weak.upgrade().unwrap_err(), Error::Expired);
//! assert!(weak.lock().is_empty());
//! ```
//!
//! # Thread safety
//!
//! Reference counts are not atomic. [`SharedPtr`], [`WeakPtr`] and [`IntrusivePtr`] are neither
//! [`Send`] nor [`Sync`]. [`UniquePtr`] is [`Send`] and [`Sync`] when its target and deleter are.

mod compressed_pair;
mod control_block;
mod deleter;
mod error;
mod intrusive;
mod shared;
mod unique;
mod weak;

pub use compressed_pair::*;
pub(crate) use control_block::*;
pub use deleter::*;
pub use error::*;
pub use intrusive::*;
pub use shared::*;
pub use unique::*;
pub use weak::*;
