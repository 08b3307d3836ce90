#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A double-ended queue that stores its elements in a ring of fixed-size blocks.
//!
//! [`BlockDeque`] offers amortized O(1) insertion and removal at both ends. Elements are never
//! moved once written: when the ring runs out of free blocks it doubles in size by moving the
//! block *ownership* into a larger table, leaving the element storage itself untouched.
//!
//! # Storage model
//!
//! * The deque owns a table of blocks. The table size is always a power of two.
//! * Each block either owns an array of [`BLOCK_CAPACITY`] slots or is empty.
//! * The occupied blocks form a contiguous span of the ring, from the left edge block to the
//!   right edge block. Only blocks within this span have slot arrays.
//! * When the last element is removed, all blocks are released. An emptied deque is
//!   indistinguishable from a newly created one.
//!
//! # Example
//!
//! ```
//! use block_deque::BlockDeque;
//!
//! let mut deque = BlockDeque::new();
//!
//! deque.push_back(2);
//! deque.push_back(3);
//! deque.push_front(1);
//!
//! assert_eq!(deque.len(), 3);
//! assert_eq!(deque[0], 1);
//! assert_eq!(deque[2], 3);
//!
//! assert_eq!(deque.pop_front(), Some(1));
//! assert_eq!(deque.pop_back(), Some(3));
//! assert_eq!(deque.pop_back(), Some(2));
//! assert!(deque.is_empty());
//! ```
//!
//! # Thread safety
//!
//! The deque is [`Send`] and [`Sync`] when `T` is. It has no interior mutability.

use std::num::NonZero;

use new_zealand::nz;

mod block;
mod deque;

pub(crate) use block::*;
pub use deque::*;

/// Number of element slots in every block of a [`BlockDeque`].
#[cfg(not(miri))]
pub const BLOCK_CAPACITY: NonZero<usize> = nz!(128);

// Under Miri, we use a smaller block capacity because Miri test runtime scales by memory usage.
/// Number of element slots in every block of a [`BlockDeque`].
#[cfg(miri)]
pub const BLOCK_CAPACITY: NonZero<usize> = nz!(8);
