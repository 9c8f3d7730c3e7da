#![cfg_attr(not(test), no_std)] // only `alloc` is needed outside of tests

//! A FIFO queue of strings backed by a singly linked list.
//!
//! Nodes are raw heap blocks owned by the [`Queue`]. Every allocation is checked, so running out of
//! memory is reported as [`QueueError::AllocationFailure`] instead of aborting the process.

extern crate alloc;

mod error;
mod node;
pub mod ops;
mod queue;
mod sort;

pub use error::QueueError;
pub use queue::Queue;
