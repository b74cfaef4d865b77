//! Slab-parallel fragmentation.
//!
//! Each worker task owns one x-slab of points and the groups that live
//! entirely inside it. Events that can see another slab, or a group that
//! has already been handed over, are decided by the coordinator against a
//! shared forest in global `(time, index)` order.

mod coordinator;
mod message;
mod worker;

pub use coordinator::{AbortHandle, ParallelEngine};
