//! Caustic Lattice Topology
//!
//! Periodic cubic lattice of Lagrangian mass elements with fixed neighbor
//! sets and slab partitioning across workers.
//!
//! # Indexing
//!
//! A lattice of `n` points per side holds `n³` points. The point at
//! `(x, y, z)` has index `(x·n + y)·n + z`, so x is the slowest axis and
//! every x-slab is a contiguous index range.
//!
//! # Neighbor Sets
//!
//! Each point sees a fixed, translation-invariant set of neighbors:
//! - 6 face neighbors (default)
//! - 12 edge neighbors
//! - 8 corner neighbors
//!
//! All offsets wrap periodically. The adjacency view is built once and
//! never mutated.

mod coord;
mod neighbors;
mod partition;

pub use coord::LatticeCoord;
pub use neighbors::{Connectivity, Lattice};
pub use partition::{Partition, Slab};

use thiserror::Error;

/// Global index of a lattice point.
pub type PointIndex = usize;

/// Face-sharing neighbors of a cubic cell.
pub const FACE_NEIGHBORS: usize = 6;

/// Edge-sharing neighbors of a cubic cell.
pub const EDGE_NEIGHBORS: usize = 12;

/// Corner-sharing neighbors of a cubic cell.
pub const CORNER_NEIGHBORS: usize = 8;

/// Full 3×3×3 stencil minus the center.
pub const FULL_NEIGHBORS: usize = 26;

// Compile-time assertion of the stencil size
const _: () = assert!(FACE_NEIGHBORS + EDGE_NEIGHBORS + CORNER_NEIGHBORS == FULL_NEIGHBORS);

/// Errors raised while building lattices or partitions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LatticeError {
    /// The lattice needs at least two points per side.
    #[error("grid size {0} is too small (need at least 2 points per side)")]
    GridTooSmall(usize),

    /// The requested worker count cannot split the lattice into slabs.
    #[error("cannot split {planes} planes across {workers} workers")]
    InvalidPartition { workers: usize, planes: usize },
}

/// Result type for lattice operations.
pub type Result<T> = std::result::Result<T, LatticeError>;
