//! Slab decomposition of the lattice across workers.
//!
//! The x planes are split into contiguous slabs; the first `n % w` slabs
//! carry one extra plane. Since x is the slowest index axis, each slab is
//! also a contiguous range of point indices.

use std::ops::Range;

use crate::{Lattice, LatticeError, PointIndex, Result};

/// One worker's share of the lattice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slab {
    /// Owning worker
    pub worker: usize,
    /// x planes held by the worker
    pub planes: Range<usize>,
    /// Point indices held by the worker
    pub points: Range<PointIndex>,
}

impl Slab {
    /// Number of points in the slab.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when the slab holds no planes.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Does the slab own this point?
    pub fn contains(&self, index: PointIndex) -> bool {
        self.points.contains(&index)
    }

    /// Offset of a global index inside the slab.
    pub fn local(&self, index: PointIndex) -> usize {
        index - self.points.start
    }
}

/// Split of `n` planes across `workers` slabs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    n: usize,
    starts: Vec<usize>,
}

impl Partition {
    /// Build a partition. Every worker must own at least one plane.
    pub fn new(n: usize, workers: usize) -> Result<Self> {
        if workers == 0 || workers > n {
            return Err(LatticeError::InvalidPartition { workers, planes: n });
        }

        let base = n / workers;
        let extra = n % workers;
        let mut starts = Vec::with_capacity(workers + 1);
        let mut plane = 0;
        for worker in 0..workers {
            starts.push(plane);
            plane += base + usize::from(worker < extra);
        }
        starts.push(plane);
        debug_assert_eq!(plane, n);

        Ok(Self { n, starts })
    }

    /// Number of workers.
    pub fn workers(&self) -> usize {
        self.starts.len() - 1
    }

    /// Points per side of the partitioned lattice.
    pub const fn size(&self) -> usize {
        self.n
    }

    /// The slab owned by a worker.
    pub fn slab(&self, worker: usize) -> Slab {
        let planes = self.starts[worker]..self.starts[worker + 1];
        let plane_points = self.n * self.n;
        Slab {
            worker,
            points: planes.start * plane_points..planes.end * plane_points,
            planes,
        }
    }

    /// All slabs in worker order.
    pub fn slabs(&self) -> impl Iterator<Item = Slab> + '_ {
        (0..self.workers()).map(move |w| self.slab(w))
    }

    /// Worker owning an x plane.
    pub fn owner_of_plane(&self, plane: usize) -> usize {
        // starts is sorted; the owner is the last slab starting at or before `plane`
        self.starts.partition_point(|&s| s <= plane) - 1
    }

    /// Worker owning a point.
    pub fn owner_of(&self, index: PointIndex) -> usize {
        self.owner_of_plane(index / (self.n * self.n))
    }

    /// True when any neighbor of the point lives on another worker.
    pub fn is_boundary(&self, lattice: &Lattice, index: PointIndex) -> bool {
        let owner = self.owner_of(index);
        lattice
            .neighbors(index)
            .iter()
            .any(|&n| self.owner_of(n) != owner)
    }
}
