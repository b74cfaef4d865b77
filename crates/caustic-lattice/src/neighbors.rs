//! Fixed neighbor sets and the read-only adjacency view.
//!
//! The stencil is translation-invariant: every point sees the same offsets,
//! wrapped periodically. On very small lattices different offsets can land
//! on the same point (or on the point itself); those are dropped so each
//! neighbor appears once.

use crate::{
    LatticeCoord, LatticeError, PointIndex, Result, CORNER_NEIGHBORS, EDGE_NEIGHBORS,
    FACE_NEIGHBORS,
};

/// Which cells count as touching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Connectivity {
    /// 6 face-sharing neighbors
    #[default]
    Faces,
    /// 6 faces + 12 edges
    FacesEdges,
    /// Full 26-point stencil
    Full,
}

impl Connectivity {
    /// The 6 face offsets.
    pub const FACE_DIRECTIONS: [LatticeCoord; FACE_NEIGHBORS] = [
        LatticeCoord { x: 1, y: 0, z: 0 },
        LatticeCoord { x: -1, y: 0, z: 0 },
        LatticeCoord { x: 0, y: 1, z: 0 },
        LatticeCoord { x: 0, y: -1, z: 0 },
        LatticeCoord { x: 0, y: 0, z: 1 },
        LatticeCoord { x: 0, y: 0, z: -1 },
    ];

    /// The 12 edge offsets (two non-zero components).
    pub fn edge_directions() -> [LatticeCoord; EDGE_NEIGHBORS] {
        Self::stencil_of_rank(2)
    }

    /// The 8 corner offsets (three non-zero components).
    pub fn corner_directions() -> [LatticeCoord; CORNER_NEIGHBORS] {
        Self::stencil_of_rank(3)
    }

    fn stencil_of_rank<const N: usize>(rank: usize) -> [LatticeCoord; N] {
        let mut result = [LatticeCoord::ORIGIN; N];
        let mut next = 0;
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let offset = LatticeCoord::new(dx, dy, dz);
                    if offset.rank() == rank {
                        result[next] = offset;
                        next += 1;
                    }
                }
            }
        }
        debug_assert_eq!(next, N);
        result
    }

    /// All offsets for this connectivity, faces first.
    pub fn directions(&self) -> Vec<LatticeCoord> {
        let mut dirs = Self::FACE_DIRECTIONS.to_vec();
        if matches!(self, Self::FacesEdges | Self::Full) {
            dirs.extend_from_slice(&Self::edge_directions());
        }
        if matches!(self, Self::Full) {
            dirs.extend_from_slice(&Self::corner_directions());
        }
        dirs
    }
}

impl std::fmt::Display for Connectivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Faces => write!(f, "faces"),
            Self::FacesEdges => write!(f, "faces+edges"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// Read-only adjacency view of a periodic cubic lattice.
///
/// Neighbor lists are stored contiguously (CSR layout) and derived once
/// from `(n, connectivity)`.
#[derive(Debug, Clone)]
pub struct Lattice {
    n: usize,
    connectivity: Connectivity,
    offsets: Vec<usize>,
    neighbors: Vec<PointIndex>,
}

impl Lattice {
    /// Build the adjacency view for `n³` points.
    pub fn new(n: usize, connectivity: Connectivity) -> Result<Self> {
        if n < 2 {
            return Err(LatticeError::GridTooSmall(n));
        }

        let directions = connectivity.directions();
        let total = n * n * n;
        let mut offsets = Vec::with_capacity(total + 1);
        let mut neighbors = Vec::with_capacity(total * directions.len());
        offsets.push(0);

        for index in 0..total {
            let coord = LatticeCoord::from_index(index, n);
            let start = neighbors.len();
            for dir in &directions {
                let neighbor = (coord + *dir).to_index(n);
                if neighbor != index && !neighbors[start..].contains(&neighbor) {
                    neighbors.push(neighbor);
                }
            }
            offsets.push(neighbors.len());
        }

        Ok(Self {
            n,
            connectivity,
            offsets,
            neighbors,
        })
    }

    /// Points per side.
    pub const fn size(&self) -> usize {
        self.n
    }

    /// Total number of points.
    pub const fn len(&self) -> usize {
        self.n * self.n * self.n
    }

    /// A lattice always has at least 8 points.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// The stencil this view was built with.
    pub const fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// Neighbors of a point, in stencil order.
    pub fn neighbors(&self, index: PointIndex) -> &[PointIndex] {
        &self.neighbors[self.offsets[index]..self.offsets[index + 1]]
    }

    /// Coordinate of a point.
    pub fn coord(&self, index: PointIndex) -> LatticeCoord {
        LatticeCoord::from_index(index, self.n)
    }

    /// Index of a (wrapped) coordinate.
    pub fn index(&self, coord: LatticeCoord) -> PointIndex {
        coord.to_index(self.n)
    }
}
