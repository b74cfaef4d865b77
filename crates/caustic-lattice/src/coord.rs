//! Lattice coordinates with periodic wrap-around.
//!
//! Coordinates are signed so that neighbor offsets can be added freely;
//! `wrap` folds any coordinate back into `[0, n)` along every axis.

use std::ops::{Add, Neg, Sub};

use crate::PointIndex;

/// A position (or offset) on the cubic lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LatticeCoord {
    /// Slab axis (slowest varying in the index)
    pub x: i64,
    pub y: i64,
    /// Fastest varying axis
    pub z: i64,
}

impl LatticeCoord {
    /// Origin of the lattice.
    pub const ORIGIN: Self = Self { x: 0, y: 0, z: 0 };

    /// Create a new coordinate.
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// Fold the coordinate into the periodic box `[0, n)³`.
    pub fn wrap(&self, n: usize) -> Self {
        let n = n as i64;
        Self {
            x: self.x.rem_euclid(n),
            y: self.y.rem_euclid(n),
            z: self.z.rem_euclid(n),
        }
    }

    /// Linear index of the (wrapped) coordinate.
    pub fn to_index(&self, n: usize) -> PointIndex {
        let w = self.wrap(n);
        ((w.x as usize * n) + w.y as usize) * n + w.z as usize
    }

    /// Coordinate of a linear index.
    pub fn from_index(index: PointIndex, n: usize) -> Self {
        let z = index % n;
        let y = (index / n) % n;
        let x = index / (n * n);
        Self::new(x as i64, y as i64, z as i64)
    }

    /// Number of non-zero components of an offset.
    pub fn rank(&self) -> usize {
        [self.x, self.y, self.z].iter().filter(|c| **c != 0).count()
    }

    /// Position in box units given the cell size.
    pub fn position(&self, cell_size: f64) -> [f64; 3] {
        [
            self.x as f64 * cell_size,
            self.y as f64 * cell_size,
            self.z as f64 * cell_size,
        ]
    }
}

impl Add for LatticeCoord {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl Sub for LatticeCoord {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

impl Neg for LatticeCoord {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }
}

impl std::fmt::Display for LatticeCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}
