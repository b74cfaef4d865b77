//! Caustic Collapse Times
//!
//! Predicts, for every lattice point, the scale factor at which its mass
//! sheet first orbit-crosses, and reduces the per-radius predictions to
//! one time per point.
//!
//! # Pipeline
//!
//! 1. A [`PerturbationModel`] fixes the LPT order and the growth lookup.
//! 2. The [`DisplacementSolver`] diagonalizes the smoothed deformation
//!    tensor at each point and solves the ellipsoidal-collapse polynomial
//!    for the growth factor `D_c` of first orbit crossing.
//! 3. `D_c` is inverted to a [`CollapseTime`] with the growth table (or the
//!    scale-dependent [`GrowthGrid`] at `k = 1/R`).
//! 4. The [`CollapseTimeSelector`] keeps the earliest time per point,
//!    preferring larger radii inside its tie window.
//!
//! # Collapse Polynomial
//!
//! ```text
//! P(D) = 1 - λ1 D - c2 D² - c3 D³
//! c2 = 3/14 λ1 (λ2 + λ3)                             (2LPT, 3LPT)
//! c3 = 1/3 λ1 λ2 λ3 + 2/63 λ1 ((λ2 + λ3)/2)²          (3LPT)
//! ```
//!
//! `λ1 ≤ 0`, no positive root, or a root beyond `D(a = 1)` means the point
//! never collapses; non-finite values are fatal.

mod cosmology;
mod ellipsoid;
mod error;
mod grid;
mod growth;
mod model;
mod selector;
mod solver;
mod time;

pub use cosmology::{Cosmology, HUBBLE_100};
pub use ellipsoid::{eigenvalues, CollapsePolynomial};
pub use error::{CollapseError, Result};
pub use grid::{GrowthGrid, GrowthGridFile};
pub use growth::{GrowthTable, Kinematics, A_MIN, TABLE_POINTS};
pub use model::{GrowthModel, PerturbationModel};
pub use selector::{Candidate, CollapseField, CollapseRecord, CollapseTimeSelector, Selection};
pub use solver::{DisplacementSolver, PointCollapse, RadiusSweep};
pub use time::CollapseTime;

pub use caustic_field::LptOrder;
