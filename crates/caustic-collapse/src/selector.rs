//! Reduction of per-radius collapse times to one time per point.
//!
//! # Deterministic Selection
//!
//! Every point carries one `(radius, time)` candidate per smoothing radius.
//! The winner is chosen without reference to evaluation order:
//!
//! ```text
//! t_min  = min_r t(r)
//! window = { r : t(r) ≤ t_min + tolerance }
//! winner = argmax_{r ∈ window} (R, -t, -index)
//! ```
//!
//! Larger smoothing radii inside the tolerance window take precedence, so
//! large-scale collapse wins near-ties.

use std::cmp::Ordering;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CollapseError, Result};
use crate::solver::{PointCollapse, RadiusSweep};
use crate::time::CollapseTime;

/// One smoothing radius' prediction for a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub radius_index: usize,
    pub radius: f64,
    pub time: CollapseTime,
}

/// Winning time plus provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub time: CollapseTime,
    /// `None` when the point never collapses at any radius
    pub radius_index: Option<usize>,
}

impl Selection {
    pub const NEVER: Self = Self {
        time: CollapseTime::NEVER,
        radius_index: None,
    };
}

/// Pure earliest-time selector with a larger-radius tie window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollapseTimeSelector {
    tolerance: f64,
}

impl Default for CollapseTimeSelector {
    fn default() -> Self {
        Self { tolerance: 0.0 }
    }
}

impl CollapseTimeSelector {
    /// `tolerance` is in units of scale factor.
    pub fn new(tolerance: f64) -> Result<Self> {
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(CollapseError::Config(format!(
                "tie tolerance must be finite and non-negative, got {tolerance}"
            )));
        }
        Ok(Self { tolerance })
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Select the winning candidate; independent of slice order.
    pub fn select(&self, candidates: &[Candidate]) -> Selection {
        let Some(t_min) = candidates.iter().map(|c| c.time).min() else {
            return Selection::NEVER;
        };
        if t_min.is_never() {
            return Selection::NEVER;
        }
        let limit = t_min.scale_factor() + self.tolerance;
        candidates
            .iter()
            .filter(|c| !c.time.is_never() && c.time.scale_factor() <= limit)
            .max_by(|a, b| precedence(a, b))
            .map(|c| Selection {
                time: c.time,
                radius_index: Some(c.radius_index),
            })
            .unwrap_or(Selection::NEVER)
    }

    /// Combine per-radius sweeps into one record per point.
    ///
    /// Points that never collapse keep the eigenvalues of the last sweep.
    pub fn select_all(&self, sweeps: &[RadiusSweep]) -> Result<CollapseField> {
        let Some(last) = sweeps.last() else {
            return Err(CollapseError::Inconsistent("no radius sweeps".into()));
        };
        let len = last.points.len();
        if let Some(bad) = sweeps.iter().find(|s| s.points.len() != len) {
            return Err(CollapseError::Inconsistent(format!(
                "radius {} has {} points, expected {len}",
                bad.radius,
                bad.points.len()
            )));
        }

        let records: Vec<CollapseRecord> = (0..len)
            .into_par_iter()
            .map(|index| {
                let candidates: Vec<Candidate> = sweeps
                    .iter()
                    .enumerate()
                    .map(|(radius_index, sweep)| Candidate {
                        radius_index,
                        radius: sweep.radius,
                        time: sweep.points[index].time,
                    })
                    .collect();
                let selection = self.select(&candidates);
                let source: &PointCollapse = match selection.radius_index {
                    Some(r) => &sweeps[r].points[index],
                    None => &last.points[index],
                };
                CollapseRecord {
                    time: selection.time,
                    radius_index: selection.radius_index,
                    inverse_growth: source.inverse_growth,
                    eigenvalues: source.eigenvalues,
                }
            })
            .collect();

        let collapsed = records.iter().filter(|r| !r.time.is_never()).count();
        info!(points = len, collapsed, radii = sweeps.len(), "collapse times selected");
        Ok(CollapseField {
            radii: sweeps.iter().map(|s| s.radius).collect(),
            records,
        })
    }
}

/// Larger radius, then earlier time, then lower index.
fn precedence(a: &Candidate, b: &Candidate) -> Ordering {
    a.radius
        .total_cmp(&b.radius)
        .then_with(|| b.time.cmp(&a.time))
        .then_with(|| b.radius_index.cmp(&a.radius_index))
}

/// Selected collapse data for one point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollapseRecord {
    pub time: CollapseTime,
    pub radius_index: Option<usize>,
    pub inverse_growth: f64,
    pub eigenvalues: [f64; 3],
}

/// Per-point selection over the whole lattice, used for diagnostics output
/// and as fragmentation input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollapseField {
    pub radii: Vec<f64>,
    pub records: Vec<CollapseRecord>,
}

impl CollapseField {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of points that collapse before `a = 1`.
    pub fn collapsed(&self) -> usize {
        self.records.iter().filter(|r| !r.time.is_never()).count()
    }
}
