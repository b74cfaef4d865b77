//! Lattice point records, collapse events and box geometry.

use caustic_collapse::{CollapseField, CollapseTime};
use caustic_field::{Displacement, DisplacementField};
use caustic_lattice::{LatticeCoord, PointIndex};
use serde::{Deserialize, Serialize};

/// Group identifier: the global index of the group's seed point.
pub type GroupId = PointIndex;

/// Fragmentation state of one point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointState {
    /// Not collapsed yet (or never)
    Uncollapsed,
    /// Collapsed, decision pending
    CollapsedFree,
    /// Member of a group
    Accreted,
    /// Collapsed outside any halo
    Filament,
}

/// One Lagrangian mass element.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRecord {
    pub index: PointIndex,
    pub coord: LatticeCoord,
    pub time: CollapseTime,
    /// Smoothing radius that produced `time`
    pub radius_index: Option<usize>,
    pub eigenvalues: [f64; 3],
    pub displacement: Displacement,
    pub state: PointState,
    /// Group joined when the point collapsed; resolve through the forest
    pub group: Option<GroupId>,
}

impl PointRecord {
    pub fn new(index: PointIndex, n: usize, time: CollapseTime, eigenvalues: [f64; 3]) -> Self {
        Self {
            index,
            coord: LatticeCoord::from_index(index, n),
            time,
            radius_index: None,
            eigenvalues,
            displacement: Displacement::default(),
            state: PointState::Uncollapsed,
            group: None,
        }
    }

    pub fn with_displacement(mut self, displacement: Displacement) -> Self {
        self.displacement = displacement;
        self
    }

    pub fn event(&self) -> Event {
        Event {
            time: self.time,
            index: self.index,
        }
    }
}

/// Assemble point records from the selected collapse field and the
/// displacement fields.
pub fn build_points(n: usize, collapse: &CollapseField, displacements: &DisplacementField) -> Vec<PointRecord> {
    collapse
        .records
        .iter()
        .enumerate()
        .map(|(index, record)| PointRecord {
            radius_index: record.radius_index,
            ..PointRecord::new(index, n, record.time, record.eigenvalues)
        }
        .with_displacement(displacements.at(index)))
        .collect()
}

/// A collapse event, totally ordered by `(time, index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Event {
    pub time: CollapseTime,
    pub index: PointIndex,
}

/// Events up to scale factor `until`, in processing order.
pub fn ordered_events<'a>(points: impl IntoIterator<Item = &'a PointRecord>, until: CollapseTime) -> Vec<Event> {
    let mut events: Vec<Event> = points
        .into_iter()
        .filter(|p| !p.time.is_never() && p.time <= until)
        .map(PointRecord::event)
        .collect();
    events.sort_unstable();
    events
}

/// Periodic box geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Points per side
    pub n: usize,
    /// Box side in Mpc/h
    pub box_size: f64,
}

impl Geometry {
    pub fn cell_size(&self) -> f64 {
        self.box_size / self.n as f64
    }

    /// Lagrangian position of a lattice point.
    pub fn position(&self, coord: LatticeCoord) -> [f64; 3] {
        coord.position(self.cell_size())
    }

    /// Periodic image of `d` closest to zero.
    pub fn min_image(&self, d: f64) -> f64 {
        d - self.box_size * (d / self.box_size).round()
    }

    /// Fold a position into `[0, L)`.
    pub fn wrap(&self, x: f64) -> f64 {
        let w = x.rem_euclid(self.box_size);
        if w >= self.box_size {
            0.0
        } else {
            w
        }
    }

    /// Minimum-image distance between two positions.
    pub fn distance(&self, a: [f64; 3], b: [f64; 3]) -> f64 {
        (0..3)
            .map(|i| self.min_image(a[i] - b[i]).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}
