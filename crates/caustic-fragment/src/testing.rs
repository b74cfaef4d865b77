//! Point fixtures shared by the engine tests.

use std::sync::Arc;

use caustic_collapse::{CollapseTime, Cosmology, GrowthTable};
use caustic_lattice::{Connectivity, Lattice};

use crate::point::PointRecord;

pub(crate) fn setup(n: usize) -> (Arc<Lattice>, Arc<GrowthTable>) {
    let lattice = Lattice::new(n, Connectivity::Faces).unwrap();
    let growth = GrowthTable::new(Cosmology::default()).unwrap();
    (Arc::new(lattice), Arc::new(growth))
}

/// Seeds at (0,0,0) and (2,0,0) and a bridge at (1,0,0) collapsing later.
pub(crate) fn line_points(n: usize) -> Vec<PointRecord> {
    let mut points: Vec<PointRecord> = (0..n * n * n)
        .map(|i| PointRecord::new(i, n, CollapseTime::NEVER, [0.0; 3]))
        .collect();
    let plane = n * n;
    for (index, a) in [(0, 0.2), (2 * plane, 0.3), (plane, 0.6)] {
        if let Some(p) = points.get_mut(index) {
            p.time = CollapseTime::from_scale_factor(a);
            p.eigenvalues = [1.0, 0.6, 0.3];
        }
    }
    points
}

/// Deterministic scatter of collapse times with ties and non-collapsing points.
pub(crate) fn mixed_points(n: usize) -> Vec<PointRecord> {
    (0..n * n * n)
        .map(|i| {
            let bucket = (i * 7919 + 13) % 97;
            let time = if bucket >= 80 {
                CollapseTime::NEVER
            } else {
                CollapseTime::from_scale_factor(0.05 + bucket as f64 / 100.0)
            };
            let eigenvalues = [1.0, (i % 5) as f64 / 5.0, -0.1];
            PointRecord::new(i, n, time, eigenvalues)
        })
        .collect()
}
