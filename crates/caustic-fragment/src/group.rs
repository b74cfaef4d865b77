//! Group records with O(1) running sums.

use caustic_collapse::{CollapseTime, Kinematics};
use caustic_field::Displacement;
use serde::{Deserialize, Serialize};

use crate::lightcone::LightConeHalo;
use crate::point::{Geometry, GroupId, PointRecord};

/// One absorption in a group's history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergeEvent {
    /// Id of the absorbed group
    pub absorbed: GroupId,
    /// Collapse time of the point that triggered the merge
    pub time: CollapseTime,
    /// Members the absorbed group brought along
    pub absorbed_members: usize,
}

/// A growing halo candidate.
///
/// Lagrangian positions are summed unwrapped: each new member is taken at
/// the periodic image nearest the current center, so the mean stays
/// meaningful for groups straddling the box edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: GroupId,
    pub members: usize,
    pub sum_q: [f64; 3],
    pub sum_psi1: [f64; 3],
    pub sum_psi2: [f64; 3],
    pub sum_psi3: [f64; 3],
    /// Latest member collapse time
    pub formation: CollapseTime,
    pub history: Vec<MergeEvent>,
    /// Light-cone crossings of this group and of every group it absorbed
    pub crossings: Vec<LightConeHalo>,
}

impl GroupRecord {
    /// Singleton group seeded by `point`; its id is the point's index.
    pub fn seed(point: &PointRecord, geometry: &Geometry) -> Self {
        let d = &point.displacement;
        Self {
            id: point.index,
            members: 1,
            sum_q: geometry.position(point.coord),
            sum_psi1: d.psi1,
            sum_psi2: d.psi2,
            sum_psi3: d.psi3,
            formation: point.time,
            history: Vec::new(),
            crossings: Vec::new(),
        }
    }

    /// Whether this group itself has crossed the light cone.
    pub fn on_light_cone(&self) -> bool {
        self.crossings.iter().any(|c| c.id == self.id)
    }

    /// Mean unwrapped Lagrangian position.
    pub fn lagrangian_center(&self) -> [f64; 3] {
        let n = self.members as f64;
        self.sum_q.map(|s| s / n)
    }

    /// Mean displacement vectors of the members.
    pub fn mean_displacement(&self) -> Displacement {
        let n = self.members as f64;
        Displacement {
            psi1: self.sum_psi1.map(|s| s / n),
            psi2: self.sum_psi2.map(|s| s / n),
            psi3: self.sum_psi3.map(|s| s / n),
        }
    }

    /// Eulerian center of mass at the kinematics' scale factor, wrapped into the box.
    pub fn center_of_mass(&self, kinematics: &Kinematics, geometry: &Geometry) -> [f64; 3] {
        let q = self.lagrangian_center();
        let shift = kinematics.displacement(&self.mean_displacement());
        std::array::from_fn(|i| geometry.wrap(q[i] + shift[i]))
    }

    /// Center-of-mass peculiar velocity in km/s.
    pub fn velocity(&self, kinematics: &Kinematics) -> [f64; 3] {
        kinematics.velocity(&self.mean_displacement())
    }

    /// Add one point. Formation time never decreases.
    pub fn accrete(&mut self, point: &PointRecord, geometry: &Geometry) {
        let center = self.lagrangian_center();
        let q = geometry.position(point.coord);
        let d = &point.displacement;
        for i in 0..3 {
            self.sum_q[i] += center[i] + geometry.min_image(q[i] - center[i]);
            self.sum_psi1[i] += d.psi1[i];
            self.sum_psi2[i] += d.psi2[i];
            self.sum_psi3[i] += d.psi3[i];
        }
        self.members += 1;
        self.formation = self.formation.max(point.time);
    }

    /// Take over every member of `other`, recording the merge at `time`.
    pub fn absorb(&mut self, other: GroupRecord, time: CollapseTime, geometry: &Geometry) {
        let center = self.lagrangian_center();
        let theirs = other.lagrangian_center();
        let m = other.members as f64;
        for i in 0..3 {
            let delta = theirs[i] - center[i];
            let shift = geometry.min_image(delta) - delta;
            self.sum_q[i] += other.sum_q[i] + shift * m;
            self.sum_psi1[i] += other.sum_psi1[i];
            self.sum_psi2[i] += other.sum_psi2[i];
            self.sum_psi3[i] += other.sum_psi3[i];
        }
        self.members += other.members;
        self.formation = self.formation.max(other.formation);
        self.history.push(MergeEvent {
            absorbed: other.id,
            time,
            absorbed_members: other.members,
        });
        self.crossings.extend(other.crossings);
    }
}
