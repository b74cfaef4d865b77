//! The per-event decision shared by the sequential engine and the
//! parallel coordinator.

use std::sync::Arc;

use caustic_collapse::GrowthTable;
use tracing::trace;

use crate::error::{FragmentError, Result};
use crate::forest::GroupForest;
use crate::group::GroupRecord;
use crate::lightcone::LightCone;
use crate::point::{Geometry, GroupId, PointRecord, PointState};
use crate::policy::{
    FilamentCriterion, FilamentPolicy, MergeCandidate, MergeContext, MergeCriterion, MergePolicy,
};

/// Outcome of one collapse event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Isolated and filamentary: no group
    Filament,
    /// Isolated: seed a group with the point's index as id
    NewGroup,
    /// Join one existing group
    Accrete { group: GroupId },
    /// Fuse `absorbed` (ascending ids) into `survivor`, then join it
    Merge {
        survivor: GroupId,
        absorbed: Vec<GroupId>,
    },
}

/// Merge and filament predicates in use.
#[derive(Debug, Clone)]
pub struct Policies {
    pub merge: Arc<dyn MergePolicy>,
    pub filament: Arc<dyn FilamentPolicy>,
}

impl Policies {
    pub fn new(merge: MergeCriterion, filament: FilamentCriterion) -> Self {
        Self {
            merge: Arc::new(merge),
            filament: Arc::new(filament),
        }
    }
}

/// Everything a decision depends on besides the point and its groups.
#[derive(Debug, Clone)]
pub struct DecisionContext {
    pub geometry: Geometry,
    pub policies: Policies,
    pub growth: Arc<GrowthTable>,
    /// Crossing test run after every applied event
    pub light_cone: Option<Arc<LightCone>>,
}

impl DecisionContext {
    /// Decide the fate of `point` given the distinct root groups it touches.
    pub fn decide(&self, point: &PointRecord, touching: &[&GroupRecord]) -> Decision {
        match touching {
            [] if self.policies.filament.is_filament(&point.eigenvalues) => Decision::Filament,
            [] => Decision::NewGroup,
            [only] => Decision::Accrete { group: only.id },
            _ => {
                let mut ordered: Vec<&GroupRecord> = touching.to_vec();
                // most members first, lowest id on ties
                ordered.sort_by(|a, b| b.members.cmp(&a.members).then(a.id.cmp(&b.id)));
                let survivor = ordered[0].id;

                let kinematics = self.growth.kinematics(point.time.scale_factor());
                let context = MergeContext {
                    time: point.time,
                    candidates: ordered
                        .iter()
                        .map(|g| MergeCandidate {
                            id: g.id,
                            members: g.members,
                            formation: g.formation,
                            center: g.center_of_mass(&kinematics, &self.geometry),
                        })
                        .collect(),
                    geometry: self.geometry,
                };
                if self.policies.merge.should_merge(&context) {
                    let mut absorbed: Vec<GroupId> = ordered[1..].iter().map(|g| g.id).collect();
                    absorbed.sort_unstable();
                    Decision::Merge { survivor, absorbed }
                } else {
                    Decision::Accrete { group: survivor }
                }
            }
        }
    }
}

/// Apply a decision to `forest`, updating the point's state and group,
/// then check the resulting group against the light cone.
pub fn apply(
    forest: &mut GroupForest,
    point: &mut PointRecord,
    decision: &Decision,
    context: &DecisionContext,
) -> Result<()> {
    let geometry = &context.geometry;
    let missing = |id: GroupId| FragmentError::Invariant(format!("group {id} is not a live root"));
    match decision {
        Decision::Filament => {
            point.state = PointState::Filament;
            point.group = None;
        }
        Decision::NewGroup => {
            forest.insert(GroupRecord::seed(point, geometry))?;
            point.state = PointState::Accreted;
            point.group = Some(point.index);
        }
        Decision::Accrete { group } => {
            forest
                .get_mut(*group)
                .ok_or_else(|| missing(*group))?
                .accrete(point, geometry);
            point.state = PointState::Accreted;
            point.group = Some(*group);
        }
        Decision::Merge { survivor, absorbed } => {
            for &id in absorbed {
                forest.union(*survivor, id, point.time, geometry)?;
            }
            forest
                .get_mut(*survivor)
                .ok_or_else(|| missing(*survivor))?
                .accrete(point, geometry);
            point.state = PointState::Accreted;
            point.group = Some(*survivor);
        }
    }
    if let (Some(cone), Some(id)) = (&context.light_cone, point.group) {
        let group = forest.get_mut(id).ok_or_else(|| missing(id))?;
        cone.observe(group, point.time, &context.growth, geometry);
    }
    trace!(index = point.index, time = %point.time, ?decision, "event applied");
    Ok(())
}
