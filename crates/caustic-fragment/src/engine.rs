//! Sequential fragmentation: one forward pass over the ordered events.

use std::sync::Arc;

use caustic_collapse::{CollapseTime, GrowthTable};
use caustic_lattice::Lattice;
use tracing::{debug, info};

use crate::catalog::{FragmentationOutcome, HaloCatalog, Membership};
use crate::decision::{apply, DecisionContext, Policies};
use crate::error::{FragmentError, Result};
use crate::forest::GroupForest;
use crate::group::GroupRecord;
use crate::lightcone::{LightCone, LightConeSettings};
use crate::point::{ordered_events, Geometry, GroupId, PointRecord, PointState};
use crate::policy::{FilamentCriterion, MergeCriterion};

/// Engine parameters shared by the sequential and parallel engines.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentationSettings {
    /// Smallest group emitted as a halo
    pub min_members: usize,
    pub merge: MergeCriterion,
    pub filament: FilamentCriterion,
    /// Output redshifts, any order
    pub outputs: Vec<f64>,
    /// Equal scale-factor spans per run (parallel engine)
    pub batch_count: usize,
    /// Past-light-cone catalog; none when absent
    pub light_cone: Option<LightConeSettings>,
}

impl Default for FragmentationSettings {
    fn default() -> Self {
        Self {
            min_members: 10,
            merge: MergeCriterion::default(),
            filament: FilamentCriterion::default(),
            outputs: vec![0.0],
            batch_count: 16,
            light_cone: None,
        }
    }
}

impl FragmentationSettings {
    pub fn validate(&self) -> Result<()> {
        if self.min_members == 0 {
            return Err(FragmentError::Config("min_members must be at least 1".into()));
        }
        if self.outputs.is_empty() {
            return Err(FragmentError::Config("no output redshifts".into()));
        }
        if let Some(z) = self.outputs.iter().find(|z| !(z.is_finite() && **z >= 0.0)) {
            return Err(FragmentError::Config(format!("invalid output redshift {z}")));
        }
        if self.batch_count == 0 {
            return Err(FragmentError::Config("batch_count must be at least 1".into()));
        }
        if let Some(cone) = &self.light_cone {
            cone.validate()?;
        }
        self.merge.validate()?;
        self.filament.validate()
    }

    /// Distinct output times, earliest first.
    pub fn output_times(&self) -> Vec<CollapseTime> {
        let mut times: Vec<CollapseTime> = self.outputs.iter().map(|&z| CollapseTime::from_redshift(z)).collect();
        times.sort();
        times.dedup();
        times
    }

    pub fn policies(&self) -> Policies {
        Policies::new(self.merge, self.filament)
    }

    /// Validate and build the decision context both engines share.
    pub(crate) fn context(&self, lattice: &Lattice, box_size: f64, growth: Arc<GrowthTable>) -> Result<DecisionContext> {
        self.validate()?;
        let geometry = Geometry {
            n: lattice.size(),
            box_size,
        };
        let light_cone = match self.light_cone {
            Some(cone) => Some(Arc::new(LightCone::new(cone, self.min_members, &growth, &geometry)?)),
            None => None,
        };
        Ok(DecisionContext {
            geometry,
            policies: self.policies(),
            growth,
            light_cone,
        })
    }
}

/// Single-threaded reference engine.
#[derive(Debug, Clone)]
pub struct FragmentationEngine {
    lattice: Arc<Lattice>,
    context: DecisionContext,
    settings: FragmentationSettings,
}

impl FragmentationEngine {
    pub fn new(
        lattice: Arc<Lattice>,
        box_size: f64,
        growth: Arc<GrowthTable>,
        settings: FragmentationSettings,
    ) -> Result<Self> {
        let context = settings.context(&lattice, box_size, growth)?;
        Ok(Self {
            lattice,
            context,
            settings,
        })
    }

    /// Replace the configured predicates with custom ones.
    pub fn with_policies(mut self, policies: Policies) -> Self {
        self.context.policies = policies;
        self
    }

    pub fn settings(&self) -> &FragmentationSettings {
        &self.settings
    }

    pub fn run(&self, mut points: Vec<PointRecord>) -> Result<FragmentationOutcome> {
        check_points(&self.lattice, &points)?;
        let outputs = self.settings.output_times();
        let last = outputs[outputs.len() - 1];
        let events = ordered_events(&points, last);
        info!(events = events.len(), outputs = outputs.len(), "sequential fragmentation started");

        let mut forest = GroupForest::new();
        let mut cursor = 0;
        let mut catalogs = Vec::with_capacity(outputs.len());
        for output in outputs {
            while cursor < events.len() && events[cursor].time <= output {
                self.process(&mut points, &mut forest, events[cursor].index)?;
                cursor += 1;
            }
            let catalog = HaloCatalog::assemble(
                output,
                forest.roots(),
                self.settings.min_members,
                cursor,
                points.len(),
                &self.context.growth,
                &self.context.geometry,
            );
            debug!(redshift = catalog.redshift, halos = catalog.len(), "snapshot taken");
            catalogs.push(catalog);
        }

        let light_cone = self.context.light_cone.as_ref().map(|cone| cone.catalog(forest.roots()));
        let membership = finalize(&mut points, self.settings.min_members, |id| {
            let root = forest.find(id)?;
            forest.get(root).map(|g| (root, g.members))
        })?;
        info!(groups = forest.len(), "sequential fragmentation finished");
        Ok(FragmentationOutcome {
            catalogs,
            membership,
            light_cone,
        })
    }

    fn process(&self, points: &mut [PointRecord], forest: &mut GroupForest, index: usize) -> Result<()> {
        points[index].state = PointState::CollapsedFree;
        let roots = touching_roots(&self.lattice, index, |nb| {
            let p = &points[nb];
            match (p.state, p.group) {
                (PointState::Accreted, Some(g)) => Ok(Some(g)),
                (PointState::Accreted, None) => Err(ungrouped(nb)),
                _ => Ok(None),
            }
        })?;
        let mut resolved: Vec<GroupId> = Vec::with_capacity(roots.len());
        for id in roots {
            resolved.push(forest.find(id).ok_or_else(|| unknown_group(id))?);
        }
        resolved.sort_unstable();
        resolved.dedup();

        let decision = {
            let touching = resolved
                .iter()
                .map(|r| forest.get(*r).ok_or_else(|| unknown_group(*r)))
                .collect::<Result<Vec<&GroupRecord>>>()?;
            self.context.decide(&points[index], &touching)
        };
        apply(forest, &mut points[index], &decision, &self.context)
    }
}

/// Group ids of a point's grouped neighbors, in neighbor order.
pub(crate) fn touching_roots<F>(lattice: &Lattice, index: usize, mut group_of: F) -> Result<Vec<GroupId>>
where
    F: FnMut(usize) -> Result<Option<GroupId>>,
{
    let mut out = Vec::new();
    for &nb in lattice.neighbors(index) {
        if let Some(g) = group_of(nb)? {
            out.push(g);
        }
    }
    Ok(out)
}

/// Final states: accreted points in undersized groups become filament.
///
/// `resolve` maps a point's group id to its live root and member count.
pub(crate) fn finalize<F>(points: &mut [PointRecord], min_members: usize, mut resolve: F) -> Result<Vec<Membership>>
where
    F: FnMut(GroupId) -> Option<(GroupId, usize)>,
{
    points
        .iter_mut()
        .map(|p| match (p.state, p.group) {
            (PointState::Accreted, Some(g)) => {
                let (root, members) = resolve(g).ok_or_else(|| unknown_group(g))?;
                if members >= min_members {
                    Ok(Membership::Halo(root))
                } else {
                    p.state = PointState::Filament;
                    Ok(Membership::Filament)
                }
            }
            (PointState::Accreted, None) => Err(ungrouped(p.index)),
            (PointState::Filament, _) => Ok(Membership::Filament),
            _ => Ok(Membership::Uncollapsed),
        })
        .collect()
}

pub(crate) fn check_points(lattice: &Lattice, points: &[PointRecord]) -> Result<()> {
    if points.len() != lattice.len() {
        return Err(FragmentError::Config(format!(
            "{} point records for a lattice of {} points",
            points.len(),
            lattice.len()
        )));
    }
    if let Some((i, p)) = points.iter().enumerate().find(|(i, p)| p.index != *i) {
        return Err(FragmentError::Invariant(format!("point record {} stored at slot {i}", p.index)));
    }
    Ok(())
}

pub(crate) fn unknown_group(id: GroupId) -> FragmentError {
    FragmentError::Invariant(format!("group {id} is unknown"))
}

pub(crate) fn ungrouped(index: usize) -> FragmentError {
    FragmentError::Invariant(format!("accreted point {index} has no group"))
}
