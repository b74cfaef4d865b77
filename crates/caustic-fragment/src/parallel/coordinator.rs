//! Coordinator of the slab-parallel engine.
//!
//! The run is split into batches of scale factor. Inside a batch every
//! worker advances through its own events until it meets one that sits on
//! a slab edge or touches a shared group. The coordinator then repeatedly
//! takes the earliest such event over all workers, resolves it against the
//! shared forest and lets its owner continue. Groups touched by a resolved
//! event move into the shared forest for good, so local and shared groups
//! never overlap and every group sees its events in global order.

use std::collections::BTreeMap;
use std::sync::Arc;

use caustic_collapse::{CollapseTime, GrowthTable};
use caustic_lattice::{Lattice, Partition, PointIndex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::message::{Command, Status, WorkerHandle};
use super::worker::{run_worker, Worker};
use crate::catalog::{FragmentationOutcome, HaloCatalog, Membership};
use crate::decision::{apply, DecisionContext, Policies};
use crate::engine::{check_points, finalize, unknown_group, FragmentationSettings};
use crate::error::{FragmentError, Result};
use crate::forest::GroupForest;
use crate::group::GroupRecord;
use crate::lightcone::LightConeCatalog;
use crate::point::{GroupId, PointRecord, PointState};

/// Queued commands per worker.
const COMMAND_QUEUE: usize = 16;

/// Stops a running (or future) parallel run.
///
/// Once aborted, the engine that issued the handle stays aborted. A failed
/// run aborts its engine the same way.
#[derive(Debug, Clone)]
pub struct AbortHandle(Arc<watch::Sender<bool>>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.0.borrow()
    }
}

/// Fragmentation across slab workers, identical in outcome to
/// [`FragmentationEngine`](crate::FragmentationEngine) for any worker count.
#[derive(Debug, Clone)]
pub struct ParallelEngine {
    lattice: Arc<Lattice>,
    partition: Arc<Partition>,
    context: DecisionContext,
    settings: FragmentationSettings,
    abort: Arc<watch::Sender<bool>>,
}

impl ParallelEngine {
    pub fn new(
        lattice: Arc<Lattice>,
        box_size: f64,
        growth: Arc<GrowthTable>,
        settings: FragmentationSettings,
        workers: usize,
    ) -> Result<Self> {
        let context = settings.context(&lattice, box_size, growth)?;
        let partition = Partition::new(lattice.size(), workers)?;
        let (abort, _) = watch::channel(false);
        Ok(Self {
            lattice,
            partition: Arc::new(partition),
            context,
            settings,
            abort: Arc::new(abort),
        })
    }

    pub fn with_policies(mut self, policies: Policies) -> Self {
        self.context.policies = policies;
        self
    }

    pub fn workers(&self) -> usize {
        self.partition.workers()
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle(Arc::clone(&self.abort))
    }

    fn aborted(&self) -> bool {
        *self.abort.borrow()
    }

    pub async fn run(&self, points: Vec<PointRecord>) -> Result<FragmentationOutcome> {
        check_points(&self.lattice, &points)?;
        if self.aborted() {
            return Err(FragmentError::Aborted);
        }
        let outputs = self.settings.output_times();
        let last = outputs[outputs.len() - 1];
        let batches = batch_ends(&outputs, self.settings.batch_count);
        info!(
            workers = self.workers(),
            batches = batches.len(),
            outputs = outputs.len(),
            "parallel fragmentation started"
        );

        let (handles, tasks) = self.spawn(points, last);
        let result = self.coordinate(&handles, &outputs, &batches).await;
        if let Err(e) = &result {
            warn!(error = %e, "parallel fragmentation failed, aborting workers");
            self.abort.send_replace(true);
        }
        drop(handles);

        let mut joined = Ok(());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "worker task failed");
                joined = Err(FragmentError::Communication(format!("worker task failed: {e}")));
            }
        }
        let outcome = result?;
        joined?;
        info!(halos = outcome.final_catalog().map_or(0, HaloCatalog::len), "parallel fragmentation finished");
        Ok(outcome)
    }

    fn spawn(&self, points: Vec<PointRecord>, until: CollapseTime) -> (Vec<WorkerHandle>, Vec<JoinHandle<()>>) {
        let mut remaining = points;
        let mut handles = Vec::with_capacity(self.workers());
        let mut tasks = Vec::with_capacity(self.workers());
        for slab in self.partition.slabs() {
            let tail = remaining.split_off(slab.len());
            let own = std::mem::replace(&mut remaining, tail);
            let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
            handles.push(WorkerHandle::new(slab.worker, tx));
            let worker = Worker::new(
                slab,
                Arc::clone(&self.lattice),
                Arc::clone(&self.partition),
                self.context.clone(),
                own,
                until,
            );
            tasks.push(tokio::spawn(run_worker(worker, rx, self.abort.subscribe())));
        }
        (handles, tasks)
    }

    async fn coordinate(
        &self,
        handles: &[WorkerHandle],
        outputs: &[CollapseTime],
        batches: &[CollapseTime],
    ) -> Result<FragmentationOutcome> {
        let mut shared = GroupForest::new();
        let mut catalogs = Vec::with_capacity(outputs.len());
        let mut light_cone = None;
        for (batch, &until) in batches.iter().enumerate() {
            self.drain(batch, until, handles, &mut shared).await?;
            if outputs.contains(&until) {
                let (catalog, cone) = self.snapshot(until, handles, &shared).await?;
                catalogs.push(catalog);
                light_cone = cone;
            }
        }
        let membership = self.finish(handles, &mut shared).await?;
        Ok(FragmentationOutcome {
            catalogs,
            membership,
            light_cone,
        })
    }

    /// Run one batch until no worker has a blocked event left in it.
    async fn drain(
        &self,
        batch: usize,
        until: CollapseTime,
        handles: &[WorkerHandle],
        shared: &mut GroupForest,
    ) -> Result<()> {
        let mut replies = Vec::with_capacity(handles.len());
        for handle in handles {
            replies.push(handle.request(|reply| Command::Advance { until, reply }).await?);
        }
        let mut statuses: Vec<Status> = Vec::with_capacity(handles.len());
        for reply in replies {
            statuses.push(reply.await??);
        }

        // each round retires one event
        let budget = statuses.iter().map(|s| s.pending).sum::<usize>() + 1;
        let mut rounds = 0;
        loop {
            if self.aborted() {
                return Err(FragmentError::Aborted);
            }
            let next = statuses
                .iter()
                .enumerate()
                .filter_map(|(w, s)| s.blocked.as_ref().map(|p| (p.event(), w)))
                .min();
            let Some((_, owner)) = next else {
                break;
            };
            rounds += 1;
            if rounds > budget {
                return Err(FragmentError::NoConvergence { batch, rounds: budget });
            }
            let point = statuses[owner]
                .blocked
                .take()
                .ok_or_else(|| FragmentError::Invariant(format!("worker {owner} lost its blocked event")))?;
            self.resolve(point, owner, handles, shared).await?;
            statuses[owner] = handles[owner]
                .call(|reply| Command::Advance { until, reply })
                .await?;
        }
        debug!(batch, until = %until, rounds, shared = shared.len(), "batch drained");
        Ok(())
    }

    /// Decide a blocked event against the shared forest and commit it to
    /// its owner.
    async fn resolve(
        &self,
        mut point: PointRecord,
        owner: usize,
        handles: &[WorkerHandle],
        shared: &mut GroupForest,
    ) -> Result<()> {
        point.state = PointState::CollapsedFree;
        let mut by_owner: BTreeMap<usize, Vec<PointIndex>> = BTreeMap::new();
        for &nb in self.lattice.neighbors(point.index) {
            by_owner.entry(self.partition.owner_of(nb)).or_default().push(nb);
        }

        let mut roots: Vec<GroupId> = Vec::new();
        for (worker, indices) in by_owner {
            let states = handles[worker]
                .call(|reply| Command::Query { indices, reply })
                .await?;
            let mut unshared: Vec<GroupId> = Vec::new();
            for link in states.iter().filter_map(|s| s.link) {
                if !link.detached {
                    unshared.push(link.root);
                }
                roots.push(link.root);
            }
            unshared.sort_unstable();
            unshared.dedup();
            if unshared.is_empty() {
                continue;
            }
            let bytes = handles[worker]
                .call(|reply| Command::Transfer { roots: unshared, reply })
                .await?;
            let records: Vec<GroupRecord> = bincode::deserialize(&bytes)?;
            for record in records {
                shared.insert(record)?;
            }
        }

        let mut resolved = roots
            .into_iter()
            .map(|r| shared.find(r).ok_or_else(|| unknown_group(r)))
            .collect::<Result<Vec<_>>>()?;
        resolved.sort_unstable();
        resolved.dedup();
        let decision = {
            let touching = resolved
                .iter()
                .map(|r| shared.get(*r).ok_or_else(|| unknown_group(*r)))
                .collect::<Result<Vec<&GroupRecord>>>()?;
            self.context.decide(&point, &touching)
        };
        apply(shared, &mut point, &decision, &self.context)?;

        let (event, state, group) = (point.event(), point.state, point.group);
        trace!(worker = handles[owner].id, index = event.index, ?decision, "blocked event resolved");
        handles[owner]
            .call(|reply| Command::Commit {
                event,
                state,
                group,
                reply,
            })
            .await
    }

    /// Catalog at `time` plus the light-cone crossings seen so far. Groups
    /// carrying crossings are never below the minimum size.
    async fn snapshot(
        &self,
        time: CollapseTime,
        handles: &[WorkerHandle],
        shared: &GroupForest,
    ) -> Result<(HaloCatalog, Option<LightConeCatalog>)> {
        let min_members = self.settings.min_members;
        let mut groups = Vec::new();
        let mut collapsed = 0;
        for handle in handles {
            let part = handle
                .call(|reply| Command::Snapshot { min_members, reply })
                .await?;
            groups.extend(part.groups);
            collapsed += part.collapsed;
        }
        let catalog = HaloCatalog::assemble(
            time,
            groups.iter().chain(shared.roots()),
            min_members,
            collapsed,
            self.lattice.len(),
            &self.context.growth,
            &self.context.geometry,
        );
        let cone = self
            .context
            .light_cone
            .as_ref()
            .map(|cone| cone.catalog(groups.iter().chain(shared.roots())));
        debug!(redshift = catalog.redshift, halos = catalog.len(), "snapshot taken");
        Ok((catalog, cone))
    }

    async fn finish(&self, handles: &[WorkerHandle], shared: &mut GroupForest) -> Result<Vec<Membership>> {
        let mut points = Vec::with_capacity(self.lattice.len());
        let mut local_members = BTreeMap::new();
        for handle in handles {
            let part = handle.call(|reply| Command::Finish { reply }).await?;
            points.extend(part.points);
            local_members.extend(part.local_members);
        }
        finalize(&mut points, self.settings.min_members, |id| match local_members.get(&id) {
            Some(&members) => Some((id, members)),
            None => {
                let root = shared.find(id)?;
                shared.get(root).map(|g| (root, g.members))
            }
        })
    }
}

/// Batch end times: every output plus `batch_count` equal steps of scale
/// factor up to the last output, ascending and distinct.
pub(crate) fn batch_ends(outputs: &[CollapseTime], batch_count: usize) -> Vec<CollapseTime> {
    let last = outputs.last().map_or(1.0, |t| t.scale_factor());
    let mut ends: Vec<CollapseTime> = (1..batch_count)
        .map(|k| CollapseTime::from_scale_factor(last * k as f64 / batch_count as f64))
        .chain(outputs.iter().copied())
        .collect();
    ends.sort();
    ends.dedup();
    ends
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{FilamentCriterion, MergeCriterion};
    use crate::testing::{line_points, mixed_points, setup};
    use crate::FragmentationEngine;

    fn settings(merge: MergeCriterion) -> FragmentationSettings {
        FragmentationSettings {
            min_members: 3,
            merge,
            filament: FilamentCriterion::Anisotropy { max_ratio: 0.2 },
            outputs: vec![2.0, 0.5, 0.0],
            batch_count: 5,
            light_cone: None,
        }
    }

    #[test]
    fn batch_ends_include_outputs() {
        let outputs = [CollapseTime::from_scale_factor(0.3), CollapseTime::from_scale_factor(1.0)];
        let ends: Vec<f64> = batch_ends(&outputs, 4).iter().map(|t| t.scale_factor()).collect();
        assert_eq!(ends, vec![0.25, 0.3, 0.5, 0.75, 1.0]);
        assert_eq!(batch_ends(&outputs, 1).len(), 2);
    }

    #[tokio::test]
    async fn matches_sequential_for_any_worker_count() {
        let n = 8;
        let (lattice, growth) = setup(n);
        for merge in [MergeCriterion::Always, MergeCriterion::MassRatio { min_ratio: 0.3 }] {
            let sequential = FragmentationEngine::new(lattice.clone(), 16.0, growth.clone(), settings(merge))
                .unwrap()
                .run(mixed_points(n))
                .unwrap();
            for workers in [1, 2, 3, 4, 8] {
                let parallel = ParallelEngine::new(lattice.clone(), 16.0, growth.clone(), settings(merge), workers)
                    .unwrap()
                    .run(mixed_points(n))
                    .await
                    .unwrap();
                assert_eq!(parallel, sequential, "{workers} workers, {merge:?}");
            }
        }
    }

    #[tokio::test]
    async fn light_cone_matches_sequential() {
        let (lattice, growth) = setup(4);
        let cone = Some(crate::LightConeSettings {
            observer: [2000.0; 3],
            max_redshift: 5.0,
        });
        let settings = FragmentationSettings {
            min_members: 1,
            outputs: vec![1.0, 0.0],
            light_cone: cone,
            ..FragmentationSettings::default()
        };
        let sequential = FragmentationEngine::new(lattice.clone(), 4000.0, growth.clone(), settings.clone())
            .unwrap()
            .run(line_points(4))
            .unwrap();
        assert_eq!(sequential.light_cone.as_ref().map(|c| c.len()), Some(1));
        for workers in [2, 4] {
            let parallel = ParallelEngine::new(lattice.clone(), 4000.0, growth.clone(), settings.clone(), workers)
                .unwrap()
                .run(line_points(4))
                .await
                .unwrap();
            assert_eq!(parallel, sequential, "{workers} workers");
        }

        let n = 8;
        let (lattice, growth) = setup(n);
        let settings = FragmentationSettings {
            light_cone: Some(crate::LightConeSettings {
                observer: [800.0; 3],
                max_redshift: 3.0,
            }),
            ..self::settings(MergeCriterion::Always)
        };
        let sequential = FragmentationEngine::new(lattice.clone(), 1600.0, growth.clone(), settings.clone())
            .unwrap()
            .run(mixed_points(n))
            .unwrap();
        for workers in [3, 8] {
            let parallel = ParallelEngine::new(lattice.clone(), 1600.0, growth.clone(), settings.clone(), workers)
                .unwrap()
                .run(mixed_points(n))
                .await
                .unwrap();
            assert_eq!(parallel, sequential, "{workers} workers");
        }
    }

    #[tokio::test]
    async fn groups_straddling_slabs_merge() {
        let (lattice, growth) = setup(4);
        let settings = FragmentationSettings {
            min_members: 1,
            outputs: vec![0.0],
            ..FragmentationSettings::default()
        };
        let outcome = ParallelEngine::new(lattice, 4.0, growth, settings, 4)
            .unwrap()
            .run(line_points(4))
            .await
            .unwrap();
        let halo = &outcome.final_catalog().unwrap().halos[0];
        assert_eq!((halo.id, halo.member_count), (0, 3));
        assert_eq!(outcome.membership[32], Membership::Halo(0));
    }

    #[tokio::test]
    async fn aborted_engine_refuses_to_run() {
        let (lattice, growth) = setup(4);
        let engine = ParallelEngine::new(lattice, 4.0, growth, FragmentationSettings::default(), 2).unwrap();
        let handle = engine.abort_handle();
        assert!(!handle.is_aborted());
        handle.abort();
        assert!(handle.is_aborted());
        let err = engine.run(line_points(4)).await.unwrap_err();
        assert!(matches!(err, FragmentError::Aborted));
    }

    #[test]
    fn too_many_workers_is_rejected() {
        let (lattice, growth) = setup(4);
        let err = ParallelEngine::new(lattice, 4.0, growth, FragmentationSettings::default(), 5).unwrap_err();
        assert!(matches!(err, FragmentError::Lattice(_)));
    }
}
