//! Slab worker: owns the points of one slab and its local group forest.

use std::collections::BTreeMap;
use std::sync::Arc;

use caustic_collapse::CollapseTime;
use caustic_lattice::{Lattice, Partition, PointIndex, Slab};
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

use super::message::{Command, FinishPart, GroupLink, NeighborState, SnapshotPart, Status};
use crate::decision::{apply, DecisionContext};
use crate::engine::{touching_roots, ungrouped, unknown_group};
use crate::error::{FragmentError, Result};
use crate::forest::GroupForest;
use crate::group::GroupRecord;
use crate::point::{ordered_events, Event, GroupId, PointRecord, PointState};

pub(crate) struct Worker {
    slab: Slab,
    lattice: Arc<Lattice>,
    partition: Arc<Partition>,
    context: DecisionContext,
    points: Vec<PointRecord>,
    forest: GroupForest,
    events: Vec<Event>,
    cursor: usize,
}

impl Worker {
    pub(crate) fn new(
        slab: Slab,
        lattice: Arc<Lattice>,
        partition: Arc<Partition>,
        context: DecisionContext,
        points: Vec<PointRecord>,
        until: CollapseTime,
    ) -> Self {
        let events = ordered_events(&points, until);
        Self {
            slab,
            lattice,
            partition,
            context,
            points,
            forest: GroupForest::new(),
            events,
            cursor: 0,
        }
    }

    pub(crate) fn id(&self) -> usize {
        self.slab.worker
    }

    fn point(&self, index: PointIndex) -> Result<&PointRecord> {
        if !self.slab.contains(index) {
            return Err(FragmentError::Invariant(format!(
                "worker {} does not own point {index}",
                self.slab.worker
            )));
        }
        Ok(&self.points[self.slab.local(index)])
    }

    fn point_mut(&mut self, index: PointIndex) -> Result<&mut PointRecord> {
        self.point(index)?;
        let local = self.slab.local(index);
        Ok(&mut self.points[local])
    }

    pub(crate) fn handle(&mut self, command: Command) {
        match command {
            Command::Advance { until, reply } => {
                let _ = reply.send(self.advance(until));
            }
            Command::Query { indices, reply } => {
                let _ = reply.send(self.query(&indices));
            }
            Command::Transfer { roots, reply } => {
                let _ = reply.send(self.transfer(&roots));
            }
            Command::Commit {
                event,
                state,
                group,
                reply,
            } => {
                let _ = reply.send(self.commit(event, state, group));
            }
            Command::Snapshot { min_members, reply } => {
                let _ = reply.send(Ok(self.snapshot(min_members)));
            }
            Command::Finish { reply } => {
                let _ = reply.send(self.finish());
            }
        }
    }

    pub(crate) fn advance(&mut self, until: CollapseTime) -> Result<Status> {
        let pending = self.events[self.cursor..]
            .iter()
            .take_while(|e| e.time <= until)
            .count();
        while let Some(&event) = self.events.get(self.cursor) {
            if event.time > until {
                break;
            }
            if !self.process_local(event.index)? {
                trace!(worker = self.id(), index = event.index, "event blocked");
                let blocked = self.point(event.index)?.clone();
                return Ok(Status {
                    blocked: Some(blocked),
                    pending,
                });
            }
            self.cursor += 1;
        }
        Ok(Status { blocked: None, pending })
    }

    /// Decide an event locally when it cannot see another slab or a shared
    /// group. Returns false, leaving everything untouched, otherwise.
    fn process_local(&mut self, index: PointIndex) -> Result<bool> {
        if self.partition.is_boundary(&self.lattice, index) {
            return Ok(false);
        }
        let lattice = Arc::clone(&self.lattice);
        let grouped = touching_roots(&lattice, index, |nb| {
            let p = self.point(nb)?;
            match (p.state, p.group) {
                (PointState::Accreted, Some(g)) => Ok(Some(g)),
                (PointState::Accreted, None) => Err(ungrouped(nb)),
                _ => Ok(None),
            }
        })?;
        let mut roots = Vec::with_capacity(grouped.len());
        for id in grouped {
            let root = self.forest.find(id).ok_or_else(|| unknown_group(id))?;
            if self.forest.is_detached(root) {
                return Ok(false);
            }
            roots.push(root);
        }
        roots.sort_unstable();
        roots.dedup();

        let local = self.slab.local(index);
        self.points[local].state = PointState::CollapsedFree;
        let decision = {
            let touching = roots
                .iter()
                .map(|r| self.forest.get(*r).ok_or_else(|| unknown_group(*r)))
                .collect::<Result<Vec<&GroupRecord>>>()?;
            self.context.decide(&self.points[local], &touching)
        };
        apply(&mut self.forest, &mut self.points[local], &decision, &self.context)?;
        Ok(true)
    }

    pub(crate) fn query(&mut self, indices: &[PointIndex]) -> Result<Vec<NeighborState>> {
        indices
            .iter()
            .map(|&index| {
                let (state, group) = {
                    let p = self.point(index)?;
                    (p.state, p.group)
                };
                let link = match (state, group) {
                    (PointState::Accreted, Some(g)) => {
                        let root = self.forest.find(g).ok_or_else(|| unknown_group(g))?;
                        Some(GroupLink {
                            root,
                            detached: self.forest.is_detached(root),
                        })
                    }
                    (PointState::Accreted, None) => return Err(ungrouped(index)),
                    _ => None,
                };
                Ok(NeighborState { index, state, link })
            })
            .collect()
    }

    pub(crate) fn transfer(&mut self, roots: &[GroupId]) -> Result<Vec<u8>> {
        let mut records = Vec::with_capacity(roots.len());
        for &root in roots {
            if self.forest.root_of(root) != Some(root) {
                return Err(FragmentError::Invariant(format!("group {root} is not a local root")));
            }
            records.push(self.forest.detach(root)?);
        }
        debug!(worker = self.id(), groups = records.len(), "groups handed to coordinator");
        Ok(bincode::serialize(&records)?)
    }

    pub(crate) fn commit(&mut self, event: Event, state: PointState, group: Option<GroupId>) -> Result<()> {
        if self.events.get(self.cursor) != Some(&event) {
            return Err(FragmentError::Invariant(format!(
                "worker {} got a commit for point {} out of order",
                self.slab.worker, event.index
            )));
        }
        if let Some(g) = group {
            self.forest.insert_detached(g);
        }
        let point = self.point_mut(event.index)?;
        point.state = state;
        point.group = group;
        self.cursor += 1;
        Ok(())
    }

    pub(crate) fn snapshot(&self, min_members: usize) -> SnapshotPart {
        SnapshotPart {
            groups: self
                .forest
                .roots()
                .filter(|g| g.members >= min_members)
                .cloned()
                .collect(),
            collapsed: self.cursor,
        }
    }

    pub(crate) fn finish(&mut self) -> Result<FinishPart> {
        let mut points = std::mem::take(&mut self.points);
        for p in &mut points {
            if let (PointState::Accreted, Some(g)) = (p.state, p.group) {
                p.group = Some(self.forest.find(g).ok_or_else(|| unknown_group(g))?);
            }
        }
        let local_members = self.forest.roots().map(|g| (g.id, g.members)).collect::<BTreeMap<_, _>>();
        Ok(FinishPart { points, local_members })
    }
}

/// Worker task body: serve commands until the channel closes or an abort
/// is observed.
pub(crate) async fn run_worker(mut worker: Worker, mut commands: mpsc::Receiver<Command>, abort: watch::Receiver<bool>) {
    debug!(worker = worker.id(), points = worker.points.len(), events = worker.events.len(), "worker started");
    while let Some(command) = commands.recv().await {
        if *abort.borrow() {
            command.fail(FragmentError::Aborted);
            debug!(worker = worker.id(), "worker aborted");
            return;
        }
        worker.handle(command);
    }
    debug!(worker = worker.id(), "worker stopped");
}
