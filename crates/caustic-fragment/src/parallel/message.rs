//! Commands exchanged between the coordinator and slab workers.
//!
//! Every command carries a oneshot reply channel; a worker answers each
//! command exactly once, with `Err(FragmentError::Aborted)` after an abort.

use std::collections::BTreeMap;

use caustic_collapse::CollapseTime;
use caustic_lattice::PointIndex;
use tokio::sync::{mpsc, oneshot};

use crate::error::{FragmentError, Result};
use crate::group::GroupRecord;
use crate::point::{Event, GroupId, PointRecord, PointState};

pub(crate) type Reply<T> = oneshot::Sender<Result<T>>;

#[derive(Debug)]
pub(crate) enum Command {
    /// Process local events up to `until`, stopping at the first one that
    /// needs the coordinator.
    Advance { until: CollapseTime, reply: Reply<Status> },
    /// Report the state of owned points.
    Query {
        indices: Vec<PointIndex>,
        reply: Reply<Vec<NeighborState>>,
    },
    /// Hand local roots over to the shared forest, bincode-encoded.
    Transfer { roots: Vec<GroupId>, reply: Reply<Vec<u8>> },
    /// Record the coordinator's decision for the blocked event.
    Commit {
        event: Event,
        state: PointState,
        group: Option<GroupId>,
        reply: Reply<()>,
    },
    /// Local groups of at least `min_members` and the processed count.
    Snapshot { min_members: usize, reply: Reply<SnapshotPart> },
    /// Local points with groups resolved to local roots.
    Finish { reply: Reply<FinishPart> },
}

impl Command {
    /// Answer the command with an error instead of running it.
    pub(crate) fn fail(self, error: FragmentError) {
        match self {
            Self::Advance { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            Self::Query { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            Self::Transfer { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            Self::Commit { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            Self::Snapshot { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            Self::Finish { reply } => {
                let _ = reply.send(Err(error));
            }
        }
    }
}

/// Where a worker stands after an `Advance`.
#[derive(Debug, Clone)]
pub(crate) struct Status {
    /// First unprocessed event at or before the batch end that touches
    /// the slab boundary or a shared group
    pub blocked: Option<PointRecord>,
    /// Events left in the batch when the advance started
    pub pending: usize,
}

/// A queried point's state and, when accreted, its local root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NeighborState {
    pub index: PointIndex,
    pub state: PointState,
    pub link: Option<GroupLink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GroupLink {
    pub root: GroupId,
    /// The record already lives in the shared forest
    pub detached: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct SnapshotPart {
    pub groups: Vec<GroupRecord>,
    pub collapsed: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct FinishPart {
    pub points: Vec<PointRecord>,
    /// Member counts of roots still held locally
    pub local_members: BTreeMap<GroupId, usize>,
}

/// Coordinator-side handle to one worker task.
#[derive(Debug, Clone)]
pub(crate) struct WorkerHandle {
    pub id: usize,
    commands: mpsc::Sender<Command>,
}

impl WorkerHandle {
    pub(crate) fn new(id: usize, commands: mpsc::Sender<Command>) -> Self {
        Self { id, commands }
    }

    /// Send a command and return the pending reply.
    pub(crate) async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<oneshot::Receiver<Result<T>>> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(make(tx)).await?;
        Ok(rx)
    }

    /// Send a command and wait for its reply.
    pub(crate) async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        self.request(make).await?.await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_worker_is_a_communication_failure() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = WorkerHandle::new(0, tx);
        let err = tokio_test::block_on(handle.call(|reply| Command::Finish { reply })).unwrap_err();
        assert!(matches!(err, FragmentError::Communication(_)));
    }

    #[tokio::test]
    async fn dropped_reply_is_a_communication_failure() {
        let (tx, mut rx) = mpsc::channel(1);
        let handle = WorkerHandle::new(0, tx);
        let pending = handle
            .request(|reply| Command::Snapshot { min_members: 1, reply })
            .await
            .unwrap();
        drop(rx.recv().await);
        assert!(matches!(pending.await, Err(_)));

        let failing = handle.request(|reply| Command::Finish { reply }).await.unwrap();
        rx.recv().await.unwrap().fail(FragmentError::Aborted);
        assert!(matches!(failing.await.unwrap(), Err(FragmentError::Aborted)));
    }
}
