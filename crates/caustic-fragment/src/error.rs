//! Error types for caustic-fragment.

use thiserror::Error;

/// Result type for fragmentation operations.
pub type Result<T> = std::result::Result<T, FragmentError>;

/// Errors raised while building halos.
#[derive(Debug, Error)]
pub enum FragmentError {
    /// Internal bookkeeping reached an impossible state.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// Invalid engine settings.
    #[error("configuration error: {0}")]
    Config(String),

    /// A worker or the coordinator stopped answering.
    #[error("communication failure: {0}")]
    Communication(String),

    /// The run was aborted after a failure elsewhere.
    #[error("fragmentation aborted")]
    Aborted,

    /// A batch did not drain within its round budget.
    #[error("batch {batch} did not converge after {rounds} rounds")]
    NoConvergence { batch: usize, rounds: usize },

    /// A group record could not be encoded or decoded for transfer.
    #[error("group transfer encoding: {0}")]
    Codec(#[from] bincode::Error),

    /// Lattice or partition failure.
    #[error(transparent)]
    Lattice(#[from] caustic_lattice::LatticeError),
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for FragmentError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Self::Communication("worker channel closed".into())
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for FragmentError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Self::Communication("reply dropped".into())
    }
}
