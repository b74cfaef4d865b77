//! Error types for caustic-run.
//!
//! Crate errors are folded into the run-level categories where one
//! applies (configuration, resources, numerics, communication); the rest
//! keep their source error.

use caustic_collapse::CollapseError;
use caustic_field::FieldError;
use caustic_fragment::FragmentError;
use caustic_lattice::LatticeError;
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad parameter file or override, found before any heavy work
    #[error("configuration error: {0}")]
    Config(String),

    /// A lattice-sized buffer could not be allocated
    #[error("resource error: {0}")]
    Resource(String),

    /// Non-finite value while predicting collapse times
    #[error("numeric error: {0}")]
    Numeric(String),

    /// Fragmentation workers stopped answering or were aborted
    #[error("communication error: {0}")]
    Communication(String),

    #[error(transparent)]
    Lattice(#[from] LatticeError),

    #[error(transparent)]
    Field(FieldError),

    #[error(transparent)]
    Collapse(CollapseError),

    #[error(transparent)]
    Fragment(FragmentError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Process exit code for the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            _ => 1,
        }
    }
}

impl From<FieldError> for Error {
    fn from(e: FieldError) -> Self {
        match e {
            FieldError::Resource { .. } => Error::Resource(e.to_string()),
            FieldError::DimensionMismatch { .. } | FieldError::InvalidGeometry(_) => Error::Config(e.to_string()),
            other => Error::Field(other),
        }
    }
}

impl From<CollapseError> for Error {
    fn from(e: CollapseError) -> Self {
        match e {
            CollapseError::Numeric { .. } => Error::Numeric(e.to_string()),
            CollapseError::Config(msg) => Error::Config(msg),
            CollapseError::Field(inner) => inner.into(),
            other => Error::Collapse(other),
        }
    }
}

impl From<FragmentError> for Error {
    fn from(e: FragmentError) -> Self {
        match e {
            FragmentError::Config(msg) => Error::Config(msg),
            FragmentError::Communication(_) | FragmentError::Aborted => Error::Communication(e.to_string()),
            FragmentError::Lattice(inner) => inner.into(),
            other => Error::Fragment(other),
        }
    }
}
