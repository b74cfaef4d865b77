//! Error types for caustic-collapse.

use thiserror::Error;

/// Result type for collapse-time operations.
pub type Result<T> = std::result::Result<T, CollapseError>;

/// Errors raised while predicting collapse times.
#[derive(Debug, Error)]
pub enum CollapseError {
    /// NaN or infinite value in the tensor, eigenvalues or collapse mapping.
    #[error("non-finite value at point {index} (radius {radius}): {detail}")]
    Numeric {
        index: usize,
        radius: f64,
        detail: String,
    },

    /// Invalid or inconsistent model configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Per-radius sweeps that cannot be combined.
    #[error("inconsistent sweeps: {0}")]
    Inconsistent(String),

    /// Growth table could not be read.
    #[error("growth table I/O: {0}")]
    Io(#[from] std::io::Error),

    /// Growth table is not valid JSON.
    #[error("growth table parse: {0}")]
    Parse(#[from] serde_json::Error),

    /// Field storage or transform failure.
    #[error(transparent)]
    Field(#[from] caustic_field::FieldError),
}

impl CollapseError {
    pub(crate) fn numeric(index: usize, radius: f64, detail: impl Into<String>) -> Self {
        Self::Numeric {
            index,
            radius,
            detail: detail.into(),
        }
    }
}
