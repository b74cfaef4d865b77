//! Error types for caustic-field.

use thiserror::Error;

/// Result type for field operations.
pub type Result<T> = std::result::Result<T, FieldError>;

/// Errors that can occur while storing or transforming fields.
#[derive(Debug, Error)]
pub enum FieldError {
    /// A buffer does not match the lattice volume.
    #[error("field has {actual} values, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A lattice-sized buffer could not be allocated.
    #[error("cannot allocate {what} ({values} values)")]
    Resource { what: &'static str, values: usize },

    /// Box or grid parameters are unusable.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// The transform service failed.
    #[error("transform failed: {0}")]
    Transform(String),
}

/// Allocate a lattice-sized buffer, reporting allocation failure instead of aborting.
pub(crate) fn allocate<T: Clone>(what: &'static str, values: usize, fill: T) -> Result<Vec<T>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(values)
        .map_err(|_| FieldError::Resource { what, values })?;
    buffer.resize(values, fill);
    Ok(buffer)
}
