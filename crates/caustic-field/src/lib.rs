//! Caustic Field Store
//!
//! Owns the linear density field in Fourier space and derives, per
//! smoothing radius, the deformation tensor `∂i∂j φ` together with the
//! Lagrangian displacement fields used to place halos.
//!
//! # Conventions
//!
//! - Grid layout matches `caustic-lattice`: index `(x·n + y)·n + z`.
//! - The linear density is normalized to scale factor `a = 1`.
//! - `∇²φ = δ`, so `φ_ij(k) = k_i k_j / k² · δ(k)` and the tensor trace is
//!   the (smoothed) density.
//! - Forward transforms are unnormalized; inverse transforms divide by `n³`.
//!
//! # Transform Service
//!
//! FFT execution is delegated to a [`SpectralTransform`]. The bundled
//! [`RustFftTransform`] runs 1-D rustfft plans along each axis.

mod error;
mod kernels;
mod store;
mod tensor;
mod transform;

pub use error::{FieldError, Result};
pub use kernels::{gaussian_window, wavenumber};
pub use store::FieldStore;
pub use tensor::{Displacement, DisplacementField, LptOrder, TensorField, TENSOR_PAIRS};
pub use transform::{RustFftTransform, SpectralTransform};

pub use num_complex::Complex64;
