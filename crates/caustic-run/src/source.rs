//! Where the linear density field comes from.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use caustic_field::{wavenumber, Complex64, FieldStore, SpectralTransform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Density source named in the parameter file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum FieldSource {
    /// Raw little-endian `f64` density contrast at `a = 1`, `n³` values in
    /// lattice index order
    RealSpaceFile { path: PathBuf },
    /// Gaussian random field with `P(k) = amplitude · k^spectral_index`
    Synthetic {
        seed: u64,
        amplitude: f64,
        spectral_index: f64,
    },
}

impl FieldSource {
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::RealSpaceFile { path } if path.as_os_str().is_empty() => {
                Err(Error::Config("empty density file path".into()))
            }
            Self::RealSpaceFile { .. } => Ok(()),
            Self::Synthetic {
                amplitude,
                spectral_index,
                ..
            } => {
                if !(amplitude.is_finite() && *amplitude > 0.0) {
                    return Err(Error::Config(format!("synthetic amplitude must be positive, got {amplitude}")));
                }
                if !spectral_index.is_finite() {
                    return Err(Error::Config(format!("invalid spectral index {spectral_index}")));
                }
                Ok(())
            }
        }
    }

    /// Build the field store for an `n³` box of side `box_size`.
    pub fn load(&self, n: usize, box_size: f64, transform: Arc<dyn SpectralTransform>) -> Result<FieldStore> {
        match self {
            Self::RealSpaceFile { path } => {
                let density = read_density(path, n)?;
                Ok(FieldStore::from_real_density(n, box_size, &density, transform)?)
            }
            Self::Synthetic {
                seed,
                amplitude,
                spectral_index,
            } => {
                let modes = synthetic_modes(n, box_size, *seed, *amplitude, *spectral_index, transform.as_ref())?;
                Ok(FieldStore::from_fourier(n, box_size, modes, transform)?)
            }
        }
    }
}

/// Read `n³` little-endian `f64` values.
pub fn read_density(path: &Path, n: usize) -> Result<Vec<f64>> {
    let bytes = std::fs::read(path)?;
    let expected = n * n * n * std::mem::size_of::<f64>();
    if bytes.len() != expected {
        return Err(Error::Config(format!(
            "{} holds {} bytes, expected {expected} for a {n}³ grid",
            path.display(),
            bytes.len()
        )));
    }
    let density: Vec<f64> = bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect();
    if let Some(i) = density.iter().position(|d| !d.is_finite()) {
        return Err(Error::Config(format!("{}: non-finite density at point {i}", path.display())));
    }
    debug!(path = %path.display(), n, "density file read");
    Ok(density)
}

/// Fourier modes of a Gaussian random field, unnormalized forward convention.
///
/// White noise is drawn in real space so the modes are Hermitian by
/// construction, then shaped by `sqrt(P(k) n³ / V)`. The mean mode is zero.
pub fn synthetic_modes(
    n: usize,
    box_size: f64,
    seed: u64,
    amplitude: f64,
    spectral_index: f64,
    transform: &dyn SpectralTransform,
) -> Result<Vec<Complex64>> {
    let volume = n * n * n;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut modes: Vec<Complex64> = (0..volume)
        .map(|_| {
            let sample: f64 = StandardNormal.sample(&mut rng);
            Complex64::new(sample, 0.0)
        })
        .collect();
    transform.forward(&mut modes)?;

    let scale = volume as f64 / box_size.powi(3);
    for (index, mode) in modes.iter_mut().enumerate() {
        let k = [index / (n * n), (index / n) % n, index % n].map(|m| wavenumber(m, n, box_size));
        let k2 = k.iter().map(|c| c * c).sum::<f64>();
        if k2 == 0.0 {
            *mode = Complex64::new(0.0, 0.0);
            continue;
        }
        let power = amplitude * k2.sqrt().powf(spectral_index);
        *mode *= (power * scale).sqrt();
    }
    debug!(n, seed, amplitude, spectral_index, "synthetic field generated");
    Ok(modes)
}
