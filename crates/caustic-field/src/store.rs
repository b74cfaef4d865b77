//! Fourier-space density storage and derived fields.

use std::sync::Arc;

use num_complex::Complex64;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{allocate, FieldError, Result};
use crate::kernels::{gaussian_window, wavevector};
use crate::tensor::{DisplacementField, LptOrder, TensorField, TENSOR_PAIRS};
use crate::transform::SpectralTransform;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const I: Complex64 = Complex64::new(0.0, 1.0);

/// Linear density field `δ(k)` at `a = 1` plus lattice geometry.
///
/// The store is immutable once built; every derived field is freshly
/// allocated so several radii can be processed independently.
#[derive(Debug, Clone)]
pub struct FieldStore {
    n: usize,
    box_size: f64,
    density_k: Vec<Complex64>,
    transform: Arc<dyn SpectralTransform>,
}

impl FieldStore {
    /// Build from a real-space density contrast laid out `(x·n + y)·n + z`.
    pub fn from_real_density(
        n: usize,
        box_size: f64,
        density: &[f64],
        transform: Arc<dyn SpectralTransform>,
    ) -> Result<Self> {
        Self::check_geometry(n, box_size, transform.as_ref())?;
        let volume = n * n * n;
        if density.len() != volume {
            return Err(FieldError::DimensionMismatch {
                expected: volume,
                actual: density.len(),
            });
        }
        let mut grid = allocate("density modes", volume, ZERO)?;
        grid.par_iter_mut()
            .zip(density.par_iter())
            .for_each(|(g, &d)| *g = Complex64::new(d, 0.0));
        transform.forward(&mut grid)?;
        debug!(n, box_size, "density moved to Fourier space");
        Ok(Self {
            n,
            box_size,
            density_k: grid,
            transform,
        })
    }

    /// Build from Fourier modes in the unnormalized forward convention.
    pub fn from_fourier(
        n: usize,
        box_size: f64,
        modes: Vec<Complex64>,
        transform: Arc<dyn SpectralTransform>,
    ) -> Result<Self> {
        Self::check_geometry(n, box_size, transform.as_ref())?;
        let volume = n * n * n;
        if modes.len() != volume {
            return Err(FieldError::DimensionMismatch {
                expected: volume,
                actual: modes.len(),
            });
        }
        Ok(Self {
            n,
            box_size,
            density_k: modes,
            transform,
        })
    }

    fn check_geometry(n: usize, box_size: f64, transform: &dyn SpectralTransform) -> Result<()> {
        if n < 2 {
            return Err(FieldError::InvalidGeometry(format!("grid size {n} below 2")));
        }
        if !(box_size.is_finite() && box_size > 0.0) {
            return Err(FieldError::InvalidGeometry(format!("box size {box_size}")));
        }
        if transform.size() != n {
            return Err(FieldError::InvalidGeometry(format!(
                "transform planned for {} points per side, grid has {n}",
                transform.size()
            )));
        }
        Ok(())
    }

    /// Points per side.
    pub fn size(&self) -> usize {
        self.n
    }

    /// Box side in Mpc/h.
    pub fn box_size(&self) -> f64 {
        self.box_size
    }

    /// Lattice spacing in Mpc/h.
    pub fn cell_size(&self) -> f64 {
        self.box_size / self.n as f64
    }

    /// Total number of points.
    pub fn len(&self) -> usize {
        self.density_k.len()
    }

    pub fn is_empty(&self) -> bool {
        self.density_k.is_empty()
    }

    /// Fourier modes of the linear density.
    pub fn density_k(&self) -> &[Complex64] {
        &self.density_k
    }

    /// Real-space variance of the density smoothed at `radius` (mean excluded).
    pub fn variance(&self, radius: f64) -> f64 {
        let (n, box_size) = (self.n, self.box_size);
        let sum: f64 = self
            .density_k
            .par_iter()
            .enumerate()
            .skip(1)
            .map(|(index, mode)| {
                let (k, _) = wavevector(index, n, box_size);
                let w = gaussian_window(norm2(k), radius);
                mode.norm_sqr() * w * w
            })
            .sum();
        let volume = self.len() as f64;
        sum / (volume * volume)
    }

    /// Deformation tensor `φ_ij` of the density smoothed at `radius`.
    pub fn tensor(&self, radius: f64) -> Result<TensorField> {
        let (n, box_size) = (self.n, self.box_size);
        let mut components: [Vec<f64>; 6] = Default::default();
        for (slot, &(i, j)) in TENSOR_PAIRS.iter().enumerate() {
            let grid = self.spectral_grid(|index, mode| {
                let (k, _) = wavevector(index, n, box_size);
                let k2 = norm2(k);
                if k2 == 0.0 {
                    return ZERO;
                }
                mode * (k[i] * k[j] / k2 * gaussian_window(k2, radius))
            })?;
            components[slot] = self.to_real(grid)?;
            debug!(radius, component = ?(i, j), "tensor component ready");
        }
        info!(radius, "deformation tensor computed");
        Ok(TensorField { radius, components })
    }

    /// Unsmoothed LPT displacement fields up to `order`.
    pub fn displacements(&self, order: LptOrder) -> Result<DisplacementField> {
        let psi1 = self.potential_gradient(&self.density_k, -1.0)?;
        let (mut psi2, mut psi3) = (None, None);

        if order >= LptOrder::Second {
            let tensor = self.tensor(0.0)?;
            let source = self.source_modes(&tensor, second_order_source)?;
            psi2 = Some(self.potential_gradient(&source, 1.0)?);
            if order >= LptOrder::Third {
                let source = self.source_modes(&tensor, determinant_source)?;
                psi3 = Some(self.potential_gradient(&source, 1.0)?);
            }
        }
        info!(%order, "displacement fields computed");
        Ok(DisplacementField {
            order,
            psi1,
            psi2,
            psi3,
        })
    }

    /// `sign · ∇φ` where `∇²φ = source`, i.e. `-sign · i k source / k²`.
    fn potential_gradient(&self, source: &[Complex64], sign: f64) -> Result<[Vec<f64>; 3]> {
        let (n, box_size) = (self.n, self.box_size);
        let mut out: [Vec<f64>; 3] = Default::default();
        for (axis, slot) in out.iter_mut().enumerate() {
            let grid = self.spectral_grid(|index, _| {
                let (k, nyquist) = wavevector(index, n, box_size);
                let k2 = norm2(k);
                if k2 == 0.0 || nyquist[axis] {
                    return ZERO;
                }
                source[index] * I * (-sign * k[axis] / k2)
            })?;
            *slot = self.to_real(grid)?;
        }
        Ok(out)
    }

    /// Forward transform of a point-wise function of the tensor.
    fn source_modes(
        &self,
        tensor: &TensorField,
        f: fn(&[f64; 6]) -> f64,
    ) -> Result<Vec<Complex64>> {
        let mut grid = allocate("source modes", self.len(), ZERO)?;
        grid.par_iter_mut()
            .enumerate()
            .for_each(|(index, g)| *g = Complex64::new(f(&tensor.at(index)), 0.0));
        self.transform.forward(&mut grid)?;
        debug!("source term moved to Fourier space");
        Ok(grid)
    }

    fn spectral_grid<F>(&self, f: F) -> Result<Vec<Complex64>>
    where
        F: Fn(usize, Complex64) -> Complex64 + Sync,
    {
        let mut grid = allocate("spectral scratch", self.len(), ZERO)?;
        grid.par_iter_mut()
            .enumerate()
            .for_each(|(index, g)| *g = f(index, self.density_k[index]));
        Ok(grid)
    }

    fn to_real(&self, mut grid: Vec<Complex64>) -> Result<Vec<f64>> {
        self.transform.inverse(&mut grid)?;
        Ok(grid.into_par_iter().map(|v| v.re).collect())
    }
}

fn norm2(k: [f64; 3]) -> f64 {
    k[0] * k[0] + k[1] * k[1] + k[2] * k[2]
}

/// `Σ_{i<j} (φ_ii φ_jj - φ_ij²)`
fn second_order_source(c: &[f64; 6]) -> f64 {
    c[0] * c[3] + c[0] * c[5] + c[3] * c[5] - c[1] * c[1] - c[2] * c[2] - c[4] * c[4]
}

/// `det φ_ij`
fn determinant_source(c: &[f64; 6]) -> f64 {
    c[0] * (c[3] * c[5] - c[4] * c[4]) - c[1] * (c[1] * c[5] - c[4] * c[2])
        + c[2] * (c[1] * c[4] - c[3] * c[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::RustFftTransform;
    use std::f64::consts::PI;

    const N: usize = 8;

    fn plane_wave(amplitude: f64) -> Vec<f64> {
        // box of side N so the cell size is 1
        let k = 2.0 * PI / N as f64;
        let mut density = Vec::with_capacity(N * N * N);
        for x in 0..N {
            for _ in 0..N * N {
                density.push(amplitude * (k * x as f64).cos());
            }
        }
        density
    }

    fn store(density: &[f64]) -> FieldStore {
        FieldStore::from_real_density(N, N as f64, density, Arc::new(RustFftTransform::new(N)))
            .unwrap()
    }

    #[test]
    fn tensor_trace_is_density() {
        let density = plane_wave(0.5);
        let tensor = store(&density).tensor(0.0).unwrap();
        for (index, &d) in density.iter().enumerate() {
            assert!((tensor.trace(index) - d).abs() < 1e-12);
            assert!((tensor.at(index)[0] - d).abs() < 1e-12);
            assert!(tensor.at(index)[3].abs() < 1e-12);
        }
    }

    #[test]
    fn first_order_displacement_of_plane_wave() {
        let amplitude = 0.5;
        let k = 2.0 * PI / N as f64;
        let field = store(&plane_wave(amplitude))
            .displacements(LptOrder::First)
            .unwrap();
        for x in 0..N {
            let index = x * N * N;
            let expected = -amplitude / k * (k * x as f64).sin();
            let d = field.at(index);
            assert!((d.psi1[0] - expected).abs() < 1e-12, "x={x}");
            assert!(d.psi1[1].abs() < 1e-12 && d.psi1[2].abs() < 1e-12);
        }
        assert!(field.psi2.is_none());
    }

    #[test]
    fn plane_wave_has_no_higher_order_source() {
        let field = store(&plane_wave(0.3))
            .displacements(LptOrder::Third)
            .unwrap();
        assert!(field.psi2.as_ref().unwrap()[0].iter().all(|v| v.abs() < 1e-12));
        assert!(field.psi3.as_ref().unwrap()[0].iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn smoothing_lowers_variance() {
        let s = store(&plane_wave(1.0));
        assert!((s.variance(0.0) - 0.5).abs() < 1e-12);
        assert!(s.variance(2.0) < s.variance(0.0));
    }

    #[test]
    fn sources_match_invariants() {
        // diag(1, 2, 3)
        let c = [1.0, 0.0, 0.0, 2.0, 0.0, 3.0];
        assert_eq!(second_order_source(&c), 11.0);
        assert_eq!(determinant_source(&c), 6.0);
        let c = [2.0, 1.0, 0.0, 2.0, 0.0, 1.0];
        assert_eq!(determinant_source(&c), 3.0);
    }

    #[test]
    fn rejects_bad_geometry() {
        let fft: Arc<dyn SpectralTransform> = Arc::new(RustFftTransform::new(4));
        let err = FieldStore::from_real_density(N, 8.0, &plane_wave(1.0), fft.clone()).unwrap_err();
        assert!(matches!(err, FieldError::InvalidGeometry(_)));
        let err = FieldStore::from_real_density(4, 8.0, &[0.0; 10], fft.clone()).unwrap_err();
        assert!(matches!(err, FieldError::DimensionMismatch { expected: 64, actual: 10 }));
        let err = FieldStore::from_fourier(4, -1.0, vec![ZERO; 64], fft).unwrap_err();
        assert!(matches!(err, FieldError::InvalidGeometry(_)));
    }
}
