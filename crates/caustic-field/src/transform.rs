//! Spectral transform service over the full complex lattice.

use std::sync::Arc;

use num_complex::Complex64;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};
use tracing::trace;

use crate::error::{FieldError, Result};

/// Forward/inverse 3-D transforms over an `n³` complex grid.
///
/// `inverse(forward(x)) == x` up to rounding; the inverse carries the
/// `1/n³` normalization.
pub trait SpectralTransform: Send + Sync + std::fmt::Debug {
    /// Points per side this transform was planned for.
    fn size(&self) -> usize;

    /// In-place forward transform (unnormalized).
    fn forward(&self, grid: &mut [Complex64]) -> Result<()>;

    /// In-place inverse transform (normalized by `1/n³`).
    fn inverse(&self, grid: &mut [Complex64]) -> Result<()>;
}

/// rustfft-backed transform: 1-D plans applied along z, y and x.
pub struct RustFftTransform {
    n: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for RustFftTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RustFftTransform").field("n", &self.n).finish()
    }
}

impl RustFftTransform {
    /// Plan transforms for `n` points per side.
    pub fn new(n: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        Self {
            n,
            forward: planner.plan_fft_forward(n),
            inverse: planner.plan_fft_inverse(n),
        }
    }

    fn check(&self, grid: &[Complex64]) -> Result<()> {
        let expected = self.n * self.n * self.n;
        if grid.len() != expected {
            return Err(FieldError::DimensionMismatch {
                expected,
                actual: grid.len(),
            });
        }
        Ok(())
    }

    fn transform_3d(&self, grid: &mut [Complex64], fft: &Arc<dyn Fft<f64>>) {
        let n = self.n;
        let plane = n * n;

        // z lines are contiguous
        grid.par_chunks_exact_mut(n).for_each(|line| fft.process(line));

        // y lines have stride n inside each x plane
        grid.par_chunks_exact_mut(plane).for_each(|slab| {
            let mut line = vec![Complex64::new(0.0, 0.0); n];
            for z in 0..n {
                for y in 0..n {
                    line[y] = slab[y * n + z];
                }
                fft.process(&mut line);
                for y in 0..n {
                    slab[y * n + z] = line[y];
                }
            }
        });

        // x lines have stride n² across the whole grid
        let source = &*grid;
        let lines: Vec<Vec<Complex64>> = (0..plane)
            .into_par_iter()
            .map(|yz| {
                let mut line: Vec<Complex64> = (0..n).map(|x| source[x * plane + yz]).collect();
                fft.process(&mut line);
                line
            })
            .collect();
        for (yz, line) in lines.into_iter().enumerate() {
            for (x, value) in line.into_iter().enumerate() {
                grid[x * plane + yz] = value;
            }
        }
    }
}

impl SpectralTransform for RustFftTransform {
    fn size(&self) -> usize {
        self.n
    }

    fn forward(&self, grid: &mut [Complex64]) -> Result<()> {
        self.check(grid)?;
        trace!(n = self.n, "forward transform");
        self.transform_3d(grid, &self.forward);
        Ok(())
    }

    fn inverse(&self, grid: &mut [Complex64]) -> Result<()> {
        self.check(grid)?;
        trace!(n = self.n, "inverse transform");
        self.transform_3d(grid, &self.inverse);
        let norm = 1.0 / (grid.len() as f64);
        grid.par_iter_mut().for_each(|v| *v *= norm);
        Ok(())
    }
}
