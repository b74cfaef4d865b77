//! Wavevectors and filter kernels.

use std::f64::consts::PI;

/// Physical wavenumber of mode `m` along one axis.
///
/// Modes above `n/2` alias to negative frequencies.
pub fn wavenumber(m: usize, n: usize, box_size: f64) -> f64 {
    let signed = if m <= n / 2 { m as f64 } else { m as f64 - n as f64 };
    2.0 * PI / box_size * signed
}

/// Gaussian filter `exp(-k²R²/2)`; radius zero leaves the field untouched.
pub fn gaussian_window(k2: f64, radius: f64) -> f64 {
    if radius <= 0.0 {
        1.0
    } else {
        (-0.5 * k2 * radius * radius).exp()
    }
}

/// Per-axis wave vector components for one Fourier-space index.
///
/// The returned flags mark components sitting on the Nyquist plane, where
/// odd derivatives must vanish.
pub(crate) fn wavevector(index: usize, n: usize, box_size: f64) -> ([f64; 3], [bool; 3]) {
    let mz = index % n;
    let my = (index / n) % n;
    let mx = index / (n * n);
    let nyquist = |m: usize| n % 2 == 0 && m == n / 2;
    (
        [
            wavenumber(mx, n, box_size),
            wavenumber(my, n, box_size),
            wavenumber(mz, n, box_size),
        ],
        [nyquist(mx), nyquist(my), nyquist(mz)],
    )
}
