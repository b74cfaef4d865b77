//! Scale-independent linear growth and LPT kinematics.

use caustic_field::Displacement;

use crate::cosmology::Cosmology;
use crate::error::{CollapseError, Result};

/// Earliest tabulated scale factor.
pub const A_MIN: f64 = 1e-3;

/// Number of log-spaced table nodes in `[A_MIN, 1]`.
pub const TABLE_POINTS: usize = 1024;

/// Simpson sub-intervals per table step (must be even).
const SIMPSON_STEPS: usize = 4;

/// Linear growth factor `D(a)` normalized to `D(1) = 1`.
///
/// `D(a) = 5Ωm/2 · E(a) ∫₀ᵃ da' / (a' E(a'))³`, tabulated on a log grid.
/// Below [`A_MIN`] the matter-dominated limit `D ∝ a` applies.
#[derive(Debug, Clone)]
pub struct GrowthTable {
    cosmology: Cosmology,
    ln_a: Vec<f64>,
    growth: Vec<f64>,
}

impl GrowthTable {
    pub fn new(cosmology: Cosmology) -> Result<Self> {
        cosmology.validate()?;
        let ln_min = A_MIN.ln();
        let step = -ln_min / (TABLE_POINTS - 1) as f64;
        let ln_a: Vec<f64> = (0..TABLE_POINTS)
            .map(|i| if i + 1 == TABLE_POINTS { 0.0 } else { ln_min + step * i as f64 })
            .collect();

        for &x in &ln_a {
            if cosmology.e_squared(x.exp()) <= 0.0 {
                return Err(CollapseError::Config(format!(
                    "expansion rate vanishes at a = {:.4}",
                    x.exp()
                )));
            }
        }

        // integrand in ln a: a · (a E)^-3
        let integrand = |x: f64| {
            let a = x.exp();
            let ae = a * cosmology.e(a);
            a / (ae * ae * ae)
        };

        let om = cosmology.omega_matter;
        let mut integral = 0.4 * A_MIN.powf(2.5) / om.powf(1.5);
        let mut growth = Vec::with_capacity(TABLE_POINTS);
        for (i, &x) in ln_a.iter().enumerate() {
            if i > 0 {
                integral += simpson(integrand, ln_a[i - 1], x);
            }
            growth.push(2.5 * om * cosmology.e(x.exp()) * integral);
        }

        let today = growth[TABLE_POINTS - 1];
        growth.iter_mut().for_each(|d| *d /= today);
        Ok(Self {
            cosmology,
            ln_a,
            growth,
        })
    }

    pub fn cosmology(&self) -> &Cosmology {
        &self.cosmology
    }

    /// `D(a)`, interpolated in `ln a`. Scale factors past 1 clamp to `D(1)`.
    pub fn growth(&self, a: f64) -> f64 {
        if a <= A_MIN {
            return self.growth[0] * a / A_MIN;
        }
        let x = a.ln();
        if x >= 0.0 {
            return self.growth[TABLE_POINTS - 1];
        }
        let i = self.ln_a.partition_point(|&v| v <= x).clamp(1, TABLE_POINTS - 1);
        let t = (x - self.ln_a[i - 1]) / (self.ln_a[i] - self.ln_a[i - 1]);
        self.growth[i - 1] + t * (self.growth[i] - self.growth[i - 1])
    }

    /// Scale factor at which the growth factor reaches `d`.
    ///
    /// `None` when `d` is not positive or exceeds `D(1)`.
    pub fn scale_factor_for(&self, d: f64) -> Option<f64> {
        invert_row(&self.ln_a, &self.growth, d)
    }

    /// Growth factor and rates at scale factor `a`.
    pub fn kinematics(&self, a: f64) -> Kinematics {
        let d = self.growth(a);
        let omega = self.cosmology.omega_matter_at(a);
        Kinematics {
            scale_factor: a,
            d1: d,
            d2: -3.0 / 7.0 * d * d,
            d3: -1.0 / 3.0 * d * d * d,
            f1: omega.powf(0.6),
            f2: 2.0 * omega.powf(4.0 / 7.0),
            f3: 3.0 * omega.powf(13.0 / 24.0),
            hubble: self.cosmology.hubble_at(a),
        }
    }
}

/// Invert a monotone growth row tabulated against `ln a`.
///
/// Below the first node the growth is taken proportional to `a`; beyond
/// `a = 1` there is no solution.
pub(crate) fn invert_row(ln_a: &[f64], growth: &[f64], d: f64) -> Option<f64> {
    if !(d > 0.0) {
        return None;
    }
    let last = growth.len() - 1;
    if d > growth[last] {
        return None;
    }
    if d <= growth[0] {
        return Some(ln_a[0].exp() * d / growth[0]);
    }
    let i = growth.partition_point(|&g| g < d).clamp(1, last);
    let t = (d - growth[i - 1]) / (growth[i] - growth[i - 1]);
    let a = (ln_a[i - 1] + t * (ln_a[i] - ln_a[i - 1])).exp();
    (a <= 1.0).then_some(a)
}

fn simpson(f: impl Fn(f64) -> f64, lo: f64, hi: f64) -> f64 {
    let h = (hi - lo) / SIMPSON_STEPS as f64;
    let mut sum = f(lo) + f(hi);
    for k in 1..SIMPSON_STEPS {
        let weight = if k % 2 == 1 { 4.0 } else { 2.0 };
        sum += weight * f(lo + h * k as f64);
    }
    sum * h / 3.0
}

/// LPT growth factors and velocity rates at one scale factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics {
    pub scale_factor: f64,
    pub d1: f64,
    pub d2: f64,
    pub d3: f64,
    pub f1: f64,
    pub f2: f64,
    pub f3: f64,
    /// `H(a)` in km/s/(Mpc/h)
    pub hubble: f64,
}

impl Kinematics {
    /// Displacement from the Lagrangian position, `d1ψ1 + d2ψ2 + d3ψ3`.
    pub fn displacement(&self, psi: &Displacement) -> [f64; 3] {
        std::array::from_fn(|i| self.d1 * psi.psi1[i] + self.d2 * psi.psi2[i] + self.d3 * psi.psi3[i])
    }

    /// Peculiar velocity in km/s, `a H (f1 d1 ψ1 + f2 d2 ψ2 + f3 d3 ψ3)`.
    pub fn velocity(&self, psi: &Displacement) -> [f64; 3] {
        let scale = self.scale_factor * self.hubble;
        std::array::from_fn(|i| {
            scale
                * (self.f1 * self.d1 * psi.psi1[i]
                    + self.f2 * self.d2 * psi.psi2[i]
                    + self.f3 * self.d3 * psi.psi3[i])
        })
    }
}
