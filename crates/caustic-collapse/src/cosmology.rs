//! Background cosmology.

use serde::{Deserialize, Serialize};

use crate::error::{CollapseError, Result};

/// Hubble constant in km/s/(Mpc/h).
pub const HUBBLE_100: f64 = 100.0;

/// Homogeneous background: matter and vacuum densities today plus `h`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Cosmology {
    pub omega_matter: f64,
    pub omega_lambda: f64,
    /// Dimensionless Hubble parameter `h`
    pub hubble: f64,
}

impl Default for Cosmology {
    fn default() -> Self {
        Self {
            omega_matter: 0.3,
            omega_lambda: 0.7,
            hubble: 0.7,
        }
    }
}

impl Cosmology {
    /// Reject parameter sets the growth integral cannot handle.
    pub fn validate(&self) -> Result<()> {
        if !(self.omega_matter.is_finite() && self.omega_matter > 0.0) {
            return Err(CollapseError::Config(format!(
                "omega_matter must be positive, got {}",
                self.omega_matter
            )));
        }
        if !(self.omega_lambda.is_finite() && self.omega_lambda >= 0.0) {
            return Err(CollapseError::Config(format!(
                "omega_lambda must be non-negative, got {}",
                self.omega_lambda
            )));
        }
        if !(self.hubble.is_finite() && self.hubble > 0.0) {
            return Err(CollapseError::Config(format!(
                "hubble must be positive, got {}",
                self.hubble
            )));
        }
        Ok(())
    }

    /// Curvature density today.
    pub fn omega_curvature(&self) -> f64 {
        1.0 - self.omega_matter - self.omega_lambda
    }

    /// `E(a)²`; may be non-positive for recollapsing models.
    pub fn e_squared(&self, a: f64) -> f64 {
        self.omega_matter / (a * a * a) + self.omega_curvature() / (a * a) + self.omega_lambda
    }

    /// Dimensionless expansion rate `H(a)/H0`.
    pub fn e(&self, a: f64) -> f64 {
        self.e_squared(a).sqrt()
    }

    /// Matter density parameter at scale factor `a`.
    pub fn omega_matter_at(&self, a: f64) -> f64 {
        self.omega_matter / (a * a * a * self.e_squared(a))
    }

    /// `H(a)` in km/s/(Mpc/h).
    pub fn hubble_at(&self, a: f64) -> f64 {
        HUBBLE_100 * self.e(a)
    }
}
