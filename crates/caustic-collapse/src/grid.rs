//! Scale-dependent growth from an external table.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CollapseError, Result};
use crate::growth::invert_row;

/// On-disk layout of a scale-dependent growth table.
///
/// `growth[k_index][a_index]` is the linear growth factor of mode `k`
/// (h/Mpc) at scale factor `a`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrowthGridFile {
    pub wavenumbers: Vec<f64>,
    pub scale_factors: Vec<f64>,
    pub growth: Vec<Vec<f64>>,
}

/// Growth factor `D(k, a)` with bilinear lookup in `(ln k, ln a)`.
#[derive(Debug, Clone)]
pub struct GrowthGrid {
    ln_k: Vec<f64>,
    ln_a: Vec<f64>,
    growth: Vec<Vec<f64>>,
}

impl GrowthGrid {
    /// Load and validate a JSON table.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let grid = Self::from_json_str(&text)?;
        info!(
            path = %path.display(),
            wavenumbers = grid.ln_k.len(),
            scale_factors = grid.ln_a.len(),
            "loaded scale-dependent growth table"
        );
        Ok(grid)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Self::from_file(serde_json::from_str(text)?)
    }

    pub fn from_file(file: GrowthGridFile) -> Result<Self> {
        let GrowthGridFile {
            wavenumbers,
            scale_factors,
            growth,
        } = file;
        let bad = |msg: String| Err(CollapseError::Config(format!("growth table: {msg}")));

        if wavenumbers.len() < 2 || scale_factors.len() < 2 {
            return bad("need at least two wavenumbers and two scale factors".into());
        }
        if !strictly_increasing_positive(&wavenumbers) {
            return bad("wavenumbers must be positive and strictly increasing".into());
        }
        if !strictly_increasing_positive(&scale_factors) {
            return bad("scale factors must be positive and strictly increasing".into());
        }
        if scale_factors[scale_factors.len() - 1] < 1.0 {
            return bad("scale factors must reach a = 1".into());
        }
        if growth.len() != wavenumbers.len() {
            return bad(format!(
                "{} growth rows for {} wavenumbers",
                growth.len(),
                wavenumbers.len()
            ));
        }
        for (k, row) in growth.iter().enumerate() {
            if row.len() != scale_factors.len() {
                return bad(format!("row {k} has {} entries", row.len()));
            }
            if !strictly_increasing_positive(row) {
                return bad(format!("row {k} is not strictly increasing in a"));
            }
        }

        Ok(Self {
            ln_k: wavenumbers.iter().map(|k| k.ln()).collect(),
            ln_a: scale_factors.iter().map(|a| a.ln()).collect(),
            growth,
        })
    }

    /// Wavenumber representing smoothing radius `radius`.
    ///
    /// `k = 1/R`; the unsmoothed field uses the largest tabulated wavenumber.
    pub fn wavenumber_for_radius(&self, radius: f64) -> f64 {
        if radius > 0.0 {
            1.0 / radius
        } else {
            self.ln_k[self.ln_k.len() - 1].exp()
        }
    }

    /// `D(k, a)`; both axes clamp to the table range.
    pub fn growth(&self, k: f64, a: f64) -> f64 {
        let (ik, tk) = bracket(&self.ln_k, k.ln());
        let (ia, ta) = bracket(&self.ln_a, a.ln());
        let lerp = |row: &[f64]| row[ia] + ta * (row[ia + 1] - row[ia]);
        let lo = lerp(&self.growth[ik]);
        let hi = lerp(&self.growth[ik + 1]);
        lo + tk * (hi - lo)
    }

    /// Scale factor at which mode `k` reaches growth `d`.
    pub fn scale_factor_for(&self, k: f64, d: f64) -> Option<f64> {
        let (ik, tk) = bracket(&self.ln_k, k.ln());
        let row: Vec<f64> = self.growth[ik]
            .iter()
            .zip(&self.growth[ik + 1])
            .map(|(lo, hi)| lo + tk * (hi - lo))
            .collect();
        invert_row(&self.ln_a, &row, d)
    }
}

fn strictly_increasing_positive(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite() && *v > 0.0) && values.windows(2).all(|w| w[0] < w[1])
}

/// Lower node and interpolation weight for `x` on an increasing axis.
fn bracket(axis: &[f64], x: f64) -> (usize, f64) {
    let last = axis.len() - 1;
    if !(x > axis[0]) {
        return (0, 0.0);
    }
    if x >= axis[last] {
        return (last - 1, 1.0);
    }
    let i = axis.partition_point(|&v| v <= x).clamp(1, last);
    (i - 1, (x - axis[i - 1]) / (axis[i] - axis[i - 1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> GrowthGridFile {
        // small scales grow 20% faster than large ones
        GrowthGridFile {
            wavenumbers: vec![0.01, 1.0],
            scale_factors: vec![0.1, 0.5, 1.0],
            growth: vec![vec![0.1, 0.5, 1.0], vec![0.12, 0.6, 1.2]],
        }
    }

    #[test]
    fn lookups_interpolate_and_clamp() {
        let grid = GrowthGrid::from_file(table()).unwrap();
        assert!((grid.growth(0.01, 0.5) - 0.5).abs() < 1e-12);
        assert!((grid.growth(1.0, 1.0) - 1.2).abs() < 1e-12);
        assert!((grid.growth(0.1, 1.0) - 1.1).abs() < 1e-12);
        assert!((grid.growth(1e3, 2.0) - 1.2).abs() < 1e-12);
        assert!((grid.growth(1e-6, 0.01) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn inversion_depends_on_scale() {
        let grid = GrowthGrid::from_file(table()).unwrap();
        let large = grid.scale_factor_for(0.01, 0.5).unwrap();
        let small = grid.scale_factor_for(1.0, 0.5).unwrap();
        assert!((large - 0.5).abs() < 1e-12);
        assert!(small < large);
        assert_eq!(grid.scale_factor_for(0.01, 1.1), None);
        assert!(grid.scale_factor_for(1.0, 1.1).is_some());
    }

    #[test]
    fn radius_maps_to_wavenumber() {
        let grid = GrowthGrid::from_file(table()).unwrap();
        assert_eq!(grid.wavenumber_for_radius(4.0), 0.25);
        assert!((grid.wavenumber_for_radius(0.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_malformed_tables() {
        let mut t = table();
        t.growth[1][2] = 0.5;
        assert!(matches!(GrowthGrid::from_file(t), Err(CollapseError::Config(_))));

        let mut t = table();
        t.scale_factors = vec![0.1, 0.5, 0.9];
        assert!(GrowthGrid::from_file(t).is_err());

        let mut t = table();
        t.growth.pop();
        assert!(GrowthGrid::from_file(t).is_err());

        assert!(matches!(
            GrowthGrid::from_json_str("{\"wavenumbers\": []}"),
            Err(CollapseError::Parse(_))
        ));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("growth.json");
        std::fs::write(&path, serde_json::to_string(&table()).unwrap()).unwrap();
        let grid = GrowthGrid::from_path(&path).unwrap();
        assert!((grid.growth(1.0, 0.5) - 0.6).abs() < 1e-12);

        let missing = GrowthGrid::from_path(dir.path().join("absent.json"));
        assert!(matches!(missing, Err(CollapseError::Io(_))));
    }
}
