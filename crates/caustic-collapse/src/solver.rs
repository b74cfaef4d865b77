//! Per-point collapse prediction for one smoothing radius.

use caustic_field::TensorField;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ellipsoid::{eigenvalues, CollapsePolynomial};
use crate::error::{CollapseError, Result};
use crate::model::PerturbationModel;
use crate::time::CollapseTime;

/// Collapse prediction for one point at one radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointCollapse {
    pub time: CollapseTime,
    /// `F = 1/D_c`, zero when the polynomial has no positive root
    pub inverse_growth: f64,
    /// `λ1 ≥ λ2 ≥ λ3`
    pub eigenvalues: [f64; 3],
}

impl PointCollapse {
    pub const NEVER: Self = Self {
        time: CollapseTime::NEVER,
        inverse_growth: 0.0,
        eigenvalues: [0.0; 3],
    };
}

/// All points of one radius.
#[derive(Debug, Clone)]
pub struct RadiusSweep {
    pub radius: f64,
    pub points: Vec<PointCollapse>,
}

/// Maps deformation tensors to collapse times under a perturbation model.
#[derive(Debug, Clone, Copy)]
pub struct DisplacementSolver<'a> {
    model: &'a PerturbationModel,
}

impl<'a> DisplacementSolver<'a> {
    pub fn new(model: &'a PerturbationModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &PerturbationModel {
        self.model
    }

    /// Collapse time of one point from its tensor components.
    pub fn solve_point(&self, index: usize, radius: f64, components: &[f64; 6]) -> Result<PointCollapse> {
        if components.iter().any(|c| !c.is_finite()) {
            return Err(CollapseError::numeric(index, radius, "tensor component"));
        }
        let l = eigenvalues(components);
        if l.iter().any(|v| !v.is_finite()) {
            return Err(CollapseError::numeric(index, radius, "eigenvalue"));
        }
        if l[0] <= 0.0 {
            return Ok(PointCollapse {
                eigenvalues: l,
                ..PointCollapse::NEVER
            });
        }

        let Some(d_collapse) = CollapsePolynomial::new(self.model.order(), l).first_root() else {
            return Ok(PointCollapse {
                eigenvalues: l,
                ..PointCollapse::NEVER
            });
        };
        let time = match self.model.scale_factor_for(radius, d_collapse) {
            Some(a) if a.is_finite() && a > 0.0 => CollapseTime::from_scale_factor(a),
            Some(a) => {
                return Err(CollapseError::numeric(index, radius, format!("collapse scale factor {a}")))
            }
            None => CollapseTime::NEVER,
        };
        Ok(PointCollapse {
            time,
            inverse_growth: 1.0 / d_collapse,
            eigenvalues: l,
        })
    }

    /// Collapse times of every point for one smoothed tensor field.
    pub fn sweep(&self, tensor: &TensorField) -> Result<RadiusSweep> {
        let radius = tensor.radius;
        let points = (0..tensor.len())
            .into_par_iter()
            .map(|index| self.solve_point(index, radius, &tensor.at(index)))
            .collect::<Result<Vec<_>>>()?;
        let collapsed = points.iter().filter(|p| !p.time.is_never()).count();
        debug!(radius, collapsed, total = points.len(), "radius sweep finished");
        Ok(RadiusSweep { radius, points })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosmology::Cosmology;
    use crate::growth::GrowthTable;
    use crate::model::GrowthModel;
    use caustic_field::LptOrder;

    fn model(order: LptOrder) -> PerturbationModel {
        let eds = Cosmology {
            omega_matter: 1.0,
            omega_lambda: 0.0,
            hubble: 0.7,
        };
        PerturbationModel::new(order, GrowthTable::new(eds).unwrap(), GrowthModel::ScaleIndependent).unwrap()
    }

    #[test]
    fn zeldovich_collapse_in_matter_domination() {
        let m = model(LptOrder::First);
        let solver = DisplacementSolver::new(&m);
        // λ1 = 4 collapses at D = 1/4 = a
        let p = solver.solve_point(0, 1.0, &[4.0, 0.0, 0.0, 1.0, 0.0, -1.0]).unwrap();
        assert!((p.time.scale_factor() - 0.25).abs() < 1e-6);
        assert!((p.inverse_growth - 4.0).abs() < 1e-12);
        assert!((p.eigenvalues[0] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn expanding_and_late_points_never_collapse() {
        let m = model(LptOrder::Second);
        let solver = DisplacementSolver::new(&m);
        let p = solver.solve_point(3, 2.0, &[-0.1, 0.0, 0.0, -0.2, 0.0, -0.3]).unwrap();
        assert!(p.time.is_never());
        // λ1 = 0.5 needs D ≈ 2 > D(1)
        let p = solver.solve_point(3, 2.0, &[0.5, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        assert!(p.time.is_never());
        assert!((p.inverse_growth - 0.5).abs() < 1e-12);
    }

    #[test]
    fn non_finite_tensor_is_fatal() {
        let m = model(LptOrder::First);
        let err = DisplacementSolver::new(&m)
            .solve_point(17, 3.0, &[f64::NAN, 0.0, 0.0, 0.0, 0.0, 0.0])
            .unwrap_err();
        assert!(matches!(err, CollapseError::Numeric { index: 17, .. }));
    }

    #[test]
    fn sweep_covers_every_point() {
        let m = model(LptOrder::Third);
        let tensor = TensorField {
            radius: 1.5,
            components: [
                vec![3.0, -1.0],
                vec![0.0, 0.0],
                vec![0.0, 0.0],
                vec![2.0, -1.0],
                vec![0.0, 0.0],
                vec![1.0, -1.0],
            ],
        };
        let sweep = DisplacementSolver::new(&m).sweep(&tensor).unwrap();
        assert_eq!(sweep.radius, 1.5);
        assert_eq!(sweep.points.len(), 2);
        assert!(!sweep.points[0].time.is_never());
        assert!(sweep.points[1].time.is_never());
    }
}
