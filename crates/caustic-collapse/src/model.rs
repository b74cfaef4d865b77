//! Perturbation model: LPT order plus growth lookup.

use caustic_field::LptOrder;

use crate::error::{CollapseError, Result};
use crate::grid::GrowthGrid;
use crate::growth::{GrowthTable, Kinematics};

/// How the collapse growth factor is converted to a scale factor.
#[derive(Debug, Clone)]
pub enum GrowthModel {
    /// One `D(a)` for every smoothing radius.
    ScaleIndependent,
    /// `D(k, a)` looked up at `k = 1/R`.
    ScaleDependent(GrowthGrid),
}

/// Physics variant chosen once from configuration.
///
/// The order fixes the collapse polynomial and the highest displacement
/// order; the growth model fixes how collapse growth maps to time. The
/// background table always drives the displacement kinematics.
#[derive(Debug, Clone)]
pub struct PerturbationModel {
    order: LptOrder,
    background: GrowthTable,
    growth: GrowthModel,
}

impl PerturbationModel {
    /// Third order with scale-dependent growth is rejected.
    pub fn new(order: LptOrder, background: GrowthTable, growth: GrowthModel) -> Result<Self> {
        if order == LptOrder::Third && matches!(growth, GrowthModel::ScaleDependent(_)) {
            return Err(CollapseError::Config(
                "third-order LPT cannot be combined with scale-dependent growth".into(),
            ));
        }
        Ok(Self {
            order,
            background,
            growth,
        })
    }

    pub fn order(&self) -> LptOrder {
        self.order
    }

    pub fn background(&self) -> &GrowthTable {
        &self.background
    }

    pub fn growth_model(&self) -> &GrowthModel {
        &self.growth
    }

    pub fn is_scale_dependent(&self) -> bool {
        matches!(self.growth, GrowthModel::ScaleDependent(_))
    }

    /// Scale factor at which growth `d` is reached on smoothing scale `radius`.
    pub fn scale_factor_for(&self, radius: f64, d: f64) -> Option<f64> {
        match &self.growth {
            GrowthModel::ScaleIndependent => self.background.scale_factor_for(d),
            GrowthModel::ScaleDependent(grid) => {
                grid.scale_factor_for(grid.wavenumber_for_radius(radius), d)
            }
        }
    }

    /// Displacement kinematics at scale factor `a`.
    pub fn kinematics(&self, a: f64) -> Kinematics {
        self.background.kinematics(a)
    }

    /// Short description for run banners.
    pub fn describe(&self) -> String {
        let growth = match self.growth {
            GrowthModel::ScaleIndependent => "scale-independent",
            GrowthModel::ScaleDependent(_) => "scale-dependent",
        };
        format!("{} with {growth} growth", self.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosmology::Cosmology;
    use crate::grid::GrowthGridFile;

    fn grid() -> GrowthGrid {
        GrowthGrid::from_file(GrowthGridFile {
            wavenumbers: vec![0.1, 10.0],
            scale_factors: vec![0.01, 1.0],
            growth: vec![vec![0.01, 1.0], vec![0.02, 2.0]],
        })
        .unwrap()
    }

    fn table() -> GrowthTable {
        GrowthTable::new(Cosmology::default()).unwrap()
    }

    #[test]
    fn third_order_rejects_scale_dependent_growth() {
        let err = PerturbationModel::new(LptOrder::Third, table(), GrowthModel::ScaleDependent(grid()));
        assert!(matches!(err, Err(CollapseError::Config(_))));
        assert!(PerturbationModel::new(LptOrder::Second, table(), GrowthModel::ScaleDependent(grid())).is_ok());
        assert!(PerturbationModel::new(LptOrder::Third, table(), GrowthModel::ScaleIndependent).is_ok());
    }

    #[test]
    fn growth_lookup_follows_variant() {
        let plain = PerturbationModel::new(LptOrder::First, table(), GrowthModel::ScaleIndependent).unwrap();
        assert_eq!(plain.scale_factor_for(1.0, 1.0), Some(1.0));
        assert_eq!(plain.scale_factor_for(8.0, 1.5), None);

        let scaled = PerturbationModel::new(LptOrder::First, table(), GrowthModel::ScaleDependent(grid())).unwrap();
        // R = 0.1 maps to k = 10, the fast-growing row
        assert!(scaled.scale_factor_for(0.1, 1.5).is_some());
        assert_eq!(scaled.scale_factor_for(10.0, 1.5), None);
        assert!(scaled.is_scale_dependent());
        assert_eq!(scaled.describe(), "Zel'dovich with scale-dependent growth");
    }
}
