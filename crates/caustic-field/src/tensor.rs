//! Real-space tensor and displacement fields.

/// Independent components of the symmetric deformation tensor, in storage order.
pub const TENSOR_PAIRS: [(usize, usize); 6] = [(0, 0), (0, 1), (0, 2), (1, 1), (1, 2), (2, 2)];

/// Order of Lagrangian perturbation theory used for displacements and collapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LptOrder {
    /// Zel'dovich approximation
    First,
    /// 2LPT
    Second,
    /// 3LPT (dominant term)
    Third,
}

impl LptOrder {
    /// Numeric order.
    pub const fn value(&self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
            Self::Third => 3,
        }
    }
}

impl std::fmt::Display for LptOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::First => write!(f, "Zel'dovich"),
            Self::Second => write!(f, "2LPT"),
            Self::Third => write!(f, "3LPT"),
        }
    }
}

/// The six components `φ_ij` of the deformation tensor at one smoothing radius.
#[derive(Debug, Clone)]
pub struct TensorField {
    /// Smoothing radius the tensor was built with
    pub radius: f64,
    /// Components in `TENSOR_PAIRS` order, each `n³` values
    pub components: [Vec<f64>; 6],
}

impl TensorField {
    /// Number of lattice points.
    pub fn len(&self) -> usize {
        self.components[0].len()
    }

    /// True when the field holds no points.
    pub fn is_empty(&self) -> bool {
        self.components[0].is_empty()
    }

    /// Raw components at one point.
    pub fn at(&self, index: usize) -> [f64; 6] {
        std::array::from_fn(|c| self.components[c][index])
    }

    /// Full symmetric matrix at one point.
    pub fn matrix(&self, index: usize) -> [[f64; 3]; 3] {
        let c = self.at(index);
        [
            [c[0], c[1], c[2]],
            [c[1], c[3], c[4]],
            [c[2], c[4], c[5]],
        ]
    }

    /// Trace (the smoothed linear density) at one point.
    pub fn trace(&self, index: usize) -> f64 {
        let c = self.at(index);
        c[0] + c[3] + c[5]
    }
}

/// Per-point displacement vectors at each perturbative order.
///
/// Orders beyond the computed one are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Displacement {
    pub psi1: [f64; 3],
    pub psi2: [f64; 3],
    pub psi3: [f64; 3],
}

/// Displacement fields over the whole lattice.
#[derive(Debug, Clone)]
pub struct DisplacementField {
    /// Highest order computed
    pub order: LptOrder,
    pub psi1: [Vec<f64>; 3],
    pub psi2: Option<[Vec<f64>; 3]>,
    pub psi3: Option<[Vec<f64>; 3]>,
}

impl DisplacementField {
    /// Number of lattice points.
    pub fn len(&self) -> usize {
        self.psi1[0].len()
    }

    /// True when the field holds no points.
    pub fn is_empty(&self) -> bool {
        self.psi1[0].is_empty()
    }

    /// Displacement vectors at one point.
    pub fn at(&self, index: usize) -> Displacement {
        let pick = |field: &Option<[Vec<f64>; 3]>| {
            field
                .as_ref()
                .map(|f| [f[0][index], f[1][index], f[2][index]])
                .unwrap_or_default()
        };
        Displacement {
            psi1: [self.psi1[0][index], self.psi1[1][index], self.psi1[2][index]],
            psi2: pick(&self.psi2),
            psi3: pick(&self.psi3),
        }
    }
}
