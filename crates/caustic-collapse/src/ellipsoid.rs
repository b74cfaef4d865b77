//! Eigen-analysis and the ellipsoidal-collapse polynomial.

use caustic_field::LptOrder;
use nalgebra::{Matrix3, SymmetricEigen};

/// Newton steps used to polish closed-form roots.
const POLISH_STEPS: usize = 3;

/// Cubic terms smaller than this (relative to the linear term) are dropped.
const CUBIC_CUTOFF: f64 = 1e-14;

/// Ordered eigenvalues `λ1 ≥ λ2 ≥ λ3` of the symmetric tensor.
///
/// Positive eigenvalues are compressive; `λ1` sets the first axis to
/// orbit-cross.
pub fn eigenvalues(components: &[f64; 6]) -> [f64; 3] {
    let c = components;
    let matrix = Matrix3::new(c[0], c[1], c[2], c[1], c[3], c[4], c[2], c[4], c[5]);
    let values = SymmetricEigen::new(matrix).eigenvalues;
    let mut sorted = [values[0], values[1], values[2]];
    sorted.sort_by(|a, b| b.total_cmp(a));
    sorted
}

/// `P(D) = 1 - c1 D - c2 D² - c3 D³`; the first root is the collapse growth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollapsePolynomial {
    pub c1: f64,
    pub c2: f64,
    pub c3: f64,
}

impl CollapsePolynomial {
    /// Coefficients for the given LPT order. The spherical limit reproduces
    /// `1 - δD/3 - (δD)²/21 - 23(δD)³/1701`.
    pub fn new(order: LptOrder, l: [f64; 3]) -> Self {
        let [l1, l2, l3] = l;
        let c1 = l1;
        let c2 = match order {
            LptOrder::First => 0.0,
            LptOrder::Second | LptOrder::Third => 3.0 / 14.0 * l1 * (l2 + l3),
        };
        let c3 = match order {
            LptOrder::Third => {
                let mean = 0.5 * (l2 + l3);
                l1 * l2 * l3 / 3.0 + 2.0 / 63.0 * l1 * mean * mean
            }
            _ => 0.0,
        };
        Self { c1, c2, c3 }
    }

    pub fn eval(&self, d: f64) -> f64 {
        1.0 - d * (self.c1 + d * (self.c2 + d * self.c3))
    }

    fn derivative(&self, d: f64) -> f64 {
        -(self.c1 + d * (2.0 * self.c2 + d * 3.0 * self.c3))
    }

    /// Smallest positive root, if any.
    pub fn first_root(&self) -> Option<f64> {
        let roots = if self.c3 != 0.0 && self.c3.abs() > CUBIC_CUTOFF * self.c1.abs() {
            cubic_roots(self.c3, self.c2, self.c1, -1.0)
        } else if self.c2 != 0.0 {
            quadratic_roots(self.c2, self.c1, -1.0)
        } else if self.c1 != 0.0 {
            vec![1.0 / self.c1]
        } else {
            Vec::new()
        };
        roots
            .into_iter()
            .map(|r| self.polish(r))
            .filter(|r| r.is_finite() && *r > 0.0)
            .min_by(f64::total_cmp)
    }

    fn polish(&self, mut root: f64) -> f64 {
        for _ in 0..POLISH_STEPS {
            let slope = self.derivative(root);
            if slope == 0.0 || !slope.is_finite() {
                break;
            }
            let next = root - self.eval(root) / slope;
            if !next.is_finite() {
                break;
            }
            root = next;
        }
        root
    }
}

/// Real roots of `a x² + b x + c`.
fn quadratic_roots(a: f64, b: f64, c: f64) -> Vec<f64> {
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return Vec::new();
    }
    let q = -0.5 * (b + b.signum() * disc.sqrt());
    if q == 0.0 {
        return vec![0.0];
    }
    vec![q / a, c / q]
}

/// Real roots of `a x³ + b x² + c x + d`.
fn cubic_roots(a: f64, b: f64, c: f64, d: f64) -> Vec<f64> {
    let (b, c, d) = (b / a, c / a, d / a);
    // depressed cubic t³ + p t + q with x = t - b/3
    let shift = b / 3.0;
    let p = c - b * b / 3.0;
    let q = 2.0 * b * b * b / 27.0 - b * c / 3.0 + d;
    let disc = (q / 2.0).powi(2) + (p / 3.0).powi(3);

    if disc > 0.0 {
        let s = disc.sqrt();
        let t = (-q / 2.0 + s).cbrt() + (-q / 2.0 - s).cbrt();
        vec![t - shift]
    } else if p == 0.0 {
        vec![-shift]
    } else {
        let m = 2.0 * (-p / 3.0).sqrt();
        let arg = (3.0 * q / (p * m)).clamp(-1.0, 1.0);
        let theta = arg.acos() / 3.0;
        (0..3)
            .map(|k| m * (theta - 2.0 * std::f64::consts::PI * k as f64 / 3.0).cos() - shift)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eigenvalues_are_sorted_descending() {
        let l = eigenvalues(&[0.2, 0.0, 0.0, 0.9, 0.0, -0.4]);
        for (got, want) in l.iter().zip([0.9, 0.2, -0.4]) {
            assert!((got - want).abs() < 1e-12);
        }

        // [[2,1,0],[1,2,0],[0,0,1]] has eigenvalues 3, 1, 1
        let l = eigenvalues(&[2.0, 1.0, 0.0, 2.0, 0.0, 1.0]);
        assert!((l[0] - 3.0).abs() < 1e-12);
        assert!((l[1] - 1.0).abs() < 1e-12 && (l[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zeldovich_root_is_inverse_eigenvalue() {
        let p = CollapsePolynomial::new(LptOrder::First, [0.5, 0.1, -0.2]);
        assert_eq!(p.first_root(), Some(2.0));
        let expanding = CollapsePolynomial::new(LptOrder::First, [-0.1, -0.2, -0.3]);
        assert_eq!(expanding.first_root(), None);
    }

    #[test]
    fn spherical_limit_coefficients() {
        let delta = 1.2;
        let p = CollapsePolynomial::new(LptOrder::Third, [delta / 3.0; 3]);
        assert!((p.c2 - delta * delta / 21.0).abs() < 1e-14);
        assert!((p.c3 - 23.0 * delta.powi(3) / 1701.0).abs() < 1e-14);
    }

    #[test]
    fn higher_orders_collapse_earlier_for_spheres() {
        let l = [1.0 / 3.0; 3];
        let first = CollapsePolynomial::new(LptOrder::First, l).first_root().unwrap();
        let second = CollapsePolynomial::new(LptOrder::Second, l).first_root().unwrap();
        let third_poly = CollapsePolynomial::new(LptOrder::Third, l);
        let third = third_poly.first_root().unwrap();
        assert!((first - 3.0).abs() < 1e-12);
        // x² + 7x - 21 = 0
        assert!((second - (-7.0 + 133f64.sqrt()) / 2.0).abs() < 1e-12);
        assert!(third < second && second < first);
        assert!(third_poly.eval(third).abs() < 1e-12);
    }

    #[test]
    fn cubic_with_three_real_roots_picks_smallest_positive() {
        // (x - 1)(x - 2)(x + 3) = x³ - 7x + 6
        let mut roots = cubic_roots(1.0, 0.0, -7.0, 6.0);
        roots.sort_by(f64::total_cmp);
        assert_eq!(roots.len(), 3);
        assert!((roots[0] + 3.0).abs() < 1e-12);
        assert!((roots[1] - 1.0).abs() < 1e-12);
        assert!((roots[2] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn quadratic_without_real_roots() {
        // 1 - D + D² never crosses zero
        let p = CollapsePolynomial {
            c1: 1.0,
            c2: -1.0,
            c3: 0.0,
        };
        assert_eq!(p.first_root(), None);
    }
}
