//! Collapse time as a totally ordered scale factor.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Scale factor at which a point's sheet first orbit-crosses.
///
/// [`CollapseTime::NEVER`] sorts after every finite time. Serialized as an
/// optional number so the sentinel survives JSON.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub struct CollapseTime(f64);

impl CollapseTime {
    /// The point does not collapse before `a = 1`.
    pub const NEVER: Self = Self(f64::INFINITY);

    pub const fn from_scale_factor(a: f64) -> Self {
        Self(a)
    }

    pub fn from_redshift(z: f64) -> Self {
        Self(1.0 / (1.0 + z))
    }

    pub const fn scale_factor(self) -> f64 {
        self.0
    }

    pub fn is_never(self) -> bool {
        self.0 == f64::INFINITY
    }

    /// `1/a - 1`, or `None` for [`CollapseTime::NEVER`].
    pub fn redshift(self) -> Option<f64> {
        (!self.is_never()).then(|| 1.0 / self.0 - 1.0)
    }
}

impl PartialEq for CollapseTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CollapseTime {}

impl PartialOrd for CollapseTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CollapseTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<Option<f64>> for CollapseTime {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::NEVER, Self)
    }
}

impl From<CollapseTime> for Option<f64> {
    fn from(time: CollapseTime) -> Self {
        (!time.is_never()).then_some(time.0)
    }
}

impl std::fmt::Display for CollapseTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.redshift() {
            Some(z) => write!(f, "a={:.5} (z={:.3})", self.0, z),
            None => write!(f, "never"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_sorts_last() {
        let mut times = vec![
            CollapseTime::NEVER,
            CollapseTime::from_scale_factor(0.5),
            CollapseTime::from_scale_factor(0.1),
        ];
        times.sort();
        assert_eq!(times[0].scale_factor(), 0.1);
        assert!(times[2].is_never());
        assert_eq!(CollapseTime::NEVER, CollapseTime::NEVER);
    }

    #[test]
    fn redshift_conversion() {
        let t = CollapseTime::from_redshift(1.0);
        assert_eq!(t.scale_factor(), 0.5);
        assert_eq!(t.redshift(), Some(1.0));
        assert_eq!(CollapseTime::NEVER.redshift(), None);
    }

    #[test]
    fn never_survives_json() {
        let json = serde_json::to_string(&[CollapseTime::NEVER, CollapseTime::from_scale_factor(0.25)]).unwrap();
        assert_eq!(json, "[null,0.25]");
        let back: Vec<CollapseTime> = serde_json::from_str(&json).unwrap();
        assert!(back[0].is_never());
        assert_eq!(back[1].scale_factor(), 0.25);
    }
}
