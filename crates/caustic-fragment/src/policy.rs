//! Pluggable merge and filament criteria.
//!
//! The fragmentation core only asks two questions: does a freshly collapsed
//! point with no grouped neighbor belong to a filament, and should several
//! groups touched by one point fuse. Both are answered by trait objects so
//! criteria can be swapped without touching the event loop. The
//! configuration enums [`MergeCriterion`] and [`FilamentCriterion`]
//! implement the traits for the built-in rules.

use caustic_collapse::CollapseTime;
use serde::{Deserialize, Serialize};

use crate::error::{FragmentError, Result};
use crate::point::{Geometry, GroupId};

/// What the merge predicate knows about one touching group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeCandidate {
    pub id: GroupId,
    pub members: usize,
    pub formation: CollapseTime,
    /// Eulerian center of mass at the triggering event's time
    pub center: [f64; 3],
}

/// Input to a merge decision.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeContext {
    /// Collapse time of the triggering point
    pub time: CollapseTime,
    /// Touching groups; the first is the would-be survivor
    pub candidates: Vec<MergeCandidate>,
    pub geometry: Geometry,
}

impl MergeContext {
    pub fn survivor(&self) -> Option<&MergeCandidate> {
        self.candidates.first()
    }
}

/// Decides whether all groups touching a point fuse.
pub trait MergePolicy: Send + Sync + std::fmt::Debug {
    fn should_merge(&self, context: &MergeContext) -> bool;
}

/// Decides whether an isolated collapsing point is filamentary.
pub trait FilamentPolicy: Send + Sync + std::fmt::Debug {
    fn is_filament(&self, eigenvalues: &[f64; 3]) -> bool;
}

/// Built-in merge rules.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeCriterion {
    /// Every touching set fuses
    #[default]
    Always,
    /// Groups never fuse; the point joins the largest
    Never,
    /// Smallest/largest member ratio at least `min_ratio`
    MassRatio { min_ratio: f64 },
    /// Every center within `factor · R_L` of the largest group's center,
    /// `R_L = cell · members^(1/3)`
    Proximity { factor: f64 },
    /// Formation scale factors within `max_gap` of each other
    Coeval { max_gap: f64 },
}

impl MergeCriterion {
    pub fn validate(&self) -> Result<()> {
        let ok = match *self {
            Self::Always | Self::Never => true,
            Self::MassRatio { min_ratio } => (0.0..=1.0).contains(&min_ratio),
            Self::Proximity { factor } => factor.is_finite() && factor > 0.0,
            Self::Coeval { max_gap } => max_gap.is_finite() && max_gap >= 0.0,
        };
        if ok {
            Ok(())
        } else {
            Err(FragmentError::Config(format!("merge criterion {self:?} out of range")))
        }
    }
}

impl MergePolicy for MergeCriterion {
    fn should_merge(&self, context: &MergeContext) -> bool {
        let candidates = &context.candidates;
        if candidates.len() < 2 {
            return true;
        }
        match *self {
            Self::Always => true,
            Self::Never => false,
            Self::MassRatio { min_ratio } => {
                let largest = candidates.iter().map(|c| c.members).max().unwrap_or(1);
                let smallest = candidates.iter().map(|c| c.members).min().unwrap_or(1);
                smallest as f64 / largest as f64 >= min_ratio
            }
            Self::Proximity { factor } => {
                let Some(main) = context.survivor() else {
                    return true;
                };
                let radius = context.geometry.cell_size() * (main.members as f64).cbrt();
                candidates[1..]
                    .iter()
                    .all(|c| context.geometry.distance(c.center, main.center) <= factor * radius)
            }
            Self::Coeval { max_gap } => {
                let times = candidates.iter().map(|c| c.formation.scale_factor());
                let latest = times.clone().fold(f64::NEG_INFINITY, f64::max);
                let earliest = times.fold(f64::INFINITY, f64::min);
                latest - earliest <= max_gap
            }
        }
    }
}

/// Built-in filament rules.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilamentCriterion {
    /// Isolated points always seed a group
    #[default]
    Never,
    /// Filament when `λ2 ≤ max_ratio · λ1`
    Anisotropy { max_ratio: f64 },
}

impl FilamentCriterion {
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Never => Ok(()),
            Self::Anisotropy { max_ratio } if (0.0..=1.0).contains(&max_ratio) => Ok(()),
            Self::Anisotropy { max_ratio } => Err(FragmentError::Config(format!(
                "anisotropy ratio {max_ratio} outside [0, 1]"
            ))),
        }
    }
}

impl FilamentPolicy for FilamentCriterion {
    fn is_filament(&self, eigenvalues: &[f64; 3]) -> bool {
        match *self {
            Self::Never => false,
            Self::Anisotropy { max_ratio } => eigenvalues[1] <= max_ratio * eigenvalues[0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: GroupId, members: usize, formation: f64, x: f64) -> MergeCandidate {
        MergeCandidate {
            id,
            members,
            formation: CollapseTime::from_scale_factor(formation),
            center: [x, 0.0, 0.0],
        }
    }

    fn context(candidates: Vec<MergeCandidate>) -> MergeContext {
        MergeContext {
            time: CollapseTime::from_scale_factor(0.5),
            candidates,
            geometry: Geometry { n: 10, box_size: 10.0 },
        }
    }

    #[test]
    fn fixed_rules() {
        let ctx = context(vec![candidate(1, 8, 0.3, 0.0), candidate(2, 1, 0.4, 5.0)]);
        assert!(MergeCriterion::Always.should_merge(&ctx));
        assert!(!MergeCriterion::Never.should_merge(&ctx));
    }

    #[test]
    fn mass_ratio() {
        let ctx = context(vec![candidate(1, 8, 0.3, 0.0), candidate(2, 2, 0.4, 0.0)]);
        assert!(MergeCriterion::MassRatio { min_ratio: 0.25 }.should_merge(&ctx));
        assert!(!MergeCriterion::MassRatio { min_ratio: 0.3 }.should_merge(&ctx));
    }

    #[test]
    fn proximity_uses_periodic_distance() {
        // R_L = 1 · 8^(1/3) = 2
        let near = context(vec![candidate(1, 8, 0.3, 0.5), candidate(2, 1, 0.4, 9.0)]);
        assert!(MergeCriterion::Proximity { factor: 1.0 }.should_merge(&near));
        let far = context(vec![candidate(1, 8, 0.3, 0.0), candidate(2, 1, 0.4, 5.0)]);
        assert!(!MergeCriterion::Proximity { factor: 1.0 }.should_merge(&far));
    }

    #[test]
    fn coeval() {
        let ctx = context(vec![candidate(1, 3, 0.30, 0.0), candidate(2, 3, 0.38, 0.0)]);
        assert!(MergeCriterion::Coeval { max_gap: 0.1 }.should_merge(&ctx));
        assert!(!MergeCriterion::Coeval { max_gap: 0.05 }.should_merge(&ctx));
    }

    #[test]
    fn anisotropy_flags_sheets() {
        let rule = FilamentCriterion::Anisotropy { max_ratio: 0.2 };
        assert!(rule.is_filament(&[1.0, 0.1, -0.5]));
        assert!(!rule.is_filament(&[1.0, 0.8, 0.5]));
        assert!(!FilamentCriterion::Never.is_filament(&[1.0, -1.0, -1.0]));
    }

    #[test]
    fn validation_and_config_shape() {
        assert!(MergeCriterion::MassRatio { min_ratio: 1.5 }.validate().is_err());
        assert!(MergeCriterion::Proximity { factor: 0.0 }.validate().is_err());
        assert!(FilamentCriterion::Anisotropy { max_ratio: -0.1 }.validate().is_err());

        let parsed: MergeCriterion = serde_json::from_str(r#"{"proximity":{"factor":0.7}}"#).unwrap();
        assert_eq!(parsed, MergeCriterion::Proximity { factor: 0.7 });
        let parsed: FilamentCriterion = serde_json::from_str(r#""never""#).unwrap();
        assert_eq!(parsed, FilamentCriterion::Never);
    }
}
