//! Halos on the past light cone.
//!
//! A group is put on the cone the first time one of its events finds it
//! at least as far from the observer as the comoving distance light has
//! travelled since that scale factor. The box is not replicated, so only
//! the minimum periodic image of each halo is considered. Crossings ride
//! along with the group record and survive merges, which keeps both
//! engines in step.

use caustic_collapse::{CollapseTime, GrowthTable};
use serde::{Deserialize, Serialize};

use crate::error::{FragmentError, Result};
use crate::group::GroupRecord;
use crate::point::{Geometry, GroupId};

/// Speed of light in km/s.
pub const SPEED_OF_LIGHT: f64 = 299_792.458;

/// Nodes of the comoving-distance table.
const CONE_POINTS: usize = 512;

/// Observer position (Mpc/h) and the redshift where the cone starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LightConeSettings {
    pub observer: [f64; 3],
    pub max_redshift: f64,
}

impl LightConeSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.max_redshift.is_finite() && self.max_redshift > 0.0) {
            return Err(FragmentError::Config(format!(
                "light cone max_redshift must be positive, got {}",
                self.max_redshift
            )));
        }
        if self.observer.iter().any(|c| !c.is_finite()) {
            return Err(FragmentError::Config(format!(
                "light cone observer {:?} is not finite",
                self.observer
            )));
        }
        Ok(())
    }
}

/// One halo as it crossed the light cone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightConeHalo {
    pub id: GroupId,
    pub member_count: usize,
    /// Scale factor of the event that found the crossing
    pub crossing_time: f64,
    pub crossing_redshift: f64,
    /// Comoving distance from the observer in Mpc/h
    pub distance: f64,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    pub formation_time: f64,
}

/// Every light-cone crossing of a run, earliest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightConeCatalog {
    pub observer: [f64; 3],
    pub max_redshift: f64,
    pub halos: Vec<LightConeHalo>,
}

impl LightConeCatalog {
    pub fn len(&self) -> usize {
        self.halos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.halos.is_empty()
    }
}

/// Crossing test bound to one cosmology and box.
#[derive(Debug, Clone)]
pub struct LightCone {
    settings: LightConeSettings,
    start: CollapseTime,
    min_members: usize,
    ln_a: Vec<f64>,
    distance: Vec<f64>,
}

impl LightCone {
    /// Tabulate `χ(a) = c/H0 ∫ₐ¹ da' / (a'² E(a'))` from the cone start to today.
    pub fn new(settings: LightConeSettings, min_members: usize, growth: &GrowthTable, geometry: &Geometry) -> Result<Self> {
        settings.validate()?;
        if settings.observer.iter().any(|c| !(0.0..geometry.box_size).contains(c)) {
            return Err(FragmentError::Config(format!(
                "light cone observer {:?} lies outside the box",
                settings.observer
            )));
        }

        let cosmology = growth.cosmology();
        let start = CollapseTime::from_redshift(settings.max_redshift);
        let ln_start = start.scale_factor().ln();
        let step = -ln_start / (CONE_POINTS - 1) as f64;
        let ln_a: Vec<f64> = (0..CONE_POINTS)
            .map(|i| if i + 1 == CONE_POINTS { 0.0 } else { ln_start + step * i as f64 })
            .collect();

        // integrand in ln a: 1 / (a E(a))
        let mut integrand = Vec::with_capacity(CONE_POINTS);
        for &x in &ln_a {
            let a = x.exp();
            let e2 = cosmology.e_squared(a);
            if !(e2 > 0.0) {
                return Err(FragmentError::Config(format!(
                    "expansion rate vanishes at a = {a:.4} inside the light cone"
                )));
            }
            integrand.push(1.0 / (a * e2.sqrt()));
        }

        let hubble_radius = SPEED_OF_LIGHT / caustic_collapse::HUBBLE_100;
        let mut distance = vec![0.0; CONE_POINTS];
        for i in (0..CONE_POINTS - 1).rev() {
            let h = ln_a[i + 1] - ln_a[i];
            distance[i] = distance[i + 1] + 0.5 * h * (integrand[i] + integrand[i + 1]) * hubble_radius;
        }

        Ok(Self {
            settings,
            start,
            min_members,
            ln_a,
            distance,
        })
    }

    pub fn settings(&self) -> &LightConeSettings {
        &self.settings
    }

    /// Earliest time at which crossings are recorded.
    pub fn start(&self) -> CollapseTime {
        self.start
    }

    /// Comoving distance to scale factor `a`, in Mpc/h.
    pub fn comoving_distance(&self, a: f64) -> f64 {
        let x = a.ln();
        if x >= 0.0 {
            return 0.0;
        }
        let last = CONE_POINTS - 1;
        if x <= self.ln_a[0] {
            return self.distance[0];
        }
        let i = self.ln_a.partition_point(|&v| v <= x).clamp(1, last);
        let t = (x - self.ln_a[i - 1]) / (self.ln_a[i] - self.ln_a[i - 1]);
        self.distance[i - 1] + t * (self.distance[i] - self.distance[i - 1])
    }

    /// Record `group` on the cone if it crossed by `time`. Groups below the
    /// minimum size and groups already on the cone are left alone.
    pub fn observe(&self, group: &mut GroupRecord, time: CollapseTime, growth: &GrowthTable, geometry: &Geometry) {
        if time < self.start || time.is_never() || group.members < self.min_members || group.on_light_cone() {
            return;
        }
        let a = time.scale_factor();
        let kinematics = growth.kinematics(a);
        let position = group.center_of_mass(&kinematics, geometry);
        let distance = position
            .iter()
            .zip(&self.settings.observer)
            .map(|(p, o)| geometry.min_image(p - o).powi(2))
            .sum::<f64>()
            .sqrt();
        if distance < self.comoving_distance(a) {
            return;
        }
        group.crossings.push(LightConeHalo {
            id: group.id,
            member_count: group.members,
            crossing_time: a,
            crossing_redshift: time.redshift().unwrap_or(f64::INFINITY),
            distance,
            position,
            velocity: group.velocity(&kinematics),
            formation_time: group.formation.scale_factor(),
        });
    }

    /// Gather the crossings carried by `groups` into a catalog.
    pub fn catalog<'a>(&self, groups: impl IntoIterator<Item = &'a GroupRecord>) -> LightConeCatalog {
        let mut halos: Vec<LightConeHalo> = groups.into_iter().flat_map(|g| g.crossings.iter().cloned()).collect();
        halos.sort_by(|a, b| a.crossing_time.total_cmp(&b.crossing_time).then(a.id.cmp(&b.id)));
        LightConeCatalog {
            observer: self.settings.observer,
            max_redshift: self.settings.max_redshift,
            halos,
        }
    }
}
