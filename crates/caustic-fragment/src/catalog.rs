//! Halo catalogs and final point membership.

use caustic_collapse::{CollapseTime, GrowthTable};
use serde::{Deserialize, Serialize};

use crate::group::{GroupRecord, MergeEvent};
use crate::lightcone::LightConeCatalog;
use crate::point::{Geometry, GroupId};

/// One cataloged halo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaloRecord {
    pub id: GroupId,
    pub member_count: usize,
    /// Eulerian center of mass in Mpc/h
    pub position: [f64; 3],
    /// Center-of-mass peculiar velocity in km/s
    pub velocity: [f64; 3],
    /// Mean (unwrapped) Lagrangian position in Mpc/h
    pub lagrangian_position: [f64; 3],
    /// Scale factor of the latest member collapse
    pub formation_time: f64,
    pub formation_redshift: f64,
    pub merge_history: Vec<MergeEvent>,
}

/// Halos above the minimum size at one output time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaloCatalog {
    pub redshift: f64,
    pub scale_factor: f64,
    /// Ordered by member count (descending), then id
    pub halos: Vec<HaloRecord>,
    pub filament_points: usize,
    pub uncollapsed_points: usize,
    pub total_points: usize,
}

impl HaloCatalog {
    /// Build a catalog from live group records.
    ///
    /// `collapsed` counts every point processed up to `time`; whatever is not
    /// in a cataloged halo counts as filament.
    pub fn assemble<'a>(
        time: CollapseTime,
        groups: impl IntoIterator<Item = &'a GroupRecord>,
        min_members: usize,
        collapsed: usize,
        total_points: usize,
        growth: &GrowthTable,
        geometry: &Geometry,
    ) -> Self {
        let a = time.scale_factor();
        let kinematics = growth.kinematics(a);
        let mut halos: Vec<HaloRecord> = groups
            .into_iter()
            .filter(|g| g.members >= min_members)
            .map(|g| HaloRecord {
                id: g.id,
                member_count: g.members,
                position: g.center_of_mass(&kinematics, geometry),
                velocity: g.velocity(&kinematics),
                lagrangian_position: g.lagrangian_center(),
                formation_time: g.formation.scale_factor(),
                formation_redshift: g.formation.redshift().unwrap_or(f64::INFINITY),
                merge_history: g.history.clone(),
            })
            .collect();
        halos.sort_by(|a, b| b.member_count.cmp(&a.member_count).then(a.id.cmp(&b.id)));

        let in_halos: usize = halos.iter().map(|h| h.member_count).sum();
        Self {
            redshift: time.redshift().unwrap_or(f64::INFINITY),
            scale_factor: a,
            halos,
            filament_points: collapsed.saturating_sub(in_halos),
            uncollapsed_points: total_points.saturating_sub(collapsed),
            total_points,
        }
    }

    pub fn len(&self) -> usize {
        self.halos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.halos.is_empty()
    }

    /// Points inside cataloged halos.
    pub fn halo_points(&self) -> usize {
        self.halos.iter().map(|h| h.member_count).sum()
    }

    /// Hex blake3 digest of the `(id, member_count)` sequence.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for halo in &self.halos {
            hasher.update(&(halo.id as u64).to_le_bytes());
            hasher.update(&(halo.member_count as u64).to_le_bytes());
        }
        hex::encode(hasher.finalize().as_bytes())
    }
}

/// Where a point ended up after the last output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Membership {
    Halo(GroupId),
    Filament,
    Uncollapsed,
}

/// Catalogs for every output plus final point membership.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentationOutcome {
    /// One catalog per distinct output, earliest first
    pub catalogs: Vec<HaloCatalog>,
    pub membership: Vec<Membership>,
    /// Present when a light cone was configured
    pub light_cone: Option<LightConeCatalog>,
}

impl FragmentationOutcome {
    /// Catalog at the last output time.
    pub fn final_catalog(&self) -> Option<&HaloCatalog> {
        self.catalogs.last()
    }

    /// Indices of the members of halo `id`.
    pub fn members_of(&self, id: GroupId) -> Vec<usize> {
        self.membership
            .iter()
            .enumerate()
            .filter(|(_, m)| **m == Membership::Halo(id))
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::PointRecord;
    use caustic_collapse::Cosmology;

    #[test]
    fn catalog_orders_and_counts() {
        let geometry = Geometry { n: 4, box_size: 4.0 };
        let growth = GrowthTable::new(Cosmology::default()).unwrap();
        let seed = |i: usize| {
            GroupRecord::seed(
                &PointRecord::new(i, 4, CollapseTime::from_scale_factor(0.2), [1.0, 0.0, 0.0]),
                &geometry,
            )
        };
        let mut big = seed(7);
        big.members = 5;
        let mut twin = seed(3);
        twin.members = 5;
        let small = seed(1);

        let catalog = HaloCatalog::assemble(
            CollapseTime::from_redshift(0.0),
            [&small, &big, &twin],
            2,
            12,
            64,
            &growth,
            &geometry,
        );
        let ids: Vec<_> = catalog.halos.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![3, 7]);
        assert_eq!(catalog.filament_points, 2);
        assert_eq!(catalog.uncollapsed_points, 52);
        assert_eq!(catalog.halo_points() + catalog.filament_points + catalog.uncollapsed_points, 64);
        assert_eq!(catalog.redshift, 0.0);
        assert_eq!(catalog.fingerprint().len(), 64);
    }

    #[test]
    fn fingerprint_tracks_membership() {
        let empty = HaloCatalog {
            redshift: 0.0,
            scale_factor: 1.0,
            halos: Vec::new(),
            filament_points: 0,
            uncollapsed_points: 0,
            total_points: 0,
        };
        let mut other = empty.clone();
        other.halos.push(HaloRecord {
            id: 1,
            member_count: 2,
            position: [0.0; 3],
            velocity: [0.0; 3],
            lagrangian_position: [0.0; 3],
            formation_time: 0.5,
            formation_redshift: 1.0,
            merge_history: Vec::new(),
        });
        assert_ne!(empty.fingerprint(), other.fingerprint());
    }
}
