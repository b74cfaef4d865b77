//! Union-find over group ids.
//!
//! Every id ever issued stays in the parent map; only roots carry a
//! [`GroupRecord`]. A root may also be *detached*: its record has been
//! handed to another owner (the coordinator's shared forest) and only the
//! id remains as a marker.

use std::collections::{BTreeMap, HashMap};

use caustic_collapse::CollapseTime;

use crate::error::{FragmentError, Result};
use crate::group::GroupRecord;
use crate::point::{Geometry, GroupId};

#[derive(Debug, Clone, Default)]
pub struct GroupForest {
    parent: HashMap<GroupId, GroupId>,
    records: BTreeMap<GroupId, GroupRecord>,
}

impl GroupForest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of roots holding a record.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: GroupId) -> bool {
        self.parent.contains_key(&id)
    }

    /// Register a new root group.
    pub fn insert(&mut self, record: GroupRecord) -> Result<()> {
        let id = record.id;
        if self.parent.contains_key(&id) {
            return Err(FragmentError::Invariant(format!("group {id} already exists")));
        }
        self.parent.insert(id, id);
        self.records.insert(id, record);
        Ok(())
    }

    /// Register a root whose record lives elsewhere.
    pub fn insert_detached(&mut self, id: GroupId) {
        self.parent.entry(id).or_insert(id);
    }

    /// Root of `id` with path compression.
    pub fn find(&mut self, id: GroupId) -> Option<GroupId> {
        let mut root = *self.parent.get(&id)?;
        while let Some(&next) = self.parent.get(&root) {
            if next == root {
                break;
            }
            root = next;
        }
        let mut cursor = id;
        while cursor != root {
            let next = self.parent.insert(cursor, root).unwrap_or(root);
            cursor = next;
        }
        Some(root)
    }

    /// Root of `id` without mutating the forest.
    pub fn root_of(&self, id: GroupId) -> Option<GroupId> {
        let mut root = *self.parent.get(&id)?;
        while let Some(&next) = self.parent.get(&root) {
            if next == root {
                break;
            }
            root = next;
        }
        Some(root)
    }

    pub fn get(&self, root: GroupId) -> Option<&GroupRecord> {
        self.records.get(&root)
    }

    pub fn get_mut(&mut self, root: GroupId) -> Option<&mut GroupRecord> {
        self.records.get_mut(&root)
    }

    /// True when `root` is known but its record has been handed off.
    pub fn is_detached(&self, root: GroupId) -> bool {
        self.parent.get(&root) == Some(&root) && !self.records.contains_key(&root)
    }

    /// Remove a root's record, leaving a detached marker behind.
    pub fn detach(&mut self, root: GroupId) -> Result<GroupRecord> {
        self.records
            .remove(&root)
            .ok_or_else(|| FragmentError::Invariant(format!("group {root} has no local record")))
    }

    /// Merge root `absorbed` into root `survivor`.
    pub fn union(
        &mut self,
        survivor: GroupId,
        absorbed: GroupId,
        time: CollapseTime,
        geometry: &Geometry,
    ) -> Result<()> {
        if survivor == absorbed {
            return Err(FragmentError::Invariant(format!("group {survivor} merged with itself")));
        }
        let taken = self
            .records
            .remove(&absorbed)
            .ok_or_else(|| FragmentError::Invariant(format!("absorbed group {absorbed} is not a root")))?;
        let Some(target) = self.records.get_mut(&survivor) else {
            self.records.insert(absorbed, taken);
            return Err(FragmentError::Invariant(format!("surviving group {survivor} is not a root")));
        };
        target.absorb(taken, time, geometry);
        self.parent.insert(absorbed, survivor);
        Ok(())
    }

    /// Live group records in id order.
    pub fn roots(&self) -> impl Iterator<Item = &GroupRecord> {
        self.records.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::PointRecord;
    use proptest::prelude::*;

    const GEOMETRY: Geometry = Geometry { n: 4, box_size: 4.0 };

    fn singleton(index: usize) -> GroupRecord {
        let point = PointRecord::new(index, 4, CollapseTime::from_scale_factor(0.1 + index as f64 / 100.0), [1.0, 0.0, 0.0]);
        GroupRecord::seed(&point, &GEOMETRY)
    }

    #[test]
    fn union_moves_members_and_history() {
        let mut forest = GroupForest::new();
        forest.insert(singleton(1)).unwrap();
        forest.insert(singleton(5)).unwrap();
        forest.union(1, 5, CollapseTime::from_scale_factor(0.5), &GEOMETRY).unwrap();
        assert_eq!(forest.find(5), Some(1));
        assert_eq!(forest.len(), 1);
        let root = forest.get(1).unwrap();
        assert_eq!(root.members, 2);
        assert!((root.formation.scale_factor() - 0.15).abs() < 1e-12);
        assert_eq!(root.history[0].absorbed, 5);
    }

    #[test]
    fn detached_roots_keep_their_id() {
        let mut forest = GroupForest::new();
        forest.insert(singleton(2)).unwrap();
        forest.insert(singleton(3)).unwrap();
        forest.union(2, 3, CollapseTime::from_scale_factor(0.4), &GEOMETRY).unwrap();
        let record = forest.detach(2).unwrap();
        assert_eq!(record.members, 2);
        assert!(forest.is_detached(2));
        assert_eq!(forest.find(3), Some(2));
        assert!(forest.get(2).is_none());
        assert!(forest.detach(2).is_err());

        forest.insert_detached(9);
        assert!(forest.is_detached(9));
        assert_eq!(forest.root_of(9), Some(9));
    }

    #[test]
    fn invalid_unions_are_rejected() {
        let mut forest = GroupForest::new();
        forest.insert(singleton(0)).unwrap();
        forest.insert(singleton(1)).unwrap();
        assert!(forest.union(0, 0, CollapseTime::NEVER, &GEOMETRY).is_err());
        assert!(forest.union(0, 7, CollapseTime::NEVER, &GEOMETRY).is_err());
        assert!(forest.union(7, 1, CollapseTime::NEVER, &GEOMETRY).is_err());
        // the failed union left group 1 intact
        assert_eq!(forest.get(1).map(|g| g.members), Some(1));
        assert!(forest.insert(singleton(0)).is_err());
    }

    proptest! {
        #[test]
        fn unions_conserve_members(pairs in prop::collection::vec((0usize..16, 0usize..16), 0..40)) {
            let mut forest = GroupForest::new();
            for i in 0..16 {
                forest.insert(singleton(i)).unwrap();
            }
            let expected_formation: [f64; 16] = std::array::from_fn(|i| 0.1 + i as f64 / 100.0);
            for (a, b) in pairs {
                let ra = forest.find(a).unwrap();
                let rb = forest.find(b).unwrap();
                if ra != rb {
                    forest.union(ra.min(rb), ra.max(rb), CollapseTime::from_scale_factor(0.9), &GEOMETRY).unwrap();
                }
            }
            let total: usize = forest.roots().map(|g| g.members).sum();
            prop_assert_eq!(total, 16);
            for i in 0..16 {
                let root = forest.find(i).unwrap();
                let record = forest.get(root).unwrap();
                // formation covers every member
                prop_assert!(record.formation.scale_factor() >= expected_formation[i]);
                prop_assert_eq!(forest.root_of(i), Some(root));
            }
        }
    }
}
