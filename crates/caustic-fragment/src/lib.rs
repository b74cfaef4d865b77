//! Caustic Fragmentation
//!
//! Builds halos from collapse times. Points are visited in `(time, index)`
//! order; each collapsing point either seeds a group, joins the one group
//! it touches, fuses several touching groups, or is marked as filament.
//! Catalogs are taken at every requested output redshift.
//!
//! # Engines
//!
//! - [`FragmentationEngine`]: single pass, the reference result
//! - [`ParallelEngine`]: x-slab workers on tokio tasks with a coordinator
//!   that settles boundary events; same outcome for any worker count
//!
//! # Light cone
//!
//! With [`LightConeSettings`] every applied event also checks whether its
//! group has crossed the observer's past light cone; crossings are
//! collected into a [`LightConeCatalog`] by either engine.
//!
//! # Criteria
//!
//! Merge and filament decisions go through the [`MergePolicy`] and
//! [`FilamentPolicy`] traits. [`MergeCriterion`] and [`FilamentCriterion`]
//! are the configurable built-ins; custom rules plug in through
//! [`Policies`].

mod catalog;
mod decision;
mod engine;
mod error;
mod forest;
mod group;
mod lightcone;
mod parallel;
mod point;
mod policy;

#[cfg(test)]
mod testing;

pub use catalog::{FragmentationOutcome, HaloCatalog, HaloRecord, Membership};
pub use decision::{apply, Decision, DecisionContext, Policies};
pub use engine::{FragmentationEngine, FragmentationSettings};
pub use error::{FragmentError, Result};
pub use forest::GroupForest;
pub use group::{GroupRecord, MergeEvent};
pub use lightcone::{LightCone, LightConeCatalog, LightConeHalo, LightConeSettings, SPEED_OF_LIGHT};
pub use parallel::{AbortHandle, ParallelEngine};
pub use point::{build_points, ordered_events, Event, Geometry, GroupId, PointRecord, PointState};
pub use policy::{
    FilamentCriterion, FilamentPolicy, MergeCandidate, MergeContext, MergeCriterion, MergePolicy,
};
