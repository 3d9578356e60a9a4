//! Cohort demographics, households, and migration flows for the Polity
//! kernel.
//!
//! Population is simulated at cohort scale: bucketed counts per
//! `(body, region, organization)` key, bounded households, and migration
//! flows that move people between cohorts at scheduled arrival acts.
//! Everything advances through the same due-scheduler discipline as
//! agent thinks -- the scheduler never iterates cohorts globally, only
//! entries whose due tick has come.
//!
//! - [`cohort`] -- cohort registry with key-derived deterministic ids
//! - [`demographics`] -- bucket arithmetic preserving the sum invariant
//! - [`household`] -- bounded, sorted household membership
//! - [`migration`] -- flow registry and all-or-nothing application
//! - [`projections`] -- epistemic (believed) cohort sizes
//! - [`scheduler`] -- cohort ticks and migration arrivals as due events

pub mod cohort;
pub mod demographics;
pub mod error;
pub mod household;
pub mod migration;
pub mod projections;
pub mod scheduler;

pub use cohort::{
    cohort_id_from_key, Cohort, CohortKey, CohortRegistry, AGE_BUCKETS, HEALTH_BUCKETS,
    HEALTH_DEFAULT_INDEX, SEX_BUCKETS, SEX_UNKNOWN_INDEX,
};
pub use demographics::{apply_delta, init_buckets, validate};
pub use error::PopulationError;
pub use household::{Household, HouseholdRegistry, HOUSEHOLD_MAX_MEMBERS};
pub use migration::{apply_migration, MigrationFlow, MigrationInput, MigrationRegistry};
pub use projections::{Projection, ProjectionRegistry};
pub use scheduler::{PopulationDueKind, PopulationScheduler};
