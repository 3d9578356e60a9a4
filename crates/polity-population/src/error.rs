//! Error types for the polity-population crate.
//!
//! As everywhere in the kernel, refusals ("this migration would overdraw
//! the source cohort") are values of
//! [`PopulationRefusal`](polity_types::PopulationRefusal), not errors;
//! this module covers container-contract violations only.

use polity_types::RegistryError;

/// Errors from population containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PopulationError {
    /// A registry mutation was rejected.
    #[error("registry operation failed: {0}")]
    Registry(#[from] RegistryError),

    /// A due-scheduler operation failed.
    #[error("due scheduler: {0}")]
    Scheduler(#[from] polity_core::SchedulerError),
}
