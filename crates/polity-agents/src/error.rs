//! Error types for the polity-agents crate.
//!
//! Errors are programming-contract violations (capacity exhausted,
//! duplicate ids, absent referents). Domain refusals -- "you may not do
//! this here" -- are *not* errors; they travel as
//! [`Refusal`](polity_types::Refusal) values inside ordinary results.

use polity_types::RegistryError;

/// Errors that can occur while mutating agent state containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    /// A registry mutation was rejected.
    #[error("registry operation failed: {0}")]
    Registry(#[from] RegistryError),

    /// A belief store is full and held no evictable entry.
    #[error("belief store capacity {capacity} exhausted")]
    BeliefStoreFull {
        /// The fixed capacity given at init.
        capacity: usize,
    },

    /// An event or operation referenced the absent agent id.
    #[error("operation requires a non-zero agent id")]
    AbsentAgent,

    /// An operation referenced a goal that does not exist.
    #[error("goal {goal_id} not found")]
    GoalNotFound {
        /// The missing goal id.
        goal_id: u64,
    },
}
