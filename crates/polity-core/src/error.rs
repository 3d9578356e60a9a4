//! Error types for the polity-core crate.

use polity_types::AgentId;

use crate::due::SchedulerError;

/// Errors from scheduling and pipeline containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A due-scheduler operation failed.
    #[error("due scheduler: {0}")]
    Scheduler(#[from] SchedulerError),

    /// The agent schedule is full.
    #[error("agent schedule capacity {capacity} exhausted")]
    ScheduleFull {
        /// The fixed capacity given at init.
        capacity: usize,
    },

    /// The agent is already registered.
    #[error("agent {agent_id} is already scheduled")]
    DuplicateAgent {
        /// The already-registered agent.
        agent_id: AgentId,
    },

    /// No schedule entry exists for this agent.
    #[error("agent {agent_id} is not scheduled")]
    UnknownAgent {
        /// The missing agent.
        agent_id: AgentId,
    },

    /// An operation requires a non-zero agent id.
    #[error("operation requires a non-zero agent id")]
    AbsentAgent,

    /// The doctrine event table is full.
    #[error("doctrine event capacity {capacity} exhausted")]
    DoctrineEventsFull {
        /// The fixed capacity given at init.
        capacity: usize,
    },
}
