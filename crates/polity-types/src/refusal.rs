//! Closed refusal taxonomies.
//!
//! A refusal explains why a requested operation did not proceed. Refusals
//! are ordinary values, not errors: the caller always receives a result
//! record, and the refusal code inside it is part of the deterministic
//! output. Codes are stable integers and must never be renumbered.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Agent refusals
// ---------------------------------------------------------------------------

/// Why an agent-level operation (evaluation, planning, delegation,
/// refinement, collapse) was refused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[repr(u32)]
pub enum Refusal {
    /// No refusal; the operation proceeded.
    #[default]
    None = 0,
    /// No goal passed the feasibility gates.
    GoalNotFeasible = 1,
    /// A required capability bit is missing.
    InsufficientCapability = 2,
    /// A required authority bit is missing.
    InsufficientAuthority = 3,
    /// A required knowledge bit is missing.
    InsufficientKnowledge = 4,
    /// The goal or plan expired before execution.
    PlanExpired = 5,
    /// The governing doctrine rejects this agent's authority or
    /// legitimacy, or no doctrine could be selected where one is
    /// required.
    DoctrineNotAuthorized = 6,
    /// Every otherwise-eligible goal was filtered by the doctrine's
    /// allow/forbid masks.
    GoalForbiddenByDoctrine = 7,
    /// The delegation covering this operation has expired.
    DelegationExpired = 8,
    /// The context names a role that is unknown or whose requirements the
    /// agent does not meet.
    RoleMismatch = 9,
    /// Aggregation was requested where the target does not permit it.
    AggregationNotAllowed = 10,
    /// Refinement asked for more representatives than the cohort holds.
    RefinementLimitReached = 11,
    /// Player attention pins the aggregate in its refined state.
    CollapseBlockedByInterest = 12,
    /// A container invariant was found violated.
    AgentStateInconsistent = 13,
}

impl Refusal {
    /// The stable integer code.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// A stable lower-snake label for logs and audit narration.
    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::GoalNotFeasible => "goal_not_feasible",
            Self::InsufficientCapability => "insufficient_capability",
            Self::InsufficientAuthority => "insufficient_authority",
            Self::InsufficientKnowledge => "insufficient_knowledge",
            Self::PlanExpired => "plan_expired",
            Self::DoctrineNotAuthorized => "doctrine_not_authorized",
            Self::GoalForbiddenByDoctrine => "goal_forbidden_by_doctrine",
            Self::DelegationExpired => "delegation_expired",
            Self::RoleMismatch => "role_mismatch",
            Self::AggregationNotAllowed => "aggregation_not_allowed",
            Self::RefinementLimitReached => "refinement_limit_reached",
            Self::CollapseBlockedByInterest => "collapse_blocked_by_interest",
            Self::AgentStateInconsistent => "agent_state_inconsistent",
        }
    }

    /// Whether this value actually refuses anything.
    pub const fn is_refused(self) -> bool {
        !matches!(self, Self::None)
    }
}

// ---------------------------------------------------------------------------
// Population refusals
// ---------------------------------------------------------------------------

/// Why a population-flow operation was refused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[repr(u32)]
pub enum PopulationRefusal {
    /// No refusal; the operation proceeded.
    #[default]
    None = 0,
    /// A migration asked to move more people than the source holds.
    MigrationInsufficientResources = 1,
    /// The migrating authority lacks the required mask.
    MigrationInsufficientAuthority = 2,
    /// A household would exceed its bounded membership.
    HouseholdTooLarge = 3,
    /// A referenced cohort does not exist.
    CohortNotFound = 4,
    /// Bucket sums diverged from the cohort count.
    InvalidBucketDistribution = 5,
}

impl PopulationRefusal {
    /// The stable integer code.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Whether this value actually refuses anything.
    pub const fn is_refused(self) -> bool {
        !matches!(self, Self::None)
    }
}

// ---------------------------------------------------------------------------
// Player intent refusals
// ---------------------------------------------------------------------------

/// Why a player-submitted intent was refused. Players pass through the
/// same capability / authority / knowledge gates as every other agent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[repr(u32)]
pub enum IntentRefusal {
    /// No refusal; the intent was accepted.
    #[default]
    None = 0,
    /// The bound agent lacks a required capability.
    NoCapability = 1,
    /// The bound agent lacks a required effective authority.
    NoAuthority = 2,
    /// The bound agent lacks a required knowledge bit.
    NoKnowledge = 3,
    /// A physical field check (slope, bearing capacity) failed.
    PhysicalConstraint = 4,
    /// The intent payload is malformed or of an unknown kind.
    InvalidIntent = 5,
    /// The referenced plan does not exist.
    PlanNotFound = 6,
}

impl IntentRefusal {
    /// The stable integer code.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Whether this value actually refuses anything.
    pub const fn is_refused(self) -> bool {
        !matches!(self, Self::None)
    }
}
