//! Enumeration types for the Polity simulation kernel.
//!
//! Goal types, process kinds, belief topics, and the status enums carried
//! by registry records. Discriminants are part of the save/load contract
//! and must never be reordered.

use serde::{Deserialize, Serialize};

use crate::masks::{KnowledgeMask, ProcessKindMask, KNOW_RESOURCE, KNOW_SAFE_ROUTE, KNOW_THREAT};

// ---------------------------------------------------------------------------
// Goal types
// ---------------------------------------------------------------------------

/// Number of goal types; doctrine priority-modifier tables are indexed by
/// goal type and sized by this constant.
pub const GOAL_TYPE_COUNT: usize = 9;

/// What an agent goal is fundamentally about.
///
/// Each type maps to a fixed plan template in the planner. The
/// discriminant doubles as the bit position in doctrine allow/forbid
/// masks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[repr(u32)]
pub enum GoalType {
    /// Stay alive: reach a known resource and consume it.
    #[default]
    Survive = 0,
    /// Obtain a specific known resource.
    Acquire = 1,
    /// Counter a known threat.
    Defend = 2,
    /// Relocate to a known destination.
    Migrate = 3,
    /// Produce new knowledge.
    Research = 4,
    /// Exchange with another party.
    Trade = 5,
    /// Examine a known destination.
    Survey = 6,
    /// Inspect and service an owned asset.
    Maintain = 7,
    /// Survey a destination and transfer resources to shore it up.
    Stabilize = 8,
}

impl GoalType {
    /// The bit for this goal type in doctrine allow/forbid masks.
    pub const fn bit(self) -> u32 {
        1u32 << (self as u32)
    }

    /// Index into per-type tables such as doctrine priority modifiers.
    pub const fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// Process kinds
// ---------------------------------------------------------------------------

/// The kind of work a plan step performs.
///
/// Discriminants are the wire values; `bit()` gives the position used in
/// constraint, contract, and delegation process masks
/// (`1 << (kind - 1)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ProcessKind {
    /// Travel toward a target reference.
    Move = 1,
    /// Take possession of a target resource.
    Acquire = 2,
    /// Oppose a target threat.
    Defend = 3,
    /// Produce knowledge.
    Research = 4,
    /// Exchange with a counterparty.
    Trade = 5,
    /// Passively gather information.
    Observe = 6,
    /// Actively examine a target.
    Survey = 7,
    /// Service an asset.
    Maintain = 8,
    /// Move resources between pools.
    Transfer = 9,
}

impl ProcessKind {
    /// The bit for this kind in process-kind masks.
    pub const fn bit(self) -> ProcessKindMask {
        1u32 << ((self as u32).wrapping_sub(1))
    }

    /// The stable string key this kind's process id is derived from.
    pub const fn id_key(self) -> &'static str {
        match self {
            Self::Move => "PROC.MOVE",
            Self::Acquire => "PROC.ACQUIRE",
            Self::Defend => "PROC.DEFEND",
            Self::Research => "PROC.RESEARCH",
            Self::Trade => "PROC.TRADE",
            Self::Observe => "PROC.OBSERVE",
            Self::Survey => "PROC.SURVEY",
            Self::Maintain => "PROC.MAINTAIN",
            Self::Transfer => "PROC.TRANSFER",
        }
    }
}

// ---------------------------------------------------------------------------
// Belief topics
// ---------------------------------------------------------------------------

/// What a belief entry is about. Topics map onto knowledge-mask bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BeliefTopic {
    /// The location or existence of a resource.
    Resource,
    /// A route believed safe to travel.
    SafeRoute,
    /// A known threat.
    Threat,
}

impl BeliefTopic {
    /// The knowledge-mask bit granted by holding a belief on this topic.
    pub const fn knowledge_bit(self) -> KnowledgeMask {
        match self {
            Self::Resource => KNOW_RESOURCE,
            Self::SafeRoute => KNOW_SAFE_ROUTE,
            Self::Threat => KNOW_THREAT,
        }
    }
}

// ---------------------------------------------------------------------------
// Record statuses
// ---------------------------------------------------------------------------

/// Lifecycle status of a goal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum GoalStatus {
    /// Eligible for arbitration.
    #[default]
    Active,
    /// Completed; never selected again.
    Satisfied,
    /// Given up after repeated failures; never selected again.
    Abandoned,
}

/// Lifecycle status of a contract.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum ContractStatus {
    /// In force; constrains both parties' plans.
    #[default]
    Active,
    /// Completed successfully.
    Fulfilled,
    /// Breached by a party.
    Failed,
    /// Withdrawn before completion.
    Revoked,
}

/// Lifecycle status of an institution.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum InstitutionStatus {
    /// Operating normally.
    #[default]
    Active,
    /// Inactive but not dissolved.
    Dormant,
    /// Lost legitimacy and dissolved.
    Collapsed,
}

/// Lifecycle status of a conflict.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum ConflictStatus {
    /// Ongoing.
    #[default]
    Active,
    /// Settled.
    Resolved,
}

/// Lifecycle status of a migration flow.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum MigrationStatus {
    /// Scheduled and waiting for its arrival tick.
    #[default]
    Active,
    /// Applied to the source and destination cohorts.
    Completed,
    /// Withdrawn before arrival.
    Cancelled,
}
