//! Shared type definitions for the Polity simulation kernel.
//!
//! This crate is the single source of truth for the types used across the
//! Polity workspace: identifiers, act-time, masks, the closed refusal
//! taxonomies, fixed-point scales, and the deterministic hash primitives.
//! Everything here is plain data with no behavior beyond arithmetic that
//! is bit-exact across machines.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe `u64` wrappers for all entity identifiers
//! - [`time`] -- The act-time tick counter and its sentinels
//! - [`enums`] -- Goal types, process kinds, belief topics, statuses
//! - [`masks`] -- Capability / authority / knowledge bit masks
//! - [`refusal`] -- Closed refusal code enumerations with stable codes
//! - [`fixed`] -- Q16 fixed-point scales and clamping helpers
//! - [`hash`] -- FNV-1a and 64-bit key mixing
//! - [`registry`] -- The bounded, id-ordered registry container

pub mod enums;
pub mod fixed;
pub mod hash;
pub mod ids;
pub mod masks;
pub mod refusal;
pub mod registry;
pub mod time;

// Re-export all public types at crate root for convenience.
pub use enums::{
    BeliefTopic, ConflictStatus, ContractStatus, GoalStatus, GoalType, InstitutionStatus,
    MigrationStatus, ProcessKind, GOAL_TYPE_COUNT,
};
pub use fixed::{
    clamp_confidence, clamp_need, clamp_priority, scale_by_confidence, CONFIDENCE_MAX, NEED_SCALE,
    PRIORITY_SCALE,
};
pub use hash::{fnv1a, fnv1a_str, fnv1a_update_u64, mix64, FNV_OFFSET_BASIS, FNV_PRIME};
pub use ids::{
    AgentId, AggregateId, BeliefId, CohortId, ConflictId, ConstraintId, ContractId, DelegationId,
    DoctrineId, EventId, FlowId, GoalId, GrantId, HouseholdId, InstitutionId, IntentId, PlanId,
    PlayerId, ProcessId, ProvenanceId, RoleId,
};
pub use masks::{
    mask_covers, AuthorityMask, CapabilityMask, KnowledgeMask, ProcessKindMask, AUTH_BASIC,
    AUTH_MILITARY, AUTH_TRADE, CAP_DEFEND, CAP_MOVE, CAP_RESEARCH, CAP_TRADE, KNOW_RESOURCE,
    KNOW_SAFE_ROUTE, KNOW_THREAT,
};
pub use refusal::{IntentRefusal, PopulationRefusal, Refusal};
pub use registry::{BoundedRegistry, Keyed, RegistryError};
pub use time::{ActTime, ACT_NEVER};
