//! The per-evaluation snapshot of an agent's situation.
//!
//! The evaluator and planner never reach into live registries for agent
//! state; the caller assembles an [`AgentContext`] from the agent's
//! belief state, capabilities, and doctrine bindings, and the same
//! context drives the whole think. This keeps every evaluation a pure
//! function of explicit inputs.

use serde::{Deserialize, Serialize};

use polity_types::{
    AgentId, AuthorityMask, CapabilityMask, DoctrineId, KnowledgeMask, RoleId,
};

/// Everything the evaluator and planner may consult about an agent at
/// one instant. All fields are subjective: they come from the agent's
/// beliefs, not from ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AgentContext {
    /// The evaluating agent (`NONE` matches goals of any agent).
    pub agent_id: AgentId,
    /// Capability bits the agent holds.
    pub capability_mask: CapabilityMask,
    /// Authority bits effective for the agent at this instant.
    pub authority_mask: AuthorityMask,
    /// Knowledge bits the agent believes it holds.
    pub knowledge_mask: KnowledgeMask,
    /// Hunger need level in `[0, NEED_SCALE]`.
    pub hunger_level: u32,
    /// Threat need level in `[0, NEED_SCALE]`.
    pub threat_level: u32,
    /// Risk the agent will accept, as a Q16 fraction.
    pub risk_tolerance_q16: u32,
    /// Confidence cap the agent imposes on every goal (`0` = unset).
    pub epistemic_confidence_q16: u32,
    /// The resource the agent believes it knows (`0` = none).
    pub known_resource_ref: u64,
    /// The threat the agent believes it knows (`0` = none).
    pub known_threat_ref: u64,
    /// The destination the agent believes it knows (`0` = none).
    pub known_destination_ref: u64,
    /// The agent's role, if it occupies one.
    pub role_id: RoleId,
    /// Doctrine bound explicitly to this agent.
    pub explicit_doctrine_ref: DoctrineId,
    /// Doctrine inherited from the agent's organization.
    pub org_doctrine_ref: DoctrineId,
    /// Doctrine of the jurisdiction the agent stands in.
    pub jurisdiction_doctrine_ref: DoctrineId,
    /// The agent's own fallback doctrine.
    pub personal_doctrine_ref: DoctrineId,
    /// The agent's legitimacy value, consulted by doctrine gates.
    pub legitimacy_value: u32,
}
