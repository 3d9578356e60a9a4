//! Goal registries and the goal lifecycle.
//!
//! A goal is a desired outcome with preconditions (capability, authority,
//! knowledge), declarative conditions on the agent's known references,
//! and a failure budget. Goals are registered once and then arbitrated by
//! the [`evaluator`](crate::evaluator) every think; execution feedback
//! arrives through [`CommandOutcome`] records that mark goals satisfied
//! or count failures toward abandonment.

use serde::{Deserialize, Serialize};

use polity_types::{
    clamp_priority, ActTime, AgentId, AuthorityMask, BoundedRegistry, CapabilityMask, GoalId,
    GoalStatus, GoalType, Keyed, KnowledgeMask,
};

use crate::belief::CommandOutcome;
use crate::error::AgentError;

/// Flag: missing required knowledge becomes a plan warning instead of a
/// refusal.
pub const GOAL_FLAG_ALLOW_UNKNOWN: u32 = 1 << 0;

/// Flag: plan steps with an epistemic gap carry an
/// `InsufficientKnowledge` failure mode.
pub const GOAL_FLAG_REQUIRE_KNOWLEDGE: u32 = 1 << 1;

// ---------------------------------------------------------------------------
// Goal record
// ---------------------------------------------------------------------------

/// Mask preconditions a goal demands of its agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GoalPreconditions {
    /// Capability bits the agent must hold.
    pub required_capabilities: CapabilityMask,
    /// Authority bits the agent must hold.
    pub required_authority: AuthorityMask,
    /// Knowledge bits the agent must believe it holds.
    pub required_knowledge: KnowledgeMask,
}

/// A declarative condition on the evaluation context.
///
/// A zero `subject_ref` requires only that the corresponding reference is
/// known; a non-zero subject additionally pins which one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalCondition {
    /// The context's knowledge mask must cover these bits.
    Knowledge {
        /// Required knowledge bits.
        bits: KnowledgeMask,
    },
    /// A resource reference must be known.
    Resource {
        /// Specific resource required, or `0` for any.
        subject_ref: u64,
    },
    /// A threat reference must be known.
    Threat {
        /// Specific threat required, or `0` for any.
        subject_ref: u64,
    },
    /// A destination reference must be known.
    Destination {
        /// Specific destination required, or `0` for any.
        subject_ref: u64,
    },
}

/// One registered goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    /// Unique id; the registry's natural key.
    pub goal_id: GoalId,
    /// The pursuing agent, or `NONE` for a shared template goal.
    pub agent_id: AgentId,
    /// What kind of outcome this goal seeks.
    pub goal_type: GoalType,
    /// Baseline priority, clamped to the priority scale.
    pub base_priority: u32,
    /// Additive urgency on top of the baseline.
    pub urgency: u32,
    /// Mask preconditions.
    pub preconditions: GoalPreconditions,
    /// Declarative context conditions; all must hold.
    pub conditions: Vec<GoalCondition>,
    /// `GOAL_FLAG_*` bits.
    pub flags: u32,
    /// Lifecycle status.
    pub status: GoalStatus,
    /// Not eligible before this act (`0` = immediately).
    pub defer_until_act: ActTime,
    /// Hard expiry (`0` = none).
    pub expiry_act: ActTime,
    /// Soft horizon consulted when no expiry is set (`0` = none).
    pub horizon_act: ActTime,
    /// Risk the goal tolerates, as a Q16 fraction (`0` = unlimited).
    pub acceptable_risk_q16: u32,
    /// Confidence cap the goal imposes on its own evaluation
    /// (`0` = unset).
    pub epistemic_confidence_q16: u32,
    /// Failures recorded so far.
    pub failure_count: u32,
    /// Failures after which the goal is abandoned (`0` = never).
    pub abandon_after_failures: u32,
    /// When the last failure was recorded.
    pub last_failure_act: ActTime,
}

impl Keyed for Goal {
    fn key(&self) -> u64 {
        self.goal_id.raw()
    }
}

impl Goal {
    /// Whether the goal's expiry or horizon has passed.
    pub const fn is_expired(&self, now_act: ActTime) -> bool {
        if self.expiry_act == 0 {
            if self.horizon_act == 0 {
                return false;
            }
            return self.horizon_act <= now_act;
        }
        self.expiry_act <= now_act
    }

    /// Whether the goal is eligible for arbitration at `now_act`.
    pub const fn is_active(&self, now_act: ActTime) -> bool {
        if matches!(self.status, GoalStatus::Abandoned | GoalStatus::Satisfied) {
            return false;
        }
        if self.defer_until_act != 0 && self.defer_until_act > now_act {
            return false;
        }
        !self.is_expired(now_act)
    }

    /// Record one failure; abandons the goal when the budget runs out.
    pub const fn record_failure(&mut self, now_act: ActTime) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure_act = now_act;
        if self.abandon_after_failures > 0 && self.failure_count >= self.abandon_after_failures {
            self.status = GoalStatus::Abandoned;
        }
    }

    /// Mark the goal satisfied; it is never selected again.
    pub const fn record_satisfied(&mut self) {
        self.status = GoalStatus::Satisfied;
    }
}

// ---------------------------------------------------------------------------
// GoalDesc
// ---------------------------------------------------------------------------

/// Registration parameters for a new goal. A zero `goal_id` lets the
/// registry allocate the next sequential id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GoalDesc {
    /// Explicit id, or `NONE` to auto-allocate.
    pub goal_id: GoalId,
    /// The pursuing agent.
    pub agent_id: AgentId,
    /// What kind of outcome this goal seeks.
    pub goal_type: GoalType,
    /// Baseline priority (clamped on registration).
    pub base_priority: u32,
    /// Additive urgency.
    pub urgency: u32,
    /// Mask preconditions.
    pub preconditions: GoalPreconditions,
    /// Declarative context conditions.
    pub conditions: Vec<GoalCondition>,
    /// `GOAL_FLAG_*` bits.
    pub flags: u32,
    /// Not eligible before this act.
    pub defer_until_act: ActTime,
    /// Hard expiry (`0` = none).
    pub expiry_act: ActTime,
    /// Soft horizon (`0` = none).
    pub horizon_act: ActTime,
    /// Tolerated risk (`0` = unlimited).
    pub acceptable_risk_q16: u32,
    /// Goal-imposed confidence cap (`0` = unset).
    pub epistemic_confidence_q16: u32,
    /// Abandonment budget (`0` = never abandon).
    pub abandon_after_failures: u32,
}

// ---------------------------------------------------------------------------
// GoalRegistry
// ---------------------------------------------------------------------------

/// Bounded registry of goals ordered ascending by goal id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalRegistry {
    goals: BoundedRegistry<Goal>,
    next_goal_id: u64,
}

impl GoalRegistry {
    /// Create an empty registry. A `start_goal_id` of zero begins
    /// auto-allocated ids at 1.
    pub fn new(capacity: usize, start_goal_id: u64) -> Self {
        Self {
            goals: BoundedRegistry::new(capacity),
            next_goal_id: if start_goal_id == 0 { 1 } else { start_goal_id },
        }
    }

    /// Number of registered goals.
    pub fn len(&self) -> usize {
        self.goals.len()
    }

    /// Whether no goals are registered.
    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }

    /// The goals in ascending id order.
    pub fn goals(&self) -> &[Goal] {
        self.goals.entries()
    }

    /// Register a goal; returns the (possibly allocated) id.
    pub fn register(&mut self, desc: GoalDesc) -> Result<GoalId, AgentError> {
        let goal_id = if desc.goal_id.is_none() {
            let id = self.allocate_id();
            GoalId::new(id)
        } else {
            desc.goal_id
        };
        self.goals.insert(Goal {
            goal_id,
            agent_id: desc.agent_id,
            goal_type: desc.goal_type,
            base_priority: clamp_priority(i64::from(desc.base_priority)),
            urgency: desc.urgency,
            preconditions: desc.preconditions,
            conditions: desc.conditions,
            flags: desc.flags,
            status: GoalStatus::Active,
            defer_until_act: desc.defer_until_act,
            expiry_act: desc.expiry_act,
            horizon_act: desc.horizon_act,
            acceptable_risk_q16: desc.acceptable_risk_q16,
            epistemic_confidence_q16: desc.epistemic_confidence_q16,
            failure_count: 0,
            abandon_after_failures: desc.abandon_after_failures,
            last_failure_act: 0,
        })?;
        Ok(goal_id)
    }

    /// Look up a goal by id.
    pub fn find(&self, goal_id: GoalId) -> Option<&Goal> {
        self.goals.find(goal_id.raw())
    }

    /// Look up a goal mutably by id.
    pub fn find_mut(&mut self, goal_id: GoalId) -> Option<&mut Goal> {
        self.goals.find_mut(goal_id.raw())
    }

    /// Record a failure on a goal.
    pub fn record_failure(&mut self, goal_id: GoalId, now_act: ActTime) -> Result<(), AgentError> {
        let goal = self.find_mut(goal_id).ok_or(AgentError::GoalNotFound {
            goal_id: goal_id.raw(),
        })?;
        goal.record_failure(now_act);
        Ok(())
    }

    /// Record satisfaction of a goal.
    pub fn record_satisfied(&mut self, goal_id: GoalId) -> Result<(), AgentError> {
        let goal = self.find_mut(goal_id).ok_or(AgentError::GoalNotFound {
            goal_id: goal_id.raw(),
        })?;
        goal.record_satisfied();
        Ok(())
    }

    /// Fold a command outcome into the goal lifecycle: success satisfies
    /// the referenced goal, failure counts against its budget. Outcomes
    /// without a goal reference are ignored.
    pub fn apply_outcome(&mut self, outcome: &CommandOutcome, now_act: ActTime) {
        if outcome.goal_id.is_none() {
            return;
        }
        if let Some(goal) = self.find_mut(outcome.goal_id) {
            if outcome.success {
                goal.record_satisfied();
            } else {
                goal.record_failure(now_act);
            }
        }
    }

    /// Next auto id, skipping zero on wraparound.
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_goal_id;
        self.next_goal_id = self.next_goal_id.wrapping_add(1);
        if id == 0 {
            let id = self.next_goal_id;
            self.next_goal_id = self.next_goal_id.wrapping_add(1);
            return id;
        }
        id
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use polity_types::PRIORITY_SCALE;

    use super::*;

    #[test]
    fn auto_ids_are_sequential() {
        let mut reg = GoalRegistry::new(4, 0);
        let a = reg.register(GoalDesc::default()).unwrap();
        let b = reg.register(GoalDesc::default()).unwrap();
        assert_eq!(a, GoalId::new(1));
        assert_eq!(b, GoalId::new(2));
    }

    #[test]
    fn base_priority_clamps_on_registration() {
        let mut reg = GoalRegistry::new(2, 1);
        let id = reg
            .register(GoalDesc {
                base_priority: 5_000,
                ..GoalDesc::default()
            })
            .unwrap();
        assert_eq!(reg.find(id).unwrap().base_priority, PRIORITY_SCALE);
    }

    #[test]
    fn failure_budget_abandons() {
        let mut reg = GoalRegistry::new(2, 1);
        let id = reg
            .register(GoalDesc {
                abandon_after_failures: 2,
                ..GoalDesc::default()
            })
            .unwrap();
        reg.record_failure(id, 5).unwrap();
        assert_eq!(reg.find(id).unwrap().status, GoalStatus::Active);
        reg.record_failure(id, 6).unwrap();
        let goal = reg.find(id).unwrap();
        assert_eq!(goal.status, GoalStatus::Abandoned);
        assert_eq!(goal.failure_count, 2);
        assert_eq!(goal.last_failure_act, 6);
        assert!(!goal.is_active(7));
    }

    #[test]
    fn expiry_and_horizon_gate_activity() {
        let mut reg = GoalRegistry::new(4, 1);
        let hard = reg
            .register(GoalDesc {
                expiry_act: 10,
                ..GoalDesc::default()
            })
            .unwrap();
        let soft = reg
            .register(GoalDesc {
                horizon_act: 10,
                ..GoalDesc::default()
            })
            .unwrap();
        assert!(reg.find(hard).unwrap().is_active(9));
        assert!(!reg.find(hard).unwrap().is_active(10));
        assert!(!reg.find(soft).unwrap().is_active(10));
    }

    #[test]
    fn deferred_goal_waits() {
        let mut reg = GoalRegistry::new(2, 1);
        let id = reg
            .register(GoalDesc {
                defer_until_act: 20,
                ..GoalDesc::default()
            })
            .unwrap();
        assert!(!reg.find(id).unwrap().is_active(19));
        assert!(reg.find(id).unwrap().is_active(20));
    }

    #[test]
    fn outcome_success_satisfies() {
        let mut reg = GoalRegistry::new(2, 1);
        let id = reg.register(GoalDesc::default()).unwrap();
        let outcome = CommandOutcome {
            goal_id: id,
            success: true,
            ..CommandOutcome::default()
        };
        reg.apply_outcome(&outcome, 3);
        assert_eq!(reg.find(id).unwrap().status, GoalStatus::Satisfied);
    }
}
