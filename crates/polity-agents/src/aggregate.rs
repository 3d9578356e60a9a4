//! Aggregate agents: cohorts acting as one.
//!
//! An aggregate agent summarizes a cohort of individuals -- belief
//! summaries (mask intersections/unions, need min/max/average) and
//! per-type goal tallies -- and evaluates through the same evaluator and
//! planner as any individual. Both summaries are order-independent: any
//! permutation of the same individuals aggregates to the same value,
//! which is what makes collapse deterministic.

use serde::{Deserialize, Serialize};

use polity_types::{
    ActTime, AggregateId, BoundedRegistry, DoctrineId, GoalId, GoalType, Keyed, KnowledgeMask,
    PlanId, ProvenanceId, Refusal, ACT_NEVER, GOAL_TYPE_COUNT,
};

use crate::belief::BeliefState;
use crate::context::AgentContext;
use crate::error::AgentError;

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

/// Order-independent summary of a set of individual belief states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BeliefSummary {
    /// Number of individuals summarized.
    pub count: u32,
    /// Knowledge every individual holds (mask intersection).
    pub knowledge_mask: KnowledgeMask,
    /// Knowledge any individual holds (mask union).
    pub knowledge_any_mask: KnowledgeMask,
    /// Minimum hunger across the cohort.
    pub hunger_min: u32,
    /// Maximum hunger across the cohort.
    pub hunger_max: u32,
    /// Truncating integer average hunger.
    pub hunger_avg: u32,
    /// Minimum threat across the cohort.
    pub threat_min: u32,
    /// Maximum threat across the cohort.
    pub threat_max: u32,
    /// Truncating integer average threat.
    pub threat_avg: u32,
}

/// One individual's goal standing, as fed into a goal summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalStatusEntry {
    /// The goal's type.
    pub goal_type: GoalType,
    /// Whether the individual has satisfied it.
    pub satisfied: bool,
}

/// Order-independent per-type goal tallies for a cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GoalSummary {
    /// Number of entries tallied.
    pub count: u32,
    /// Goals per type.
    pub goal_counts: [u32; GOAL_TYPE_COUNT],
    /// Satisfied goals per type.
    pub satisfied_counts: [u32; GOAL_TYPE_COUNT],
}

/// Summarize individual belief states. An empty input yields the zeroed
/// summary.
pub fn aggregate_beliefs(states: &[BeliefState]) -> BeliefSummary {
    let mut summary = BeliefSummary::default();
    let Some(first) = states.first() else {
        return summary;
    };
    summary.count = u32::try_from(states.len()).unwrap_or(u32::MAX);
    summary.knowledge_mask = first.knowledge_mask;
    summary.knowledge_any_mask = first.knowledge_mask;
    summary.hunger_min = first.hunger_level;
    summary.hunger_max = first.hunger_level;
    summary.threat_min = first.threat_level;
    summary.threat_max = first.threat_level;
    let mut hunger_sum = u64::from(first.hunger_level);
    let mut threat_sum = u64::from(first.threat_level);
    for state in states.iter().skip(1) {
        summary.knowledge_mask &= state.knowledge_mask;
        summary.knowledge_any_mask |= state.knowledge_mask;
        summary.hunger_min = summary.hunger_min.min(state.hunger_level);
        summary.hunger_max = summary.hunger_max.max(state.hunger_level);
        summary.threat_min = summary.threat_min.min(state.threat_level);
        summary.threat_max = summary.threat_max.max(state.threat_level);
        hunger_sum += u64::from(state.hunger_level);
        threat_sum += u64::from(state.threat_level);
    }
    let count = u64::from(summary.count);
    summary.hunger_avg = u32::try_from(hunger_sum / count).unwrap_or(u32::MAX);
    summary.threat_avg = u32::try_from(threat_sum / count).unwrap_or(u32::MAX);
    summary
}

/// Tally goal standings per type. An empty input yields the zeroed
/// summary.
pub fn aggregate_goals(entries: &[GoalStatusEntry]) -> GoalSummary {
    let mut summary = GoalSummary::default();
    summary.count = u32::try_from(entries.len()).unwrap_or(u32::MAX);
    for entry in entries {
        if let Some(slot) = summary.goal_counts.get_mut(entry.goal_type.index()) {
            *slot = slot.saturating_add(1);
        }
        if entry.satisfied {
            if let Some(slot) = summary.satisfied_counts.get_mut(entry.goal_type.index()) {
                *slot = slot.saturating_add(1);
            }
        }
    }
    summary
}

// ---------------------------------------------------------------------------
// AggregateAgent
// ---------------------------------------------------------------------------

/// A cohort acting as a single agent.
///
/// Invariant: `refined_count <= cohort_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateAgent {
    /// Unique id; the registry's natural key.
    pub aggregate_agent_id: AggregateId,
    /// The cohort this aggregate stands for.
    pub cohort_ref: u64,
    /// The doctrine the aggregate evaluates under.
    pub doctrine_ref: DoctrineId,
    /// Summary of the cohort's beliefs.
    pub belief_summary: BeliefSummary,
    /// Summary of the cohort's goals.
    pub goal_summary: GoalSummary,
    /// Individuals the cohort stands for.
    pub cohort_count: u32,
    /// Individuals currently refined out as explicit representatives.
    pub refined_count: u32,
    /// When the aggregate next thinks.
    pub next_think_act: ActTime,
    /// The goal currently pursued, if any.
    pub active_goal_ref: GoalId,
    /// The plan currently executing, if any.
    pub active_plan_ref: PlanId,
    /// Causal origin of the aggregate.
    pub provenance_ref: ProvenanceId,
}

impl Keyed for AggregateAgent {
    fn key(&self) -> u64 {
        self.aggregate_agent_id.raw()
    }
}

impl AggregateAgent {
    /// Build the evaluation context the aggregate thinks with: the
    /// summary's intersection mask and averages, under the aggregate's
    /// doctrine as the explicit binding.
    pub fn make_context(&self) -> AgentContext {
        AgentContext {
            agent_id: polity_types::AgentId::new(self.aggregate_agent_id.raw()),
            knowledge_mask: self.belief_summary.knowledge_mask,
            hunger_level: self.belief_summary.hunger_avg,
            threat_level: self.belief_summary.threat_avg,
            explicit_doctrine_ref: self.doctrine_ref,
            ..AgentContext::default()
        }
    }

    /// Set both counts, refusing a refined count above the cohort
    /// count.
    pub const fn set_counts(
        &mut self,
        cohort_count: u32,
        refined_count: u32,
    ) -> Result<(), Refusal> {
        if refined_count > cohort_count {
            return Err(Refusal::RefinementLimitReached);
        }
        self.cohort_count = cohort_count;
        self.refined_count = refined_count;
        Ok(())
    }

    /// Mark `desired_count` individuals as refined out.
    pub const fn refine(&mut self, desired_count: u32) -> Result<(), Refusal> {
        if desired_count > self.cohort_count {
            return Err(Refusal::RefinementLimitReached);
        }
        self.refined_count = desired_count;
        Ok(())
    }

    /// Discard refined representatives and wake the aggregate.
    pub const fn collapse(&mut self, now_act: ActTime) {
        self.refined_count = 0;
        self.next_think_act = now_act;
    }

    /// Re-summarize from explicit individuals without collapsing.
    pub fn refresh_from_individuals(
        &mut self,
        beliefs: &[BeliefState],
        goals: &[GoalStatusEntry],
    ) {
        self.belief_summary = aggregate_beliefs(beliefs);
        self.goal_summary = aggregate_goals(goals);
        self.cohort_count = self.belief_summary.count;
        if self.refined_count > self.cohort_count {
            self.refined_count = self.cohort_count;
        }
    }

    /// Collapse from explicit individuals: re-summarize, zero the
    /// refined count, and wake the aggregate. Goal and belief inputs
    /// must describe the same individuals when both are given.
    pub fn collapse_from_individuals(
        &mut self,
        beliefs: &[BeliefState],
        goals: &[GoalStatusEntry],
        now_act: ActTime,
    ) -> Result<(), Refusal> {
        if !goals.is_empty() && !beliefs.is_empty() && goals.len() != beliefs.len() {
            return Err(Refusal::AgentStateInconsistent);
        }
        self.belief_summary = aggregate_beliefs(beliefs);
        self.goal_summary = aggregate_goals(goals);
        self.cohort_count = self.belief_summary.count;
        self.refined_count = 0;
        self.next_think_act = now_act;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Interest gate
// ---------------------------------------------------------------------------

/// External source of attention strength on simulation targets --
/// typically the player's camera and pinned interests.
pub trait InterestProvider {
    /// Attention strength on `(target_kind, target_id)` at `now_act`.
    fn strength(&self, target_kind: u32, target_id: u64, now_act: ActTime) -> u32;
}

/// Gate a collapse on external interest: attention at or above
/// `block_threshold` pins the aggregate in its refined state. No
/// provider, or a zero threshold, never blocks.
pub fn check_collapse_interest(
    provider: Option<&dyn InterestProvider>,
    target_kind: u32,
    target_id: u64,
    now_act: ActTime,
    block_threshold: u32,
) -> Result<(), Refusal> {
    let Some(provider) = provider else {
        return Ok(());
    };
    if block_threshold == 0 {
        return Ok(());
    }
    if provider.strength(target_kind, target_id, now_act) >= block_threshold {
        return Err(Refusal::CollapseBlockedByInterest);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// AggregateRegistry
// ---------------------------------------------------------------------------

/// Bounded registry of aggregate agents ordered ascending by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateRegistry {
    agents: BoundedRegistry<AggregateAgent>,
    next_aggregate_id: u64,
}

impl AggregateRegistry {
    /// Create an empty registry. A `start_id` of zero begins
    /// auto-allocated ids at 1.
    pub fn new(capacity: usize, start_id: u64) -> Self {
        Self {
            agents: BoundedRegistry::new(capacity),
            next_aggregate_id: if start_id == 0 { 1 } else { start_id },
        }
    }

    /// Number of aggregates.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no aggregates are registered.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// The aggregates in ascending id order.
    pub fn agents(&self) -> &[AggregateAgent] {
        self.agents.entries()
    }

    /// Register a new aggregate. A zero id auto-allocates; a zero
    /// provenance falls back to the aggregate id. The aggregate starts
    /// unrefined and parked at `ACT_NEVER`.
    pub fn register(
        &mut self,
        aggregate_agent_id: AggregateId,
        cohort_ref: u64,
        doctrine_ref: DoctrineId,
        cohort_count: u32,
        provenance_ref: ProvenanceId,
    ) -> Result<AggregateId, AgentError> {
        let id = if aggregate_agent_id.is_none() {
            let raw = self.allocate_id();
            AggregateId::new(raw)
        } else {
            aggregate_agent_id
        };
        self.agents.insert(AggregateAgent {
            aggregate_agent_id: id,
            cohort_ref,
            doctrine_ref,
            belief_summary: BeliefSummary::default(),
            goal_summary: GoalSummary::default(),
            cohort_count,
            refined_count: 0,
            next_think_act: ACT_NEVER,
            active_goal_ref: GoalId::NONE,
            active_plan_ref: PlanId::NONE,
            provenance_ref: if provenance_ref.is_none() {
                ProvenanceId::new(id.raw())
            } else {
                provenance_ref
            },
        })?;
        Ok(id)
    }

    /// Look up an aggregate by id.
    pub fn find(&self, aggregate_agent_id: AggregateId) -> Option<&AggregateAgent> {
        self.agents.find(aggregate_agent_id.raw())
    }

    /// Look up an aggregate mutably by id.
    pub fn find_mut(&mut self, aggregate_agent_id: AggregateId) -> Option<&mut AggregateAgent> {
        self.agents.find_mut(aggregate_agent_id.raw())
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_aggregate_id;
        self.next_aggregate_id = self.next_aggregate_id.wrapping_add(1);
        if id == 0 {
            let id = self.next_aggregate_id;
            self.next_aggregate_id = self.next_aggregate_id.wrapping_add(1);
            return id;
        }
        id
    }
}
