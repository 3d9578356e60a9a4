//! The think pipeline: one due agent, one bounded decision.
//!
//! [`run_think_cycle`] advances a [`KernelState`] to a target tick.
//! Scheduled doctrine updates due by the target land first; then, for
//! every agent whose think comes due, in `(next_think_act, agent_id)`
//! order:
//!
//! 1. The belief store decays and expires entries up to the think act.
//! 2. A subjective [`AgentContext`] is assembled from the agent's
//!    profile, scalar belief state, belief store, and effective
//!    authority.
//! 3. The evaluator arbitrates the agent's goals (under the selected
//!    doctrine when the profile binds one).
//! 4. The planner builds a bounded plan; the constraint, contract, and
//!    delegation registries may veto it.
//! 5. The audit log records the decision (`GoalChosen`/`PlanBuilt`, or
//!    the refusal) under a deterministic `(act, provenance)` context.
//! 6. The schedule re-arms the agent at its interval, or at the window
//!    its doctrine dictates.
//!
//! The cycle is a pure function of kernel state: two runs fed identical
//! registrations and targets produce identical summaries and
//! byte-identical audit logs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use polity_types::{
    ActTime, AgentId, AuthorityMask, BeliefTopic, CapabilityMask, DoctrineId, ProvenanceId,
    Refusal, RoleId,
};

use polity_agents::authority::AuthorityRegistry;
use polity_agents::belief::{BeliefState, BeliefStore};
use polity_agents::constraint::ConstraintRegistry;
use polity_agents::context::AgentContext;
use polity_agents::contract::ContractRegistry;
use polity_agents::delegation::DelegationRegistry;
use polity_agents::doctrine::DoctrineRegistry;
use polity_agents::evaluator::{choose_goal, choose_goal_with_doctrine, GoalEvaluation};
use polity_agents::goal::GoalRegistry;
use polity_agents::planner::{build_plan, Plan, PlanOptions};
use polity_agents::role::RoleRegistry;
use polity_events::{AuditKind, AuditLog};

use crate::config::KernelConfig;
use crate::doctrine_events::DoctrineScheduler;
use crate::error::CoreError;
use crate::schedule::AgentSchedule;

// ---------------------------------------------------------------------------
// AgentProfile
// ---------------------------------------------------------------------------

/// The durable, non-belief identity of a scheduled agent: what it can
/// do, what it is entitled to, and which social bindings it thinks
/// under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AgentProfile {
    /// The agent.
    pub agent_id: AgentId,
    /// Capability bits the agent holds.
    pub capability_mask: CapabilityMask,
    /// Authority before grants are applied.
    pub base_authority_mask: AuthorityMask,
    /// Risk the agent tolerates, as a Q16 fraction.
    pub risk_tolerance_q16: u32,
    /// Confidence cap the agent imposes on every goal (`0` = unset).
    pub epistemic_confidence_q16: u32,
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
    /// The agent's legitimacy value.
    pub legitimacy_value: u32,
    /// Whether plans must pass the delegation check (the agent acts on
    /// someone else's behalf).
    pub requires_delegation: bool,
    /// Provenance stamped on the agent's audit records (`NONE` = the
    /// agent id).
    pub provenance_id: ProvenanceId,
}

impl AgentProfile {
    /// Whether this profile binds any doctrine source, making thinks go
    /// through doctrine selection.
    pub const fn binds_doctrine(&self) -> bool {
        self.role_id.is_some()
            || self.explicit_doctrine_ref.is_some()
            || self.org_doctrine_ref.is_some()
            || self.jurisdiction_doctrine_ref.is_some()
            || self.personal_doctrine_ref.is_some()
    }
}

// ---------------------------------------------------------------------------
// KernelState
// ---------------------------------------------------------------------------

/// Everything one simulation instance owns. No globals: independent
/// instances may run in parallel as long as their states do not alias.
#[derive(Debug)]
pub struct KernelState {
    /// The configuration the state was built with.
    pub config: KernelConfig,
    /// The per-agent think cadence.
    pub schedule: AgentSchedule,
    /// The shared belief store.
    pub beliefs: BeliefStore,
    /// Scalar belief state per agent.
    pub belief_states: BTreeMap<AgentId, BeliefState>,
    /// Durable agent profiles.
    pub profiles: BTreeMap<AgentId, AgentProfile>,
    /// The goal registry.
    pub goals: GoalRegistry,
    /// The doctrine registry.
    pub doctrines: DoctrineRegistry,
    /// Scheduled doctrine updates.
    pub doctrine_events: DoctrineScheduler,
    /// The role registry.
    pub roles: RoleRegistry,
    /// Authority grants.
    pub authority: AuthorityRegistry,
    /// Institutional constraints.
    pub constraints: ConstraintRegistry,
    /// Bilateral contracts.
    pub contracts: ContractRegistry,
    /// Delegations.
    pub delegations: DelegationRegistry,
    /// The audit trail.
    pub audit: AuditLog,
}

impl KernelState {
    /// Build a fresh state from a configuration, starting at
    /// `start_tick`.
    pub fn new(config: KernelConfig, start_tick: ActTime) -> Self {
        Self {
            schedule: AgentSchedule::new(config.agent_capacity, start_tick),
            beliefs: BeliefStore::new(
                config.belief_capacity,
                1,
                config.belief_decay_q16_per_act,
                config.min_confidence_q16,
            ),
            belief_states: BTreeMap::new(),
            profiles: BTreeMap::new(),
            goals: GoalRegistry::new(config.goal_capacity, 1),
            doctrines: DoctrineRegistry::new(config.doctrine_capacity),
            doctrine_events: DoctrineScheduler::new(
                config.doctrine_event_capacity,
                start_tick,
                1,
            ),
            roles: RoleRegistry::new(config.role_capacity),
            authority: AuthorityRegistry::new(config.authority_capacity),
            constraints: ConstraintRegistry::new(config.constraint_capacity),
            contracts: ContractRegistry::new(config.contract_capacity),
            delegations: DelegationRegistry::new(config.delegation_capacity),
            audit: AuditLog::new(config.audit_capacity, 1),
            config,
        }
    }

    /// Register an agent: its profile, a default belief state, and a
    /// schedule entry. A zero interval falls back to the configured
    /// default.
    pub fn register_agent(
        &mut self,
        profile: AgentProfile,
        first_think_act: ActTime,
        think_interval_act: ActTime,
    ) -> Result<(), CoreError> {
        if profile.agent_id.is_none() {
            return Err(CoreError::AbsentAgent);
        }
        let interval = if think_interval_act > 0 {
            think_interval_act
        } else {
            self.config.default_think_interval_act
        };
        self.schedule
            .register(profile.agent_id, first_think_act, interval)?;
        self.belief_states
            .entry(profile.agent_id)
            .or_insert_with(|| BeliefState::new(profile.agent_id, 0, 0, 0, first_think_act));
        self.profiles.insert(profile.agent_id, profile);
        Ok(())
    }

    /// Fold an executed command's outcome back into the kernel: the
    /// referenced goal is satisfied or counts a failure, and the acting
    /// agent's belief state absorbs the knowledge and need deltas. This
    /// is how wrong beliefs get corrected -- a knowledge-refused failure
    /// withdraws the belief that caused it, so the next think diverges.
    pub fn apply_command_outcome(
        &mut self,
        outcome: &polity_agents::belief::CommandOutcome,
        now_act: ActTime,
    ) {
        self.goals.apply_outcome(outcome, now_act);
        if let Some(state) = self.belief_states.get_mut(&outcome.agent_id) {
            state.apply_command_outcome(outcome, now_act);
        }
    }
}

// ---------------------------------------------------------------------------
// Think cycle
// ---------------------------------------------------------------------------

/// The decision one agent took (or failed to take) during a think.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkOutcome {
    /// The thinking agent.
    pub agent_id: AgentId,
    /// The act the think fired at.
    pub act: ActTime,
    /// The arbitration result.
    pub evaluation: GoalEvaluation,
    /// The plan built, when the think succeeded.
    pub plan: Option<Plan>,
    /// The most specific refusal of the whole think (`None` on
    /// success).
    pub refusal: Refusal,
}

/// Summary of one [`run_think_cycle`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkSummary {
    /// The tick advanced to.
    pub target_tick: ActTime,
    /// Thinks dispatched.
    pub thinks: u32,
    /// Doctrine events applied before any think.
    pub doctrine_events_processed: u32,
    /// Per-think decisions, in dispatch order.
    pub outcomes: Vec<ThinkOutcome>,
}

/// Advance the kernel to `target_tick`.
pub fn run_think_cycle(state: &mut KernelState, target_tick: ActTime) -> ThinkSummary {
    let KernelState {
        config,
        schedule,
        beliefs,
        belief_states,
        profiles,
        goals,
        doctrines,
        doctrine_events,
        roles,
        authority,
        constraints,
        contracts,
        delegations,
        audit,
    } = state;

    // Scheduled policy changes due by the target land before any think.
    doctrine_events.advance(doctrines, target_tick);
    let doctrine_events_processed = doctrine_events.processed_last();

    info!(target_tick, "Think cycle started");

    let mut outcomes: Vec<ThinkOutcome> = Vec::new();
    schedule.advance(target_tick, |entry, now| {
        beliefs.decay(now);
        let Some(profile) = profiles.get(&entry.agent_id) else {
            return;
        };
        let belief_state = belief_states
            .get(&entry.agent_id)
            .copied()
            .unwrap_or_default();

        let ctx = assemble_context(profile, &belief_state, beliefs, authority, now);
        audit.set_context(
            now,
            if profile.provenance_id.is_some() {
                profile.provenance_id
            } else {
                ProvenanceId::new(profile.agent_id.raw())
            },
        );

        let evaluation = if profile.binds_doctrine() {
            choose_goal_with_doctrine(goals, doctrines, roles, &ctx, now)
        } else {
            choose_goal(goals, &ctx, now)
        };

        if evaluation.refusal.is_refused() {
            debug!(agent_id = %entry.agent_id, refusal = evaluation.refusal.label(), "Goal refused");
            let _ = audit.record(
                entry.agent_id,
                AuditKind::GoalRefused,
                evaluation.goal_id.raw(),
                0,
                i64::from(evaluation.refusal.code()),
            );
            outcomes.push(ThinkOutcome {
                agent_id: entry.agent_id,
                act: now,
                evaluation,
                plan: None,
                refusal: evaluation.refusal,
            });
            return;
        }

        let _ = audit.record(
            entry.agent_id,
            AuditKind::GoalChosen,
            evaluation.goal_id.raw(),
            0,
            i64::from(evaluation.computed_priority),
        );

        let Some(goal) = goals.find(evaluation.goal_id) else {
            outcomes.push(ThinkOutcome {
                agent_id: entry.agent_id,
                act: now,
                evaluation,
                plan: None,
                refusal: Refusal::AgentStateInconsistent,
            });
            return;
        };

        let options = PlanOptions {
            step_duration_act: config.plan_step_duration_act,
            ..PlanOptions::default()
        };
        let (plan, refusal) = match build_plan(goal, &ctx, &options, now) {
            Ok(plan) => {
                match veto_plan(&plan, profile, constraints, contracts, delegations, now) {
                    Ok(()) => (Some(plan), Refusal::None),
                    Err((refusal, related_id)) => {
                        let _ = audit.record(
                            entry.agent_id,
                            AuditKind::PlanRefused,
                            evaluation.goal_id.raw(),
                            related_id,
                            i64::from(refusal.code()),
                        );
                        (None, refusal)
                    }
                }
            }
            Err(refusal) => {
                let _ = audit.record(
                    entry.agent_id,
                    AuditKind::PlanRefused,
                    evaluation.goal_id.raw(),
                    0,
                    i64::from(refusal.code()),
                );
                (None, refusal)
            }
        };

        if let Some(plan) = &plan {
            let _ = audit.record(
                entry.agent_id,
                AuditKind::PlanBuilt,
                plan.plan_id.raw(),
                evaluation.goal_id.raw(),
                i64::from(plan.step_count()),
            );
            entry.active_goal_ref = evaluation.goal_id;
            entry.active_plan_ref = plan.plan_id;

            // A doctrine with scheduling policy may reshape the next
            // think; leaving next_think_act untouched keeps the plain
            // interval cadence.
            if evaluation.applied_doctrine_ref.is_some() {
                if let Some(doctrine) = doctrines.find(evaluation.applied_doctrine_ref) {
                    let desired = now.saturating_add(entry.think_interval_act);
                    let shaped = doctrine.next_think_act(now, desired);
                    if shaped != desired {
                        entry.next_think_act = shaped;
                    }
                }
            }
        } else {
            debug!(agent_id = %entry.agent_id, refusal = refusal.label(), "Plan refused");
        }

        outcomes.push(ThinkOutcome {
            agent_id: entry.agent_id,
            act: now,
            evaluation,
            plan,
            refusal,
        });
    });

    let thinks = schedule.processed_last();
    info!(target_tick, thinks, "Think cycle finished");
    ThinkSummary {
        target_tick,
        thinks,
        doctrine_events_processed,
        outcomes,
    }
}

/// Assemble the subjective context an agent thinks with.
fn assemble_context(
    profile: &AgentProfile,
    belief_state: &BeliefState,
    beliefs: &BeliefStore,
    authority: &AuthorityRegistry,
    now_act: ActTime,
) -> AgentContext {
    let agent_id = profile.agent_id;
    let known_ref = |topic: BeliefTopic| {
        beliefs
            .best_topic(agent_id, topic)
            .map_or(0, |entry| entry.knowledge_ref)
    };
    AgentContext {
        agent_id,
        capability_mask: profile.capability_mask,
        authority_mask: authority.effective_mask(agent_id, profile.base_authority_mask, now_act),
        knowledge_mask: belief_state.knowledge_mask | beliefs.mask(agent_id),
        hunger_level: belief_state.hunger_level,
        threat_level: belief_state.threat_level,
        risk_tolerance_q16: profile.risk_tolerance_q16,
        epistemic_confidence_q16: profile.epistemic_confidence_q16,
        known_resource_ref: known_ref(BeliefTopic::Resource),
        known_threat_ref: known_ref(BeliefTopic::Threat),
        known_destination_ref: known_ref(BeliefTopic::SafeRoute),
        role_id: profile.role_id,
        explicit_doctrine_ref: profile.explicit_doctrine_ref,
        org_doctrine_ref: profile.org_doctrine_ref,
        jurisdiction_doctrine_ref: profile.jurisdiction_doctrine_ref,
        personal_doctrine_ref: profile.personal_doctrine_ref,
        legitimacy_value: profile.legitimacy_value,
    }
}

/// Run a built plan through the social veto registries. Returns the
/// refusal and the vetoing entity id on failure.
fn veto_plan(
    plan: &Plan,
    profile: &AgentProfile,
    constraints: &ConstraintRegistry,
    contracts: &ContractRegistry,
    delegations: &DelegationRegistry,
    now_act: ActTime,
) -> Result<(), (Refusal, u64)> {
    for step in &plan.steps {
        if let Err(institution_id) =
            constraints.allows_process(profile.agent_id, step.process_kind, now_act)
        {
            return Err((Refusal::InsufficientAuthority, institution_id.raw()));
        }
    }
    if let Err(contract_id) = contracts.check_plan(profile.agent_id, plan, now_act) {
        return Err((Refusal::InsufficientAuthority, contract_id.raw()));
    }
    if profile.requires_delegation {
        delegations
            .check_plan(profile.agent_id.raw(), plan, now_act)
            .map_err(|refusal| (refusal, 0))?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use polity_agents::belief::{BeliefEvent, BeliefEventKind};
    use polity_agents::constraint::{Constraint, ConstraintMode};
    use polity_agents::goal::{GoalDesc, GoalPreconditions};
    use polity_types::{
        ConstraintId, GoalType, InstitutionId, ProcessKind, CAP_MOVE, CONFIDENCE_MAX,
        KNOW_RESOURCE,
    };

    use super::*;

    fn state_with_agent(agent: u64) -> KernelState {
        let mut state = KernelState::new(KernelConfig::default(), 0);
        state
            .register_agent(
                AgentProfile {
                    agent_id: AgentId::new(agent),
                    capability_mask: CAP_MOVE,
                    risk_tolerance_q16: CONFIDENCE_MAX,
                    ..AgentProfile::default()
                },
                1,
                5,
            )
            .unwrap();
        state
    }

    fn acquire_goal(agent: u64) -> GoalDesc {
        GoalDesc {
            agent_id: AgentId::new(agent),
            goal_type: GoalType::Acquire,
            base_priority: 400,
            preconditions: GoalPreconditions {
                required_capabilities: CAP_MOVE,
                ..GoalPreconditions::default()
            },
            ..GoalDesc::default()
        }
    }

    fn observe_resource(agent: u64, resource: u64) -> BeliefEvent {
        BeliefEvent {
            kind: BeliefEventKind::Observe,
            agent_id: AgentId::new(agent),
            knowledge_ref: resource,
            topic: Some(BeliefTopic::Resource),
            confidence_q16: CONFIDENCE_MAX,
            ..BeliefEvent::default()
        }
    }

    #[test]
    fn due_agent_chooses_and_plans() {
        let mut state = state_with_agent(1);
        state.goals.register(acquire_goal(1)).unwrap();
        state.beliefs.apply_event(&observe_resource(1, 555), 0).unwrap();

        let summary = run_think_cycle(&mut state, 1);
        assert_eq!(summary.thinks, 1);
        let outcome = summary.outcomes.first().unwrap();
        assert_eq!(outcome.refusal, Refusal::None);
        let plan = outcome.plan.as_ref().unwrap();
        assert_eq!(plan.steps.first().unwrap().target_ref, 555);

        // Audit holds GoalChosen then PlanBuilt under the think's act.
        let kinds: Vec<AuditKind> = state.audit.entries().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![AuditKind::GoalChosen, AuditKind::PlanBuilt]);
        assert!(state.audit.entries().iter().all(|e| e.act_time == 1));

        // The schedule re-armed the agent at its interval.
        assert_eq!(state.schedule.find(AgentId::new(1)).unwrap().next_think_act, 6);
    }

    #[test]
    fn refusals_are_audited_not_planned() {
        let mut state = state_with_agent(1);
        // No goals at all: arbitration refuses.
        let summary = run_think_cycle(&mut state, 1);
        let outcome = summary.outcomes.first().unwrap();
        assert_eq!(outcome.refusal, Refusal::GoalNotFeasible);
        assert!(outcome.plan.is_none());
        let kinds: Vec<AuditKind> = state.audit.entries().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![AuditKind::GoalRefused]);
    }

    #[test]
    fn constraint_vetoes_the_plan() {
        let mut state = state_with_agent(1);
        state.goals.register(acquire_goal(1)).unwrap();
        state.beliefs.apply_event(&observe_resource(1, 555), 0).unwrap();
        state
            .constraints
            .register(Constraint {
                constraint_id: ConstraintId::new(1),
                institution_id: InstitutionId::new(2001),
                target_agent_id: AgentId::new(1),
                process_kind_mask: ProcessKind::Acquire.bit(),
                mode: ConstraintMode::Deny,
                expiry_act: 0,
                revoked: false,
                provenance_id: ProvenanceId::NONE,
            })
            .unwrap();

        let summary = run_think_cycle(&mut state, 1);
        let outcome = summary.outcomes.first().unwrap();
        assert_eq!(outcome.refusal, Refusal::InsufficientAuthority);
        let refused = state
            .audit
            .entries()
            .iter()
            .find(|e| e.kind == AuditKind::PlanRefused)
            .unwrap();
        assert_eq!(refused.related_id, 2001);
    }

    #[test]
    fn decayed_belief_turns_into_knowledge_refusal() {
        let mut state = KernelState::new(
            KernelConfig {
                belief_decay_q16_per_act: 40_000,
                min_confidence_q16: 1_000,
                ..KernelConfig::default()
            },
            0,
        );
        state
            .register_agent(
                AgentProfile {
                    agent_id: AgentId::new(40),
                    capability_mask: CAP_MOVE,
                    risk_tolerance_q16: CONFIDENCE_MAX,
                    ..AgentProfile::default()
                },
                1,
                11,
            )
            .unwrap();
        state
            .goals
            .register(GoalDesc {
                preconditions: GoalPreconditions {
                    required_capabilities: CAP_MOVE,
                    required_knowledge: KNOW_RESOURCE,
                    ..GoalPreconditions::default()
                },
                flags: polity_agents::goal::GOAL_FLAG_REQUIRE_KNOWLEDGE,
                ..acquire_goal(40)
            })
            .unwrap();
        state.beliefs.apply_event(&observe_resource(40, 555), 1).unwrap();

        // First think at act 1: the belief is fresh, the plan targets it.
        let summary = run_think_cycle(&mut state, 1);
        assert_eq!(summary.outcomes.first().unwrap().refusal, Refusal::None);

        // By act 12 decay has erased the belief; the same goal now
        // refuses for missing knowledge.
        let summary = run_think_cycle(&mut state, 12);
        let outcome = summary.outcomes.first().unwrap();
        assert_eq!(outcome.refusal, Refusal::InsufficientKnowledge);
    }

    #[test]
    fn failed_command_corrects_the_belief_state() {
        use polity_agents::belief::CommandOutcome;

        let mut state = state_with_agent(35);
        let goal_id = state
            .goals
            .register(GoalDesc {
                abandon_after_failures: 3,
                ..acquire_goal(35)
            })
            .unwrap();
        if let Some(belief) = state.belief_states.get_mut(&AgentId::new(35)) {
            belief.knowledge_mask = KNOW_RESOURCE;
        }

        state.apply_command_outcome(
            &CommandOutcome {
                agent_id: AgentId::new(35),
                goal_id,
                success: false,
                refusal: Refusal::InsufficientKnowledge,
                ..CommandOutcome::default()
            },
            3,
        );

        // The failure withdrew the resource belief and counted against
        // the goal's budget.
        let belief = state.belief_states.get(&AgentId::new(35)).unwrap();
        assert_eq!(belief.knowledge_mask & KNOW_RESOURCE, 0);
        assert_eq!(state.goals.find(goal_id).unwrap().failure_count, 1);
    }

    #[test]
    fn identical_runs_have_identical_audit_fingerprints() {
        let build = || {
            let mut state = state_with_agent(50);
            state.goals.register(acquire_goal(50)).unwrap();
            state.beliefs.apply_event(&observe_resource(50, 888), 0).unwrap();
            run_think_cycle(&mut state, 10);
            state.audit.fingerprint()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn stepwise_and_batch_cycles_agree() {
        let drive = |targets: &[ActTime]| {
            let mut state = state_with_agent(7);
            state.goals.register(acquire_goal(7)).unwrap();
            state.beliefs.apply_event(&observe_resource(7, 99), 0).unwrap();
            for &target in targets {
                run_think_cycle(&mut state, target);
            }
            state.audit.fingerprint()
        };
        assert_eq!(drive(&[5, 10]), drive(&[10]));
    }
}
