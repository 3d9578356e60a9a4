//! Bounded deterministic planning.
//!
//! The planner maps `(goal type, context)` to a short, fixed sequence of
//! process steps -- never more than [`PLAN_MAX_STEPS`], never searched,
//! never sampled. Step targets come from the agent's *believed*
//! references, so two agents with divergent beliefs produce divergent
//! plans from the same goal definition. Epistemic gaps the goal tolerates
//! are embedded in the plan as flagged failure points instead of being
//! refused up front.

use serde::{Deserialize, Serialize};

use polity_types::{
    fnv1a_str, mask_covers, ActTime, AgentId, AuthorityMask, CapabilityMask, GoalId, GoalType,
    KnowledgeMask, PlanId, ProcessId, ProcessKind, Refusal, CONFIDENCE_MAX,
};

use crate::context::AgentContext;
use crate::goal::{Goal, GOAL_FLAG_ALLOW_UNKNOWN, GOAL_FLAG_REQUIRE_KNOWLEDGE};

/// Hard upper bound on steps in any plan.
pub const PLAN_MAX_STEPS: usize = 8;

/// Step flag: the step operates on knowledge the agent lacks.
pub const STEP_FLAG_EPISTEMIC_GAP: u32 = 1 << 0;

/// Step flag: the step carries a non-zero failure mode.
pub const STEP_FLAG_FAILURE_POINT: u32 = 1 << 1;

// ---------------------------------------------------------------------------
// Plan records
// ---------------------------------------------------------------------------

/// One process step of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Deterministic process template id for the kind.
    pub process_id: ProcessId,
    /// What kind of work the step performs.
    pub process_kind: ProcessKind,
    /// The believed reference the step operates on (`0` = none).
    pub target_ref: u64,
    /// Capability the step requires (inherited from the goal).
    pub required_capability_mask: CapabilityMask,
    /// Authority the step requires (inherited from the goal).
    pub required_authority_mask: AuthorityMask,
    /// Expected cost in abstract units.
    pub expected_cost_units: u32,
    /// Knowledge bits the step needs but the agent lacks.
    pub epistemic_gap_mask: KnowledgeMask,
    /// The confidence floor of goal and context at build time.
    pub confidence_q16: u32,
    /// Stable refusal code expected if the step fails (`0` = none).
    pub failure_mode_id: u32,
    /// `STEP_FLAG_*` bits.
    pub flags: u32,
}

/// A bounded plan for one goal.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Plan {
    /// Plan id; defaults to the goal id unless overridden.
    pub plan_id: PlanId,
    /// The executing agent.
    pub agent_id: AgentId,
    /// The goal this plan serves.
    pub goal_id: GoalId,
    /// The steps, at most [`PLAN_MAX_STEPS`].
    pub steps: Vec<PlanStep>,
    /// Index of the next step to execute.
    pub step_cursor: u32,
    /// Sum of step costs.
    pub estimated_cost: u32,
    /// Union of step capability requirements.
    pub required_capability_mask: CapabilityMask,
    /// Union of step authority requirements.
    pub required_authority_mask: AuthorityMask,
    /// Union of step epistemic gaps.
    pub expected_epistemic_gap_mask: KnowledgeMask,
    /// Minimum step confidence.
    pub confidence_q16: u32,
    /// Bit per step index whose failure mode is non-zero.
    pub failure_point_mask: u32,
    /// Compute budget consumed while building.
    pub compute_budget_used: u32,
    /// `step_duration_act * step_count`.
    pub estimated_duration_act: ActTime,
    /// When execution is expected to complete.
    pub next_due_tick: ActTime,
    /// When the plan was built.
    pub created_act: ActTime,
    /// Hard expiry inherited from options or goal (`0` = none).
    pub expiry_act: ActTime,
    /// Soft horizon inherited from the goal (`0` = none).
    pub horizon_act: ActTime,
}

impl Plan {
    /// Number of steps.
    pub fn step_count(&self) -> u32 {
        u32::try_from(self.steps.len()).unwrap_or(u32::MAX)
    }
}

/// Caller-supplied bounds and overrides for one build. Zero fields mean
/// "unset".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanOptions {
    /// Step ceiling (`0` = the hard maximum).
    pub max_steps: u32,
    /// Depth ceiling, an additional cap on steps (`0` = unset).
    pub max_depth: u32,
    /// Compute budget, an additional cap on steps (`0` = unset).
    pub compute_budget: u32,
    /// Resume execution at this step index (`0` = from the start).
    pub resume_step: u32,
    /// Plan id override (`NONE` = use the goal id).
    pub plan_id: PlanId,
    /// Expiry override (`0` = use the goal's).
    pub expiry_act: ActTime,
    /// Duration charged per step (`0` = one act).
    pub step_duration_act: ActTime,
}

// ---------------------------------------------------------------------------
// Process ids
// ---------------------------------------------------------------------------

/// The fixed 64-bit id of a process kind, derived by FNV-1a from its
/// stable string key. Bit-identical across implementations.
pub fn process_id_for_kind(kind: ProcessKind) -> ProcessId {
    ProcessId::new(fnv1a_str(kind.id_key()))
}

// ---------------------------------------------------------------------------
// Plan construction
// ---------------------------------------------------------------------------

/// Build a bounded plan for `goal` in `ctx`.
///
/// Preflight refuses `PlanExpired` when the goal (or an options
/// override) has lapsed, then checks the goal's capability and knowledge
/// preconditions (`ALLOW_UNKNOWN` downgrades missing knowledge into
/// plan-embedded gap flags). The step template is fixed per goal type;
/// exceeding the effective step limit refuses `GoalNotFeasible`.
pub fn build_plan(
    goal: &Goal,
    ctx: &AgentContext,
    options: &PlanOptions,
    now_act: ActTime,
) -> Result<Plan, Refusal> {
    if expired_at(goal, options, now_act) {
        return Err(Refusal::PlanExpired);
    }
    planner_preconditions_ok(goal, ctx)?;

    let limit = step_limit(options);
    let step_duration = if options.step_duration_act > 0 {
        options.step_duration_act
    } else {
        1
    };
    let confidence = step_confidence(goal, ctx);
    let missing_knowledge = goal.preconditions.required_knowledge & !ctx.knowledge_mask;
    let failure_mode = if missing_knowledge != 0 && goal.flags & GOAL_FLAG_REQUIRE_KNOWLEDGE != 0 {
        Refusal::InsufficientKnowledge.code()
    } else {
        0
    };

    let template: [Option<(ProcessKind, u64)>; 2] = match goal.goal_type {
        GoalType::Survive => [
            Some((ProcessKind::Move, ctx.known_resource_ref)),
            Some((ProcessKind::Acquire, ctx.known_resource_ref)),
        ],
        GoalType::Acquire => [Some((ProcessKind::Acquire, ctx.known_resource_ref)), None],
        GoalType::Defend => [Some((ProcessKind::Defend, ctx.known_threat_ref)), None],
        GoalType::Migrate => [Some((ProcessKind::Move, ctx.known_destination_ref)), None],
        GoalType::Research => [Some((ProcessKind::Research, 0)), None],
        GoalType::Trade => [Some((ProcessKind::Trade, ctx.known_resource_ref)), None],
        GoalType::Survey => [Some((ProcessKind::Survey, ctx.known_destination_ref)), None],
        GoalType::Maintain => [
            Some((ProcessKind::Survey, ctx.known_resource_ref)),
            Some((ProcessKind::Maintain, ctx.known_resource_ref)),
        ],
        GoalType::Stabilize => [
            Some((ProcessKind::Survey, ctx.known_destination_ref)),
            Some((ProcessKind::Transfer, ctx.known_destination_ref)),
        ],
    };

    let mut plan = Plan {
        plan_id: if options.plan_id.is_some() {
            options.plan_id
        } else {
            PlanId::new(goal.goal_id.raw())
        },
        agent_id: if goal.agent_id.is_some() {
            goal.agent_id
        } else {
            ctx.agent_id
        },
        goal_id: goal.goal_id,
        confidence_q16: CONFIDENCE_MAX,
        created_act: now_act,
        expiry_act: if options.expiry_act != 0 {
            options.expiry_act
        } else {
            goal.expiry_act
        },
        horizon_act: goal.horizon_act,
        ..Plan::default()
    };

    // Research produces knowledge rather than consuming it; its steps
    // never carry an epistemic gap.
    let (gap, step_failure_mode) = if matches!(goal.goal_type, GoalType::Research) {
        (0, 0)
    } else {
        (missing_knowledge, failure_mode)
    };

    for (kind, target_ref) in template.into_iter().flatten() {
        add_step(
            &mut plan,
            limit,
            kind,
            target_ref,
            goal.preconditions.required_capabilities,
            goal.preconditions.required_authority,
            1,
            gap,
            confidence,
            step_failure_mode,
        )
        .map_err(|()| Refusal::GoalNotFeasible)?;
    }

    plan.compute_budget_used = plan.step_count();
    plan.estimated_duration_act = step_duration.saturating_mul(ActTime::from(plan.step_count()));
    plan.next_due_tick = now_act.saturating_add(plan.estimated_duration_act);
    if options.resume_step > 0 && options.resume_step < plan.step_count() {
        plan.step_cursor = options.resume_step;
    }
    Ok(plan)
}

/// Scale a single plan to a whole cohort: the total and per-step costs
/// multiply by the cohort size, saturating at `u32::MAX`. Returns `None`
/// for an empty cohort.
pub fn scale_plan_for_cohort(plan: &Plan, cohort_size: u32) -> Option<Plan> {
    if cohort_size == 0 {
        return None;
    }
    let mut scaled = plan.clone();
    if scaled.estimated_cost > 0 {
        let cost = u64::from(scaled.estimated_cost) * u64::from(cohort_size);
        scaled.estimated_cost = u32::try_from(cost).unwrap_or(u32::MAX);
    }
    for step in &mut scaled.steps {
        if step.expected_cost_units > 0 {
            let cost = u64::from(step.expected_cost_units) * u64::from(cohort_size);
            step.expected_cost_units = u32::try_from(cost).unwrap_or(u32::MAX);
        }
    }
    Some(scaled)
}

/// The planner's precondition gate.
///
/// Unlike arbitration, planning does not re-check authority: vetoes over
/// process kinds belong to the constraint, contract, and delegation
/// registries that inspect the finished plan.
fn planner_preconditions_ok(goal: &Goal, ctx: &AgentContext) -> Result<(), Refusal> {
    if !mask_covers(ctx.capability_mask, goal.preconditions.required_capabilities) {
        return Err(Refusal::InsufficientCapability);
    }
    if !mask_covers(ctx.knowledge_mask, goal.preconditions.required_knowledge)
        && goal.flags & GOAL_FLAG_ALLOW_UNKNOWN == 0
    {
        return Err(Refusal::InsufficientKnowledge);
    }
    Ok(())
}

/// The earliest applicable expiry of goal and options, if any, has
/// passed.
const fn expired_at(goal: &Goal, options: &PlanOptions, now_act: ActTime) -> bool {
    let mut expiry = if options.expiry_act != 0 {
        options.expiry_act
    } else {
        0
    };
    if goal.expiry_act != 0 && (expiry == 0 || goal.expiry_act < expiry) {
        expiry = goal.expiry_act;
    }
    expiry != 0 && expiry <= now_act
}

/// Effective step ceiling: the smallest of the option bounds and the
/// hard maximum, treating zero as "unset".
fn step_limit(options: &PlanOptions) -> usize {
    let mut limit = if options.max_steps > 0 {
        options.max_steps.min(u32::try_from(PLAN_MAX_STEPS).unwrap_or(u32::MAX))
    } else {
        u32::try_from(PLAN_MAX_STEPS).unwrap_or(u32::MAX)
    };
    if options.compute_budget > 0 && options.compute_budget < limit {
        limit = options.compute_budget;
    }
    if options.max_depth > 0 && options.max_depth < limit {
        limit = options.max_depth;
    }
    usize::try_from(limit).unwrap_or(PLAN_MAX_STEPS).min(PLAN_MAX_STEPS)
}

/// The confidence floor of goal and context, treating zero as unset.
fn step_confidence(goal: &Goal, ctx: &AgentContext) -> u32 {
    let mut confidence = CONFIDENCE_MAX;
    if goal.epistemic_confidence_q16 > 0 {
        confidence = goal.epistemic_confidence_q16;
    }
    if ctx.epistemic_confidence_q16 > 0 && ctx.epistemic_confidence_q16 < confidence {
        confidence = ctx.epistemic_confidence_q16;
    }
    confidence
}

#[allow(clippy::too_many_arguments)]
fn add_step(
    plan: &mut Plan,
    limit: usize,
    kind: ProcessKind,
    target_ref: u64,
    required_caps: CapabilityMask,
    required_auth: AuthorityMask,
    expected_cost: u32,
    epistemic_gap_mask: KnowledgeMask,
    confidence_q16: u32,
    failure_mode_id: u32,
) -> Result<(), ()> {
    if plan.steps.len() >= limit || plan.steps.len() >= PLAN_MAX_STEPS {
        return Err(());
    }
    let step_index = u32::try_from(plan.steps.len()).unwrap_or(u32::MAX);
    let mut flags = 0;
    if epistemic_gap_mask != 0 {
        flags |= STEP_FLAG_EPISTEMIC_GAP;
    }
    if failure_mode_id != 0 {
        flags |= STEP_FLAG_FAILURE_POINT;
        plan.failure_point_mask |= 1u32 << step_index.min(31);
    }
    plan.steps.push(PlanStep {
        process_id: process_id_for_kind(kind),
        process_kind: kind,
        target_ref,
        required_capability_mask: required_caps,
        required_authority_mask: required_auth,
        expected_cost_units: expected_cost,
        epistemic_gap_mask,
        confidence_q16,
        failure_mode_id,
        flags,
    });
    plan.required_capability_mask |= required_caps;
    plan.required_authority_mask |= required_auth;
    plan.expected_epistemic_gap_mask |= epistemic_gap_mask;
    if plan.steps.len() == 1 || confidence_q16 < plan.confidence_q16 {
        plan.confidence_q16 = confidence_q16;
    }
    plan.estimated_cost = plan.estimated_cost.saturating_add(expected_cost);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use polity_types::{AgentId, CAP_MOVE, KNOW_RESOURCE};

    use super::*;
    use crate::goal::{GoalDesc, GoalPreconditions, GoalRegistry};

    fn goal_with(
        agent: u64,
        goal_type: GoalType,
        required_knowledge: KnowledgeMask,
        flags: u32,
    ) -> Goal {
        let mut reg = GoalRegistry::new(1, 1);
        let id = reg
            .register(GoalDesc {
                agent_id: AgentId::new(agent),
                goal_type,
                preconditions: GoalPreconditions {
                    required_capabilities: CAP_MOVE,
                    required_knowledge,
                    ..GoalPreconditions::default()
                },
                flags,
                ..GoalDesc::default()
            })
            .unwrap();
        reg.find(id).unwrap().clone()
    }

    fn ctx_with_knowledge(agent: u64, knowledge: KnowledgeMask, resource: u64) -> AgentContext {
        AgentContext {
            agent_id: AgentId::new(agent),
            capability_mask: CAP_MOVE,
            knowledge_mask: knowledge,
            known_resource_ref: resource,
            ..AgentContext::default()
        }
    }

    #[test]
    fn missing_knowledge_refuses() {
        let goal = goal_with(2, GoalType::Acquire, KNOW_RESOURCE, GOAL_FLAG_REQUIRE_KNOWLEDGE);
        let ctx = ctx_with_knowledge(2, 0, 0);
        let refusal = build_plan(&goal, &ctx, &PlanOptions::default(), 5).unwrap_err();
        assert_eq!(refusal, Refusal::InsufficientKnowledge);
    }

    #[test]
    fn divergent_beliefs_produce_divergent_plans() {
        let goal_a = goal_with(10, GoalType::Acquire, KNOW_RESOURCE, GOAL_FLAG_REQUIRE_KNOWLEDGE);
        let goal_b = goal_with(11, GoalType::Acquire, KNOW_RESOURCE, GOAL_FLAG_REQUIRE_KNOWLEDGE);
        let plan_a = build_plan(
            &goal_a,
            &ctx_with_knowledge(10, KNOW_RESOURCE, 1001),
            &PlanOptions::default(),
            1,
        )
        .unwrap();
        let plan_b = build_plan(
            &goal_b,
            &ctx_with_knowledge(11, KNOW_RESOURCE, 2002),
            &PlanOptions::default(),
            1,
        )
        .unwrap();
        assert_eq!(plan_a.steps.first().unwrap().target_ref, 1001);
        assert_eq!(plan_b.steps.first().unwrap().target_ref, 2002);
    }

    #[test]
    fn allow_unknown_embeds_gap_instead_of_refusing() {
        let goal = goal_with(
            1,
            GoalType::Acquire,
            KNOW_RESOURCE,
            GOAL_FLAG_ALLOW_UNKNOWN | GOAL_FLAG_REQUIRE_KNOWLEDGE,
        );
        let plan = build_plan(
            &goal,
            &ctx_with_knowledge(1, 0, 0),
            &PlanOptions::default(),
            1,
        )
        .unwrap();
        let step = plan.steps.first().unwrap();
        assert_eq!(step.epistemic_gap_mask, KNOW_RESOURCE);
        assert_ne!(step.flags & STEP_FLAG_EPISTEMIC_GAP, 0);
        assert_ne!(step.flags & STEP_FLAG_FAILURE_POINT, 0);
        assert_eq!(step.failure_mode_id, Refusal::InsufficientKnowledge.code());
        assert_eq!(plan.failure_point_mask, 0b1);
        assert_eq!(plan.expected_epistemic_gap_mask, KNOW_RESOURCE);
    }

    #[test]
    fn survive_template_moves_then_acquires() {
        let goal = goal_with(1, GoalType::Survive, 0, 0);
        let plan = build_plan(
            &goal,
            &ctx_with_knowledge(1, 0, 555),
            &PlanOptions::default(),
            7,
        )
        .unwrap();
        let kinds: Vec<ProcessKind> = plan.steps.iter().map(|s| s.process_kind).collect();
        assert_eq!(kinds, vec![ProcessKind::Move, ProcessKind::Acquire]);
        assert!(plan.steps.iter().all(|s| s.target_ref == 555));
        assert_eq!(plan.estimated_cost, 2);
        assert_eq!(plan.estimated_duration_act, 2);
        assert_eq!(plan.next_due_tick, 9);
        assert_eq!(plan.plan_id.raw(), goal.goal_id.raw());
        assert_eq!(plan.created_act, 7);
    }

    #[test]
    fn stabilize_surveys_then_transfers() {
        let goal = goal_with(1, GoalType::Stabilize, 0, 0);
        let mut ctx = ctx_with_knowledge(1, 0, 0);
        ctx.known_destination_ref = 42;
        let plan = build_plan(&goal, &ctx, &PlanOptions::default(), 1).unwrap();
        let kinds: Vec<ProcessKind> = plan.steps.iter().map(|s| s.process_kind).collect();
        assert_eq!(kinds, vec![ProcessKind::Survey, ProcessKind::Transfer]);
        assert!(plan.steps.iter().all(|s| s.target_ref == 42));
    }

    #[test]
    fn compute_budget_caps_steps() {
        let goal = goal_with(1, GoalType::Survive, 0, 0);
        let options = PlanOptions {
            compute_budget: 1,
            ..PlanOptions::default()
        };
        // The survive template needs two steps; a budget of one refuses.
        let refusal = build_plan(&goal, &ctx_with_knowledge(1, 0, 5), &options, 1).unwrap_err();
        assert_eq!(refusal, Refusal::GoalNotFeasible);
    }

    #[test]
    fn plan_requirements_come_from_the_goal() {
        let goal = goal_with(1, GoalType::Acquire, 0, 0);
        let plan = build_plan(
            &goal,
            &ctx_with_knowledge(1, 0, 5),
            &PlanOptions::default(),
            1,
        )
        .unwrap();
        assert!(mask_covers(
            goal.preconditions.required_capabilities,
            plan.required_capability_mask
        ));
        assert_eq!(plan.required_capability_mask, CAP_MOVE);
    }

    #[test]
    fn expired_goal_refuses_plan_expired() {
        let mut goal = goal_with(1, GoalType::Acquire, 0, 0);
        goal.expiry_act = 4;
        let refusal = build_plan(
            &goal,
            &ctx_with_knowledge(1, 0, 5),
            &PlanOptions::default(),
            4,
        )
        .unwrap_err();
        assert_eq!(refusal, Refusal::PlanExpired);
    }

    #[test]
    fn options_expiry_can_tighten() {
        let goal = goal_with(1, GoalType::Acquire, 0, 0);
        let options = PlanOptions {
            expiry_act: 3,
            ..PlanOptions::default()
        };
        let refusal =
            build_plan(&goal, &ctx_with_knowledge(1, 0, 5), &options, 3).unwrap_err();
        assert_eq!(refusal, Refusal::PlanExpired);
    }

    #[test]
    fn resume_step_sets_cursor() {
        let goal = goal_with(1, GoalType::Survive, 0, 0);
        let options = PlanOptions {
            resume_step: 1,
            ..PlanOptions::default()
        };
        let plan = build_plan(&goal, &ctx_with_knowledge(1, 0, 5), &options, 1).unwrap();
        assert_eq!(plan.step_cursor, 1);
    }

    #[test]
    fn process_ids_are_stable_and_distinct() {
        let move_id = process_id_for_kind(ProcessKind::Move);
        assert_eq!(move_id, process_id_for_kind(ProcessKind::Move));
        assert_ne!(move_id, process_id_for_kind(ProcessKind::Trade));
        assert!(move_id.is_some());
    }

    #[test]
    fn cohort_scaling_multiplies_costs() {
        let goal = goal_with(1, GoalType::Survive, 0, 0);
        let plan = build_plan(
            &goal,
            &ctx_with_knowledge(1, 0, 5),
            &PlanOptions::default(),
            1,
        )
        .unwrap();
        let scaled = scale_plan_for_cohort(&plan, 50).unwrap();
        assert_eq!(scaled.estimated_cost, plan.estimated_cost * 50);
        assert_eq!(
            scaled.steps.first().unwrap().expected_cost_units,
            plan.steps.first().unwrap().expected_cost_units * 50
        );
        assert!(scale_plan_for_cohort(&plan, 0).is_none());
    }

    #[test]
    fn cohort_scaling_saturates() {
        let goal = goal_with(1, GoalType::Acquire, 0, 0);
        let mut plan = build_plan(
            &goal,
            &ctx_with_knowledge(1, 0, 5),
            &PlanOptions::default(),
            1,
        )
        .unwrap();
        plan.estimated_cost = u32::MAX / 2;
        let scaled = scale_plan_for_cohort(&plan, 3).unwrap();
        assert_eq!(scaled.estimated_cost, u32::MAX);
    }
}
