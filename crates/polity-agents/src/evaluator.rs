//! Deterministic goal arbitration.
//!
//! The evaluator walks an agent's goals once, in ascending goal-id
//! order, and selects the highest doctrine-modified priority whose
//! preconditions hold. It tracks the best *overall* candidate separately
//! from the best *feasible* one so that, when nothing is feasible, it can
//! report the most specific refusal it can justify: a doctrine filter, an
//! expired best candidate, or the concrete precondition the best
//! candidate fails.
//!
//! Scoring is fixed-point throughout: priorities clamp to the priority
//! scale before being scaled by the Q16 confidence floor of goal and
//! context, and ties always break toward the lowest goal id.

use serde::{Deserialize, Serialize};

use polity_types::{
    clamp_priority, mask_covers, scale_by_confidence, ActTime, DoctrineId, GoalId, GoalType,
    Refusal, RoleId, CONFIDENCE_MAX, NEED_SCALE,
};

use crate::context::AgentContext;
use crate::doctrine::{Doctrine, DoctrineBinding, DoctrineRegistry};
use crate::goal::{Goal, GoalCondition, GoalRegistry, GOAL_FLAG_ALLOW_UNKNOWN};
use crate::role::RoleRegistry;

/// The outcome of one arbitration pass.
///
/// `refusal == Refusal::None` means `goal_id` names the chosen goal.
/// Otherwise `goal_id` names the best candidate the refusal is about
/// (or is `NONE` when no goal survived the filters at all).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GoalEvaluation {
    /// The chosen (or best-refused) goal.
    pub goal_id: GoalId,
    /// The goal's type, when one was considered.
    pub goal_type: Option<GoalType>,
    /// The doctrine-modified, confidence-scaled priority.
    pub computed_priority: u32,
    /// The confidence floor applied to the priority.
    pub confidence_q16: u32,
    /// Why arbitration refused, or `None` on success.
    pub refusal: Refusal,
    /// The doctrine that governed the pass, if any.
    pub applied_doctrine_ref: DoctrineId,
    /// The role resolved for the context, if any.
    pub applied_role_ref: RoleId,
}

/// Arbitrate without any doctrine filter.
pub fn choose_goal(
    goals: &GoalRegistry,
    ctx: &AgentContext,
    now_act: ActTime,
) -> GoalEvaluation {
    evaluate(goals, ctx, now_act, None, RoleId::NONE)
}

/// Arbitrate under the doctrine selected for the context's bindings.
///
/// Role resolution happens first: a context naming an unknown role, or
/// one whose requirements the context's masks do not meet, refuses
/// `RoleMismatch` without consulting any goal. Doctrine selection then
/// follows the strict binding order; its refusals pass through
/// unchanged.
pub fn choose_goal_with_doctrine(
    goals: &GoalRegistry,
    doctrines: &DoctrineRegistry,
    roles: &RoleRegistry,
    ctx: &AgentContext,
    now_act: ActTime,
) -> GoalEvaluation {
    let mut role_doctrine = DoctrineId::NONE;
    let mut applied_role = RoleId::NONE;
    if ctx.role_id.is_some() {
        let Some(role) = roles.find(ctx.role_id) else {
            return refused(Refusal::RoleMismatch, DoctrineId::NONE, RoleId::NONE);
        };
        if !role.requirements_ok(ctx.authority_mask, ctx.capability_mask) {
            return refused(Refusal::RoleMismatch, DoctrineId::NONE, RoleId::NONE);
        }
        role_doctrine = role.default_doctrine_ref;
        applied_role = role.role_id;
    }
    let binding = DoctrineBinding {
        explicit_doctrine_ref: ctx.explicit_doctrine_ref,
        role_doctrine_ref: role_doctrine,
        org_doctrine_ref: ctx.org_doctrine_ref,
        jurisdiction_doctrine_ref: ctx.jurisdiction_doctrine_ref,
        personal_doctrine_ref: ctx.personal_doctrine_ref,
        authority_mask: ctx.authority_mask,
        legitimacy_value: ctx.legitimacy_value,
    };
    match doctrines.select(&binding, now_act) {
        Ok(doctrine) => evaluate(goals, ctx, now_act, Some(doctrine), applied_role),
        Err(refusal) => refused(refusal, DoctrineId::NONE, applied_role),
    }
}

/// Check a goal's mask preconditions against a context.
///
/// `ALLOW_UNKNOWN` downgrades missing knowledge from a refusal to an
/// acceptance; the planner later embeds the gap in the plan instead.
pub fn preconditions_ok(goal: &Goal, ctx: &AgentContext) -> Result<(), Refusal> {
    if !mask_covers(ctx.capability_mask, goal.preconditions.required_capabilities) {
        return Err(Refusal::InsufficientCapability);
    }
    if !mask_covers(ctx.authority_mask, goal.preconditions.required_authority) {
        return Err(Refusal::InsufficientAuthority);
    }
    if !mask_covers(ctx.knowledge_mask, goal.preconditions.required_knowledge)
        && goal.flags & GOAL_FLAG_ALLOW_UNKNOWN == 0
    {
        return Err(Refusal::InsufficientKnowledge);
    }
    Ok(())
}

fn evaluate(
    goals: &GoalRegistry,
    ctx: &AgentContext,
    now_act: ActTime,
    doctrine: Option<&Doctrine>,
    applied_role: RoleId,
) -> GoalEvaluation {
    let applied_doctrine = doctrine.map_or(DoctrineId::NONE, |d| d.doctrine_id);
    let mut best: Option<(&Goal, u32, u32)> = None;
    let mut best_feasible: Option<(&Goal, u32, u32)> = None;
    let mut filtered_by_doctrine = false;

    for goal in goals.goals() {
        if goal.agent_id.is_some() && ctx.agent_id.is_some() && goal.agent_id != ctx.agent_id {
            continue;
        }
        if !goal.is_active(now_act) {
            continue;
        }
        if let Some(doctrine) = doctrine {
            if !doctrine.allows_goal(goal.goal_type) {
                filtered_by_doctrine = true;
                continue;
            }
        }
        if !conditions_ok(goal, ctx) {
            continue;
        }
        if !risk_ok(goal, ctx) {
            continue;
        }
        let (mut priority, confidence) = priority_score(goal, ctx);
        if let Some(doctrine) = doctrine {
            priority = doctrine.apply_priority(goal.goal_type, priority);
        }
        if beats(best, priority, goal.goal_id) {
            best = Some((goal, priority, confidence));
        }
        if goal.is_expired(now_act) {
            continue;
        }
        if preconditions_ok(goal, ctx).is_ok() && beats(best_feasible, priority, goal.goal_id) {
            best_feasible = Some((goal, priority, confidence));
        }
    }

    if let Some((goal, priority, confidence)) = best_feasible {
        return GoalEvaluation {
            goal_id: goal.goal_id,
            goal_type: Some(goal.goal_type),
            computed_priority: priority,
            confidence_q16: confidence,
            refusal: Refusal::None,
            applied_doctrine_ref: applied_doctrine,
            applied_role_ref: applied_role,
        };
    }

    let Some((goal, priority, confidence)) = best else {
        let refusal = if filtered_by_doctrine {
            Refusal::GoalForbiddenByDoctrine
        } else {
            Refusal::GoalNotFeasible
        };
        return refused(refusal, applied_doctrine, applied_role);
    };

    let refusal = if goal.is_expired(now_act) {
        Refusal::PlanExpired
    } else {
        match preconditions_ok(goal, ctx) {
            Err(specific) => specific,
            Ok(()) => Refusal::GoalNotFeasible,
        }
    };
    GoalEvaluation {
        goal_id: goal.goal_id,
        goal_type: Some(goal.goal_type),
        computed_priority: priority,
        confidence_q16: confidence,
        refusal,
        applied_doctrine_ref: applied_doctrine,
        applied_role_ref: applied_role,
    }
}

/// Whether a candidate at `(priority, goal_id)` displaces the incumbent:
/// higher priority wins, the lower goal id wins ties.
fn beats(incumbent: Option<(&Goal, u32, u32)>, priority: u32, goal_id: GoalId) -> bool {
    match incumbent {
        None => true,
        Some((goal, best_priority, _)) => {
            priority > best_priority || (priority == best_priority && goal_id < goal.goal_id)
        }
    }
}

/// Raw priority and confidence for a goal in a context.
///
/// Need boosts: hunger raises `Survive`, threat raises `Defend`. The
/// total clamps to the priority scale *before* confidence scaling.
fn priority_score(goal: &Goal, ctx: &AgentContext) -> (u32, u32) {
    let mut total =
        u64::from(goal.base_priority).saturating_add(u64::from(goal.urgency));
    match goal.goal_type {
        GoalType::Survive => total = total.saturating_add(u64::from(ctx.hunger_level)),
        GoalType::Defend => total = total.saturating_add(u64::from(ctx.threat_level)),
        _ => {}
    }
    let mut confidence = CONFIDENCE_MAX;
    if ctx.epistemic_confidence_q16 > 0 {
        confidence = ctx.epistemic_confidence_q16;
    }
    if goal.epistemic_confidence_q16 > 0 && goal.epistemic_confidence_q16 < confidence {
        confidence = goal.epistemic_confidence_q16;
    }
    let clamped = clamp_priority(i64::try_from(total).unwrap_or(i64::MAX));
    (scale_by_confidence(clamped, confidence), confidence)
}

/// Evaluate the goal's declarative conditions against the context.
fn conditions_ok(goal: &Goal, ctx: &AgentContext) -> bool {
    goal.conditions.iter().all(|condition| match *condition {
        GoalCondition::Knowledge { bits } => mask_covers(ctx.knowledge_mask, bits),
        GoalCondition::Resource { subject_ref } => {
            ctx.known_resource_ref != 0
                && (subject_ref == 0 || ctx.known_resource_ref == subject_ref)
        }
        GoalCondition::Threat { subject_ref } => {
            ctx.known_threat_ref != 0 && (subject_ref == 0 || ctx.known_threat_ref == subject_ref)
        }
        GoalCondition::Destination { subject_ref } => {
            ctx.known_destination_ref != 0
                && (subject_ref == 0 || ctx.known_destination_ref == subject_ref)
        }
    })
}

/// The risk gate: skip a goal whose estimated risk exceeds both what the
/// goal accepts and what the agent tolerates.
fn risk_ok(goal: &Goal, ctx: &AgentContext) -> bool {
    if goal.acceptable_risk_q16 == 0 {
        return true;
    }
    let product = u64::from(ctx.threat_level).saturating_mul(u64::from(CONFIDENCE_MAX));
    let Some(risk_estimate) = product.checked_div(u64::from(NEED_SCALE)) else {
        return true;
    };
    let risk_estimate_q16 = u32::try_from(risk_estimate).unwrap_or(u32::MAX);
    !(risk_estimate_q16 > goal.acceptable_risk_q16
        && ctx.risk_tolerance_q16 < risk_estimate_q16)
}

const fn refused(refusal: Refusal, doctrine: DoctrineId, role: RoleId) -> GoalEvaluation {
    GoalEvaluation {
        goal_id: GoalId::NONE,
        goal_type: None,
        computed_priority: 0,
        confidence_q16: 0,
        refusal,
        applied_doctrine_ref: doctrine,
        applied_role_ref: role,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use polity_types::{
        AgentId, AUTH_BASIC, AUTH_MILITARY, AUTH_TRADE, CAP_DEFEND, CAP_MOVE, CAP_TRADE,
    };

    use super::*;
    use crate::doctrine::Doctrine;
    use crate::goal::{GoalDesc, GoalPreconditions};
    use crate::role::Role;

    fn register(
        reg: &mut GoalRegistry,
        agent: u64,
        goal_type: GoalType,
        base_priority: u32,
        caps: u32,
    ) -> GoalId {
        reg.register(GoalDesc {
            agent_id: AgentId::new(agent),
            goal_type,
            base_priority,
            preconditions: GoalPreconditions {
                required_capabilities: caps,
                ..GoalPreconditions::default()
            },
            ..GoalDesc::default()
        })
        .unwrap()
    }

    fn ctx(agent: u64, caps: u32, auth: u32) -> AgentContext {
        AgentContext {
            agent_id: AgentId::new(agent),
            capability_mask: caps,
            authority_mask: auth,
            ..AgentContext::default()
        }
    }

    #[test]
    fn highest_priority_feasible_goal_wins() {
        let mut reg = GoalRegistry::new(4, 1);
        register(&mut reg, 1, GoalType::Survive, 100, CAP_MOVE);
        let b = register(&mut reg, 1, GoalType::Acquire, 400, 0);
        let eval = choose_goal(
            &reg,
            &ctx(1, CAP_MOVE | CAP_TRADE, AUTH_BASIC | AUTH_TRADE),
            10,
        );
        assert_eq!(eval.refusal, Refusal::None);
        assert_eq!(eval.goal_id, b);
        assert_eq!(eval.computed_priority, 400);
    }

    #[test]
    fn hunger_boosts_survive_goals() {
        let mut reg = GoalRegistry::new(4, 1);
        let survive = register(&mut reg, 1, GoalType::Survive, 100, 0);
        let acquire = register(&mut reg, 1, GoalType::Acquire, 400, 0);
        let mut context = ctx(1, 0, 0);
        assert_eq!(choose_goal(&reg, &context, 1).goal_id, acquire);
        context.hunger_level = 500;
        assert_eq!(choose_goal(&reg, &context, 1).goal_id, survive);
    }

    #[test]
    fn recorded_failure_rewrites_arbitration() {
        let mut reg = GoalRegistry::new(4, 1);
        let a = reg
            .register(GoalDesc {
                agent_id: AgentId::new(20),
                goal_type: GoalType::Acquire,
                base_priority: 500,
                abandon_after_failures: 1,
                ..GoalDesc::default()
            })
            .unwrap();
        let b = register(&mut reg, 20, GoalType::Defend, 100, 0);
        let context = ctx(20, CAP_MOVE | CAP_DEFEND, AUTH_BASIC | AUTH_MILITARY);
        assert_eq!(choose_goal(&reg, &context, 1).goal_id, a);
        reg.record_failure(a, 2).unwrap();
        assert_eq!(choose_goal(&reg, &context, 3).goal_id, b);
    }

    #[test]
    fn infeasible_best_reports_specific_precondition() {
        let mut reg = GoalRegistry::new(4, 1);
        register(&mut reg, 1, GoalType::Defend, 900, CAP_DEFEND);
        let eval = choose_goal(&reg, &ctx(1, CAP_MOVE, AUTH_BASIC), 1);
        assert_eq!(eval.refusal, Refusal::InsufficientCapability);
        assert_eq!(eval.goal_type, Some(GoalType::Defend));
    }

    #[test]
    fn risk_gate_skips_dangerous_goals() {
        let mut reg = GoalRegistry::new(4, 1);
        let risky = reg
            .register(GoalDesc {
                agent_id: AgentId::new(1),
                goal_type: GoalType::Acquire,
                base_priority: 900,
                acceptable_risk_q16: 1_000,
                ..GoalDesc::default()
            })
            .unwrap();
        let safe = register(&mut reg, 1, GoalType::Survive, 100, 0);
        let mut context = ctx(1, 0, 0);
        context.threat_level = 500; // estimate: 500 * 65536 / 1000 = 32768
        context.risk_tolerance_q16 = 0;
        assert_eq!(choose_goal(&reg, &context, 1).goal_id, safe);
        // A tolerant agent accepts the same risk.
        context.risk_tolerance_q16 = CONFIDENCE_MAX;
        assert_eq!(choose_goal(&reg, &context, 1).goal_id, risky);
    }

    #[test]
    fn confidence_scales_priority() {
        let mut reg = GoalRegistry::new(4, 1);
        register(&mut reg, 1, GoalType::Acquire, 400, 0);
        let mut context = ctx(1, 0, 0);
        context.epistemic_confidence_q16 = CONFIDENCE_MAX / 2;
        let eval = choose_goal(&reg, &context, 1);
        assert_eq!(eval.computed_priority, 200);
        assert_eq!(eval.confidence_q16, CONFIDENCE_MAX / 2);
    }

    #[test]
    fn doctrine_filters_and_reports() {
        let mut goals = GoalRegistry::new(4, 1);
        register(&mut goals, 1, GoalType::Trade, 400, 0);
        let mut doctrines = DoctrineRegistry::new(2);
        doctrines
            .register(Doctrine {
                doctrine_id: DoctrineId::new(5),
                forbidden_goal_types: GoalType::Trade.bit(),
                ..Doctrine::default()
            })
            .unwrap();
        let roles = RoleRegistry::new(1);
        let mut context = ctx(1, 0, 0);
        context.explicit_doctrine_ref = DoctrineId::new(5);
        let eval = choose_goal_with_doctrine(&goals, &doctrines, &roles, &context, 1);
        assert_eq!(eval.refusal, Refusal::GoalForbiddenByDoctrine);
        assert_eq!(eval.applied_doctrine_ref, DoctrineId::new(5));
    }

    #[test]
    fn doctrine_modifier_changes_winner() {
        let mut goals = GoalRegistry::new(4, 1);
        register(&mut goals, 1, GoalType::Trade, 400, 0);
        let defend = register(&mut goals, 1, GoalType::Defend, 300, 0);
        let mut doctrine = Doctrine {
            doctrine_id: DoctrineId::new(5),
            ..Doctrine::default()
        };
        doctrine.priority_modifiers[GoalType::Defend.index()] = 200;
        let mut doctrines = DoctrineRegistry::new(2);
        doctrines.register(doctrine).unwrap();
        let roles = RoleRegistry::new(1);
        let mut context = ctx(1, 0, 0);
        context.explicit_doctrine_ref = DoctrineId::new(5);
        let eval = choose_goal_with_doctrine(&goals, &doctrines, &roles, &context, 1);
        assert_eq!(eval.goal_id, defend);
        assert_eq!(eval.computed_priority, 500);
    }

    #[test]
    fn unknown_role_is_a_mismatch() {
        let goals = GoalRegistry::new(2, 1);
        let doctrines = DoctrineRegistry::new(1);
        let roles = RoleRegistry::new(1);
        let mut context = ctx(1, 0, 0);
        context.role_id = RoleId::new(99);
        let eval = choose_goal_with_doctrine(&goals, &doctrines, &roles, &context, 1);
        assert_eq!(eval.refusal, Refusal::RoleMismatch);
    }

    #[test]
    fn role_default_doctrine_applies() {
        let mut goals = GoalRegistry::new(2, 1);
        register(&mut goals, 1, GoalType::Trade, 400, 0);
        let mut doctrines = DoctrineRegistry::new(2);
        doctrines
            .register(Doctrine {
                doctrine_id: DoctrineId::new(7),
                ..Doctrine::default()
            })
            .unwrap();
        let mut roles = RoleRegistry::new(2);
        roles
            .register(Role {
                role_id: RoleId::new(3),
                default_doctrine_ref: DoctrineId::new(7),
                authority_requirements: 0,
                capability_requirements: 0,
            })
            .unwrap();
        let mut context = ctx(1, 0, 0);
        context.role_id = RoleId::new(3);
        let eval = choose_goal_with_doctrine(&goals, &doctrines, &roles, &context, 1);
        assert_eq!(eval.refusal, Refusal::None);
        assert_eq!(eval.applied_doctrine_ref, DoctrineId::new(7));
        assert_eq!(eval.applied_role_ref, RoleId::new(3));
    }

    #[test]
    fn conditions_pin_known_subjects() {
        let mut reg = GoalRegistry::new(4, 1);
        reg.register(GoalDesc {
            agent_id: AgentId::new(1),
            goal_type: GoalType::Acquire,
            base_priority: 400,
            conditions: vec![GoalCondition::Resource { subject_ref: 1001 }],
            ..GoalDesc::default()
        })
        .unwrap();
        let mut context = ctx(1, 0, 0);
        assert_eq!(choose_goal(&reg, &context, 1).refusal, Refusal::GoalNotFeasible);
        context.known_resource_ref = 2002;
        assert_eq!(choose_goal(&reg, &context, 1).refusal, Refusal::GoalNotFeasible);
        context.known_resource_ref = 1001;
        assert_eq!(choose_goal(&reg, &context, 1).refusal, Refusal::None);
    }
}
