//! Agent state and social rule evaluation for the Polity kernel.
//!
//! Everything that acts in the simulation -- a person, a cohort acting as
//! one ("aggregate agent"), an institution, a player body -- is an agent:
//! it holds subjective beliefs, pursues goals under social constraints,
//! and produces bounded plans. This crate implements the per-agent state
//! containers and the pure evaluation functions over them:
//!
//! - [`belief`] -- belief stores with decay and scalar need state
//! - [`goal`] -- goal registries and the goal lifecycle
//! - [`context`] -- the per-evaluation snapshot of an agent's situation
//! - [`doctrine`] / [`role`] -- policy filters on what may be pursued
//! - [`evaluator`] -- deterministic goal arbitration
//! - [`planner`] -- bounded plan construction from goal templates
//! - [`authority`] / [`constraint`] / [`contract`] / [`delegation`] --
//!   social gates on which process kinds a plan may use
//! - [`institution`] / [`conflict`] -- institutional actors and disputes
//! - [`aggregate`] / [`refinement`] -- cohort summaries, refinement to
//!   representatives, and collapse back to aggregate form
//!
//! All functions are synchronous and deterministic: identical inputs
//! produce bit-identical outputs on every machine. No walltime, no
//! floating point, no hash-order dependence.

pub mod aggregate;
pub mod authority;
pub mod belief;
pub mod conflict;
pub mod constraint;
pub mod context;
pub mod contract;
pub mod delegation;
pub mod doctrine;
pub mod error;
pub mod evaluator;
pub mod goal;
pub mod institution;
pub mod planner;
pub mod refinement;
pub mod role;

pub use aggregate::{
    aggregate_beliefs, aggregate_goals, check_collapse_interest, AggregateAgent,
    AggregateRegistry, BeliefSummary, GoalStatusEntry, GoalSummary, InterestProvider,
};
pub use authority::{AuthorityGrant, AuthorityRegistry};
pub use belief::{
    BeliefEntry, BeliefEvent, BeliefEventKind, BeliefState, BeliefStore, CommandOutcome,
    ObservationEvent, BELIEF_FLAG_DISTORTED, BELIEF_FLAG_HEARSAY,
};
pub use conflict::{Conflict, ConflictRegistry};
pub use constraint::{Constraint, ConstraintMode, ConstraintRegistry};
pub use context::AgentContext;
pub use contract::{Contract, ContractRegistry};
pub use delegation::{Delegation, DelegationRegistry};
pub use doctrine::{
    Doctrine, DoctrineBinding, DoctrineRegistry, DoctrineScope, SCHED_INTERVAL, SCHED_WINDOW,
};
pub use error::AgentError;
pub use evaluator::{choose_goal, choose_goal_with_doctrine, GoalEvaluation};
pub use goal::{Goal, GoalCondition, GoalDesc, GoalPreconditions, GoalRegistry, GOAL_FLAG_ALLOW_UNKNOWN, GOAL_FLAG_REQUIRE_KNOWLEDGE};
pub use institution::{Institution, InstitutionRegistry};
pub use planner::{
    build_plan, process_id_for_kind, scale_plan_for_cohort, Plan, PlanOptions, PlanStep,
    PLAN_MAX_STEPS, STEP_FLAG_EPISTEMIC_GAP, STEP_FLAG_FAILURE_POINT,
};
pub use refinement::{
    process_refinement_events, refine_to_states, select_representatives, RefineCandidate,
    RefinementEvent, RefinementEventKind,
};
pub use role::{Role, RoleRegistry};
