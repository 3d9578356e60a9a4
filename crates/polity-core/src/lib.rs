//! Scheduling and the think pipeline for the Polity kernel.
//!
//! This crate owns simulation time. A single due-tick scheduler
//! discipline ([`due`]) drives every periodic behavior -- agent thinks
//! ([`schedule`]), scheduled doctrine updates ([`doctrine_events`]), and
//! (in `polity-population`) cohort ticks and migration arrivals. The
//! think pipeline ([`tick`]) composes the agent crates into the
//! per-agent decision loop: decay beliefs, arbitrate goals, build and
//! veto a plan, audit the decision, re-arm the agent.
//!
//! Everything is cooperative and single-threaded: one `advance` call
//! dispatches all due work up to its target and returns. Two runs that
//! make the same calls produce identical dispatch orders and
//! byte-identical audit trails.

pub mod config;
pub mod doctrine_events;
pub mod due;
pub mod error;
pub mod schedule;
pub mod tick;

pub use config::KernelConfig;
pub use doctrine_events::{DoctrineEvent, DoctrineEventKind, DoctrineScheduler};
pub use due::{DueHandle, DueScheduler, SchedulerError};
pub use error::CoreError;
pub use schedule::{AgentSchedule, ThinkEntry};
pub use tick::{run_think_cycle, AgentProfile, KernelState, ThinkOutcome, ThinkSummary};
