//! Per-agent think cadence.
//!
//! Each registered agent owns a schedule entry `(next_think_act,
//! think_interval_act)` backed by a due-scheduler slot keyed by the
//! agent id. Advancing runs the caller's `on_think` hook for every due
//! entry; when the hook leaves `next_think_act` untouched the entry
//! advances by its interval, and a zero interval retires the entry after
//! one firing (it stays registered, parked at `ACT_NEVER`).

use serde::{Deserialize, Serialize};

use polity_types::{ActTime, AgentId, GoalId, PlanId, ACT_NEVER};

use crate::due::{DueHandle, DueScheduler};
use crate::error::CoreError;

/// One agent's schedule entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkEntry {
    /// The scheduled agent.
    pub agent_id: AgentId,
    /// When the agent next thinks; `ACT_NEVER` parks it.
    pub next_think_act: ActTime,
    /// Ticks between thinks; `0` makes the entry one-shot.
    pub think_interval_act: ActTime,
    /// The goal the agent is currently pursuing, if any.
    pub active_goal_ref: GoalId,
    /// The plan the agent is currently executing, if any.
    pub active_plan_ref: PlanId,
    due_handle: DueHandle,
}

/// The per-agent think scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSchedule {
    due: DueScheduler<usize>,
    entries: Vec<Option<ThinkEntry>>,
    processed_last: u32,
    processed_total: u64,
}

impl AgentSchedule {
    /// Create a schedule for at most `capacity` agents, starting at
    /// `start_tick`.
    pub fn new(capacity: usize, start_tick: ActTime) -> Self {
        Self {
            due: DueScheduler::new(capacity, start_tick),
            entries: (0..capacity).map(|_| None).collect(),
            processed_last: 0,
            processed_total: 0,
        }
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }

    /// Whether no agents are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Thinks dispatched by the most recent advance.
    pub const fn processed_last(&self) -> u32 {
        self.processed_last
    }

    /// Thinks dispatched over the schedule's lifetime.
    pub const fn processed_total(&self) -> u64 {
        self.processed_total
    }

    /// Register an agent. Refuses a duplicate registration and a zero
    /// agent id.
    pub fn register(
        &mut self,
        agent_id: AgentId,
        first_think_act: ActTime,
        think_interval_act: ActTime,
    ) -> Result<(), CoreError> {
        if agent_id.is_none() {
            return Err(CoreError::AbsentAgent);
        }
        if self.find(agent_id).is_some() {
            return Err(CoreError::DuplicateAgent { agent_id });
        }
        let Some(slot_idx) = self.entries.iter().position(Option::is_none) else {
            return Err(CoreError::ScheduleFull {
                capacity: self.entries.len(),
            });
        };
        let due_handle = self.due.register(slot_idx, agent_id.raw(), first_think_act)?;
        if let Some(slot) = self.entries.get_mut(slot_idx) {
            *slot = Some(ThinkEntry {
                agent_id,
                next_think_act: first_think_act,
                think_interval_act,
                active_goal_ref: GoalId::NONE,
                active_plan_ref: PlanId::NONE,
                due_handle,
            });
        }
        Ok(())
    }

    /// Look up an agent's entry.
    pub fn find(&self, agent_id: AgentId) -> Option<&ThinkEntry> {
        self.entries
            .iter()
            .flatten()
            .find(|entry| entry.agent_id == agent_id)
    }

    /// Re-arm an agent at an explicit next think act.
    pub fn set_next(&mut self, agent_id: AgentId, next_think_act: ActTime) -> Result<(), CoreError> {
        let Some(entry) = self
            .entries
            .iter_mut()
            .flatten()
            .find(|entry| entry.agent_id == agent_id)
        else {
            return Err(CoreError::UnknownAgent { agent_id });
        };
        entry.next_think_act = next_think_act;
        let handle = entry.due_handle;
        self.due.set_tick(handle, next_think_act)?;
        Ok(())
    }

    /// Record the agent's active goal and plan references.
    pub fn set_active(
        &mut self,
        agent_id: AgentId,
        goal_ref: GoalId,
        plan_ref: PlanId,
    ) -> Result<(), CoreError> {
        let Some(entry) = self
            .entries
            .iter_mut()
            .flatten()
            .find(|entry| entry.agent_id == agent_id)
        else {
            return Err(CoreError::UnknownAgent { agent_id });
        };
        entry.active_goal_ref = goal_ref;
        entry.active_plan_ref = plan_ref;
        Ok(())
    }

    /// The smallest scheduled think act, or `ACT_NEVER`.
    pub fn next_due(&self) -> ActTime {
        self.due.next_due()
    }

    /// Advance to `target_tick`, invoking `on_think` for every due
    /// agent in `(next_think_act, agent_id)` order.
    ///
    /// The hook may re-arm the entry by assigning `next_think_act`; if
    /// it leaves the field untouched, the entry advances by its
    /// interval, or parks at `ACT_NEVER` when the interval is zero.
    pub fn advance<F>(&mut self, target_tick: ActTime, mut on_think: F)
    where
        F: FnMut(&mut ThinkEntry, ActTime),
    {
        self.processed_last = 0;
        let entries = &mut self.entries;
        let mut processed_last: u32 = 0;
        let mut processed_total: u64 = 0;
        self.due.advance_with(target_tick, |slot_idx, fired_tick| {
            let Some(entry) = entries.get_mut(slot_idx).and_then(Option::as_mut) else {
                return ACT_NEVER;
            };
            let current = entry.next_think_act;
            if current == ACT_NEVER || current > fired_tick {
                return entry.next_think_act;
            }
            on_think(entry, current);
            if entry.next_think_act == current {
                entry.next_think_act = if entry.think_interval_act > 0 {
                    current.saturating_add(entry.think_interval_act)
                } else {
                    ACT_NEVER
                };
            }
            processed_last = processed_last.saturating_add(1);
            processed_total = processed_total.saturating_add(1);
            entry.next_think_act
        });
        self.processed_last = processed_last;
        self.processed_total = self.processed_total.saturating_add(processed_total);
    }
}
