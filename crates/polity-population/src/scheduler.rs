//! The population due scheduler.
//!
//! Cohort ticks and migration arrivals ride the same due-scheduler
//! discipline as agent thinks: entries fire in `(tick, entity_id)`
//! order, and nothing is ever iterated globally -- only entries whose
//! due tick is at or before the advance target are touched.
//!
//! Cohort entries fire at the cohort's `next_due_tick` (empty cohorts
//! are parked); each firing invokes the caller's cohort hook, which
//! returns the next tick or `ACT_NEVER` to retire. Migration entries
//! fire once at the flow's `arrival_act`, apply the flow, and park.

use serde::{Deserialize, Serialize};

use polity_types::{ActTime, CohortId, FlowId, MigrationStatus, ACT_NEVER};

use polity_core::DueScheduler;
use tracing::warn;

use crate::cohort::{Cohort, CohortRegistry};
use crate::error::PopulationError;
use crate::migration::{apply_migration, MigrationRegistry};

/// What a population due entry drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PopulationDueKind {
    /// A cohort's periodic tick.
    Cohort(CohortId),
    /// A migration flow's arrival.
    Migration(FlowId),
}

/// The population scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationScheduler {
    due: DueScheduler<PopulationDueKind>,
    start_tick: ActTime,
    processed_last: u32,
    processed_total: u64,
}

impl PopulationScheduler {
    /// Create a scheduler with `capacity` entry slots, starting at
    /// `start_tick`.
    pub fn new(capacity: usize, start_tick: ActTime) -> Self {
        Self {
            due: DueScheduler::new(capacity, start_tick),
            start_tick,
            processed_last: 0,
            processed_total: 0,
        }
    }

    /// Events dispatched by the most recent advance.
    pub const fn processed_last(&self) -> u32 {
        self.processed_last
    }

    /// Events dispatched over the scheduler's lifetime.
    pub const fn processed_total(&self) -> u64 {
        self.processed_total
    }

    /// Register a cohort's due entry. A cohort that has never been
    /// scheduled (`next_due_tick == ACT_NEVER`) is armed at the
    /// scheduler's start tick.
    pub fn register_cohort(
        &mut self,
        cohorts: &mut CohortRegistry,
        cohort_id: CohortId,
    ) -> Result<(), PopulationError> {
        let Some(cohort) = cohorts.find_mut(cohort_id) else {
            return Err(PopulationError::Registry(
                polity_types::RegistryError::AbsentKey {
                    key: cohort_id.raw(),
                },
            ));
        };
        if cohort.next_due_tick == ACT_NEVER {
            cohort.next_due_tick = self.start_tick;
        }
        let tick = cohort.next_due_tick;
        self.due
            .register(PopulationDueKind::Cohort(cohort_id), cohort_id.raw(), tick)?;
        Ok(())
    }

    /// Register a migration flow's arrival entry.
    pub fn register_migration(
        &mut self,
        flows: &MigrationRegistry,
        flow_id: FlowId,
    ) -> Result<(), PopulationError> {
        let Some(flow) = flows.find(flow_id) else {
            return Err(PopulationError::Registry(
                polity_types::RegistryError::AbsentKey { key: flow_id.raw() },
            ));
        };
        self.due.register(
            PopulationDueKind::Migration(flow_id),
            flow_id.raw(),
            flow.arrival_act,
        )?;
        Ok(())
    }

    /// The smallest scheduled tick, or `ACT_NEVER`.
    pub fn next_due(&self) -> ActTime {
        self.due.next_due()
    }

    /// Advance to `target_tick`.
    ///
    /// Each due cohort entry runs the cohort hook repeatedly until the
    /// hook's returned tick passes the target (or retires the cohort).
    /// Each due migration entry applies its flow once and parks.
    pub fn advance<F>(
        &mut self,
        cohorts: &mut CohortRegistry,
        flows: &mut MigrationRegistry,
        target_tick: ActTime,
        mut cohort_hook: F,
    ) where
        F: FnMut(&mut Cohort, ActTime) -> ActTime,
    {
        self.processed_last = 0;
        let mut processed_last: u32 = 0;
        let mut processed_total: u64 = 0;
        self.due.advance_with(target_tick, |kind, _fired_tick| {
            match kind {
                PopulationDueKind::Cohort(cohort_id) => {
                    let Some(cohort) = cohorts.find_mut(cohort_id) else {
                        return ACT_NEVER;
                    };
                    if cohort.count == 0 {
                        return ACT_NEVER;
                    }
                    let mut next = cohort.next_due_tick;
                    if next == ACT_NEVER || next > target_tick {
                        return next;
                    }
                    while next != ACT_NEVER && next <= target_tick {
                        processed_last = processed_last.saturating_add(1);
                        processed_total = processed_total.saturating_add(1);
                        next = cohort_hook(cohort, next);
                        cohort.next_due_tick = next;
                    }
                    next
                }
                PopulationDueKind::Migration(flow_id) => {
                    let Some(flow) = flows.find_mut(flow_id) else {
                        return ACT_NEVER;
                    };
                    if flow.status != MigrationStatus::Active
                        || flow.arrival_act == ACT_NEVER
                        || flow.arrival_act > target_tick
                    {
                        return ACT_NEVER;
                    }
                    processed_last = processed_last.saturating_add(1);
                    processed_total = processed_total.saturating_add(1);
                    if let Err(refusal) = apply_migration(flow, cohorts) {
                        warn!(flow_id = %flow_id, ?refusal, "Migration arrival refused");
                    }
                    flow.arrival_act = ACT_NEVER;
                    flow.status = MigrationStatus::Completed;
                    ACT_NEVER
                }
            }
        });
        self.processed_last = processed_last;
        self.processed_total = self.processed_total.saturating_add(processed_total);
    }
}
