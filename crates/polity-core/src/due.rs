//! The due-tick scheduler.
//!
//! A fixed-capacity slot table of typed events keyed by
//! `(next_tick, entity_id)`. [`advance_with`](DueScheduler::advance_with)
//! repeatedly selects the in-use entry with the smallest key among those
//! due at or before the target tick, dispatches it, and re-arms it at
//! the tick the dispatch hook returns ([`ACT_NEVER`] parks the entry
//! without freeing its slot).
//!
//! Determinism contract: for any two runs that register the same
//! `(key, entity_id, initial_tick)` set in any order and advance to the
//! same target sequence, the order of dispatch calls is identical --
//! ties on a tick fire the smaller entity id first. Handles are
//! first-free-index so they are stable across runs that register
//! identically.
//!
//! The event payload is a caller-defined tagged variant (agent think,
//! doctrine event, cohort tick, migration arrival, ...); the dispatch
//! hook matches on it. This is the kernel's sole dispatch point.

use serde::{Deserialize, Serialize};

use polity_types::{ActTime, ACT_NEVER};

/// Errors from the due scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// Every slot is in use.
    #[error("scheduler capacity {capacity} exhausted")]
    CapacityExhausted {
        /// The fixed capacity given at init.
        capacity: usize,
    },

    /// The handle does not name a live entry.
    #[error("scheduler handle {handle} is not in use")]
    BadHandle {
        /// The offending handle.
        handle: usize,
    },
}

/// A stable slot index into the scheduler's entry table.
pub type DueHandle = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct DueSlot<K> {
    key: K,
    entity_id: u64,
    next_tick: ActTime,
}

/// A fixed-capacity due-event scheduler over event payloads `K`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DueScheduler<K> {
    slots: Vec<Option<DueSlot<K>>>,
    now: ActTime,
}

impl<K: Copy> DueScheduler<K> {
    /// Create a scheduler with `capacity` slots, starting at
    /// `start_tick`.
    pub fn new(capacity: usize, start_tick: ActTime) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            now: start_tick,
        }
    }

    /// The fixed slot capacity.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Whether no entries are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The current tick (the highest advance target seen).
    pub const fn now(&self) -> ActTime {
        self.now
    }

    /// Register an event at the first free slot.
    pub fn register(
        &mut self,
        key: K,
        entity_id: u64,
        initial_tick: ActTime,
    ) -> Result<DueHandle, SchedulerError> {
        let Some(handle) = self.slots.iter().position(Option::is_none) else {
            return Err(SchedulerError::CapacityExhausted {
                capacity: self.slots.len(),
            });
        };
        if let Some(slot) = self.slots.get_mut(handle) {
            *slot = Some(DueSlot {
                key,
                entity_id,
                next_tick: initial_tick,
            });
        }
        Ok(handle)
    }

    /// Free a slot entirely.
    pub fn unregister(&mut self, handle: DueHandle) -> Result<(), SchedulerError> {
        match self.slots.get_mut(handle) {
            Some(slot @ Some(_)) => {
                *slot = None;
                Ok(())
            }
            _ => Err(SchedulerError::BadHandle { handle }),
        }
    }

    /// Re-arm a live entry at a new tick ([`ACT_NEVER`] parks it).
    pub fn set_tick(&mut self, handle: DueHandle, tick: ActTime) -> Result<(), SchedulerError> {
        match self.slots.get_mut(handle).and_then(Option::as_mut) {
            Some(slot) => {
                slot.next_tick = tick;
                Ok(())
            }
            None => Err(SchedulerError::BadHandle { handle }),
        }
    }

    /// The tick a live entry is armed at.
    pub fn tick_of(&self, handle: DueHandle) -> Option<ActTime> {
        self.slots
            .get(handle)
            .and_then(Option::as_ref)
            .map(|slot| slot.next_tick)
    }

    /// The smallest scheduled tick, or [`ACT_NEVER`] when nothing is
    /// armed.
    pub fn next_due(&self) -> ActTime {
        self.slots
            .iter()
            .flatten()
            .map(|slot| slot.next_tick)
            .min()
            .unwrap_or(ACT_NEVER)
    }

    /// Advance to `target_tick`, dispatching every due entry in
    /// `(next_tick, entity_id)` order.
    ///
    /// The dispatch hook receives the entry's payload and the tick it
    /// fired at, performs the client's work up to that tick, and returns
    /// the entry's new tick. A returned tick still at or before the
    /// target makes the entry fire again within the same call, so hooks
    /// must move their entry forward or park it at [`ACT_NEVER`].
    /// Returns the number of dispatches performed.
    pub fn advance_with<F>(&mut self, target_tick: ActTime, mut dispatch: F) -> u32
    where
        F: FnMut(K, ActTime) -> ActTime,
    {
        let mut processed: u32 = 0;
        loop {
            let mut best: Option<(DueHandle, u64, ActTime)> = None;
            for (handle, slot) in self.slots.iter().enumerate() {
                let Some(slot) = slot else { continue };
                if slot.next_tick > target_tick {
                    continue;
                }
                let earlier = match best {
                    None => true,
                    Some((_, best_entity, best_tick)) => {
                        slot.next_tick < best_tick
                            || (slot.next_tick == best_tick && slot.entity_id < best_entity)
                    }
                };
                if earlier {
                    best = Some((handle, slot.entity_id, slot.next_tick));
                }
            }
            let Some((handle, _, tick)) = best else {
                break;
            };
            let key = match self.slots.get(handle).and_then(Option::as_ref) {
                Some(slot) => slot.key,
                None => break,
            };
            let next_tick = dispatch(key, tick);
            if let Some(slot) = self.slots.get_mut(handle).and_then(Option::as_mut) {
                slot.next_tick = next_tick;
            }
            processed = processed.saturating_add(1);
        }
        if target_tick > self.now {
            self.now = target_tick;
        }
        processed
    }
}
