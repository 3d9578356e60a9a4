//! Scheduled doctrine updates.
//!
//! Doctrine lifecycles are driven by a due-scheduled apply/clear event
//! stream: an `Apply` event upserts its doctrine payload into the
//! registry at its trigger act, a `Clear` event removes the doctrine.
//! After each event, the affected doctrine's `next_due_tick` is
//! recomputed from the remaining pending events so consumers can see
//! when policy will next change.

use serde::{Deserialize, Serialize};

use polity_types::{ActTime, DoctrineId, EventId, ProvenanceId, ACT_NEVER};

use polity_agents::doctrine::{Doctrine, DoctrineRegistry};

use crate::due::DueScheduler;
use crate::error::CoreError;

/// What a scheduled doctrine event does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoctrineEventKind {
    /// Upsert this doctrine payload.
    Apply(Box<Doctrine>),
    /// Remove the doctrine.
    Clear,
}

/// One scheduled doctrine event. A `trigger_act` of `ACT_NEVER` marks
/// the slot consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctrineEvent {
    /// Unique event id; the tie-break within one act.
    pub event_id: EventId,
    /// The doctrine the event touches.
    pub doctrine_id: DoctrineId,
    /// When the event fires.
    pub trigger_act: ActTime,
    /// Apply or clear.
    pub kind: DoctrineEventKind,
    /// Causal origin of the event.
    pub provenance_ref: ProvenanceId,
}

/// The doctrine event scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctrineScheduler {
    due: DueScheduler<usize>,
    events: Vec<Option<DoctrineEvent>>,
    next_event_id: u64,
    processed_last: u32,
    processed_total: u64,
}

impl DoctrineScheduler {
    /// Create a scheduler holding at most `capacity` pending events. A
    /// `start_event_id` of zero begins event ids at 1.
    pub fn new(capacity: usize, start_tick: ActTime, start_event_id: u64) -> Self {
        Self {
            due: DueScheduler::new(capacity, start_tick),
            events: (0..capacity).map(|_| None).collect(),
            next_event_id: if start_event_id == 0 { 1 } else { start_event_id },
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

    /// Number of pending (unconsumed) events.
    pub fn pending(&self) -> usize {
        self.events
            .iter()
            .flatten()
            .filter(|event| event.trigger_act != ACT_NEVER)
            .count()
    }

    /// Schedule a doctrine upsert at `trigger_act`.
    pub fn schedule_apply(
        &mut self,
        doctrines: &mut DoctrineRegistry,
        doctrine: Doctrine,
        trigger_act: ActTime,
    ) -> Result<EventId, CoreError> {
        let doctrine_id = doctrine.doctrine_id;
        let provenance = if doctrine.provenance_ref.is_some() {
            doctrine.provenance_ref
        } else {
            ProvenanceId::NONE
        };
        self.schedule(
            doctrines,
            doctrine_id,
            trigger_act,
            DoctrineEventKind::Apply(Box::new(doctrine)),
            provenance,
        )
    }

    /// Schedule a doctrine removal at `trigger_act`.
    pub fn schedule_clear(
        &mut self,
        doctrines: &mut DoctrineRegistry,
        doctrine_id: DoctrineId,
        trigger_act: ActTime,
    ) -> Result<EventId, CoreError> {
        self.schedule(
            doctrines,
            doctrine_id,
            trigger_act,
            DoctrineEventKind::Clear,
            ProvenanceId::NONE,
        )
    }

    /// The smallest pending trigger act, or `ACT_NEVER`.
    pub fn next_due(&self) -> ActTime {
        self.due.next_due()
    }

    /// Fire every event due at or before `target_tick`, in
    /// `(trigger_act, event_id)` order, against the registry.
    pub fn advance(&mut self, doctrines: &mut DoctrineRegistry, target_tick: ActTime) {
        self.processed_last = 0;
        let events = &mut self.events;
        let mut processed_last: u32 = 0;
        let mut processed_total: u64 = 0;
        self.due.advance_with(target_tick, |slot_idx, _fired_tick| {
            let Some(event) = events.get_mut(slot_idx).and_then(Option::as_mut) else {
                return ACT_NEVER;
            };
            if event.trigger_act == ACT_NEVER || event.trigger_act > target_tick {
                return event.trigger_act;
            }
            match &event.kind {
                DoctrineEventKind::Apply(doctrine) => {
                    let _ = doctrines.upsert((**doctrine).clone());
                }
                DoctrineEventKind::Clear => {
                    doctrines.remove_if_present(event.doctrine_id);
                }
            }
            event.trigger_act = ACT_NEVER;
            let doctrine_id = event.doctrine_id;
            processed_last = processed_last.saturating_add(1);
            processed_total = processed_total.saturating_add(1);
            recompute_next_due(doctrines, events, doctrine_id);
            ACT_NEVER
        });
        self.processed_last = processed_last;
        self.processed_total = self.processed_total.saturating_add(processed_total);
    }

    fn schedule(
        &mut self,
        doctrines: &mut DoctrineRegistry,
        doctrine_id: DoctrineId,
        trigger_act: ActTime,
        kind: DoctrineEventKind,
        provenance: ProvenanceId,
    ) -> Result<EventId, CoreError> {
        if doctrine_id.is_none() {
            return Err(CoreError::AbsentAgent);
        }
        let Some(slot_idx) = self.events.iter().position(Option::is_none) else {
            return Err(CoreError::DoctrineEventsFull {
                capacity: self.events.len(),
            });
        };
        let event_id = EventId::new(self.next_event_id);
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.due.register(slot_idx, event_id.raw(), trigger_act)?;
        if let Some(slot) = self.events.get_mut(slot_idx) {
            *slot = Some(DoctrineEvent {
                event_id,
                doctrine_id,
                trigger_act,
                kind,
                provenance_ref: if provenance.is_none() {
                    ProvenanceId::new(event_id.raw())
                } else {
                    provenance
                },
            });
        }
        recompute_next_due(doctrines, &mut self.events, doctrine_id);
        Ok(event_id)
    }
}

/// Recompute a doctrine's `next_due_tick` from the pending events that
/// still target it.
fn recompute_next_due(
    doctrines: &mut DoctrineRegistry,
    events: &mut [Option<DoctrineEvent>],
    doctrine_id: DoctrineId,
) {
    let next = events
        .iter()
        .flatten()
        .filter(|event| event.doctrine_id == doctrine_id && event.trigger_act != ACT_NEVER)
        .map(|event| event.trigger_act)
        .min()
        .unwrap_or(ACT_NEVER);
    if let Some(doctrine) = doctrines.find_mut(doctrine_id) {
        doctrine.next_due_tick = next;
    }
}
