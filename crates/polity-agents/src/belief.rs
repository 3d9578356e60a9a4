//! Belief stores and scalar belief state.
//!
//! Agents act on what they *believe*, not on ground truth. A
//! [`BeliefStore`] holds per-agent belief entries ordered by
//! `(agent_id, knowledge_ref)`, each with a Q16 confidence that decays
//! over time, an optional expiry, and hearsay/distortion flags. A
//! [`BeliefState`] is the cheap scalar summary the evaluator reads every
//! think: a knowledge bitmask plus hunger and threat need levels.
//!
//! Both containers update only through explicit events, in call order,
//! with clamped fixed-point arithmetic -- two runs fed the same events
//! hold bit-identical state.

use serde::{Deserialize, Serialize};

use polity_types::{
    clamp_confidence, clamp_need, ActTime, AgentId, BeliefId, BeliefTopic, GoalId, KnowledgeMask,
    Refusal, CONFIDENCE_MAX, KNOW_RESOURCE,
};

use crate::error::AgentError;

/// Flag: the belief arrived second-hand.
pub const BELIEF_FLAG_HEARSAY: u32 = 1 << 0;

/// Flag: the belief was altered after observation (deliberately or by
/// forgetting).
pub const BELIEF_FLAG_DISTORTED: u32 = 1 << 1;

// ---------------------------------------------------------------------------
// BeliefEntry
// ---------------------------------------------------------------------------

/// One remembered proposition: "agent believes something about
/// `knowledge_ref`, with this confidence".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeliefEntry {
    /// Unique id, allocated by the store in event order.
    pub belief_id: BeliefId,
    /// The believing agent.
    pub agent_id: AgentId,
    /// What the belief is about (a resource, route, threat, ... ref).
    pub knowledge_ref: u64,
    /// The topic contributing to the agent's knowledge mask, if any.
    pub topic: Option<BeliefTopic>,
    /// Current confidence as a Q16 fraction.
    pub confidence_q16: u32,
    /// When the underlying observation was made.
    pub observed_act: ActTime,
    /// When the belief lapses regardless of confidence (`0` = never).
    pub expires_act: ActTime,
    /// `BELIEF_FLAG_*` bits.
    pub flags: u32,
}

// ---------------------------------------------------------------------------
// BeliefEvent
// ---------------------------------------------------------------------------

/// How a belief event came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BeliefEventKind {
    /// First-hand observation.
    #[default]
    Observe,
    /// Second-hand report; marks the entry `HEARSAY`.
    Hear,
    /// Deliberate alteration; marks the entry `DISTORTED`.
    Distort,
    /// Removal or confidence reduction; marks the entry `DISTORTED`.
    Forget,
}

/// An event applied to a belief store.
///
/// Zero-valued fields mean "unset": a zero `confidence_q16` defers to the
/// delta, a zero delta leaves confidence alone, a zero `observed_act`
/// stamps the current act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BeliefEvent {
    /// What happened.
    pub kind: BeliefEventKind,
    /// The believing agent. Required.
    pub agent_id: AgentId,
    /// What the belief is about.
    pub knowledge_ref: u64,
    /// Topic to record, if the event carries one.
    pub topic: Option<BeliefTopic>,
    /// Absolute confidence to set (`0` = unset).
    pub confidence_q16: u32,
    /// Signed confidence adjustment (`0` = unset).
    pub confidence_delta_q16: i32,
    /// Observation timestamp override (`0` = stamp with `now`).
    pub observed_act: ActTime,
    /// Expiry to record (`0` = never).
    pub expires_act: ActTime,
    /// Flags to set on the entry.
    pub flags_set: u32,
    /// Flags to clear on the entry.
    pub flags_clear: u32,
}

// ---------------------------------------------------------------------------
// BeliefStore
// ---------------------------------------------------------------------------

/// A bounded store of belief entries ordered by
/// `(agent_id, knowledge_ref)`.
///
/// When the store is full, upserting a new proposition evicts the
/// globally lowest-confidence entry (the earliest such entry on ties).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeliefStore {
    entries: Vec<BeliefEntry>,
    capacity: usize,
    next_id: u64,
    decay_q16_per_act: u32,
    min_confidence_q16: u32,
    last_decay_act: ActTime,
}

impl BeliefStore {
    /// Create an empty store.
    ///
    /// `decay_q16_per_act` is subtracted from every entry per elapsed
    /// act; entries at or below `min_confidence_q16` are dropped. A
    /// `start_id` of zero begins belief ids at 1.
    pub fn new(
        capacity: usize,
        start_id: u64,
        decay_q16_per_act: u32,
        min_confidence_q16: u32,
    ) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            next_id: if start_id == 0 { 1 } else { start_id },
            decay_q16_per_act,
            min_confidence_q16: min_confidence_q16.min(CONFIDENCE_MAX),
            last_decay_act: 0,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entries in `(agent_id, knowledge_ref)` order.
    pub fn entries(&self) -> &[BeliefEntry] {
        &self.entries
    }

    /// Look up the entry for one proposition.
    pub fn find(&self, agent_id: AgentId, knowledge_ref: u64) -> Option<&BeliefEntry> {
        match self.position_of(agent_id, knowledge_ref) {
            Ok(idx) => self.entries.get(idx),
            Err(_) => None,
        }
    }

    /// Apply one event. See [`BeliefEvent`] for field semantics.
    pub fn apply_event(&mut self, event: &BeliefEvent, now_act: ActTime) -> Result<(), AgentError> {
        if event.agent_id.is_none() {
            return Err(AgentError::AbsentAgent);
        }
        let position = self.position_of(event.agent_id, event.knowledge_ref);

        if matches!(event.kind, BeliefEventKind::Forget) {
            let Ok(idx) = position else {
                return Ok(());
            };
            if let Some(entry) = self.entries.get_mut(idx) {
                let confidence = if event.confidence_delta_q16 != 0 {
                    clamp_confidence(
                        i64::from(entry.confidence_q16) + i64::from(event.confidence_delta_q16),
                    )
                } else {
                    0
                };
                entry.confidence_q16 = confidence;
                entry.flags |= BELIEF_FLAG_DISTORTED;
                if confidence <= self.min_confidence_q16 {
                    self.entries.remove(idx);
                }
            }
            return Ok(());
        }

        let idx = match position {
            Ok(idx) => idx,
            Err(mut idx) => {
                if self.entries.len() >= self.capacity {
                    if self.capacity == 0 {
                        return Err(AgentError::BeliefStoreFull { capacity: 0 });
                    }
                    let evict = self.lowest_confidence_index();
                    tracing::debug!(
                        agent_id = %event.agent_id,
                        knowledge_ref = event.knowledge_ref,
                        "Belief store full, evicting lowest-confidence entry"
                    );
                    self.entries.remove(evict);
                    if idx > evict {
                        idx -= 1;
                    }
                }
                let belief_id = BeliefId::new(self.next_id);
                self.next_id = self.next_id.wrapping_add(1);
                self.entries.insert(
                    idx,
                    BeliefEntry {
                        belief_id,
                        agent_id: event.agent_id,
                        knowledge_ref: event.knowledge_ref,
                        topic: None,
                        confidence_q16: 0,
                        observed_act: 0,
                        expires_act: 0,
                        flags: 0,
                    },
                );
                idx
            }
        };

        if let Some(entry) = self.entries.get_mut(idx) {
            let mut confidence = entry.confidence_q16;
            if event.confidence_q16 != 0 {
                confidence = event.confidence_q16;
            } else if event.confidence_delta_q16 != 0 {
                confidence =
                    clamp_confidence(i64::from(confidence) + i64::from(event.confidence_delta_q16));
            }
            if confidence == 0 {
                confidence = CONFIDENCE_MAX / 2;
            }
            entry.confidence_q16 = confidence;
            if event.topic.is_some() {
                entry.topic = event.topic;
            }
            entry.observed_act = if event.observed_act != 0 {
                event.observed_act
            } else {
                now_act
            };
            entry.expires_act = event.expires_act;
            entry.flags |= event.flags_set;
            entry.flags &= !event.flags_clear;
            match event.kind {
                BeliefEventKind::Hear => entry.flags |= BELIEF_FLAG_HEARSAY,
                BeliefEventKind::Distort => entry.flags |= BELIEF_FLAG_DISTORTED,
                BeliefEventKind::Observe | BeliefEventKind::Forget => {}
            }
        }
        Ok(())
    }

    /// Decay all entries up to `now_act`.
    ///
    /// The first call only arms the decay clock. Later calls subtract
    /// `decay_q16_per_act` per elapsed act (saturating at zero) from
    /// every entry and drop entries that expired or fell to or below the
    /// minimum confidence.
    pub fn decay(&mut self, now_act: ActTime) {
        if self.decay_q16_per_act == 0 || self.entries.is_empty() {
            self.last_decay_act = now_act;
            return;
        }
        if self.last_decay_act == 0 {
            self.last_decay_act = now_act;
            return;
        }
        if now_act <= self.last_decay_act {
            return;
        }
        let elapsed = now_act - self.last_decay_act;
        let total = u64::from(self.decay_q16_per_act).saturating_mul(elapsed);
        let step = u32::try_from(total).unwrap_or(u32::MAX);
        let min_confidence = self.min_confidence_q16;
        self.entries.retain_mut(|entry| {
            if entry.expires_act != 0 && entry.expires_act <= now_act {
                return false;
            }
            entry.confidence_q16 = entry.confidence_q16.saturating_sub(step);
            entry.confidence_q16 > min_confidence
        });
        self.last_decay_act = now_act;
    }

    /// The most confident belief an agent holds on a topic; ties break
    /// toward the lowest belief id.
    pub fn best_topic(&self, agent_id: AgentId, topic: BeliefTopic) -> Option<&BeliefEntry> {
        let mut best: Option<&BeliefEntry> = None;
        for entry in &self.entries {
            if entry.agent_id != agent_id || entry.topic != Some(topic) {
                continue;
            }
            let better = match best {
                None => true,
                Some(b) => {
                    entry.confidence_q16 > b.confidence_q16
                        || (entry.confidence_q16 == b.confidence_q16
                            && entry.belief_id < b.belief_id)
                }
            };
            if better {
                best = Some(entry);
            }
        }
        best
    }

    /// The knowledge mask derivable from the topics an agent holds
    /// beliefs on.
    pub fn mask(&self, agent_id: AgentId) -> KnowledgeMask {
        let mut mask = 0;
        for entry in &self.entries {
            if entry.agent_id != agent_id {
                continue;
            }
            if let Some(topic) = entry.topic {
                mask |= topic.knowledge_bit();
            }
        }
        mask
    }

    /// Sorted position of a proposition: `Ok(idx)` when present,
    /// `Err(insertion_idx)` otherwise.
    fn position_of(&self, agent_id: AgentId, knowledge_ref: u64) -> Result<usize, usize> {
        self.entries
            .binary_search_by_key(&(agent_id, knowledge_ref), |e| (e.agent_id, e.knowledge_ref))
    }

    /// Index of the globally lowest-confidence entry; the earliest entry
    /// wins ties. Only called on a non-empty store.
    fn lowest_confidence_index(&self) -> usize {
        let mut lowest = 0;
        let mut lowest_confidence = u32::MAX;
        for (idx, entry) in self.entries.iter().enumerate() {
            if entry.confidence_q16 < lowest_confidence {
                lowest_confidence = entry.confidence_q16;
                lowest = idx;
            }
        }
        lowest
    }
}

// ---------------------------------------------------------------------------
// BeliefState
// ---------------------------------------------------------------------------

/// The scalar belief summary the evaluator reads every think: knowledge
/// bits plus clamped hunger and threat need levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BeliefState {
    /// The owning agent.
    pub agent_id: AgentId,
    /// Knowledge bits the agent believes it holds.
    pub knowledge_mask: KnowledgeMask,
    /// Hunger need in `[0, NEED_SCALE]`.
    pub hunger_level: u32,
    /// Threat need in `[0, NEED_SCALE]`.
    pub threat_level: u32,
    /// When this state last changed.
    pub last_update_act: ActTime,
}

/// An observation applied to a belief state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObservationEvent {
    /// Knowledge bits to grant.
    pub knowledge_grant_mask: KnowledgeMask,
    /// Knowledge bits to withdraw.
    pub knowledge_clear_mask: KnowledgeMask,
    /// Signed hunger adjustment.
    pub hunger_delta: i32,
    /// Signed threat adjustment.
    pub threat_delta: i32,
}

/// The outcome of an executed command, fed back into beliefs and the
/// goal lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// The acting agent.
    pub agent_id: AgentId,
    /// The goal the command served, if any.
    pub goal_id: GoalId,
    /// Whether the command succeeded.
    pub success: bool,
    /// The refusal when it did not.
    pub refusal: Refusal,
    /// Knowledge bits the outcome disproves.
    pub knowledge_clear_mask: KnowledgeMask,
    /// Signed hunger adjustment.
    pub hunger_delta: i32,
    /// Signed threat adjustment.
    pub threat_delta: i32,
}

impl BeliefState {
    /// Create a state with clamped need levels.
    pub const fn new(
        agent_id: AgentId,
        knowledge_mask: KnowledgeMask,
        hunger_level: u32,
        threat_level: u32,
        now_act: ActTime,
    ) -> Self {
        Self {
            agent_id,
            knowledge_mask,
            hunger_level: clamp_need(hunger_level as i64),
            threat_level: clamp_need(threat_level as i64),
            last_update_act: now_act,
        }
    }

    /// Apply an observation: grant then clear knowledge bits, adjust
    /// needs with clamping.
    pub fn apply_observation(&mut self, obs: &ObservationEvent, now_act: ActTime) {
        self.knowledge_mask |= obs.knowledge_grant_mask;
        self.knowledge_mask &= !obs.knowledge_clear_mask;
        self.hunger_level = clamp_need(i64::from(self.hunger_level) + i64::from(obs.hunger_delta));
        self.threat_level = clamp_need(i64::from(self.threat_level) + i64::from(obs.threat_delta));
        self.last_update_act = now_act;
    }

    /// Apply a command outcome.
    ///
    /// A failure refused for `InsufficientKnowledge` that carries no
    /// explicit clear mask withdraws the `RESOURCE` bit: the agent has
    /// learned its belief about the resource was wrong.
    pub fn apply_command_outcome(&mut self, outcome: &CommandOutcome, now_act: ActTime) {
        self.knowledge_mask &= !outcome.knowledge_clear_mask;
        if !outcome.success
            && outcome.refusal == Refusal::InsufficientKnowledge
            && outcome.knowledge_clear_mask == 0
        {
            self.knowledge_mask &= !KNOW_RESOURCE;
        }
        self.hunger_level =
            clamp_need(i64::from(self.hunger_level) + i64::from(outcome.hunger_delta));
        self.threat_level =
            clamp_need(i64::from(self.threat_level) + i64::from(outcome.threat_delta));
        self.last_update_act = now_act;
    }
}
