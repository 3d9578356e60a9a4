//! Player embodiment and uniform intent validation.
//!
//! A player is just another agent: binding a player to an agent body
//! grants no shortcuts. Every submitted intent passes the same gates an
//! autonomous agent faces -- capability, effective authority, believed
//! knowledge, and (when a field provider is present) physical
//! constraints -- in that order, reporting the most specific refusal.
//! The player also *sees* as its agent sees: the subjective snapshot
//! exposes only belief-derived fields, never ground truth.
//!
//! Validation is headless by design: with no field provider the
//! physical checks are skipped, and a refused intent leaves no trace
//! beyond its queue entry and the mirrored feedback event.

use serde::{Deserialize, Serialize};
use tracing::debug;

use polity_types::{
    mask_covers, ActTime, AgentId, AuthorityMask, BoundedRegistry, CapabilityMask, EventId,
    IntentId, IntentRefusal, Keyed, KnowledgeMask, PlanId, PlayerId,
};

use polity_agents::authority::AuthorityRegistry;
use polity_agents::belief::{BeliefState, BeliefStore};
use polity_agents::goal::{GoalDesc, GoalRegistry};

/// Errors from player containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PlayerError {
    /// A registry mutation was rejected.
    #[error("registry operation failed: {0}")]
    Registry(#[from] polity_types::RegistryError),

    /// The intent queue is full; the intent was not enqueued.
    #[error("intent queue capacity {capacity} exhausted")]
    QueueFull {
        /// The fixed capacity given at init.
        capacity: usize,
    },

    /// The player event log is full.
    #[error("player event log capacity {capacity} exhausted")]
    EventLogFull {
        /// The fixed capacity given at init.
        capacity: usize,
    },

    /// Binding requires non-zero player and agent ids.
    #[error("binding requires non-zero player and agent ids")]
    AbsentBinding,
}

// ---------------------------------------------------------------------------
// Player registry
// ---------------------------------------------------------------------------

/// One player-to-agent binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// The human player.
    pub player_id: PlayerId,
    /// The agent body the player embodies.
    pub agent_id: AgentId,
}

impl Keyed for PlayerRecord {
    fn key(&self) -> u64 {
        self.player_id.raw()
    }
}

/// Bounded registry of player bindings ordered ascending by player id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRegistry {
    players: BoundedRegistry<PlayerRecord>,
}

impl PlayerRegistry {
    /// Create an empty registry.
    pub fn new(capacity: usize) -> Self {
        Self {
            players: BoundedRegistry::new(capacity),
        }
    }

    /// Number of bound players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether no players are bound.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Bind a player to an agent body; rebinding replaces the body in
    /// place.
    pub fn bind(&mut self, player_id: PlayerId, agent_id: AgentId) -> Result<(), PlayerError> {
        if player_id.is_none() || agent_id.is_none() {
            return Err(PlayerError::AbsentBinding);
        }
        if let Some(record) = self.players.find_mut(player_id.raw()) {
            record.agent_id = agent_id;
            return Ok(());
        }
        self.players.insert(PlayerRecord { player_id, agent_id })?;
        Ok(())
    }

    /// Look up a binding.
    pub fn find(&self, player_id: PlayerId) -> Option<&PlayerRecord> {
        self.players.find(player_id.raw())
    }
}

// ---------------------------------------------------------------------------
// Subjective snapshot
// ---------------------------------------------------------------------------

/// What a player is allowed to see of its agent: the belief-derived
/// fields only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubjectiveSnapshot {
    /// The embodied agent.
    pub agent_id: AgentId,
    /// Knowledge bits the agent believes it holds.
    pub knowledge_mask: KnowledgeMask,
    /// Hunger need level.
    pub hunger_level: u32,
    /// Threat need level.
    pub threat_level: u32,
    /// The resource the agent believes it knows (`0` = none).
    pub known_resource_ref: u64,
    /// The threat the agent believes it knows (`0` = none).
    pub known_threat_ref: u64,
    /// The destination the agent believes it knows (`0` = none).
    pub known_destination_ref: u64,
}

/// Build the player-visible snapshot of an agent from its belief
/// containers.
pub fn build_snapshot(state: &BeliefState, store: &BeliefStore) -> SubjectiveSnapshot {
    let agent_id = state.agent_id;
    let known_ref = |topic: polity_types::BeliefTopic| {
        store
            .best_topic(agent_id, topic)
            .map_or(0, |entry| entry.knowledge_ref)
    };
    SubjectiveSnapshot {
        agent_id,
        knowledge_mask: state.knowledge_mask | store.mask(agent_id),
        hunger_level: state.hunger_level,
        threat_level: state.threat_level,
        known_resource_ref: known_ref(polity_types::BeliefTopic::Resource),
        known_threat_ref: known_ref(polity_types::BeliefTopic::Threat),
        known_destination_ref: known_ref(polity_types::BeliefTopic::SafeRoute),
    }
}

// ---------------------------------------------------------------------------
// Field provider
// ---------------------------------------------------------------------------

/// Physical fields an intent may be checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Terrain slope at a position, Q16.
    Slope,
    /// Ground bearing capacity at a position, Q16.
    BearingCapacity,
}

/// External source of physical field values. Absence of a provider
/// (headless operation) skips physical checks entirely.
pub trait FieldProvider {
    /// The field value at `(x, y)`, or `None` when the field is not
    /// sampled there.
    fn value(&self, field: FieldKind, x: i64, y: i64) -> Option<i32>;
}

// ---------------------------------------------------------------------------
// Intents
// ---------------------------------------------------------------------------

/// A request to start a process, with the gates it must pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessRequest {
    /// Capability bits the agent must hold.
    pub required_capability_mask: CapabilityMask,
    /// Effective authority bits the agent must hold.
    pub required_authority_mask: AuthorityMask,
    /// Knowledge bits the agent must believe it holds.
    pub required_knowledge_mask: KnowledgeMask,
    /// Position the process happens at.
    pub x: i64,
    /// Position the process happens at.
    pub y: i64,
    /// Maximum tolerable slope, Q16 (`0` = unchecked).
    pub max_slope_q16: i32,
    /// Minimum required bearing capacity, Q16 (`0` = unchecked).
    pub min_bearing_q16: i32,
}

/// What a player intent asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IntentPayload {
    /// Register a goal on the embodied agent.
    GoalUpdate(GoalDesc),
    /// Confirm a previously proposed plan.
    PlanConfirm {
        /// The plan being confirmed.
        plan_id: PlanId,
    },
    /// Request a physical process.
    ProcessRequest(ProcessRequest),
}

/// Validation status of a queued intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IntentStatus {
    /// Not yet validated.
    #[default]
    Pending,
    /// Passed every gate.
    Accepted,
    /// Failed a gate; see the refusal.
    Refused,
}

/// One queued intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Sequential id stamped at submission.
    pub intent_id: IntentId,
    /// The submitting player.
    pub player_id: PlayerId,
    /// The embodied agent the intent acts through.
    pub agent_id: AgentId,
    /// What the intent asks for.
    pub payload: IntentPayload,
    /// Validation status.
    pub status: IntentStatus,
    /// Why the intent was refused, if it was.
    pub refusal: IntentRefusal,
}

/// Bounded queue of submitted intents, in submission order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentQueue {
    entries: Vec<Intent>,
    capacity: usize,
    next_intent_id: u64,
}

impl IntentQueue {
    /// Create an empty queue. A `start_id` of zero begins intent ids at
    /// 1.
    pub fn new(capacity: usize, start_id: u64) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            next_intent_id: if start_id == 0 { 1 } else { start_id },
        }
    }

    /// Number of queued intents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The intents in submission order.
    pub fn entries(&self) -> &[Intent] {
        &self.entries
    }
}

// ---------------------------------------------------------------------------
// Player event log
// ---------------------------------------------------------------------------

/// The feedback mirrored to the player for a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerEventKind {
    /// The intent passed validation.
    IntentAccepted,
    /// The intent was refused.
    IntentRefused,
}

/// One player feedback event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEvent {
    /// Sequential event id.
    pub event_id: EventId,
    /// The submitting player.
    pub player_id: PlayerId,
    /// The embodied agent.
    pub agent_id: AgentId,
    /// Accepted or refused.
    pub kind: PlayerEventKind,
    /// The intent the event mirrors.
    pub intent_id: IntentId,
    /// The refusal carried, when refused.
    pub refusal: IntentRefusal,
    /// When the submission was validated.
    pub act_time: ActTime,
}

/// Bounded append-only log of player feedback events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerEventLog {
    entries: Vec<PlayerEvent>,
    capacity: usize,
    next_event_id: u64,
}

impl PlayerEventLog {
    /// Create an empty log. A `start_id` of zero begins event ids at 1.
    pub fn new(capacity: usize, start_id: u64) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            next_event_id: if start_id == 0 { 1 } else { start_id },
        }
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The events in append order.
    pub fn entries(&self) -> &[PlayerEvent] {
        &self.entries
    }

    fn record(&mut self, event: PlayerEvent) -> Result<EventId, PlayerError> {
        if self.entries.len() >= self.capacity {
            return Err(PlayerError::EventLogFull {
                capacity: self.capacity,
            });
        }
        let event_id = EventId::new(self.next_event_id);
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.entries.push(PlayerEvent { event_id, ..event });
        Ok(event_id)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// What the gates consult when validating an intent.
pub struct IntentGates<'a> {
    /// The embodied agent's capability bits.
    pub capability_mask: CapabilityMask,
    /// The embodied agent's authority before grants.
    pub base_authority_mask: AuthorityMask,
    /// Authority grants, for the effective mask.
    pub authority: Option<&'a AuthorityRegistry>,
    /// The embodied agent's scalar belief state.
    pub belief_state: Option<&'a BeliefState>,
    /// The embodied agent's belief store.
    pub beliefs: Option<&'a BeliefStore>,
    /// Physical field source; `None` runs headless.
    pub fields: Option<&'a dyn FieldProvider>,
    /// The act submissions are validated at.
    pub now_act: ActTime,
}

/// Submit one intent: validate, stamp, enqueue, and mirror a feedback
/// event.
///
/// The gates run in order -- capability, effective authority, believed
/// knowledge, physical -- and the first failure decides the refusal. An
/// accepted `GoalUpdate` registers its goal; refused intents leave no
/// side effects beyond the queue entry and the mirrored event.
pub fn submit_intent(
    queue: &mut IntentQueue,
    events: &mut PlayerEventLog,
    goals: &mut GoalRegistry,
    gates: &IntentGates<'_>,
    player_id: PlayerId,
    agent_id: AgentId,
    payload: IntentPayload,
) -> Result<(IntentId, IntentRefusal), PlayerError> {
    if queue.entries.len() >= queue.capacity {
        return Err(PlayerError::QueueFull {
            capacity: queue.capacity,
        });
    }
    let intent_id = IntentId::new(queue.next_intent_id);
    queue.next_intent_id = queue.next_intent_id.wrapping_add(1);

    let effective_authority = gates.authority.map_or(gates.base_authority_mask, |reg| {
        reg.effective_mask(agent_id, gates.base_authority_mask, gates.now_act)
    });

    let refusal = match &payload {
        IntentPayload::GoalUpdate(desc) => {
            let gate = check_masks(
                gates,
                effective_authority,
                agent_id,
                desc.preconditions.required_capabilities,
                desc.preconditions.required_authority,
                desc.preconditions.required_knowledge,
            );
            if gate == IntentRefusal::None {
                // Acceptance has exactly one side effect: the goal lands
                // in the registry.
                if goals.register(desc.clone()).is_err() {
                    IntentRefusal::InvalidIntent
                } else {
                    IntentRefusal::None
                }
            } else {
                gate
            }
        }
        IntentPayload::PlanConfirm { plan_id } => {
            if plan_id.is_none() {
                IntentRefusal::PlanNotFound
            } else {
                IntentRefusal::None
            }
        }
        IntentPayload::ProcessRequest(request) => {
            let gate = check_masks(
                gates,
                effective_authority,
                agent_id,
                request.required_capability_mask,
                request.required_authority_mask,
                request.required_knowledge_mask,
            );
            if gate == IntentRefusal::None {
                check_physical(gates, request)
            } else {
                gate
            }
        }
    };

    let accepted = refusal == IntentRefusal::None;
    queue.entries.push(Intent {
        intent_id,
        player_id,
        agent_id,
        payload,
        status: if accepted {
            IntentStatus::Accepted
        } else {
            IntentStatus::Refused
        },
        refusal,
    });
    if !accepted {
        debug!(%player_id, %agent_id, refusal = ?refusal, "Intent refused");
    }
    events.record(PlayerEvent {
        event_id: EventId::NONE,
        player_id,
        agent_id,
        kind: if accepted {
            PlayerEventKind::IntentAccepted
        } else {
            PlayerEventKind::IntentRefused
        },
        intent_id,
        refusal,
        act_time: gates.now_act,
    })?;
    Ok((intent_id, refusal))
}

/// The capability / authority / knowledge gates, in order.
fn check_masks(
    gates: &IntentGates<'_>,
    effective_authority: AuthorityMask,
    agent_id: AgentId,
    required_capability: CapabilityMask,
    required_authority: AuthorityMask,
    required_knowledge: KnowledgeMask,
) -> IntentRefusal {
    if !mask_covers(gates.capability_mask, required_capability) {
        return IntentRefusal::NoCapability;
    }
    if !mask_covers(effective_authority, required_authority) {
        return IntentRefusal::NoAuthority;
    }
    if required_knowledge != 0 {
        let mut knowledge = gates
            .belief_state
            .map_or(0, |state| state.knowledge_mask);
        if let Some(store) = gates.beliefs {
            knowledge |= store.mask(agent_id);
        }
        if !mask_covers(knowledge, required_knowledge) {
            return IntentRefusal::NoKnowledge;
        }
    }
    IntentRefusal::None
}

/// The physical gate; skipped entirely when no field provider is
/// present.
fn check_physical(gates: &IntentGates<'_>, request: &ProcessRequest) -> IntentRefusal {
    let Some(fields) = gates.fields else {
        return IntentRefusal::None;
    };
    if request.max_slope_q16 > 0 {
        if let Some(slope) = fields.value(FieldKind::Slope, request.x, request.y) {
            if slope > request.max_slope_q16 {
                return IntentRefusal::PhysicalConstraint;
            }
        }
    }
    if request.min_bearing_q16 > 0 {
        if let Some(bearing) = fields.value(FieldKind::BearingCapacity, request.x, request.y) {
            if bearing < request.min_bearing_q16 {
                return IntentRefusal::PhysicalConstraint;
            }
        }
    }
    IntentRefusal::None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use polity_agents::authority::AuthorityGrant;
    use polity_agents::goal::GoalPreconditions;
    use polity_types::{
        GrantId, ProvenanceId, AUTH_BASIC, AUTH_TRADE, CAP_MOVE, CAP_TRADE, KNOW_RESOURCE,
    };

    use super::*;

    fn gates(caps: CapabilityMask, auth: AuthorityMask) -> IntentGates<'static> {
        IntentGates {
            capability_mask: caps,
            base_authority_mask: auth,
            authority: None,
            belief_state: None,
            beliefs: None,
            fields: None,
            now_act: 10,
        }
    }

    fn harness() -> (IntentQueue, PlayerEventLog, GoalRegistry) {
        (
            IntentQueue::new(8, 1),
            PlayerEventLog::new(8, 1),
            GoalRegistry::new(8, 1),
        )
    }

    fn goal_update(caps: CapabilityMask, auth: AuthorityMask) -> IntentPayload {
        IntentPayload::GoalUpdate(GoalDesc {
            agent_id: AgentId::new(5),
            preconditions: GoalPreconditions {
                required_capabilities: caps,
                required_authority: auth,
                ..GoalPreconditions::default()
            },
            ..GoalDesc::default()
        })
    }

    #[test]
    fn binding_and_rebinding() {
        let mut reg = PlayerRegistry::new(4);
        reg.bind(PlayerId::new(1), AgentId::new(10)).unwrap();
        reg.bind(PlayerId::new(1), AgentId::new(20)).unwrap();
        assert_eq!(reg.find(PlayerId::new(1)).unwrap().agent_id, AgentId::new(20));
        assert_eq!(reg.len(), 1);
        assert!(reg.bind(PlayerId::NONE, AgentId::new(1)).is_err());
    }

    #[test]
    fn accepted_goal_update_registers_the_goal() {
        let (mut queue, mut events, mut goals) = harness();
        let (intent_id, refusal) = submit_intent(
            &mut queue,
            &mut events,
            &mut goals,
            &gates(CAP_MOVE, AUTH_BASIC),
            PlayerId::new(1),
            AgentId::new(5),
            goal_update(CAP_MOVE, AUTH_BASIC),
        )
        .unwrap();
        assert_eq!(refusal, IntentRefusal::None);
        assert_eq!(intent_id, IntentId::new(1));
        assert_eq!(goals.len(), 1);
        let event = events.entries().first().unwrap();
        assert_eq!(event.kind, PlayerEventKind::IntentAccepted);
        assert_eq!(event.act_time, 10);
    }

    #[test]
    fn capability_gate_refuses_without_side_effects() {
        let (mut queue, mut events, mut goals) = harness();
        let (_, refusal) = submit_intent(
            &mut queue,
            &mut events,
            &mut goals,
            &gates(0, AUTH_BASIC),
            PlayerId::new(1),
            AgentId::new(5),
            goal_update(CAP_TRADE, 0),
        )
        .unwrap();
        assert_eq!(refusal, IntentRefusal::NoCapability);
        assert!(goals.is_empty());
        assert_eq!(
            queue.entries().first().unwrap().status,
            IntentStatus::Refused
        );
        assert_eq!(
            events.entries().first().unwrap().kind,
            PlayerEventKind::IntentRefused
        );
    }

    #[test]
    fn authority_gate_consults_grants() {
        let (mut queue, mut events, mut goals) = harness();
        let mut authority = AuthorityRegistry::new(4);
        authority
            .register(AuthorityGrant {
                grant_id: GrantId::new(1),
                granter_id: AgentId::new(100),
                grantee_id: AgentId::new(5),
                authority_mask: AUTH_TRADE,
                expiry_act: 0,
                revoked: false,
                provenance_id: ProvenanceId::NONE,
            })
            .unwrap();
        let mut g = gates(CAP_MOVE, AUTH_BASIC);
        g.authority = Some(&authority);
        let (_, refusal) = submit_intent(
            &mut queue,
            &mut events,
            &mut goals,
            &g,
            PlayerId::new(1),
            AgentId::new(5),
            goal_update(0, AUTH_TRADE),
        )
        .unwrap();
        assert_eq!(refusal, IntentRefusal::None);
    }

    #[test]
    fn knowledge_gate_reads_beliefs() {
        let (mut queue, mut events, mut goals) = harness();
        let state = BeliefState::new(AgentId::new(5), 0, 0, 0, 1);
        let mut g = gates(CAP_MOVE, AUTH_BASIC);
        g.belief_state = Some(&state);
        let payload = IntentPayload::ProcessRequest(ProcessRequest {
            required_knowledge_mask: KNOW_RESOURCE,
            ..ProcessRequest::default()
        });
        let (_, refusal) = submit_intent(
            &mut queue,
            &mut events,
            &mut goals,
            &g,
            PlayerId::new(1),
            AgentId::new(5),
            payload,
        )
        .unwrap();
        assert_eq!(refusal, IntentRefusal::NoKnowledge);
    }

    struct SteepTerrain;

    impl FieldProvider for SteepTerrain {
        fn value(&self, field: FieldKind, _x: i64, _y: i64) -> Option<i32> {
            match field {
                FieldKind::Slope => Some(9_000),
                FieldKind::BearingCapacity => Some(100),
            }
        }
    }

    #[test]
    fn physical_gate_checks_fields() {
        let (mut queue, mut events, mut goals) = harness();
        let terrain = SteepTerrain;
        let mut g = gates(0, 0);
        g.fields = Some(&terrain);
        let payload = IntentPayload::ProcessRequest(ProcessRequest {
            max_slope_q16: 5_000,
            ..ProcessRequest::default()
        });
        let (_, refusal) = submit_intent(
            &mut queue,
            &mut events,
            &mut goals,
            &g,
            PlayerId::new(1),
            AgentId::new(5),
            payload,
        )
        .unwrap();
        assert_eq!(refusal, IntentRefusal::PhysicalConstraint);
    }

    #[test]
    fn headless_operation_skips_physical_checks() {
        let (mut queue, mut events, mut goals) = harness();
        let payload = IntentPayload::ProcessRequest(ProcessRequest {
            max_slope_q16: 1,
            min_bearing_q16: 1_000_000,
            ..ProcessRequest::default()
        });
        let (_, refusal) = submit_intent(
            &mut queue,
            &mut events,
            &mut goals,
            &gates(0, 0),
            PlayerId::new(1),
            AgentId::new(5),
            payload,
        )
        .unwrap();
        assert_eq!(refusal, IntentRefusal::None);
    }

    #[test]
    fn plan_confirm_requires_a_plan() {
        let (mut queue, mut events, mut goals) = harness();
        let (_, refusal) = submit_intent(
            &mut queue,
            &mut events,
            &mut goals,
            &gates(0, 0),
            PlayerId::new(1),
            AgentId::new(5),
            IntentPayload::PlanConfirm {
                plan_id: PlanId::NONE,
            },
        )
        .unwrap();
        assert_eq!(refusal, IntentRefusal::PlanNotFound);

        let (_, refusal) = submit_intent(
            &mut queue,
            &mut events,
            &mut goals,
            &gates(0, 0),
            PlayerId::new(1),
            AgentId::new(5),
            IntentPayload::PlanConfirm {
                plan_id: PlanId::new(9),
            },
        )
        .unwrap();
        assert_eq!(refusal, IntentRefusal::None);
    }

    #[test]
    fn intent_ids_are_sequential() {
        let (mut queue, mut events, mut goals) = harness();
        for expected in 1..=3u64 {
            let (intent_id, _) = submit_intent(
                &mut queue,
                &mut events,
                &mut goals,
                &gates(0, 0),
                PlayerId::new(1),
                AgentId::new(5),
                IntentPayload::PlanConfirm {
                    plan_id: PlanId::new(9),
                },
            )
            .unwrap();
            assert_eq!(intent_id, IntentId::new(expected));
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn snapshot_is_belief_derived() {
        use polity_agents::belief::{BeliefEvent, BeliefEventKind};
        use polity_types::BeliefTopic;

        let mut store = BeliefStore::new(4, 1, 0, 0);
        store
            .apply_event(
                &BeliefEvent {
                    kind: BeliefEventKind::Observe,
                    agent_id: AgentId::new(5),
                    knowledge_ref: 777,
                    topic: Some(BeliefTopic::Resource),
                    confidence_q16: 1_000,
                    ..BeliefEvent::default()
                },
                1,
            )
            .unwrap();
        let state = BeliefState::new(AgentId::new(5), 0, 300, 40, 1);
        let snapshot = build_snapshot(&state, &store);
        assert_eq!(snapshot.known_resource_ref, 777);
        assert_eq!(snapshot.knowledge_mask, KNOW_RESOURCE);
        assert_eq!(snapshot.hunger_level, 300);
        assert_eq!(snapshot.known_threat_ref, 0);
    }
}
