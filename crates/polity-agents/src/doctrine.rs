//! Doctrine policies: what goal types an agent may pursue, with what
//! priority bias, and on what schedule.
//!
//! A doctrine allows or forbids goal types, biases their priorities with
//! signed per-type modifiers, constrains think scheduling (minimum
//! interval and/or a time window), and demands authority and legitimacy
//! of whoever it governs. Doctrines are scoped (agent, cohort,
//! organization, jurisdiction) and selected per evaluation through a
//! strict binding order.

use serde::{Deserialize, Serialize};

use polity_types::{
    clamp_priority, ActTime, AuthorityMask, BoundedRegistry, DoctrineId, GoalType, Keyed,
    ProvenanceId, Refusal, ACT_NEVER, GOAL_TYPE_COUNT,
};

use crate::error::AgentError;

/// Scheduling policy bit: enforce `min_think_interval_act` between
/// thinks.
pub const SCHED_INTERVAL: u32 = 1 << 0;

/// Scheduling policy bit: clamp thinks into
/// `[window_start_act, window_end_act]`.
pub const SCHED_WINDOW: u32 = 1 << 1;

/// Who a doctrine is meant to govern.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum DoctrineScope {
    /// A single agent.
    #[default]
    Agent,
    /// A cohort acting as one.
    Cohort,
    /// An organization and its members.
    Organization,
    /// Everyone inside a jurisdiction.
    Jurisdiction,
}

// ---------------------------------------------------------------------------
// Doctrine record
// ---------------------------------------------------------------------------

/// One doctrine policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctrine {
    /// Unique id; the registry's natural key.
    pub doctrine_id: DoctrineId,
    /// The agent or institution that issued the doctrine.
    pub owner_ref: u64,
    /// Who the doctrine governs.
    pub scope: DoctrineScope,
    /// Goal-type bits explicitly permitted (`0` = all types permitted).
    pub allowed_goal_types: u32,
    /// Goal-type bits forbidden outright; beats the allow mask.
    pub forbidden_goal_types: u32,
    /// Signed per-goal-type priority bias, indexed by goal type.
    pub priority_modifiers: [i32; GOAL_TYPE_COUNT],
    /// `SCHED_*` policy bits.
    pub scheduling_policy: u32,
    /// Minimum ticks between thinks under `SCHED_INTERVAL`.
    pub min_think_interval_act: ActTime,
    /// Window start under `SCHED_WINDOW` (`0` = unset).
    pub window_start_act: ActTime,
    /// Window end under `SCHED_WINDOW` (`0` = unset).
    pub window_end_act: ActTime,
    /// When the doctrine lapses (`0` = never).
    pub expiry_act: ActTime,
    /// Authority the governed binding must hold.
    pub authority_required_mask: AuthorityMask,
    /// Minimum legitimacy the governed binding must show (`0` = none).
    pub legitimacy_min: u32,
    /// Next act at which a scheduled update touches this doctrine;
    /// maintained by the doctrine event scheduler.
    pub next_due_tick: ActTime,
    /// Causal origin of the doctrine.
    pub provenance_ref: ProvenanceId,
}

impl Keyed for Doctrine {
    fn key(&self) -> u64 {
        self.doctrine_id.raw()
    }
}

impl Doctrine {
    /// Whether the doctrine permits pursuing this goal type.
    pub const fn allows_goal(&self, goal_type: GoalType) -> bool {
        let bit = goal_type.bit();
        if self.forbidden_goal_types & bit != 0 {
            return false;
        }
        if self.allowed_goal_types != 0 && self.allowed_goal_types & bit == 0 {
            return false;
        }
        true
    }

    /// Apply this doctrine's per-type priority bias, re-clamped to the
    /// priority scale.
    pub fn apply_priority(&self, goal_type: GoalType, priority: u32) -> u32 {
        let modifier = self
            .priority_modifiers
            .get(goal_type.index())
            .copied()
            .unwrap_or(0);
        clamp_priority(i64::from(priority) + i64::from(modifier))
    }

    /// The earliest act at which the doctrine's schedule permits the
    /// next think, given the last think and the desired next act.
    pub const fn next_think_act(&self, last_act: ActTime, desired_act: ActTime) -> ActTime {
        let mut next = desired_act;
        if self.scheduling_policy & SCHED_INTERVAL != 0 && self.min_think_interval_act > 0 {
            let floor = last_act.saturating_add(self.min_think_interval_act);
            if next < floor {
                next = floor;
            }
        }
        if self.scheduling_policy & SCHED_WINDOW != 0
            && self.window_start_act > 0
            && self.window_end_act > 0
        {
            if next < self.window_start_act {
                next = self.window_start_act;
            } else if next > self.window_end_act {
                next = self.window_end_act;
            }
        }
        next
    }

    /// Whether a binding satisfies the doctrine's authority and
    /// legitimacy demands.
    pub fn authorizes(&self, binding: &DoctrineBinding) -> Result<(), Refusal> {
        if binding.authority_mask & self.authority_required_mask != self.authority_required_mask {
            return Err(Refusal::DoctrineNotAuthorized);
        }
        if self.legitimacy_min > 0 && binding.legitimacy_value < self.legitimacy_min {
            return Err(Refusal::DoctrineNotAuthorized);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DoctrineBinding
// ---------------------------------------------------------------------------

/// The doctrine references an agent brings to selection, in strict
/// precedence order, together with the masks the candidate doctrine will
/// judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DoctrineBinding {
    /// Explicitly assigned doctrine; highest precedence.
    pub explicit_doctrine_ref: DoctrineId,
    /// The default doctrine of the agent's role.
    pub role_doctrine_ref: DoctrineId,
    /// The organization's doctrine.
    pub org_doctrine_ref: DoctrineId,
    /// The jurisdiction's doctrine.
    pub jurisdiction_doctrine_ref: DoctrineId,
    /// The agent's personal fallback doctrine; lowest precedence.
    pub personal_doctrine_ref: DoctrineId,
    /// The authority the agent holds.
    pub authority_mask: AuthorityMask,
    /// The legitimacy the agent shows.
    pub legitimacy_value: u32,
}

// ---------------------------------------------------------------------------
// DoctrineRegistry
// ---------------------------------------------------------------------------

/// Bounded registry of doctrines ordered ascending by doctrine id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctrineRegistry {
    doctrines: BoundedRegistry<Doctrine>,
}

impl DoctrineRegistry {
    /// Create an empty registry.
    pub fn new(capacity: usize) -> Self {
        Self {
            doctrines: BoundedRegistry::new(capacity),
        }
    }

    /// Number of registered doctrines.
    pub fn len(&self) -> usize {
        self.doctrines.len()
    }

    /// Whether no doctrines are registered.
    pub fn is_empty(&self) -> bool {
        self.doctrines.is_empty()
    }

    /// The doctrines in ascending id order.
    pub fn doctrines(&self) -> &[Doctrine] {
        self.doctrines.entries()
    }

    /// Register a new doctrine. A zero `next_due_tick` is normalized to
    /// `ACT_NEVER`; a zero provenance falls back to the doctrine id.
    pub fn register(&mut self, doctrine: Doctrine) -> Result<(), AgentError> {
        self.doctrines.insert(Self::normalized(doctrine))?;
        Ok(())
    }

    /// Update a doctrine in place, or register it if absent.
    pub fn upsert(&mut self, doctrine: Doctrine) -> Result<(), AgentError> {
        let normalized = Self::normalized(doctrine);
        if let Some(entry) = self.doctrines.find_mut(normalized.doctrine_id.raw()) {
            *entry = normalized;
            return Ok(());
        }
        self.doctrines.insert(normalized)?;
        Ok(())
    }

    /// Remove a doctrine.
    pub fn remove(&mut self, doctrine_id: DoctrineId) -> Result<(), AgentError> {
        self.doctrines.remove(doctrine_id.raw())?;
        Ok(())
    }

    /// Look up a doctrine by id.
    pub fn find(&self, doctrine_id: DoctrineId) -> Option<&Doctrine> {
        self.doctrines.find(doctrine_id.raw())
    }

    /// Look up a doctrine mutably by id.
    pub fn find_mut(&mut self, doctrine_id: DoctrineId) -> Option<&mut Doctrine> {
        self.doctrines.find_mut(doctrine_id.raw())
    }

    /// Whether a doctrine id is registered.
    pub fn contains(&self, doctrine_id: DoctrineId) -> bool {
        self.find(doctrine_id).is_some()
    }

    /// Remove a doctrine without treating absence as an error.
    pub fn remove_if_present(&mut self, doctrine_id: DoctrineId) {
        let _ = self.doctrines.remove(doctrine_id.raw());
    }

    /// Select the doctrine governing a binding at `now_act`.
    ///
    /// Candidates are tried in strict precedence order (explicit, role,
    /// organization, jurisdiction, personal). Absent or expired
    /// candidates are skipped; the first live candidate decides: it
    /// either authorizes the binding or the selection fails with
    /// `DoctrineNotAuthorized`. No live candidate at all is also
    /// `DoctrineNotAuthorized`.
    pub fn select<'a>(
        &'a self,
        binding: &DoctrineBinding,
        now_act: ActTime,
    ) -> Result<&'a Doctrine, Refusal> {
        let candidates = [
            binding.explicit_doctrine_ref,
            binding.role_doctrine_ref,
            binding.org_doctrine_ref,
            binding.jurisdiction_doctrine_ref,
            binding.personal_doctrine_ref,
        ];
        for candidate in candidates {
            if candidate.is_none() {
                continue;
            }
            let Some(doctrine) = self.find(candidate) else {
                continue;
            };
            if doctrine.expiry_act != 0 && doctrine.expiry_act <= now_act {
                continue;
            }
            doctrine.authorizes(binding)?;
            return Ok(doctrine);
        }
        Err(Refusal::DoctrineNotAuthorized)
    }

    fn normalized(mut doctrine: Doctrine) -> Doctrine {
        if doctrine.next_due_tick == 0 {
            doctrine.next_due_tick = ACT_NEVER;
        }
        if doctrine.provenance_ref.is_none() {
            doctrine.provenance_ref = ProvenanceId::new(doctrine.doctrine_id.raw());
        }
        doctrine
    }
}

/// A blank doctrine useful as a construction base.
impl Default for Doctrine {
    fn default() -> Self {
        Self {
            doctrine_id: DoctrineId::NONE,
            owner_ref: 0,
            scope: DoctrineScope::Agent,
            allowed_goal_types: 0,
            forbidden_goal_types: 0,
            priority_modifiers: [0; GOAL_TYPE_COUNT],
            scheduling_policy: 0,
            min_think_interval_act: 0,
            window_start_act: 0,
            window_end_act: 0,
            expiry_act: 0,
            authority_required_mask: 0,
            legitimacy_min: 0,
            next_due_tick: ACT_NEVER,
            provenance_ref: ProvenanceId::NONE,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use polity_types::{AUTH_MILITARY, PRIORITY_SCALE};

    use super::*;

    fn doctrine(id: u64) -> Doctrine {
        Doctrine {
            doctrine_id: DoctrineId::new(id),
            ..Doctrine::default()
        }
    }

    #[test]
    fn forbid_beats_allow() {
        let d = Doctrine {
            allowed_goal_types: GoalType::Trade.bit() | GoalType::Survive.bit(),
            forbidden_goal_types: GoalType::Trade.bit(),
            ..doctrine(1)
        };
        assert!(d.allows_goal(GoalType::Survive));
        assert!(!d.allows_goal(GoalType::Trade));
        assert!(!d.allows_goal(GoalType::Defend));
    }

    #[test]
    fn empty_allow_mask_permits_all() {
        let d = doctrine(1);
        assert!(d.allows_goal(GoalType::Stabilize));
    }

    #[test]
    fn priority_modifier_clamps_both_ways() {
        let mut d = doctrine(1);
        d.priority_modifiers[GoalType::Trade.index()] = -2_000;
        d.priority_modifiers[GoalType::Defend.index()] = 2_000;
        assert_eq!(d.apply_priority(GoalType::Trade, 500), 0);
        assert_eq!(d.apply_priority(GoalType::Defend, 500), PRIORITY_SCALE);
        assert_eq!(d.apply_priority(GoalType::Survive, 500), 500);
    }

    #[test]
    fn interval_and_window_shape_next_think() {
        let d = Doctrine {
            scheduling_policy: SCHED_INTERVAL | SCHED_WINDOW,
            min_think_interval_act: 10,
            window_start_act: 100,
            window_end_act: 200,
            ..doctrine(1)
        };
        // Interval floor pushes forward, then the window pulls into range.
        assert_eq!(d.next_think_act(95, 96), 105);
        assert_eq!(d.next_think_act(0, 5), 100);
        assert_eq!(d.next_think_act(0, 500), 200);
    }

    #[test]
    fn selection_follows_precedence() {
        let mut reg = DoctrineRegistry::new(4);
        reg.register(doctrine(10)).unwrap();
        reg.register(doctrine(20)).unwrap();
        let binding = DoctrineBinding {
            org_doctrine_ref: DoctrineId::new(10),
            personal_doctrine_ref: DoctrineId::new(20),
            ..DoctrineBinding::default()
        };
        let selected = reg.select(&binding, 0).unwrap();
        assert_eq!(selected.doctrine_id, DoctrineId::new(10));
    }

    #[test]
    fn expired_candidate_is_skipped() {
        let mut reg = DoctrineRegistry::new(4);
        reg.register(Doctrine {
            expiry_act: 5,
            ..doctrine(10)
        })
        .unwrap();
        reg.register(doctrine(20)).unwrap();
        let binding = DoctrineBinding {
            explicit_doctrine_ref: DoctrineId::new(10),
            personal_doctrine_ref: DoctrineId::new(20),
            ..DoctrineBinding::default()
        };
        let selected = reg.select(&binding, 5).unwrap();
        assert_eq!(selected.doctrine_id, DoctrineId::new(20));
    }

    #[test]
    fn unauthorized_candidate_stops_selection() {
        let mut reg = DoctrineRegistry::new(4);
        reg.register(Doctrine {
            authority_required_mask: AUTH_MILITARY,
            ..doctrine(10)
        })
        .unwrap();
        reg.register(doctrine(20)).unwrap();
        let binding = DoctrineBinding {
            explicit_doctrine_ref: DoctrineId::new(10),
            personal_doctrine_ref: DoctrineId::new(20),
            ..DoctrineBinding::default()
        };
        // The explicit candidate exists but rejects the binding; the
        // fallback is never consulted.
        assert_eq!(
            reg.select(&binding, 0).unwrap_err(),
            Refusal::DoctrineNotAuthorized
        );
    }

    #[test]
    fn no_candidates_is_not_authorized() {
        let reg = DoctrineRegistry::new(4);
        assert_eq!(
            reg.select(&DoctrineBinding::default(), 0).unwrap_err(),
            Refusal::DoctrineNotAuthorized
        );
    }
}
