//! Institutional constraints over process kinds.
//!
//! A constraint lets an institution deny (or nominally allow) process
//! kinds for one agent or for everyone. Evaluation scans in id order and
//! the first matching live DENY decides -- there is no ALLOW override of
//! a DENY.

use serde::{Deserialize, Serialize};

use polity_types::{
    ActTime, AgentId, BoundedRegistry, ConstraintId, InstitutionId, Keyed, ProcessKind,
    ProcessKindMask, ProvenanceId,
};

use crate::error::AgentError;

/// Whether a constraint denies or allows its process kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConstraintMode {
    /// Block the masked kinds. Strictly prioritized.
    #[default]
    Deny,
    /// Nominally permit the masked kinds; never overrides a deny.
    Allow,
}

/// One institutional constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    /// Unique id; the registry's natural key.
    pub constraint_id: ConstraintId,
    /// The issuing institution.
    pub institution_id: InstitutionId,
    /// The constrained agent (`NONE` = applies to everyone).
    pub target_agent_id: AgentId,
    /// The process kinds the constraint covers.
    pub process_kind_mask: ProcessKindMask,
    /// Deny or allow.
    pub mode: ConstraintMode,
    /// When the constraint lapses (`0` = never).
    pub expiry_act: ActTime,
    /// Whether the constraint has been withdrawn.
    pub revoked: bool,
    /// Causal origin of the constraint.
    pub provenance_id: ProvenanceId,
}

impl Keyed for Constraint {
    fn key(&self) -> u64 {
        self.constraint_id.raw()
    }
}

/// Bounded registry of constraints ordered ascending by constraint id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintRegistry {
    constraints: BoundedRegistry<Constraint>,
}

impl ConstraintRegistry {
    /// Create an empty registry.
    pub fn new(capacity: usize) -> Self {
        Self {
            constraints: BoundedRegistry::new(capacity),
        }
    }

    /// Number of constraints (revoked included).
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Whether no constraints are registered.
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Register a constraint. A zero provenance falls back to the
    /// constraint id.
    pub fn register(&mut self, mut constraint: Constraint) -> Result<(), AgentError> {
        if constraint.provenance_id.is_none() {
            constraint.provenance_id = ProvenanceId::new(constraint.constraint_id.raw());
        }
        constraint.revoked = false;
        self.constraints.insert(constraint)?;
        Ok(())
    }

    /// Look up a constraint by id.
    pub fn find(&self, constraint_id: ConstraintId) -> Option<&Constraint> {
        self.constraints.find(constraint_id.raw())
    }

    /// Revoke a constraint in place.
    pub fn revoke(&mut self, constraint_id: ConstraintId) -> Result<(), AgentError> {
        match self.constraints.find_mut(constraint_id.raw()) {
            Some(constraint) => {
                constraint.revoked = true;
                Ok(())
            }
            None => Err(AgentError::Registry(
                polity_types::RegistryError::AbsentKey {
                    key: constraint_id.raw(),
                },
            )),
        }
    }

    /// Whether `agent_id` may perform `process_kind` at `now_act`.
    ///
    /// Scans in id order, skipping revoked, expired, and
    /// target-mismatched entries; the first DENY whose mask covers the
    /// kind blocks and names its institution. Absence of any matching
    /// DENY permits.
    pub fn allows_process(
        &self,
        agent_id: AgentId,
        process_kind: ProcessKind,
        now_act: ActTime,
    ) -> Result<(), InstitutionId> {
        for constraint in self.constraints.iter() {
            if constraint.revoked {
                continue;
            }
            if constraint.expiry_act != 0 && constraint.expiry_act <= now_act {
                continue;
            }
            if constraint.target_agent_id.is_some() && constraint.target_agent_id != agent_id {
                continue;
            }
            if constraint.process_kind_mask & process_kind.bit() == 0 {
                continue;
            }
            if matches!(constraint.mode, ConstraintMode::Deny) {
                return Err(constraint.institution_id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn deny(id: u64, target: u64, mask: ProcessKindMask) -> Constraint {
        Constraint {
            constraint_id: ConstraintId::new(id),
            institution_id: InstitutionId::new(2001),
            target_agent_id: AgentId::new(target),
            process_kind_mask: mask,
            mode: ConstraintMode::Deny,
            expiry_act: 0,
            revoked: false,
            provenance_id: ProvenanceId::NONE,
        }
    }

    #[test]
    fn deny_blocks_and_names_the_institution() {
        let mut reg = ConstraintRegistry::new(2);
        reg.register(deny(10, 6000, ProcessKind::Trade.bit())).unwrap();
        assert_eq!(
            reg.allows_process(AgentId::new(6000), ProcessKind::Trade, 5),
            Err(InstitutionId::new(2001))
        );
        assert!(reg
            .allows_process(AgentId::new(6000), ProcessKind::Move, 5)
            .is_ok());
    }

    #[test]
    fn revoked_constraint_stops_blocking() {
        let mut reg = ConstraintRegistry::new(2);
        reg.register(deny(10, 6000, ProcessKind::Trade.bit())).unwrap();
        reg.revoke(ConstraintId::new(10)).unwrap();
        assert!(reg
            .allows_process(AgentId::new(6000), ProcessKind::Trade, 5)
            .is_ok());
    }

    #[test]
    fn untargeted_constraint_hits_everyone() {
        let mut reg = ConstraintRegistry::new(2);
        reg.register(deny(10, 0, ProcessKind::Defend.bit())).unwrap();
        assert!(reg
            .allows_process(AgentId::new(1), ProcessKind::Defend, 1)
            .is_err());
        assert!(reg
            .allows_process(AgentId::new(2), ProcessKind::Defend, 1)
            .is_err());
    }

    #[test]
    fn expired_constraint_stops_blocking() {
        let mut reg = ConstraintRegistry::new(2);
        let mut constraint = deny(10, 6000, ProcessKind::Trade.bit());
        constraint.expiry_act = 5;
        reg.register(constraint).unwrap();
        assert!(reg
            .allows_process(AgentId::new(6000), ProcessKind::Trade, 4)
            .is_err());
        assert!(reg
            .allows_process(AgentId::new(6000), ProcessKind::Trade, 5)
            .is_ok());
    }

    #[test]
    fn allow_mode_does_not_override_deny() {
        let mut reg = ConstraintRegistry::new(2);
        reg.register(deny(10, 6000, ProcessKind::Trade.bit())).unwrap();
        let mut allow = deny(5, 6000, ProcessKind::Trade.bit());
        allow.mode = ConstraintMode::Allow;
        reg.register(allow).unwrap();
        // The allow sits earlier in id order, but the deny still blocks.
        assert!(reg
            .allows_process(AgentId::new(6000), ProcessKind::Trade, 1)
            .is_err());
    }
}
