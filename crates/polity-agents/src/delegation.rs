//! Delegations of process authority.
//!
//! A delegation lets one agent act on another's behalf over a mask of
//! process kinds. Operations that require delegation refuse
//! `InsufficientAuthority` when the delegatee holds none, and
//! `DelegationExpired` when the covering delegation has lapsed.

use serde::{Deserialize, Serialize};

use polity_types::{
    ActTime, AuthorityMask, BoundedRegistry, DelegationId, Keyed, ProcessKind, ProcessKindMask,
    ProvenanceId, Refusal,
};

use crate::error::AgentError;
use crate::planner::Plan;

/// One delegation from delegator to delegatee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    /// Unique id; the registry's natural key.
    pub delegation_id: DelegationId,
    /// Who delegates.
    pub delegator_ref: u64,
    /// Who acts under the delegation.
    pub delegatee_ref: u64,
    /// Content-defined discriminator of the delegation's purpose.
    pub delegation_kind: u32,
    /// Process kinds the delegatee may use (`0` = all kinds).
    pub allowed_process_mask: ProcessKindMask,
    /// Authority conveyed alongside the delegation.
    pub authority_mask: AuthorityMask,
    /// When the delegation lapses (`0` = never).
    pub expiry_act: ActTime,
    /// Whether the delegation has been withdrawn.
    pub revoked: bool,
    /// Causal origin of the delegation.
    pub provenance_ref: ProvenanceId,
}

impl Keyed for Delegation {
    fn key(&self) -> u64 {
        self.delegation_id.raw()
    }
}

impl Delegation {
    /// Whether this delegation permits a process kind at `now_act`.
    ///
    /// A revoked delegation refuses `InsufficientAuthority`; an expired
    /// one refuses `DelegationExpired`; an empty allowed mask permits
    /// every kind.
    pub const fn allows_process(
        &self,
        process_kind: ProcessKind,
        now_act: ActTime,
    ) -> Result<(), Refusal> {
        if self.revoked {
            return Err(Refusal::InsufficientAuthority);
        }
        if self.expiry_act != 0 && self.expiry_act <= now_act {
            return Err(Refusal::DelegationExpired);
        }
        if self.allowed_process_mask == 0 {
            return Ok(());
        }
        if self.allowed_process_mask & process_kind.bit() == 0 {
            return Err(Refusal::InsufficientAuthority);
        }
        Ok(())
    }
}

/// Bounded registry of delegations ordered ascending by delegation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationRegistry {
    delegations: BoundedRegistry<Delegation>,
}

impl DelegationRegistry {
    /// Create an empty registry.
    pub fn new(capacity: usize) -> Self {
        Self {
            delegations: BoundedRegistry::new(capacity),
        }
    }

    /// Number of delegations (revoked included).
    pub fn len(&self) -> usize {
        self.delegations.len()
    }

    /// Whether no delegations are registered.
    pub fn is_empty(&self) -> bool {
        self.delegations.is_empty()
    }

    /// Register a delegation. A zero provenance falls back to the
    /// delegation id.
    pub fn register(&mut self, mut delegation: Delegation) -> Result<(), AgentError> {
        if delegation.provenance_ref.is_none() {
            delegation.provenance_ref = ProvenanceId::new(delegation.delegation_id.raw());
        }
        delegation.revoked = false;
        self.delegations.insert(delegation)?;
        Ok(())
    }

    /// Look up a delegation by id.
    pub fn find(&self, delegation_id: DelegationId) -> Option<&Delegation> {
        self.delegations.find(delegation_id.raw())
    }

    /// Revoke a delegation in place.
    pub fn revoke(&mut self, delegation_id: DelegationId) -> Result<(), AgentError> {
        match self.delegations.find_mut(delegation_id.raw()) {
            Some(delegation) => {
                delegation.revoked = true;
                Ok(())
            }
            None => Err(AgentError::Registry(
                polity_types::RegistryError::AbsentKey {
                    key: delegation_id.raw(),
                },
            )),
        }
    }

    /// The first non-expired delegation naming this delegatee, in id
    /// order.
    pub fn find_for_delegatee(
        &self,
        delegatee_ref: u64,
        now_act: ActTime,
    ) -> Option<&Delegation> {
        if delegatee_ref == 0 {
            return None;
        }
        self.delegations.iter().find(|delegation| {
            delegation.delegatee_ref == delegatee_ref
                && !(delegation.expiry_act != 0 && delegation.expiry_act <= now_act)
        })
    }

    /// Check a plan under the delegatee's delegation.
    ///
    /// Absence of any live delegation refuses `InsufficientAuthority`.
    /// Otherwise every step's process kind must be permitted.
    pub fn check_plan(
        &self,
        delegatee_ref: u64,
        plan: &Plan,
        now_act: ActTime,
    ) -> Result<(), Refusal> {
        if delegatee_ref == 0 {
            return Err(Refusal::InsufficientAuthority);
        }
        let Some(delegation) = self.find_for_delegatee(delegatee_ref, now_act) else {
            return Err(Refusal::InsufficientAuthority);
        };
        for step in &plan.steps {
            delegation.allows_process(step.process_kind, now_act)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use polity_types::AgentId;

    use super::*;
    use crate::planner::{process_id_for_kind, PlanStep};

    fn delegation(id: u64, delegatee: u64, mask: ProcessKindMask, expiry: ActTime) -> Delegation {
        Delegation {
            delegation_id: DelegationId::new(id),
            delegator_ref: 100,
            delegatee_ref: delegatee,
            delegation_kind: 0,
            allowed_process_mask: mask,
            authority_mask: 0,
            expiry_act: expiry,
            revoked: false,
            provenance_ref: ProvenanceId::NONE,
        }
    }

    fn plan_with_step(kind: ProcessKind) -> Plan {
        Plan {
            agent_id: AgentId::new(1),
            steps: vec![PlanStep {
                process_id: process_id_for_kind(kind),
                process_kind: kind,
                target_ref: 0,
                required_capability_mask: 0,
                required_authority_mask: 0,
                expected_cost_units: 1,
                epistemic_gap_mask: 0,
                confidence_q16: 0,
                failure_mode_id: 0,
                flags: 0,
            }],
            ..Plan::default()
        }
    }

    #[test]
    fn missing_delegation_is_insufficient_authority() {
        let reg = DelegationRegistry::new(2);
        let plan = plan_with_step(ProcessKind::Move);
        assert_eq!(
            reg.check_plan(42, &plan, 1).unwrap_err(),
            Refusal::InsufficientAuthority
        );
    }

    #[test]
    fn masked_kind_refuses() {
        let mut reg = DelegationRegistry::new(2);
        reg.register(delegation(1, 42, ProcessKind::Move.bit(), 0)).unwrap();
        assert!(reg.check_plan(42, &plan_with_step(ProcessKind::Move), 1).is_ok());
        assert_eq!(
            reg.check_plan(42, &plan_with_step(ProcessKind::Trade), 1)
                .unwrap_err(),
            Refusal::InsufficientAuthority
        );
    }

    #[test]
    fn empty_mask_permits_all_kinds() {
        let mut reg = DelegationRegistry::new(2);
        reg.register(delegation(1, 42, 0, 0)).unwrap();
        assert!(reg.check_plan(42, &plan_with_step(ProcessKind::Transfer), 1).is_ok());
    }

    #[test]
    fn expired_delegation_reports_expiry() {
        let mut reg = DelegationRegistry::new(2);
        reg.register(delegation(1, 42, 0, 5)).unwrap();
        // The expired delegation is not found for the delegatee at all,
        // which reads as holding no delegation.
        assert_eq!(
            reg.check_plan(42, &plan_with_step(ProcessKind::Move), 5)
                .unwrap_err(),
            Refusal::InsufficientAuthority
        );
        // A delegation that expires mid-check reports the expiry itself.
        let held = reg.find(DelegationId::new(1)).unwrap();
        assert_eq!(
            held.allows_process(ProcessKind::Move, 5).unwrap_err(),
            Refusal::DelegationExpired
        );
    }

    #[test]
    fn revoked_delegation_refuses() {
        let mut reg = DelegationRegistry::new(2);
        reg.register(delegation(1, 42, 0, 0)).unwrap();
        reg.revoke(DelegationId::new(1)).unwrap();
        assert_eq!(
            reg.check_plan(42, &plan_with_step(ProcessKind::Move), 1)
                .unwrap_err(),
            Refusal::InsufficientAuthority
        );
    }
}
