//! Institutions.
//!
//! Institutions are agents: each one is backed by an agent id and holds
//! beliefs, goals, and audit entries like any person. What this registry
//! adds is the institutional lifecycle -- authority, Q16 legitimacy, and
//! collapse when legitimacy falls to a threshold.

use serde::{Deserialize, Serialize};

use polity_types::{
    ActTime, AgentId, AuthorityMask, BoundedRegistry, InstitutionId, InstitutionStatus, Keyed,
    ProvenanceId,
};

use crate::error::AgentError;

/// One institution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Institution {
    /// Unique id; the registry's natural key.
    pub institution_id: InstitutionId,
    /// The agent embodying the institution.
    pub agent_id: AgentId,
    /// The authority the institution wields.
    pub authority_mask: AuthorityMask,
    /// Q16 legitimacy; collapse consults this.
    pub legitimacy_q16: u32,
    /// Lifecycle status.
    pub status: InstitutionStatus,
    /// When the institution was founded.
    pub founded_act: ActTime,
    /// When it collapsed (`0` = still standing).
    pub collapsed_act: ActTime,
    /// Causal origin of the institution.
    pub provenance_id: ProvenanceId,
}

impl Keyed for Institution {
    fn key(&self) -> u64 {
        self.institution_id.raw()
    }
}

/// Bounded registry of institutions ordered ascending by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstitutionRegistry {
    institutions: BoundedRegistry<Institution>,
}

impl InstitutionRegistry {
    /// Create an empty registry.
    pub fn new(capacity: usize) -> Self {
        Self {
            institutions: BoundedRegistry::new(capacity),
        }
    }

    /// Number of institutions (collapsed included).
    pub fn len(&self) -> usize {
        self.institutions.len()
    }

    /// Whether no institutions are registered.
    pub fn is_empty(&self) -> bool {
        self.institutions.is_empty()
    }

    /// Register an institution as active. The backing agent is required;
    /// a zero provenance falls back to the institution id.
    pub fn register(&mut self, mut institution: Institution) -> Result<(), AgentError> {
        if institution.agent_id.is_none() {
            return Err(AgentError::AbsentAgent);
        }
        if institution.provenance_id.is_none() {
            institution.provenance_id = ProvenanceId::new(institution.institution_id.raw());
        }
        institution.status = InstitutionStatus::Active;
        institution.collapsed_act = 0;
        self.institutions.insert(institution)?;
        Ok(())
    }

    /// Look up an institution by id.
    pub fn find(&self, institution_id: InstitutionId) -> Option<&Institution> {
        self.institutions.find(institution_id.raw())
    }

    /// Set an institution's legitimacy.
    pub fn set_legitimacy(
        &mut self,
        institution_id: InstitutionId,
        legitimacy_q16: u32,
    ) -> Result<(), AgentError> {
        let institution = self.get_mut(institution_id)?;
        institution.legitimacy_q16 = legitimacy_q16;
        Ok(())
    }

    /// Collapse the institution if its legitimacy is at or below the
    /// threshold. Returns whether a collapse happened on this call; an
    /// already-collapsed institution never re-collapses.
    pub fn check_collapse(
        &mut self,
        institution_id: InstitutionId,
        collapse_threshold_q16: u32,
        now_act: ActTime,
    ) -> Result<bool, AgentError> {
        let institution = self.get_mut(institution_id)?;
        if institution.status == InstitutionStatus::Collapsed {
            return Ok(false);
        }
        if institution.legitimacy_q16 <= collapse_threshold_q16 {
            institution.status = InstitutionStatus::Collapsed;
            institution.collapsed_act = now_act;
            return Ok(true);
        }
        Ok(false)
    }

    fn get_mut(&mut self, institution_id: InstitutionId) -> Result<&mut Institution, AgentError> {
        self.institutions.find_mut(institution_id.raw()).ok_or(
            AgentError::Registry(polity_types::RegistryError::AbsentKey {
                key: institution_id.raw(),
            }),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use polity_types::AUTH_BASIC;

    use super::*;

    fn institution(id: u64, agent: u64, legitimacy: u32) -> Institution {
        Institution {
            institution_id: InstitutionId::new(id),
            agent_id: AgentId::new(agent),
            authority_mask: AUTH_BASIC,
            legitimacy_q16: legitimacy,
            status: InstitutionStatus::Active,
            founded_act: 10,
            collapsed_act: 0,
            provenance_id: ProvenanceId::NONE,
        }
    }

    #[test]
    fn institutions_are_backed_by_agents() {
        let mut reg = InstitutionRegistry::new(2);
        reg.register(institution(1001, 9001, 50_000)).unwrap();
        let found = reg.find(InstitutionId::new(1001)).unwrap();
        assert_eq!(found.agent_id, AgentId::new(9001));
        assert_eq!(found.status, InstitutionStatus::Active);

        let no_agent = institution(1002, 0, 0);
        assert!(reg.register(no_agent).is_err());
    }

    #[test]
    fn legitimacy_collapse_stamps_the_act() {
        let mut reg = InstitutionRegistry::new(2);
        reg.register(institution(4001, 9001, 40_000)).unwrap();
        reg.set_legitimacy(InstitutionId::new(4001), 1).unwrap();
        assert!(reg.check_collapse(InstitutionId::new(4001), 10, 44).unwrap());
        let collapsed = reg.find(InstitutionId::new(4001)).unwrap();
        assert_eq!(collapsed.status, InstitutionStatus::Collapsed);
        assert_eq!(collapsed.collapsed_act, 44);
        // Collapse is terminal; a second check reports nothing new.
        assert!(!reg.check_collapse(InstitutionId::new(4001), 10, 45).unwrap());
    }

    #[test]
    fn healthy_institution_does_not_collapse() {
        let mut reg = InstitutionRegistry::new(2);
        reg.register(institution(1, 9, 40_000)).unwrap();
        assert!(!reg.check_collapse(InstitutionId::new(1), 10, 5).unwrap());
        assert_eq!(
            reg.find(InstitutionId::new(1)).unwrap().status,
            InstitutionStatus::Active
        );
    }
}
