//! Authority grants.
//!
//! An agent's effective authority at an instant is its base mask plus
//! every non-revoked, non-expired grant naming it as grantee. Grants are
//! never deleted -- revocation flips a flag, preserving the audit trail.

use serde::{Deserialize, Serialize};

use polity_types::{
    ActTime, AgentId, AuthorityMask, BoundedRegistry, GrantId, Keyed, ProvenanceId,
};

use crate::error::AgentError;

/// One authority grant from granter to grantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityGrant {
    /// Unique id; the registry's natural key.
    pub grant_id: GrantId,
    /// Who conferred the authority.
    pub granter_id: AgentId,
    /// Who received it.
    pub grantee_id: AgentId,
    /// The authority bits conferred.
    pub authority_mask: AuthorityMask,
    /// When the grant lapses (`0` = never).
    pub expiry_act: ActTime,
    /// Whether the grant has been withdrawn.
    pub revoked: bool,
    /// Causal origin of the grant.
    pub provenance_id: ProvenanceId,
}

impl Keyed for AuthorityGrant {
    fn key(&self) -> u64 {
        self.grant_id.raw()
    }
}

/// Bounded registry of authority grants ordered ascending by grant id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityRegistry {
    grants: BoundedRegistry<AuthorityGrant>,
}

impl AuthorityRegistry {
    /// Create an empty registry.
    pub fn new(capacity: usize) -> Self {
        Self {
            grants: BoundedRegistry::new(capacity),
        }
    }

    /// Number of grants (revoked included).
    pub fn len(&self) -> usize {
        self.grants.len()
    }

    /// Whether no grants are registered.
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// Register a grant. A grantee is required; a zero provenance falls
    /// back to the grant id.
    pub fn register(&mut self, mut grant: AuthorityGrant) -> Result<(), AgentError> {
        if grant.grantee_id.is_none() {
            return Err(AgentError::AbsentAgent);
        }
        if grant.provenance_id.is_none() {
            grant.provenance_id = ProvenanceId::new(grant.grant_id.raw());
        }
        grant.revoked = false;
        self.grants.insert(grant)?;
        Ok(())
    }

    /// Look up a grant by id.
    pub fn find(&self, grant_id: GrantId) -> Option<&AuthorityGrant> {
        self.grants.find(grant_id.raw())
    }

    /// Revoke a grant in place.
    pub fn revoke(&mut self, grant_id: GrantId) -> Result<(), AgentError> {
        match self.grants.find_mut(grant_id.raw()) {
            Some(grant) => {
                grant.revoked = true;
                Ok(())
            }
            None => Err(AgentError::Registry(
                polity_types::RegistryError::AbsentKey {
                    key: grant_id.raw(),
                },
            )),
        }
    }

    /// The grantee's effective authority at `now_act`: the base mask
    /// united with all live grants.
    pub fn effective_mask(
        &self,
        grantee_id: AgentId,
        base_mask: AuthorityMask,
        now_act: ActTime,
    ) -> AuthorityMask {
        if grantee_id.is_none() {
            return base_mask;
        }
        let mut mask = base_mask;
        for grant in self.grants.iter() {
            if grant.grantee_id != grantee_id || grant.revoked {
                continue;
            }
            if grant.expiry_act != 0 && grant.expiry_act <= now_act {
                continue;
            }
            mask |= grant.authority_mask;
        }
        mask
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use polity_types::{AUTH_BASIC, AUTH_TRADE};

    use super::*;

    fn grant(id: u64, grantee: u64, mask: AuthorityMask, expiry: ActTime) -> AuthorityGrant {
        AuthorityGrant {
            grant_id: GrantId::new(id),
            granter_id: AgentId::new(5000),
            grantee_id: AgentId::new(grantee),
            authority_mask: mask,
            expiry_act: expiry,
            revoked: false,
            provenance_id: ProvenanceId::NONE,
        }
    }

    #[test]
    fn grant_then_revoke() {
        let mut reg = AuthorityRegistry::new(2);
        reg.register(grant(1, 6000, AUTH_TRADE, 0)).unwrap();
        let mask = reg.effective_mask(AgentId::new(6000), AUTH_BASIC, 12);
        assert_eq!(mask, AUTH_BASIC | AUTH_TRADE);

        reg.revoke(GrantId::new(1)).unwrap();
        let mask = reg.effective_mask(AgentId::new(6000), AUTH_BASIC, 12);
        assert_eq!(mask, AUTH_BASIC);
    }

    #[test]
    fn expired_grants_do_not_count() {
        let mut reg = AuthorityRegistry::new(2);
        reg.register(grant(1, 6000, AUTH_TRADE, 10)).unwrap();
        assert_eq!(
            reg.effective_mask(AgentId::new(6000), 0, 9),
            AUTH_TRADE
        );
        assert_eq!(reg.effective_mask(AgentId::new(6000), 0, 10), 0);
    }

    #[test]
    fn grants_only_reach_their_grantee() {
        let mut reg = AuthorityRegistry::new(2);
        reg.register(grant(1, 6000, AUTH_TRADE, 0)).unwrap();
        assert_eq!(reg.effective_mask(AgentId::new(6001), AUTH_BASIC, 1), AUTH_BASIC);
    }

    #[test]
    fn provenance_defaults_to_grant_id() {
        let mut reg = AuthorityRegistry::new(2);
        reg.register(grant(9, 6000, AUTH_TRADE, 0)).unwrap();
        assert_eq!(
            reg.find(GrantId::new(9)).unwrap().provenance_id,
            ProvenanceId::new(9)
        );
    }
}
