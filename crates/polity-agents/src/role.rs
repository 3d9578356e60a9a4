//! Agent roles.
//!
//! A role couples a default doctrine with the authority and capability
//! an occupant must demonstrate. The evaluator resolves the context's
//! role before doctrine selection; an unknown role, or one whose
//! requirements the agent does not meet, is a `RoleMismatch`.

use serde::{Deserialize, Serialize};

use polity_types::{
    mask_covers, AuthorityMask, BoundedRegistry, CapabilityMask, DoctrineId, Keyed, RoleId,
};

use crate::error::AgentError;

/// One role definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Unique id; the registry's natural key.
    pub role_id: RoleId,
    /// Doctrine occupants fall under when no explicit doctrine binds.
    pub default_doctrine_ref: DoctrineId,
    /// Authority an occupant must hold.
    pub authority_requirements: AuthorityMask,
    /// Capability an occupant must hold.
    pub capability_requirements: CapabilityMask,
}

impl Keyed for Role {
    fn key(&self) -> u64 {
        self.role_id.raw()
    }
}

impl Role {
    /// Whether an agent with these masks may occupy the role.
    pub const fn requirements_ok(
        &self,
        authority_mask: AuthorityMask,
        capability_mask: CapabilityMask,
    ) -> bool {
        mask_covers(authority_mask, self.authority_requirements)
            && mask_covers(capability_mask, self.capability_requirements)
    }
}

/// Bounded registry of roles ordered ascending by role id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleRegistry {
    roles: BoundedRegistry<Role>,
}

impl RoleRegistry {
    /// Create an empty registry.
    pub fn new(capacity: usize) -> Self {
        Self {
            roles: BoundedRegistry::new(capacity),
        }
    }

    /// Number of registered roles.
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Whether no roles are registered.
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Register a role.
    pub fn register(&mut self, role: Role) -> Result<(), AgentError> {
        self.roles.insert(role)?;
        Ok(())
    }

    /// Look up a role by id.
    pub fn find(&self, role_id: RoleId) -> Option<&Role> {
        self.roles.find(role_id.raw())
    }
}
