//! Conflicts between parties.
//!
//! A conflict records two parties disputing a subject. The kernel only
//! tracks lifecycle; resolution mechanics belong to the surrounding
//! simulation rules, which mark conflicts resolved through this
//! registry.

use serde::{Deserialize, Serialize};

use polity_types::{
    ActTime, AgentId, BoundedRegistry, ConflictId, ConflictStatus, Keyed, ProvenanceId,
};

use crate::error::AgentError;

/// One conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// Unique id; the registry's natural key.
    pub conflict_id: ConflictId,
    /// The first party.
    pub party_a_id: AgentId,
    /// The second party.
    pub party_b_id: AgentId,
    /// What the conflict is about.
    pub subject_id: u64,
    /// Lifecycle status.
    pub status: ConflictStatus,
    /// When the conflict began.
    pub started_act: ActTime,
    /// When it was resolved (`0` = still active).
    pub resolved_act: ActTime,
    /// Causal origin of the conflict.
    pub provenance_id: ProvenanceId,
}

impl Keyed for Conflict {
    fn key(&self) -> u64 {
        self.conflict_id.raw()
    }
}

/// Bounded registry of conflicts ordered ascending by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRegistry {
    conflicts: BoundedRegistry<Conflict>,
}

impl ConflictRegistry {
    /// Create an empty registry.
    pub fn new(capacity: usize) -> Self {
        Self {
            conflicts: BoundedRegistry::new(capacity),
        }
    }

    /// Number of conflicts (resolved included).
    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    /// Whether no conflicts are registered.
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Register a conflict as active. A zero provenance falls back to
    /// the conflict id.
    pub fn register(&mut self, mut conflict: Conflict) -> Result<(), AgentError> {
        if conflict.provenance_id.is_none() {
            conflict.provenance_id = ProvenanceId::new(conflict.conflict_id.raw());
        }
        conflict.status = ConflictStatus::Active;
        conflict.resolved_act = 0;
        self.conflicts.insert(conflict)?;
        Ok(())
    }

    /// Look up a conflict by id.
    pub fn find(&self, conflict_id: ConflictId) -> Option<&Conflict> {
        self.conflicts.find(conflict_id.raw())
    }

    /// Mark a conflict resolved at `resolved_act`.
    pub fn resolve(
        &mut self,
        conflict_id: ConflictId,
        resolved_act: ActTime,
    ) -> Result<(), AgentError> {
        let conflict = self.conflicts.find_mut(conflict_id.raw()).ok_or(
            AgentError::Registry(polity_types::RegistryError::AbsentKey {
                key: conflict_id.raw(),
            }),
        )?;
        conflict.status = ConflictStatus::Resolved;
        conflict.resolved_act = resolved_act;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn register_and_resolve() {
        let mut reg = ConflictRegistry::new(2);
        reg.register(Conflict {
            conflict_id: ConflictId::new(8001),
            party_a_id: AgentId::new(9001),
            party_b_id: AgentId::new(9002),
            subject_id: 500,
            status: ConflictStatus::Active,
            started_act: 21,
            resolved_act: 0,
            provenance_id: ProvenanceId::NONE,
        })
        .unwrap();

        let conflict = reg.find(ConflictId::new(8001)).unwrap();
        assert_eq!(conflict.status, ConflictStatus::Active);

        reg.resolve(ConflictId::new(8001), 33).unwrap();
        let conflict = reg.find(ConflictId::new(8001)).unwrap();
        assert_eq!(conflict.status, ConflictStatus::Resolved);
        assert_eq!(conflict.resolved_act, 33);
    }
}
