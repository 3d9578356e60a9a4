//! Type-safe identifier wrappers around `u64`.
//!
//! Every entity in the simulation has a strongly-typed ID to prevent
//! accidental mixing of identifiers at compile time. All IDs are plain
//! 64-bit integers; the raw value `0` means "absent" and is available as
//! the `NONE` constant on every wrapper. Identifiers never encode time or
//! machine state -- callers allocate them from registry counters so two
//! runs that make the same calls produce the same IDs.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around `u64` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// The absent identifier (raw value `0`).
            pub const NONE: Self = Self(0);

            /// Wrap a raw 64-bit value.
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Return the inner `u64` value.
            pub const fn raw(self) -> u64 {
                self.0
            }

            /// Whether this identifier is the absent sentinel.
            pub const fn is_none(self) -> bool {
                self.0 == 0
            }

            /// Whether this identifier names an entity.
            pub const fn is_some(self) -> bool {
                self.0 != 0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for an agent (person, cohort, institution, or
    /// player body -- anything that holds beliefs and goals).
    AgentId
}

define_id! {
    /// Unique identifier for a belief entry in a belief store.
    BeliefId
}

define_id! {
    /// Unique identifier for a goal in a goal registry.
    GoalId
}

define_id! {
    /// Unique identifier for a bounded plan.
    PlanId
}

define_id! {
    /// Unique identifier for a doctrine policy.
    DoctrineId
}

define_id! {
    /// Unique identifier for an agent role.
    RoleId
}

define_id! {
    /// Unique identifier for an authority grant.
    GrantId
}

define_id! {
    /// Unique identifier for an institutional constraint.
    ConstraintId
}

define_id! {
    /// Unique identifier for a bilateral contract.
    ContractId
}

define_id! {
    /// Unique identifier for a delegation of process authority.
    DelegationId
}

define_id! {
    /// Unique identifier for an institution.
    InstitutionId
}

define_id! {
    /// Unique identifier for a conflict between two parties.
    ConflictId
}

define_id! {
    /// Unique identifier for an aggregate agent (a cohort acting as one).
    AggregateId
}

define_id! {
    /// Unique identifier for a population cohort, derived by mixing the
    /// cohort key fields.
    CohortId
}

define_id! {
    /// Unique identifier for a household.
    HouseholdId
}

define_id! {
    /// Unique identifier for a migration flow.
    FlowId
}

define_id! {
    /// Unique identifier for a player-submitted intent.
    IntentId
}

define_id! {
    /// Unique identifier for a human player.
    PlayerId
}

define_id! {
    /// Unique identifier for an event record (audit, player feedback,
    /// doctrine update, refinement).
    EventId
}

define_id! {
    /// Stable identifier tracing a record to its causal origin.
    ProvenanceId
}

define_id! {
    /// Deterministic identifier for a process template, derived from a
    /// stable string key.
    ProcessId
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn none_is_absent() {
        assert!(AgentId::NONE.is_none());
        assert!(!AgentId::new(7).is_none());
        assert!(AgentId::new(7).is_some());
    }

    #[test]
    fn ids_order_by_raw_value() {
        let a = GoalId::new(3);
        let b = GoalId::new(12);
        assert!(a < b);
        assert_eq!(a.raw(), 3);
    }

    #[test]
    fn id_roundtrip_serde() {
        let original = CohortId::new(0xDEAD_BEEF);
        let json = serde_json::to_string(&original).unwrap();
        // Transparent representation: just the number.
        assert_eq!(json, "3735928559");
        let restored: CohortId = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn id_display_matches_raw() {
        let id = InstitutionId::new(42);
        assert_eq!(id.to_string(), "42");
    }
}
