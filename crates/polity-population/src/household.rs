//! Bounded households.
//!
//! A household groups up to [`HOUSEHOLD_MAX_MEMBERS`] persons around a
//! residence and a shared resource pool. Member lists are strictly
//! ascending, so membership reads identically across runs.

use serde::{Deserialize, Serialize};

use polity_types::{ActTime, BoundedRegistry, HouseholdId, Keyed, PopulationRefusal, ACT_NEVER};

use crate::error::PopulationError;

/// Hard upper bound on household membership.
pub const HOUSEHOLD_MAX_MEMBERS: usize = 32;

/// One household.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Household {
    /// Unique id; the registry's natural key.
    pub household_id: HouseholdId,
    /// The residence the household occupies (`0` = none).
    pub residence_ref: u64,
    /// The shared resource pool (`0` = none).
    pub resource_pool_ref: u64,
    /// Member person ids, strictly ascending, at most
    /// [`HOUSEHOLD_MAX_MEMBERS`].
    pub members: Vec<u64>,
    /// When the household next ticks; `ACT_NEVER` parks it.
    pub next_due_tick: ActTime,
}

impl Keyed for Household {
    fn key(&self) -> u64 {
        self.household_id.raw()
    }
}

impl Household {
    /// Whether a person belongs to the household.
    pub fn has_member(&self, person_id: u64) -> bool {
        self.members.binary_search(&person_id).is_ok()
    }

    /// Number of members.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

/// Bounded registry of households ordered ascending by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseholdRegistry {
    households: BoundedRegistry<Household>,
}

impl HouseholdRegistry {
    /// Create an empty registry.
    pub fn new(capacity: usize) -> Self {
        Self {
            households: BoundedRegistry::new(capacity),
        }
    }

    /// Number of households.
    pub fn len(&self) -> usize {
        self.households.len()
    }

    /// Whether no households are registered.
    pub fn is_empty(&self) -> bool {
        self.households.is_empty()
    }

    /// Register an empty household.
    pub fn register(
        &mut self,
        household_id: HouseholdId,
        residence_ref: u64,
        resource_pool_ref: u64,
    ) -> Result<(), PopulationError> {
        self.households.insert(Household {
            household_id,
            residence_ref,
            resource_pool_ref,
            members: Vec::with_capacity(HOUSEHOLD_MAX_MEMBERS),
            next_due_tick: ACT_NEVER,
        })?;
        Ok(())
    }

    /// Look up a household by id.
    pub fn find(&self, household_id: HouseholdId) -> Option<&Household> {
        self.households.find(household_id.raw())
    }

    /// Add a member in sorted position.
    ///
    /// Adding an existing member is a no-op; exceeding the membership
    /// bound refuses `HouseholdTooLarge` without mutating.
    pub fn add_member(
        &mut self,
        household_id: HouseholdId,
        person_id: u64,
    ) -> Result<(), PopulationRefusal> {
        let Some(household) = self.households.find_mut(household_id.raw()) else {
            return Err(PopulationRefusal::CohortNotFound);
        };
        match household.members.binary_search(&person_id) {
            Ok(_) => Ok(()),
            Err(idx) => {
                if household.members.len() >= HOUSEHOLD_MAX_MEMBERS {
                    return Err(PopulationRefusal::HouseholdTooLarge);
                }
                household.members.insert(idx, person_id);
                Ok(())
            }
        }
    }

    /// Remove a member. Removing an absent member is a no-op.
    pub fn remove_member(
        &mut self,
        household_id: HouseholdId,
        person_id: u64,
    ) -> Result<(), PopulationRefusal> {
        let Some(household) = self.households.find_mut(household_id.raw()) else {
            return Err(PopulationRefusal::CohortNotFound);
        };
        if let Ok(idx) = household.members.binary_search(&person_id) {
            household.members.remove(idx);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn members_stay_sorted() {
        let mut reg = HouseholdRegistry::new(2);
        reg.register(HouseholdId::new(100), 200, 300).unwrap();
        for person in [1005u64, 1001, 1003] {
            reg.add_member(HouseholdId::new(100), person).unwrap();
        }
        let household = reg.find(HouseholdId::new(100)).unwrap();
        assert_eq!(household.members, vec![1001, 1003, 1005]);
        assert!(household.has_member(1003));
        assert!(!household.has_member(1002));
    }

    #[test]
    fn membership_is_bounded() {
        let mut reg = HouseholdRegistry::new(2);
        reg.register(HouseholdId::new(100), 200, 300).unwrap();
        for person in 0..HOUSEHOLD_MAX_MEMBERS as u64 {
            reg.add_member(HouseholdId::new(100), 1000 + person).unwrap();
        }
        let err = reg.add_member(HouseholdId::new(100), 9999).unwrap_err();
        assert_eq!(err, PopulationRefusal::HouseholdTooLarge);
        let household = reg.find(HouseholdId::new(100)).unwrap();
        assert_eq!(household.member_count(), HOUSEHOLD_MAX_MEMBERS);
        assert!(!household.has_member(9999));
    }

    #[test]
    fn duplicate_add_is_noop() {
        let mut reg = HouseholdRegistry::new(2);
        reg.register(HouseholdId::new(100), 0, 0).unwrap();
        reg.add_member(HouseholdId::new(100), 7).unwrap();
        reg.add_member(HouseholdId::new(100), 7).unwrap();
        assert_eq!(reg.find(HouseholdId::new(100)).unwrap().member_count(), 1);
    }

    #[test]
    fn remove_member_keeps_order() {
        let mut reg = HouseholdRegistry::new(2);
        reg.register(HouseholdId::new(100), 0, 0).unwrap();
        for person in [3u64, 1, 2] {
            reg.add_member(HouseholdId::new(100), person).unwrap();
        }
        reg.remove_member(HouseholdId::new(100), 2).unwrap();
        assert_eq!(reg.find(HouseholdId::new(100)).unwrap().members, vec![1, 3]);
        // Absent member: no-op.
        reg.remove_member(HouseholdId::new(100), 99).unwrap();
    }
}
