//! Population cohorts.
//!
//! A cohort is the bucketed population of one `(body, region,
//! organization)` key. Its id is a deterministic mix of the key fields,
//! so two simulations registering the same keys -- in any order -- hold
//! identical registries. Every count change routes through the
//! demographics bucket arithmetic and folds a provenance value into the
//! cohort's summary hash.

use serde::{Deserialize, Serialize};

use polity_types::{
    mix64, ActTime, BoundedRegistry, CohortId, Keyed, PopulationRefusal, ACT_NEVER,
};

use crate::demographics;
use crate::error::PopulationError;

/// Age buckets per cohort.
pub const AGE_BUCKETS: usize = 8;

/// Sex buckets per cohort.
pub const SEX_BUCKETS: usize = 3;

/// Index of the "unknown" sex bucket, where unattributed additions
/// land.
pub const SEX_UNKNOWN_INDEX: usize = 2;

/// Health buckets per cohort.
pub const HEALTH_BUCKETS: usize = 4;

/// Index of the default health bucket, where unattributed additions
/// land.
pub const HEALTH_DEFAULT_INDEX: usize = 0;

/// The identity of a cohort: where it lives and to whom it belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CohortKey {
    /// The body (world) the cohort inhabits.
    pub body_id: u64,
    /// The region within the body.
    pub region_id: u64,
    /// The organization the cohort belongs to (`0` = none).
    pub org_id: u64,
}

/// Derive the deterministic cohort id from a key. A zero mix result is
/// remapped to 1 so it never collides with "absent".
pub const fn cohort_id_from_key(key: &CohortKey) -> CohortId {
    let mut hash = 0xC0D1_C0D1u64;
    hash = mix64(hash, key.body_id);
    hash = mix64(hash, key.region_id);
    hash = mix64(hash, key.org_id);
    if hash == 0 {
        hash = 1;
    }
    CohortId::new(hash)
}

/// One cohort's bucketed state.
///
/// Invariant: the sums of `age_buckets`, `sex_buckets`, and
/// `health_buckets` each equal `count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cohort {
    /// Unique id derived from the key; the registry's natural key.
    pub cohort_id: CohortId,
    /// The cohort's identity.
    pub key: CohortKey,
    /// Total population.
    pub count: u32,
    /// Population by age band.
    pub age_buckets: [u32; AGE_BUCKETS],
    /// Population by sex.
    pub sex_buckets: [u32; SEX_BUCKETS],
    /// Population by health band.
    pub health_buckets: [u32; HEALTH_BUCKETS],
    /// External needs-state reference (`0` = none).
    pub needs_state_ref: u64,
    /// When the cohort next ticks; `ACT_NEVER` parks it.
    pub next_due_tick: ActTime,
    /// Running hash of every delta's provenance.
    pub provenance_summary_hash: u64,
}

impl Keyed for Cohort {
    fn key(&self) -> u64 {
        self.cohort_id.raw()
    }
}

/// Bounded registry of cohorts ordered ascending by cohort id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortRegistry {
    cohorts: BoundedRegistry<Cohort>,
}

impl CohortRegistry {
    /// Create an empty registry.
    pub fn new(capacity: usize) -> Self {
        Self {
            cohorts: BoundedRegistry::new(capacity),
        }
    }

    /// Number of cohorts.
    pub fn len(&self) -> usize {
        self.cohorts.len()
    }

    /// Whether no cohorts are registered.
    pub fn is_empty(&self) -> bool {
        self.cohorts.is_empty()
    }

    /// The cohorts in ascending id order.
    pub fn cohorts(&self) -> &[Cohort] {
        self.cohorts.entries()
    }

    /// Register a cohort for a key with an initial count.
    ///
    /// Buckets initialize to the default distribution (everyone in age
    /// band 0, sex unknown, default health); the provenance hash seeds
    /// from the id and count. The cohort starts parked at `ACT_NEVER`.
    pub fn register(
        &mut self,
        key: &CohortKey,
        count: u32,
        needs_state_ref: u64,
    ) -> Result<CohortId, PopulationError> {
        let cohort_id = cohort_id_from_key(key);
        let mut cohort = Cohort {
            cohort_id,
            key: *key,
            count,
            age_buckets: [0; AGE_BUCKETS],
            sex_buckets: [0; SEX_BUCKETS],
            health_buckets: [0; HEALTH_BUCKETS],
            needs_state_ref,
            next_due_tick: ACT_NEVER,
            provenance_summary_hash: mix64(cohort_id.raw(), u64::from(count)),
        };
        demographics::init_buckets(&mut cohort);
        self.cohorts.insert(cohort)?;
        Ok(cohort_id)
    }

    /// Look up a cohort by id.
    pub fn find(&self, cohort_id: CohortId) -> Option<&Cohort> {
        self.cohorts.find(cohort_id.raw())
    }

    /// Look up a cohort mutably by id.
    pub fn find_mut(&mut self, cohort_id: CohortId) -> Option<&mut Cohort> {
        self.cohorts.find_mut(cohort_id.raw())
    }

    /// Look up a cohort by key.
    pub fn find_by_key(&self, key: &CohortKey) -> Option<&Cohort> {
        self.find(cohort_id_from_key(key))
    }

    /// Adjust a cohort's count through the bucket arithmetic, using the
    /// cohort id as the provenance mix. A cohort that empties parks at
    /// `ACT_NEVER`. Returns the new count.
    pub fn adjust_count(
        &mut self,
        cohort_id: CohortId,
        delta: i32,
    ) -> Result<u32, PopulationRefusal> {
        let Some(cohort) = self.find_mut(cohort_id) else {
            return Err(PopulationRefusal::CohortNotFound);
        };
        demographics::apply_delta(cohort, delta, cohort_id.raw())?;
        if cohort.count == 0 {
            cohort.next_due_tick = ACT_NEVER;
        }
        Ok(cohort.count)
    }

    /// Re-arm a cohort's next due tick.
    pub fn set_next_due(
        &mut self,
        cohort_id: CohortId,
        next_due_tick: ActTime,
    ) -> Result<(), PopulationRefusal> {
        let Some(cohort) = self.find_mut(cohort_id) else {
            return Err(PopulationRefusal::CohortNotFound);
        };
        cohort.next_due_tick = next_due_tick;
        Ok(())
    }

    /// Fold a provenance value into a cohort's summary hash.
    pub fn mix_provenance(
        &mut self,
        cohort_id: CohortId,
        provenance_mix: u64,
    ) -> Result<(), PopulationRefusal> {
        let Some(cohort) = self.find_mut(cohort_id) else {
            return Err(PopulationRefusal::CohortNotFound);
        };
        cohort.provenance_summary_hash = mix64(cohort.provenance_summary_hash, provenance_mix);
        Ok(())
    }
}
