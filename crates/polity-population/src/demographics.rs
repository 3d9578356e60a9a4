//! Cohort bucket arithmetic.
//!
//! Every count change preserves the bucket invariant: the sums of the
//! age, sex, and health bucket arrays each equal the cohort count.
//! Additions land in the default buckets (age band 0, sex unknown,
//! default health); removals drain from the highest bucket index
//! downward, capped by the count. Each delta folds its provenance into
//! the cohort's summary hash so divergent histories are detectable.

use polity_types::PopulationRefusal;

use crate::cohort::{Cohort, HEALTH_DEFAULT_INDEX, SEX_UNKNOWN_INDEX};

/// Reset a cohort's buckets to the default distribution for its count.
pub fn init_buckets(cohort: &mut Cohort) {
    cohort.age_buckets = [0; crate::cohort::AGE_BUCKETS];
    cohort.sex_buckets = [0; crate::cohort::SEX_BUCKETS];
    cohort.health_buckets = [0; crate::cohort::HEALTH_BUCKETS];
    if cohort.count > 0 {
        if let Some(slot) = cohort.age_buckets.first_mut() {
            *slot = cohort.count;
        }
        if let Some(slot) = cohort.sex_buckets.get_mut(SEX_UNKNOWN_INDEX) {
            *slot = cohort.count;
        }
        if let Some(slot) = cohort.health_buckets.get_mut(HEALTH_DEFAULT_INDEX) {
            *slot = cohort.count;
        }
    }
}

/// Check the bucket invariant.
pub fn validate(cohort: &Cohort) -> Result<(), PopulationRefusal> {
    let age: u64 = cohort.age_buckets.iter().map(|&b| u64::from(b)).sum();
    let sex: u64 = cohort.sex_buckets.iter().map(|&b| u64::from(b)).sum();
    let health: u64 = cohort.health_buckets.iter().map(|&b| u64::from(b)).sum();
    let count = u64::from(cohort.count);
    if age != count || sex != count || health != count {
        return Err(PopulationRefusal::InvalidBucketDistribution);
    }
    Ok(())
}

/// Apply a signed count delta, preserving the bucket invariant and
/// folding `provenance_mix` into the summary hash.
///
/// Positive deltas land in the default buckets; negative deltas drain
/// from the bucket tails, capped by the current count.
pub fn apply_delta(
    cohort: &mut Cohort,
    delta: i32,
    provenance_mix: u64,
) -> Result<(), PopulationRefusal> {
    if delta == 0 {
        return Ok(());
    }
    if delta > 0 {
        let add = delta.unsigned_abs();
        cohort.count = cohort.count.saturating_add(add);
        if let Some(slot) = cohort.age_buckets.first_mut() {
            *slot = slot.saturating_add(add);
        }
        if let Some(slot) = cohort.sex_buckets.get_mut(SEX_UNKNOWN_INDEX) {
            *slot = slot.saturating_add(add);
        }
        if let Some(slot) = cohort.health_buckets.get_mut(HEALTH_DEFAULT_INDEX) {
            *slot = slot.saturating_add(add);
        }
    } else {
        let remove = delta.unsigned_abs().min(cohort.count);
        remove_from_tail(&mut cohort.age_buckets, remove);
        remove_from_tail(&mut cohort.sex_buckets, remove);
        remove_from_tail(&mut cohort.health_buckets, remove);
        cohort.count -= remove;
    }
    cohort.provenance_summary_hash ^= provenance_mix;
    Ok(())
}

/// Drain `remove` people from the highest bucket index downward.
fn remove_from_tail(buckets: &mut [u32], mut remove: u32) {
    for bucket in buckets.iter_mut().rev() {
        if remove == 0 {
            return;
        }
        let take = (*bucket).min(remove);
        *bucket -= take;
        remove -= take;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use polity_types::ACT_NEVER;

    use crate::cohort::{CohortKey, AGE_BUCKETS, HEALTH_BUCKETS, SEX_BUCKETS};

    use super::*;

    fn cohort(count: u32) -> Cohort {
        let mut cohort = Cohort {
            cohort_id: polity_types::CohortId::new(1),
            key: CohortKey::default(),
            count,
            age_buckets: [0; AGE_BUCKETS],
            sex_buckets: [0; SEX_BUCKETS],
            health_buckets: [0; HEALTH_BUCKETS],
            needs_state_ref: 0,
            next_due_tick: ACT_NEVER,
            provenance_summary_hash: 0,
        };
        init_buckets(&mut cohort);
        cohort
    }

    #[test]
    fn deltas_preserve_the_invariant() {
        let mut c = cohort(10);
        apply_delta(&mut c, 7, 1).unwrap();
        validate(&c).unwrap();
        assert_eq!(c.count, 17);
        apply_delta(&mut c, -5, 2).unwrap();
        validate(&c).unwrap();
        assert_eq!(c.count, 12);
    }

    #[test]
    fn removal_drains_tails_first() {
        let mut c = cohort(0);
        c.age_buckets = [1, 1, 1, 1, 1, 1, 1, 3];
        c.sex_buckets = [4, 4, 2];
        c.health_buckets = [7, 1, 1, 1];
        c.count = 10;
        validate(&c).unwrap();
        apply_delta(&mut c, -4, 1).unwrap();
        assert_eq!(c.age_buckets, [1, 1, 1, 1, 1, 1, 0, 0]);
        assert_eq!(c.sex_buckets, [4, 2, 0]);
        assert_eq!(c.health_buckets, [6, 0, 0, 0]);
        validate(&c).unwrap();
    }

    #[test]
    fn removal_caps_at_count() {
        let mut c = cohort(3);
        apply_delta(&mut c, -100, 1).unwrap();
        assert_eq!(c.count, 0);
        validate(&c).unwrap();
    }

    #[test]
    fn provenance_mix_is_xor() {
        let mut c = cohort(1);
        let before = c.provenance_summary_hash;
        apply_delta(&mut c, 1, 0xAB).unwrap();
        assert_eq!(c.provenance_summary_hash, before ^ 0xAB);
        // Mixing the same value twice cancels, by XOR's nature.
        apply_delta(&mut c, 1, 0xAB).unwrap();
        assert_eq!(c.provenance_summary_hash, before);
    }

    #[test]
    fn zero_delta_is_a_noop() {
        let mut c = cohort(5);
        let snapshot = c;
        apply_delta(&mut c, 0, 0xFF).unwrap();
        assert_eq!(c, snapshot);
    }

    #[test]
    fn validate_catches_divergence() {
        let mut c = cohort(5);
        c.age_buckets[0] = 4;
        assert_eq!(
            validate(&c).unwrap_err(),
            PopulationRefusal::InvalidBucketDistribution
        );
    }
}
