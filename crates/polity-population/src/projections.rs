//! Epistemic population projections.
//!
//! What an observer *believes* a cohort's size to be: a known min/max
//! range reported at some act. Unreported cohorts read as unknown. This
//! is the population counterpart of subjective beliefs -- consumers of
//! projections never see ground-truth counts.

use serde::{Deserialize, Serialize};

use polity_types::{ActTime, BoundedRegistry, CohortId, Keyed, ACT_NEVER};

use crate::error::PopulationError;

/// One cohort-size belief.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    /// The cohort the projection is about; the registry's natural key.
    pub cohort_id: CohortId,
    /// Believed minimum size.
    pub known_min: u32,
    /// Believed maximum size (at least `known_min`).
    pub known_max: u32,
    /// When the range was reported.
    pub report_tick: ActTime,
    /// Whether anything has been reported at all.
    pub is_known: bool,
}

impl Keyed for Projection {
    fn key(&self) -> u64 {
        self.cohort_id.raw()
    }
}

impl Projection {
    /// The unknown view for a cohort.
    pub const fn unknown(cohort_id: CohortId) -> Self {
        Self {
            cohort_id,
            known_min: 0,
            known_max: 0,
            report_tick: ACT_NEVER,
            is_known: false,
        }
    }
}

/// Bounded registry of projections ordered ascending by cohort id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionRegistry {
    projections: BoundedRegistry<Projection>,
}

impl ProjectionRegistry {
    /// Create an empty registry.
    pub fn new(capacity: usize) -> Self {
        Self {
            projections: BoundedRegistry::new(capacity),
        }
    }

    /// Number of reported projections.
    pub fn len(&self) -> usize {
        self.projections.len()
    }

    /// Whether nothing has been reported.
    pub fn is_empty(&self) -> bool {
        self.projections.is_empty()
    }

    /// Report a range for a cohort, replacing any earlier report. The
    /// maximum clamps up to the minimum.
    pub fn report(
        &mut self,
        cohort_id: CohortId,
        known_min: u32,
        known_max: u32,
        report_tick: ActTime,
    ) -> Result<(), PopulationError> {
        let projection = Projection {
            cohort_id,
            known_min,
            known_max: known_max.max(known_min),
            report_tick,
            is_known: true,
        };
        if let Some(existing) = self.projections.find_mut(cohort_id.raw()) {
            *existing = projection;
            return Ok(());
        }
        self.projections.insert(projection)?;
        Ok(())
    }

    /// The current view for a cohort; unreported cohorts read as
    /// unknown.
    pub fn get(&self, cohort_id: CohortId) -> Projection {
        self.projections
            .find(cohort_id.raw())
            .copied()
            .unwrap_or(Projection::unknown(cohort_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unreported_reads_unknown() {
        let reg = ProjectionRegistry::new(4);
        let view = reg.get(CohortId::new(42));
        assert!(!view.is_known);
        assert_eq!(view.report_tick, ACT_NEVER);
    }

    #[test]
    fn report_then_read() {
        let mut reg = ProjectionRegistry::new(4);
        reg.report(CohortId::new(42), 10, 12, 5).unwrap();
        let view = reg.get(CohortId::new(42));
        assert!(view.is_known);
        assert_eq!(view.known_min, 10);
        assert_eq!(view.known_max, 12);
        assert_eq!(view.report_tick, 5);
    }

    #[test]
    fn max_clamps_up_to_min() {
        let mut reg = ProjectionRegistry::new(4);
        reg.report(CohortId::new(42), 10, 3, 5).unwrap();
        let view = reg.get(CohortId::new(42));
        assert_eq!(view.known_max, 10);
    }

    #[test]
    fn re_report_replaces() {
        let mut reg = ProjectionRegistry::new(4);
        reg.report(CohortId::new(42), 10, 12, 5).unwrap();
        reg.report(CohortId::new(42), 1, 2, 9).unwrap();
        let view = reg.get(CohortId::new(42));
        assert_eq!((view.known_min, view.known_max, view.report_tick), (1, 2, 9));
        assert_eq!(reg.len(), 1);
    }
}
