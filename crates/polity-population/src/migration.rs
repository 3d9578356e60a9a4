//! Migration flows.
//!
//! A migration moves people from a source cohort to a destination
//! cohort at an arrival act. Flow ids are either caller-supplied or
//! hashed deterministically from the flow's inputs, so two simulations
//! scheduling the same migrations hold identical registries. Application
//! is all-or-nothing: an overdraw refuses and leaves both cohorts
//! untouched.

use serde::{Deserialize, Serialize};

use polity_types::{
    mix64, ActTime, BoundedRegistry, CohortId, FlowId, Keyed, MigrationStatus, PopulationRefusal,
};

use crate::cohort::{cohort_id_from_key, CohortKey, CohortRegistry};
use crate::demographics;
use crate::error::PopulationError;

/// Scheduling parameters for a migration flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MigrationInput {
    /// Explicit flow id, or `NONE` to derive one from the inputs.
    pub flow_id: FlowId,
    /// Where the people leave from.
    pub src_key: CohortKey,
    /// Where they arrive.
    pub dst_key: CohortKey,
    /// How many people move.
    pub count_delta: u32,
    /// When the flow departs.
    pub start_act: ActTime,
    /// When the flow arrives and applies.
    pub arrival_act: ActTime,
    /// Content-defined cause discriminator.
    pub cause_code: u32,
    /// Provenance folded into both cohorts on application
    /// (`0` = the flow id).
    pub provenance_mix: u64,
}

/// One scheduled migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationFlow {
    /// Unique id; the registry's natural key.
    pub flow_id: FlowId,
    /// Where the people leave from.
    pub src_key: CohortKey,
    /// Where they arrive.
    pub dst_key: CohortKey,
    /// The source cohort (derived from the key).
    pub src_cohort_id: CohortId,
    /// The destination cohort (derived from the key).
    pub dst_cohort_id: CohortId,
    /// How many people move.
    pub count_delta: u32,
    /// When the flow departs.
    pub start_act: ActTime,
    /// When the flow arrives; `ACT_NEVER` once applied.
    pub arrival_act: ActTime,
    /// Content-defined cause discriminator.
    pub cause_code: u32,
    /// Provenance folded into both cohorts on application.
    pub provenance_mix: u64,
    /// Lifecycle status.
    pub status: MigrationStatus,
}

impl Keyed for MigrationFlow {
    fn key(&self) -> u64 {
        self.flow_id.raw()
    }
}

/// Bounded registry of migration flows ordered ascending by flow id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationRegistry {
    flows: BoundedRegistry<MigrationFlow>,
    next_flow_id: u64,
}

impl MigrationRegistry {
    /// Create an empty registry. A `start_flow_id` of zero begins
    /// derived-id seeding at 1.
    pub fn new(capacity: usize, start_flow_id: u64) -> Self {
        Self {
            flows: BoundedRegistry::new(capacity),
            next_flow_id: if start_flow_id == 0 { 1 } else { start_flow_id },
        }
    }

    /// Number of flows (completed included).
    pub fn len(&self) -> usize {
        self.flows.len()
    }

    /// Whether no flows are registered.
    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// The flows in ascending id order.
    pub fn flows(&self) -> &[MigrationFlow] {
        self.flows.entries()
    }

    /// Schedule a flow as active. Returns the (possibly derived) flow
    /// id.
    pub fn schedule(&mut self, input: &MigrationInput) -> Result<FlowId, PopulationError> {
        let flow_id = if input.flow_id.is_some() {
            input.flow_id
        } else {
            let seed = self.next_flow_id;
            self.next_flow_id = self.next_flow_id.wrapping_add(1);
            flow_id_from_input(input, seed)
        };
        self.flows.insert(MigrationFlow {
            flow_id,
            src_key: input.src_key,
            dst_key: input.dst_key,
            src_cohort_id: cohort_id_from_key(&input.src_key),
            dst_cohort_id: cohort_id_from_key(&input.dst_key),
            count_delta: input.count_delta,
            start_act: input.start_act,
            arrival_act: input.arrival_act,
            cause_code: input.cause_code,
            provenance_mix: if input.provenance_mix == 0 {
                flow_id.raw()
            } else {
                input.provenance_mix
            },
            status: MigrationStatus::Active,
        })?;
        Ok(flow_id)
    }

    /// Look up a flow by id.
    pub fn find(&self, flow_id: FlowId) -> Option<&MigrationFlow> {
        self.flows.find(flow_id.raw())
    }

    /// Look up a flow mutably by id.
    pub fn find_mut(&mut self, flow_id: FlowId) -> Option<&mut MigrationFlow> {
        self.flows.find_mut(flow_id.raw())
    }
}

/// Fold a value into a running flow-id hash without the golden-ratio
/// constant. The scalar flow fields fold this way; only the key fields
/// take the full [`mix64`].
const fn fold64(hash: u64, value: u64) -> u64 {
    hash ^ value.wrapping_add(hash << 6).wrapping_add(hash >> 2)
}

/// Derive a deterministic flow id from the input fields and a seed.
///
/// The six cohort-key fields mix with the golden-ratio constant; the
/// count, arrival act, and cause code fold plainly. A zero result is
/// remapped to 1.
const fn flow_id_from_input(input: &MigrationInput, seed: u64) -> FlowId {
    let mut hash = if seed == 0 { 0x9e37_79b9 } else { seed };
    hash = mix64(hash, input.src_key.body_id);
    hash = mix64(hash, input.src_key.region_id);
    hash = mix64(hash, input.src_key.org_id);
    hash = mix64(hash, input.dst_key.body_id);
    hash = mix64(hash, input.dst_key.region_id);
    hash = mix64(hash, input.dst_key.org_id);
    hash = fold64(hash, input.count_delta as u64);
    hash = fold64(hash, input.arrival_act);
    hash = fold64(hash, input.cause_code as u64);
    if hash == 0 {
        hash = 1;
    }
    FlowId::new(hash)
}

/// Apply a flow to its cohorts: subtract at the source, add at the
/// destination, mark the flow completed.
///
/// A non-active flow is a no-op. Missing cohorts refuse
/// `CohortNotFound`; an overdraw refuses
/// `MigrationInsufficientResources` with both cohorts untouched.
pub fn apply_migration(
    flow: &mut MigrationFlow,
    cohorts: &mut CohortRegistry,
) -> Result<(), PopulationRefusal> {
    if flow.status != MigrationStatus::Active {
        return Ok(());
    }
    let src_count = match cohorts.find(flow.src_cohort_id) {
        Some(src) => src.count,
        None => return Err(PopulationRefusal::CohortNotFound),
    };
    if cohorts.find(flow.dst_cohort_id).is_none() {
        return Err(PopulationRefusal::CohortNotFound);
    }
    if flow.count_delta > src_count {
        return Err(PopulationRefusal::MigrationInsufficientResources);
    }
    let delta = i32::try_from(flow.count_delta).unwrap_or(i32::MAX);
    if let Some(src) = cohorts.find_mut(flow.src_cohort_id) {
        demographics::apply_delta(src, -delta, flow.provenance_mix)?;
    }
    if let Some(dst) = cohorts.find_mut(flow.dst_cohort_id) {
        demographics::apply_delta(dst, delta, flow.provenance_mix)?;
    }
    flow.status = MigrationStatus::Completed;
    Ok(())
}
