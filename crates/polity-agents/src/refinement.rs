//! Refinement and collapse events.
//!
//! Refinement turns an aggregate into explicit representative
//! individuals; collapse discards them again. Selection and value
//! spreading are pure functions of the candidate set and the aggregate
//! summary -- no randomness, no input-order dependence -- so any two
//! runs refine the same cohort into the same individuals.

use serde::{Deserialize, Serialize};

use polity_types::{ActTime, AgentId, AggregateId, EventId, Refusal, ACT_NEVER};

use crate::aggregate::{AggregateRegistry, BeliefSummary};
use crate::belief::BeliefState;

// ---------------------------------------------------------------------------
// Representative selection
// ---------------------------------------------------------------------------

/// A cohort member eligible to become a representative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefineCandidate {
    /// The member's agent id.
    pub agent_id: AgentId,
    /// Social standing; higher ranks are selected first.
    pub role_rank: u32,
}

/// Select up to `max_select` representatives.
///
/// Ordering is `(role_rank desc, agent_id asc)`; duplicate agent ids
/// collapse to one selection. The input order has no effect on the
/// result.
pub fn select_representatives(
    candidates: &[RefineCandidate],
    max_select: usize,
) -> Vec<AgentId> {
    if max_select == 0 {
        return Vec::new();
    }
    let mut sorted: Vec<RefineCandidate> = candidates.to_vec();
    sorted.sort_by(|a, b| {
        b.role_rank
            .cmp(&a.role_rank)
            .then_with(|| a.agent_id.cmp(&b.agent_id))
    });
    let mut selected = Vec::with_capacity(max_select.min(sorted.len()));
    for candidate in sorted {
        if selected.contains(&candidate.agent_id) {
            continue;
        }
        selected.push(candidate.agent_id);
        if selected.len() >= max_select {
            break;
        }
    }
    selected
}

/// Spread a summary range across an agent id: `min + id % (span + 1)`.
///
/// Deterministic and biased toward the low end of the range; the bias is
/// acceptable because it reproduces.
const fn spread_value(agent_id: AgentId, min_value: u32, max_value: u32) -> u32 {
    if max_value <= min_value {
        return min_value;
    }
    let span = max_value - min_value;
    min_value + (agent_id.raw() % (span as u64 + 1)) as u32
}

/// Refine an aggregate summary into explicit individual belief states.
///
/// Representatives are selected by rank, then each receives the
/// summary's union knowledge mask and spread hunger/threat values.
/// Refuses `AgentStateInconsistent` when representatives are desired but
/// no candidates exist, and `RefinementLimitReached` when fewer
/// candidates than desired are available.
pub fn refine_to_states(
    summary: &BeliefSummary,
    candidates: &[RefineCandidate],
    desired_count: u32,
    now_act: ActTime,
) -> Result<Vec<BeliefState>, Refusal> {
    if desired_count == 0 {
        return Ok(Vec::new());
    }
    if candidates.is_empty() {
        return Err(Refusal::AgentStateInconsistent);
    }
    let desired = usize::try_from(desired_count).unwrap_or(usize::MAX);
    let selected = select_representatives(candidates, desired);
    if selected.len() < desired {
        return Err(Refusal::RefinementLimitReached);
    }
    let states = selected
        .into_iter()
        .map(|agent_id| {
            BeliefState::new(
                agent_id,
                summary.knowledge_any_mask,
                spread_value(agent_id, summary.hunger_min, summary.hunger_max),
                spread_value(agent_id, summary.threat_min, summary.threat_max),
                now_act,
            )
        })
        .collect();
    Ok(states)
}

// ---------------------------------------------------------------------------
// Refinement events
// ---------------------------------------------------------------------------

/// What a refinement event does to its aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefinementEventKind {
    /// Set the refined count to `desired_count`.
    Refine {
        /// Representatives to refine out.
        desired_count: u32,
    },
    /// Discard representatives and wake the aggregate.
    Collapse,
}

/// A scheduled refinement or collapse. A `trigger_act` of `ACT_NEVER`
/// marks the slot consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementEvent {
    /// Unique event id; the tie-break within one act.
    pub event_id: EventId,
    /// The aggregate the event applies to.
    pub aggregate_agent_id: AggregateId,
    /// When the event fires; `ACT_NEVER` once consumed.
    pub trigger_act: ActTime,
    /// What the event does.
    pub kind: RefinementEventKind,
}

/// Process all refinement events due at or before `target_tick`.
///
/// Events fire in `(trigger_act, event_id)` order regardless of their
/// position in the slice; each fired event is consumed by parking its
/// trigger at `ACT_NEVER`. Advancing stepwise over several calls or in
/// one batch call yields the same final state.
pub fn process_refinement_events(
    aggregates: &mut AggregateRegistry,
    events: &mut [RefinementEvent],
    target_tick: ActTime,
) -> Result<(), Refusal> {
    loop {
        let mut next: Option<usize> = None;
        for (idx, event) in events.iter().enumerate() {
            if event.trigger_act == ACT_NEVER || event.trigger_act > target_tick {
                continue;
            }
            let earlier = match next.and_then(|n| events.get(n)) {
                None => true,
                Some(best) => {
                    event.trigger_act < best.trigger_act
                        || (event.trigger_act == best.trigger_act
                            && event.event_id < best.event_id)
                }
            };
            if earlier {
                next = Some(idx);
            }
        }
        let Some(idx) = next else {
            return Ok(());
        };
        let Some(event) = events.get_mut(idx) else {
            return Ok(());
        };
        let aggregate = aggregates
            .find_mut(event.aggregate_agent_id)
            .ok_or(Refusal::AgentStateInconsistent)?;
        match event.kind {
            RefinementEventKind::Refine { desired_count } => {
                aggregate.refine(desired_count)?;
            }
            RefinementEventKind::Collapse => {
                aggregate.collapse(event.trigger_act);
            }
        }
        event.trigger_act = ACT_NEVER;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use polity_types::{DoctrineId, ProvenanceId, KNOW_RESOURCE, KNOW_THREAT};

    use super::*;

    fn candidate(agent: u64, rank: u32) -> RefineCandidate {
        RefineCandidate {
            agent_id: AgentId::new(agent),
            role_rank: rank,
        }
    }

    #[test]
    fn selection_orders_by_rank_then_id() {
        let a = [candidate(5, 3), candidate(7, 9), candidate(10, 3), candidate(12, 1)];
        let b = [candidate(12, 1), candidate(10, 3), candidate(7, 9), candidate(5, 3)];
        let selected_a = select_representatives(&a, 3);
        let selected_b = select_representatives(&b, 3);
        assert_eq!(
            selected_a,
            vec![AgentId::new(7), AgentId::new(5), AgentId::new(10)]
        );
        assert_eq!(selected_a, selected_b);
    }

    #[test]
    fn selection_caps_at_max() {
        let candidates = [candidate(1, 1), candidate(2, 2)];
        assert_eq!(select_representatives(&candidates, 1).len(), 1);
        assert!(select_representatives(&candidates, 0).is_empty());
    }

    #[test]
    fn spread_is_deterministic_within_range() {
        let summary = BeliefSummary {
            count: 2,
            knowledge_any_mask: KNOW_RESOURCE | KNOW_THREAT,
            hunger_min: 100,
            hunger_max: 109,
            threat_min: 50,
            threat_max: 50,
            ..BeliefSummary::default()
        };
        let candidates = [candidate(23, 1), candidate(24, 1)];
        let states = refine_to_states(&summary, &candidates, 2, 7).unwrap();
        for state in &states {
            assert!((100..=109).contains(&state.hunger_level));
            assert_eq!(state.threat_level, 50);
            assert_eq!(state.knowledge_mask, KNOW_RESOURCE | KNOW_THREAT);
            assert_eq!(state.last_update_act, 7);
        }
        // id 23: 100 + 23 % 10 = 103; id 24: 104.
        assert_eq!(states.first().unwrap().hunger_level, 103);
        assert_eq!(states.get(1).unwrap().hunger_level, 104);
    }

    #[test]
    fn refinement_needs_enough_candidates() {
        let summary = BeliefSummary::default();
        assert_eq!(
            refine_to_states(&summary, &[], 1, 0).unwrap_err(),
            Refusal::AgentStateInconsistent
        );
        let candidates = [candidate(1, 1)];
        assert_eq!(
            refine_to_states(&summary, &candidates, 2, 0).unwrap_err(),
            Refusal::RefinementLimitReached
        );
        assert!(refine_to_states(&summary, &candidates, 0, 0).unwrap().is_empty());
    }

    fn registry_with_one(cohort_count: u32) -> (AggregateRegistry, AggregateId) {
        let mut reg = AggregateRegistry::new(2, 1);
        let id = reg
            .register(
                AggregateId::new(1),
                99,
                DoctrineId::NONE,
                cohort_count,
                ProvenanceId::new(1),
            )
            .unwrap();
        (reg, id)
    }

    #[test]
    fn batch_and_stepwise_event_processing_agree() {
        let (mut step_reg, id) = registry_with_one(5);
        let (mut batch_reg, _) = registry_with_one(5);
        let make_events = || {
            [
                RefinementEvent {
                    event_id: EventId::new(1),
                    aggregate_agent_id: id,
                    trigger_act: 5,
                    kind: RefinementEventKind::Refine { desired_count: 3 },
                },
                RefinementEvent {
                    event_id: EventId::new(2),
                    aggregate_agent_id: id,
                    trigger_act: 10,
                    kind: RefinementEventKind::Collapse,
                },
            ]
        };
        let mut step_events = make_events();
        process_refinement_events(&mut step_reg, &mut step_events, 5).unwrap();
        assert_eq!(step_reg.find(id).unwrap().refined_count, 3);
        process_refinement_events(&mut step_reg, &mut step_events, 10).unwrap();

        let mut batch_events = make_events();
        process_refinement_events(&mut batch_reg, &mut batch_events, 10).unwrap();

        assert_eq!(
            step_reg.find(id).unwrap().refined_count,
            batch_reg.find(id).unwrap().refined_count
        );
        assert_eq!(step_reg.find(id).unwrap().refined_count, 0);
        assert!(step_events.iter().all(|e| e.trigger_act == ACT_NEVER));
    }

    #[test]
    fn over_refinement_refuses_and_leaves_count() {
        let (mut reg, id) = registry_with_one(2);
        let mut events = [RefinementEvent {
            event_id: EventId::new(1),
            aggregate_agent_id: id,
            trigger_act: 1,
            kind: RefinementEventKind::Refine { desired_count: 9 },
        }];
        assert_eq!(
            process_refinement_events(&mut reg, &mut events, 5).unwrap_err(),
            Refusal::RefinementLimitReached
        );
        assert_eq!(reg.find(id).unwrap().refined_count, 0);
    }
}
