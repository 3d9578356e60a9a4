//! Append-only audit trail and history aggregation for the Polity
//! kernel.
//!
//! Every consequential decision the kernel takes -- a goal chosen, a
//! plan built or refused, a conflict begun, an institution collapsed --
//! is appended to an [`AuditLog`] in call order. The log is the
//! replayability contract: two runs that make the same sequence of calls
//! produce byte-identical logs, verified cheaply by an FNV-1a
//! [`fingerprint`](AuditLog::fingerprint).
//!
//! A [`HistoryBuffer`] is the narrative view over the audit trail:
//! aggregation filters by an opt-in list of narrative ids plus an
//! "objective record" flag, strictly preserving audit order.

use serde::{Deserialize, Serialize};

use polity_types::{
    fnv1a_update_u64, ActTime, AgentId, EventId, InstitutionId, ProvenanceId, FNV_OFFSET_BASIS,
};

/// Errors from audit and history containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    /// The bounded log is full; the record was not appended.
    #[error("audit log capacity {capacity} exhausted")]
    LogFull {
        /// The fixed capacity given at init.
        capacity: usize,
    },
}

// ---------------------------------------------------------------------------
// Audit kinds
// ---------------------------------------------------------------------------

/// What an audit entry records. Discriminants are stable and feed the
/// log fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum AuditKind {
    /// The evaluator selected a goal.
    GoalChosen = 1,
    /// The evaluator refused to select any goal.
    GoalRefused = 2,
    /// The planner produced a plan.
    PlanBuilt = 3,
    /// The planner (or a veto registry) refused a plan.
    PlanRefused = 4,
    /// A conflict opened between two parties.
    ConflictBegin = 5,
    /// A conflict was resolved.
    ConflictResolved = 6,
    /// An institution collapsed.
    InstitutionCollapse = 7,
    /// A player intent passed validation.
    IntentAccepted = 8,
    /// A player intent was refused.
    IntentRefused = 9,
    /// A scheduled doctrine update was applied.
    DoctrineApplied = 10,
    /// A scheduled doctrine clear removed a doctrine.
    DoctrineCleared = 11,
    /// An aggregate refined representatives out.
    RefinementApplied = 12,
    /// An aggregate collapsed back from representatives.
    CollapseApplied = 13,
    /// A migration flow arrived and was applied.
    MigrationApplied = 14,
}

impl AuditKind {
    /// The stable integer code.
    pub const fn code(self) -> u32 {
        self as u32
    }
}

// ---------------------------------------------------------------------------
// AuditLog
// ---------------------------------------------------------------------------

/// One audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Sequential event id, allocated in append order.
    pub event_id: EventId,
    /// What happened.
    pub kind: AuditKind,
    /// The acting agent.
    pub agent_id: AgentId,
    /// The primary subject (goal, plan, conflict, institution, ...).
    pub subject_id: u64,
    /// A secondary related entity (`0` = none).
    pub related_id: u64,
    /// A signed magnitude attached to the record.
    pub amount: i64,
    /// The act the record was stamped with.
    pub act_time: ActTime,
    /// The provenance the record was stamped with.
    pub provenance_id: ProvenanceId,
}

/// Bounded append-only audit log.
///
/// A caller-set context `(act_time, provenance_id)` stamps every record
/// until changed, so a think cycle sets its context once and records
/// freely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
    capacity: usize,
    next_event_id: u64,
    context_act: ActTime,
    context_provenance: ProvenanceId,
}

impl AuditLog {
    /// Create an empty log. A `start_event_id` of zero begins event ids
    /// at 1.
    pub fn new(capacity: usize, start_event_id: u64) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            next_event_id: if start_event_id == 0 { 1 } else { start_event_id },
            context_act: 0,
            context_provenance: ProvenanceId::NONE,
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The records in append order.
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    /// Set the context stamped on every subsequent record.
    pub const fn set_context(&mut self, act_time: ActTime, provenance_id: ProvenanceId) {
        self.context_act = act_time;
        self.context_provenance = provenance_id;
    }

    /// Append one record under the current context.
    pub fn record(
        &mut self,
        agent_id: AgentId,
        kind: AuditKind,
        subject_id: u64,
        related_id: u64,
        amount: i64,
    ) -> Result<EventId, EventError> {
        if self.entries.len() >= self.capacity {
            return Err(EventError::LogFull {
                capacity: self.capacity,
            });
        }
        let event_id = EventId::new(self.next_event_id);
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.entries.push(AuditEntry {
            event_id,
            kind,
            agent_id,
            subject_id,
            related_id,
            amount,
            act_time: self.context_act,
            provenance_id: self.context_provenance,
        });
        Ok(event_id)
    }

    /// FNV-1a fingerprint over the whole log.
    ///
    /// Two runs producing the same call sequence produce equal
    /// fingerprints; this is the cheap cross-run identity check.
    pub fn fingerprint(&self) -> u64 {
        let mut hash = FNV_OFFSET_BASIS;
        hash = fnv1a_update_u64(hash, self.entries.len() as u64);
        for entry in &self.entries {
            hash = fnv1a_update_u64(hash, entry.event_id.raw());
            hash = fnv1a_update_u64(hash, u64::from(entry.kind.code()));
            hash = fnv1a_update_u64(hash, entry.agent_id.raw());
            hash = fnv1a_update_u64(hash, entry.subject_id);
            hash = fnv1a_update_u64(hash, entry.related_id);
            hash = fnv1a_update_u64(hash, entry.amount.cast_unsigned());
            hash = fnv1a_update_u64(hash, entry.act_time);
            hash = fnv1a_update_u64(hash, entry.provenance_id.raw());
        }
        hash
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// History record flag: an objective (narrative-free) record.
pub const HISTORY_FLAG_OBJECTIVE: u32 = 1 << 0;

/// History record flag: a record attributed to a narrative.
pub const HISTORY_FLAG_NARRATIVE: u32 = 1 << 1;

/// One aggregated history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Sequential history id.
    pub history_id: u64,
    /// The audit event this record derives from.
    pub source_event_id: EventId,
    /// The narrative the record belongs to (`0` = objective).
    pub narrative_id: u64,
    /// The acting agent.
    pub agent_id: AgentId,
    /// The institution involved, when the kind is institutional.
    pub institution_id: InstitutionId,
    /// The audit subject.
    pub subject_id: u64,
    /// The audit act time.
    pub act_time: ActTime,
    /// The audit kind.
    pub kind: AuditKind,
    /// `HISTORY_FLAG_*` bits.
    pub flags: u32,
    /// The audit amount.
    pub amount: i64,
}

/// Which narratives (and whether objective records) aggregation emits.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryPolicy<'a> {
    /// Narrative ids to attribute each audit record to.
    pub narrative_ids: &'a [u64],
    /// Whether to also emit one objective record per audit record.
    pub include_objective: bool,
}

/// Bounded buffer of aggregated history records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryBuffer {
    entries: Vec<HistoryRecord>,
    capacity: usize,
    next_history_id: u64,
}

impl HistoryBuffer {
    /// Create an empty buffer. A `start_id` of zero begins history ids
    /// at 1.
    pub fn new(capacity: usize, start_id: u64) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            next_history_id: if start_id == 0 { 1 } else { start_id },
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The records in aggregation order.
    pub fn entries(&self) -> &[HistoryRecord] {
        &self.entries
    }

    /// FNV-1a fingerprint over the buffer.
    pub fn fingerprint(&self) -> u64 {
        let mut hash = FNV_OFFSET_BASIS;
        hash = fnv1a_update_u64(hash, self.entries.len() as u64);
        for record in &self.entries {
            hash = fnv1a_update_u64(hash, record.history_id);
            hash = fnv1a_update_u64(hash, record.source_event_id.raw());
            hash = fnv1a_update_u64(hash, record.narrative_id);
            hash = fnv1a_update_u64(hash, record.agent_id.raw());
            hash = fnv1a_update_u64(hash, record.institution_id.raw());
            hash = fnv1a_update_u64(hash, record.subject_id);
            hash = fnv1a_update_u64(hash, record.act_time);
            hash = fnv1a_update_u64(hash, u64::from(record.kind.code()));
            hash = fnv1a_update_u64(hash, u64::from(record.flags));
            hash = fnv1a_update_u64(hash, record.amount.cast_unsigned());
        }
        hash
    }

    fn push(&mut self, record: HistoryRecord) -> bool {
        if self.entries.len() >= self.capacity {
            return false;
        }
        self.entries.push(record);
        true
    }
}

/// Aggregate an audit log into a history buffer under a policy.
///
/// For every audit record, in log order: one record per narrative id in
/// the policy, then one objective record when `include_objective` is
/// set. Returns the number of records written; aggregation stops
/// silently when the buffer fills.
pub fn aggregate_history(
    audit: &AuditLog,
    policy: &HistoryPolicy<'_>,
    out: &mut HistoryBuffer,
) -> usize {
    let mut written = 0;
    for entry in audit.entries() {
        let institution_id = if matches!(entry.kind, AuditKind::InstitutionCollapse) {
            InstitutionId::new(entry.subject_id)
        } else {
            InstitutionId::NONE
        };
        for &narrative_id in policy.narrative_ids {
            let history_id = out.next_history_id;
            if !out.push(HistoryRecord {
                history_id,
                source_event_id: entry.event_id,
                narrative_id,
                agent_id: entry.agent_id,
                institution_id,
                subject_id: entry.subject_id,
                act_time: entry.act_time,
                kind: entry.kind,
                flags: HISTORY_FLAG_NARRATIVE,
                amount: entry.amount,
            }) {
                return written;
            }
            out.next_history_id = out.next_history_id.wrapping_add(1);
            written += 1;
        }
        if policy.include_objective {
            let history_id = out.next_history_id;
            if !out.push(HistoryRecord {
                history_id,
                source_event_id: entry.event_id,
                narrative_id: 0,
                agent_id: entry.agent_id,
                institution_id,
                subject_id: entry.subject_id,
                act_time: entry.act_time,
                kind: entry.kind,
                flags: HISTORY_FLAG_OBJECTIVE,
                amount: entry.amount,
            }) {
                return written;
            }
            out.next_history_id = out.next_history_id.wrapping_add(1);
            written += 1;
        }
    }
    written
}
