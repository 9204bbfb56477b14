//! Append-only audit log
//!
//! Every admission decision, operator override, device fault, and power
//! change lands here with a monotonic sequence number and an attributable
//! actor. The log is in-memory and shared across lanes; a production
//! deployment would drain it to durable storage, but the contract is the
//! same: append-only, never rewritten.

use parking_lot::Mutex;

use crate::types::event::{Actor, AuditEntry, AuditKind};
use crate::types::session::{LaneId, Plate, Timestamp};

/// Shared append-only audit log
#[derive(Debug)]
pub struct AuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLog {
    pub fn new() -> Self {
        AuditLog {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Append one entry, assigning the next sequence number
    ///
    /// The number is taken under the entries lock, so sequence order and
    /// vector order are the same thing even under concurrent appends.
    pub fn record(
        &self,
        at: Timestamp,
        lane_id: LaneId,
        actor: Actor,
        kind: AuditKind,
        plate: Option<Plate>,
        detail: impl Into<String>,
    ) -> AuditEntry {
        let mut entries = self.entries.lock();
        let entry = AuditEntry {
            seq: entries.len() as u64 + 1,
            at,
            lane_id,
            actor,
            kind,
            plate,
            detail: detail.into(),
        };

        tracing::info!(
            seq = entry.seq,
            lane = %entry.lane_id,
            actor = %entry.actor,
            kind = ?entry.kind,
            detail = %entry.detail,
            "audit"
        );

        entries.push(entry.clone());
        entry
    }

    /// A copy of all entries recorded so far, in sequence order
    pub fn snapshot(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
