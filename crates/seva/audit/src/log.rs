//! The append-only in-memory audit log.

use crate::event::{AuditEvent, DraftEvent, GENESIS_HASH};
use crate::verify::{verify_chain, ChainVerification};
use parking_lot::RwLock;
use seva_types::Arn;

/// The audit log: an index-ordered, append-only sequence of events.
///
/// Appends take the write lock for the whole placement, so `prev_hash` is
/// always the hash of the true latest row — concurrent appenders cannot
/// interleave between reading the head and inserting.
pub struct AuditLog {
    events: RwLock<Vec<AuditEvent>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }

    /// Append a draft event, chaining it to the current head.
    pub fn append(&self, draft: DraftEvent) -> AuditEvent {
        let mut events = self.events.write();
        let seq = events.len() as u64;
        let prev_hash = events
            .last()
            .map(|e| e.hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());

        let event = draft.finalize(seq, prev_hash);
        tracing::debug!(seq, arn = %event.arn, kind = ?event.kind, "audit event appended");
        events.push(event.clone());
        event
    }

    /// Number of events in the chain.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Hash of the latest event, or the genesis hash for an empty chain.
    pub fn head_hash(&self) -> String {
        self.events
            .read()
            .last()
            .map(|e| e.hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string())
    }

    /// Snapshot of the full chain in sequence order.
    pub fn snapshot(&self) -> Vec<AuditEvent> {
        self.events.read().clone()
    }

    /// All events for one application, in sequence order.
    pub fn events_for(&self, arn: &Arn) -> Vec<AuditEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| &e.arn == arn)
            .cloned()
            .collect()
    }

    /// Walk the full chain from genesis, recomputing every hash.
    pub fn verify_integrity(&self) -> ChainVerification {
        verify_chain(&self.events.read())
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}
