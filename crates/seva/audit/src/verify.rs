//! Chain integrity verification.

use crate::event::{AuditEvent, GENESIS_HASH};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result of walking a chain from genesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainVerification {
    /// Whether every event verified.
    pub ok: bool,
    /// Events verified before the first mismatch (all of them when `ok`).
    pub checked_count: usize,
    /// The first broken event, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatch: Option<Mismatch>,
}

/// The first broken event found during verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mismatch {
    pub seq: u64,
    pub event_id: Uuid,
    pub reason: String,
}

/// Verify a chain of events in sequence order.
///
/// Recomputes every hash from the recorded fields and checks each link
/// against its predecessor. Stops at the first mismatch and reports it
/// along with how many events verified before it — partial progress is
/// reported, never swallowed.
pub fn verify_chain(events: &[AuditEvent]) -> ChainVerification {
    let mut checked = 0usize;

    for (i, event) in events.iter().enumerate() {
        // Sequence must be dense and ordered; a gap means deletion.
        if event.seq != i as u64 {
            return broken(
                checked,
                event,
                format!("sequence gap: expected seq {}, found {}", i, event.seq),
            );
        }

        let expected_prev = if i == 0 {
            GENESIS_HASH
        } else {
            events[i - 1].hash.as_str()
        };
        if event.prev_hash != expected_prev {
            return broken(
                checked,
                event,
                format!(
                    "chain link broken: prev_hash {} does not match predecessor hash {}",
                    event.prev_hash, expected_prev
                ),
            );
        }

        let recomputed = event.compute_hash();
        if recomputed != event.hash {
            return broken(
                checked,
                event,
                format!(
                    "hash mismatch: stored {}, recomputed {}",
                    event.hash, recomputed
                ),
            );
        }

        checked += 1;
    }

    ChainVerification {
        ok: true,
        checked_count: checked,
        mismatch: None,
    }
}

fn broken(checked: usize, event: &AuditEvent, reason: String) -> ChainVerification {
    tracing::error!(seq = event.seq, event_id = %event.event_id, %reason, "audit chain broken");
    ChainVerification {
        ok: false,
        checked_count: checked,
        mismatch: Some(Mismatch {
            seq: event.seq,
            event_id: event.event_id,
            reason,
        }),
    }
}
