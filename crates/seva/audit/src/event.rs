//! Audit event types and hash computation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use seva_types::Arn;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Well-known genesis `prev_hash` for the first event in a chain.
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// One immutable audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Monotonic position in the chain, starting at 0.
    pub seq: u64,

    /// Unique event ID.
    pub event_id: Uuid,

    /// The application this event concerns.
    pub arn: Arn,

    /// What happened.
    pub kind: AuditKind,

    /// Who did it.
    pub actor: AuditActor,

    /// Structured event payload (fromState/toState/transitionId and the
    /// like).
    pub payload: serde_json::Value,

    /// Hash of the previous event ([`GENESIS_HASH`] for seq 0).
    pub prev_hash: String,

    /// SHA-256 over `prev_hash ‖ canonical(payload) ‖ timestamp` plus the
    /// identifying fields.
    pub hash: String,

    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    /// Recompute this event's hash from its recorded fields.
    pub fn compute_hash(&self) -> String {
        hash_fields(
            &self.event_id,
            &self.arn,
            &self.kind,
            &self.actor,
            &self.payload,
            &self.prev_hash,
            self.timestamp,
        )
    }
}

/// An event not yet placed in the chain: everything but `seq`,
/// `prev_hash`, and `hash`, which only the log can assign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftEvent {
    pub event_id: Uuid,
    pub arn: Arn,
    pub kind: AuditKind,
    pub actor: AuditActor,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl DraftEvent {
    pub fn new(arn: Arn, kind: AuditKind, actor: AuditActor, payload: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            arn,
            kind,
            actor,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Place the draft into the chain at `seq` after `prev_hash`.
    pub fn finalize(self, seq: u64, prev_hash: String) -> AuditEvent {
        let hash = hash_fields(
            &self.event_id,
            &self.arn,
            &self.kind,
            &self.actor,
            &self.payload,
            &prev_hash,
            self.timestamp,
        );

        AuditEvent {
            seq,
            event_id: self.event_id,
            arn: self.arn,
            kind: self.kind,
            actor: self.actor,
            payload: self.payload,
            prev_hash,
            hash,
            timestamp: self.timestamp,
        }
    }
}

fn hash_fields(
    event_id: &Uuid,
    arn: &Arn,
    kind: &AuditKind,
    actor: &AuditActor,
    payload: &serde_json::Value,
    prev_hash: &str,
    timestamp: DateTime<Utc>,
) -> String {
    let hash_input = format!(
        "{}{}{}{}{}{}{}",
        prev_hash,
        event_id,
        arn,
        serde_json::to_string(kind).unwrap_or_default(),
        serde_json::to_string(actor).unwrap_or_default(),
        serde_json::to_string(payload).unwrap_or_default(),
        timestamp.to_rfc3339(),
    );

    let mut hasher = Sha256::new();
    hasher.update(hash_input.as_bytes());
    hex::encode(hasher.finalize())
}

/// What kind of event was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    ApplicationSubmitted,
    TransitionExecuted,
    TaskClaimed,
    TaskReleased,
    QueryRaised,
    QueryResponded,
    QueryExpired,
    SlaBreached,
    ActionDeadLettered,
    Custom(String),
}

/// Who performed the audited action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditActor {
    /// An officer acting under their roles.
    Officer { id: String },
    /// The citizen applicant.
    Citizen,
    /// The engine itself (system transitions, sweeps).
    System { component: String },
}

impl AuditActor {
    pub fn officer(id: impl Into<String>) -> Self {
        Self::Officer { id: id.into() }
    }

    pub fn system(component: impl Into<String>) -> Self {
        Self::System {
            component: component.into(),
        }
    }
}
