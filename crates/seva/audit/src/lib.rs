//! Tamper-evident audit trail for the Seva engine.
//!
//! Every state-changing operation appends one [`AuditEvent`]. Each event's
//! hash covers its payload, its timestamp, and the previous event's hash,
//! so editing, deleting, or reordering history breaks the chain at the
//! first touched event. The log is an index-ordered sequence with a
//! monotonic `seq` — `prev_hash` is always read from the max-seq row inside
//! the same critical section as the insert.
//!
//! There is no update or delete surface, deliberately.

#![deny(unsafe_code)]

pub mod event;
pub mod log;
pub mod sink;
pub mod verify;

pub use event::{AuditActor, AuditEvent, AuditKind, DraftEvent, GENESIS_HASH};
pub use log::AuditLog;
pub use sink::JsonlSink;
pub use verify::{verify_chain, ChainVerification, Mismatch};

/// Audit-related errors.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("sink I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type AuditResult<T> = Result<T, AuditError>;
