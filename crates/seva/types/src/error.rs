//! The engine error taxonomy.

use crate::ids::{Arn, QueryId, ServiceKey, StateId, TaskId, TransitionId};
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Typed errors returned by the engine.
///
/// Every variant except `AuditChainBroken` is a per-request error the
/// caller can act on. `AuditChainBroken` is a system-health alarm: it halts
/// automated processing and is never auto-repaired.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed request or definition; recoverable by the caller.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A business rule was not satisfied. Carries the failing condition.
    #[error("guard failed: {reason}")]
    GuardFailed { reason: String },

    /// The actor does not hold a role the transition or task requires.
    #[error("actor lacks a required role")]
    Forbidden,

    /// No transition with that id leaves the application's current state.
    /// The client holds stale state and should refetch.
    #[error("transition '{transition}' not found from state '{state}'")]
    TransitionNotFound {
        transition: TransitionId,
        state: StateId,
    },

    /// Optimistic version clash; the caller retries the whole transition.
    #[error("concurrent update on application '{arn}'")]
    ConcurrencyConflict { arn: Arn },

    /// The query cycle budget is exhausted for this application.
    #[error("query budget exhausted for application '{arn}'")]
    QueryBudgetExhausted { arn: Arn },

    /// An enqueued side-effect failed; retried internally, never surfaced
    /// synchronously to the transition caller.
    #[error("action dispatch failure: {0}")]
    ActionDispatchFailure(String),

    /// The audit chain failed integrity verification.
    #[error("audit chain broken at seq {seq}: {reason}")]
    AuditChainBroken { seq: u64, reason: String },

    #[error("application '{0}' not found")]
    ApplicationNotFound(Arn),

    #[error("workflow definition '{service_key}' v{version} not found")]
    DefinitionNotFound { service_key: ServiceKey, version: u32 },

    #[error("task '{0}' not found")]
    TaskNotFound(TaskId),

    #[error("query '{0}' not found")]
    QueryNotFound(QueryId),
}

impl EngineError {
    /// Stable machine-readable code for wire surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::GuardFailed { .. } => "GUARD_FAILED",
            Self::Forbidden => "FORBIDDEN",
            Self::TransitionNotFound { .. } => "TRANSITION_NOT_FOUND",
            Self::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            Self::QueryBudgetExhausted { .. } => "QUERY_BUDGET_EXHAUSTED",
            Self::ActionDispatchFailure(_) => "ACTION_DISPATCH_FAILURE",
            Self::AuditChainBroken { .. } => "AUDIT_CHAIN_BROKEN",
            Self::ApplicationNotFound(_) => "APPLICATION_NOT_FOUND",
            Self::DefinitionNotFound { .. } => "DEFINITION_NOT_FOUND",
            Self::TaskNotFound(_) => "TASK_NOT_FOUND",
            Self::QueryNotFound(_) => "QUERY_NOT_FOUND",
        }
    }

    /// Whether this error is a system-health alarm rather than a
    /// per-request failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AuditChainBroken { .. })
    }
}
