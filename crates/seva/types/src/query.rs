//! Query cycles: pause-and-clarify loops between an officer and a citizen.

use crate::ids::{Arn, QueryId, RoleId, StateId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One query cycle raised against an application.
///
/// The originating state is stored explicitly so resubmission can re-enter
/// it by direct assignment — the workflow graph is a plain digraph with
/// revisitable nodes, not a call stack.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryCycle {
    pub id: QueryId,
    pub arn: Arn,
    pub raised_at: DateTime<Utc>,
    pub raised_by_role: RoleId,
    /// The state that raised this query; resubmission returns here.
    pub originating_state: StateId,
    pub message: String,
    /// Form field keys the citizen may edit while responding.
    pub unlocked_fields: Vec<String>,
    /// Document types the citizen may re-upload while responding.
    pub unlocked_doc_types: Vec<String>,
    /// Calendar deadline for the citizen's response.
    pub response_due_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
    /// Number of resubmissions made against this cycle.
    pub resubmission_count: u32,
    pub status: QueryStatus,
}

impl QueryCycle {
    pub fn is_pending(&self) -> bool {
        self.status == QueryStatus::Pending
    }

    /// Whether a field key was unlocked for citizen editing.
    pub fn field_unlocked(&self, key: &str) -> bool {
        self.unlocked_fields.iter().any(|f| f == key)
    }
}

/// Lifecycle of a query cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryStatus {
    /// Awaiting citizen response.
    Pending,
    /// Citizen responded; application returned to the originating state.
    Responded,
    /// Response window elapsed without a response.
    Expired,
}
