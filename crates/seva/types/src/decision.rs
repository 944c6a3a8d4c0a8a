//! Decision records: immutable terminal-adjacent outcomes.

use crate::ids::{Arn, DecisionId, OfficerId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An officer's recorded decision. Immutable once written.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Decision {
    pub id: DecisionId,
    pub arn: Arn,
    /// The task whose completion produced this decision.
    pub task_id: TaskId,
    pub outcome: DecisionOutcome,
    #[serde(default)]
    pub reason_codes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub decided_by: OfficerId,
    pub decided_at: DateTime<Utc>,
}

impl Decision {
    pub fn new(
        arn: Arn,
        task_id: TaskId,
        outcome: DecisionOutcome,
        decided_by: OfficerId,
    ) -> Self {
        Self {
            id: DecisionId::generate(),
            arn,
            task_id,
            outcome,
            reason_codes: Vec::new(),
            remarks: None,
            decided_by,
            decided_at: Utc::now(),
        }
    }

    pub fn with_reason_codes(mut self, codes: Vec<String>) -> Self {
        self.reason_codes = codes;
        self
    }

    pub fn with_remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into());
        self
    }
}

/// The decision an officer can record on a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionOutcome {
    Approve,
    Reject,
    /// Return the application to an earlier officer stage.
    Return,
    /// Approve with withheld items recorded in the reason codes.
    PartialApprove,
}
