//! Officer tasks: one unit of pending work per active review state.

use crate::decision::DecisionOutcome;
use crate::ids::{Arn, AuthorityId, OfficerId, RoleId, StateId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A task awaiting officer action.
///
/// Created when a transition enters a non-terminal officer state, completed
/// when the officer acts. The engine maintains at most one non-completed
/// task per application.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub arn: Arn,
    /// The state this task reviews.
    pub state: StateId,
    /// Role any claiming officer must hold.
    pub role_required: RoleId,
    pub authority_id: AuthorityId,
    /// Set when an officer claims the task from the role pool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<OfficerId>,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sla_due_at: Option<DateTime<Utc>>,
    /// Outcome recorded when the task completes via a deciding transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<DecisionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        arn: Arn,
        state: StateId,
        role_required: RoleId,
        authority_id: AuthorityId,
        sla_due_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: TaskId::generate(),
            arn,
            state,
            role_required,
            authority_id,
            assignee: None,
            status: TaskStatus::Pending,
            sla_due_at,
            decision: None,
            remarks: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status != TaskStatus::Completed
    }

    /// Whether the task's SLA deadline has passed.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_open() && self.sla_due_at.is_some_and(|due| now > due)
    }
}

/// Task lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Unclaimed, visible to the whole role pool.
    Pending,
    /// Claimed by an officer.
    InProgress,
    Completed,
}
