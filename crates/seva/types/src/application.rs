//! Applications: the case files moving through the pipeline.

use crate::ids::{Arn, AuthorityId, ServiceKey, StateId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A citizen-submitted application.
///
/// Owned exclusively by the orchestrator: created on submission, mutated
/// only through transitions, never deleted. `row_version` is the optimistic
/// concurrency counter; every committed transition bumps it by one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Application {
    pub arn: Arn,
    pub service_key: ServiceKey,
    /// Definition version pinned at submission.
    pub workflow_version: u32,
    pub authority_id: AuthorityId,
    /// Current workflow state.
    pub state: StateId,
    /// Live form payload. Only fields unlocked by a pending query are
    /// citizen-editable.
    pub data: serde_json::Value,
    /// Immutable copy of the payload taken at submit time.
    pub submission_snapshot: serde_json::Value,
    /// Optimistic concurrency counter.
    pub row_version: u64,
    /// Query cycles consumed so far.
    pub query_count: u32,
    /// Stage SLA deadline, if the current state carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sla_due_at: Option<DateTime<Utc>>,
    /// Set while the SLA clock is paused by a pending query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sla_paused_at: Option<DateTime<Utc>>,
    /// Unused SLA budget frozen at pause time, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sla_remaining_secs: Option<i64>,
    /// Terminal outcome, set exactly once when a terminal state is entered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disposal: Option<DisposalType>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    /// Create a new application at the initial state of its pinned
    /// definition, snapshotting the submitted payload.
    pub fn submit(
        arn: Arn,
        service_key: ServiceKey,
        workflow_version: u32,
        authority_id: AuthorityId,
        initial_state: StateId,
        data: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            arn,
            service_key,
            workflow_version,
            authority_id,
            state: initial_state,
            submission_snapshot: data.clone(),
            data,
            row_version: 0,
            query_count: 0,
            sla_due_at: None,
            sla_paused_at: None,
            sla_remaining_secs: None,
            disposal: None,
            submitted_at: now,
            updated_at: now,
        }
    }

    /// Whether processing has reached a terminal disposal.
    pub fn is_disposed(&self) -> bool {
        self.disposal.is_some()
    }

    /// Whether the SLA clock is currently paused.
    pub fn sla_paused(&self) -> bool {
        self.sla_paused_at.is_some()
    }
}

/// Terminal outcome of an application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisposalType {
    Approved,
    Rejected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_snapshots_payload() {
        let data = serde_json::json!({"applicant": {"name": "A. Kumar", "age": 34}});
        let app = Application::submit(
            Arn::new("ARN-1"),
            ServiceKey::new("water_connection"),
            2,
            AuthorityId::new("DIST-01"),
            StateId::new("CLERK_REVIEW"),
            data.clone(),
        );

        assert_eq!(app.submission_snapshot, data);
        assert_eq!(app.row_version, 0);
        assert_eq!(app.query_count, 0);
        assert!(!app.is_disposed());
        assert!(!app.sla_paused());
    }

    #[test]
    fn snapshot_survives_data_edits() {
        let data = serde_json::json!({"field": "original"});
        let mut app = Application::submit(
            Arn::new("ARN-2"),
            ServiceKey::new("trade_license"),
            1,
            AuthorityId::new("DIST-02"),
            StateId::new("CLERK_REVIEW"),
            data.clone(),
        );

        app.data["field"] = serde_json::json!("amended");
        assert_eq!(app.submission_snapshot, data);
    }
}
