//! The query/resubmission controller.
//!
//! A query is a nested pause-and-clarify loop inside one workflow state:
//! the officer asks, the citizen answers, and the application re-enters
//! the **originating** state — never the first state — so the same desk
//! resumes its review. The cycle budget is bounded by the definition's
//! query policy, and only the explicitly unlocked fields become
//! citizen-editable while the query is pending.

use crate::engine::WorkflowEngine;
use chrono::{DateTime, Utc};
use seva_audit::{AuditActor, AuditKind, DraftEvent};
use seva_types::{
    Application, Arn, EngineError, EngineResult, QueryCycle, QueryId, QueryStatus, TaskId,
};

impl WorkflowEngine {
    /// Raise a query against the application's active task.
    ///
    /// Requires `query_count < max_cycles`; a budget overrun is a typed
    /// rejection, not a silent no-op. Pauses the SLA clock (per policy),
    /// records the originating state, and routes the application to the
    /// citizen query state.
    pub async fn raise_query(
        &self,
        arn: &Arn,
        task_id: &TaskId,
        message: impl Into<String>,
        unlocked_fields: Vec<String>,
        unlocked_doc_types: Vec<String>,
    ) -> EngineResult<QueryCycle> {
        let lock = self.lock_for(arn);
        let _guard = lock.lock().await;

        let app = self.store.get(arn)?;
        let workflow = self.registry.get(&app.service_key, app.workflow_version)?;
        let policy = &workflow.definition.query_policy;

        if app.query_count >= policy.max_cycles {
            return Err(EngineError::QueryBudgetExhausted { arn: arn.clone() });
        }

        let task = self.tasks.get(task_id)?;
        if task.arn != *arn || !task.is_open() {
            return Err(EngineError::Validation(format!(
                "task '{}' is not the open task for application '{}'",
                task_id, arn
            )));
        }

        let now = Utc::now();
        let calendar = self.calendars.for_authority(&app.authority_id);
        let response_due_at = calendar.add_working_days(now, policy.response_due_days);

        let expected_version = app.row_version;
        let mut updated = app.clone();
        let originating_state = updated.state.clone();

        if policy.pause_sla {
            self.sla_clock_for(&updated.authority_id).pause(&mut updated, now);
        }
        updated.state = policy.query_state.clone();
        updated.query_count += 1;
        updated.row_version += 1;
        updated.updated_at = now;

        let query = QueryCycle {
            id: QueryId::generate(),
            arn: arn.clone(),
            raised_at: now,
            raised_by_role: task.role_required.clone(),
            originating_state: originating_state.clone(),
            message: message.into(),
            unlocked_fields,
            unlocked_doc_types,
            response_due_at,
            responded_at: None,
            resubmission_count: 0,
            status: QueryStatus::Pending,
        };

        self.store.update(updated, expected_version)?;
        // The officer's task closes while the citizen responds; the
        // return trip opens a fresh task at the originating state.
        self.tasks.complete_active(arn, None, Some(query.message.clone()));
        self.queries.insert(query.id.clone(), query.clone());

        self.audit.append(DraftEvent::new(
            arn.clone(),
            AuditKind::QueryRaised,
            AuditActor::officer(task.assignee.map(|o| o.to_string()).unwrap_or_default()),
            serde_json::json!({
                "queryId": query.id.to_string(),
                "originatingState": originating_state.to_string(),
                "unlockedFields": query.unlocked_fields,
                "cycle": app.query_count + 1,
            }),
        ));

        tracing::info!(
            %arn,
            query_id = %query.id,
            originating_state = %originating_state,
            cycle = app.query_count + 1,
            "query raised"
        );
        Ok(query)
    }

    /// Accept the citizen's response to a pending query.
    ///
    /// Only unlocked fields may change, every unlocked field must be
    /// addressed, and the application re-enters the state that raised the
    /// query with its SLA clock resumed from the frozen remainder.
    pub async fn respond_to_query(
        &self,
        arn: &Arn,
        query_id: &QueryId,
        updated_data: serde_json::Value,
    ) -> EngineResult<Application> {
        let lock = self.lock_for(arn);
        let _guard = lock.lock().await;

        let app = self.store.get(arn)?;
        let mut query = self
            .queries
            .get(query_id)
            .map(|q| q.clone())
            .ok_or_else(|| EngineError::QueryNotFound(query_id.clone()))?;

        if query.arn != *arn {
            return Err(EngineError::QueryNotFound(query_id.clone()));
        }
        if !query.is_pending() {
            return Err(EngineError::Validation(format!(
                "query '{}' is not pending",
                query_id
            )));
        }

        let fields = match &updated_data {
            serde_json::Value::Object(map) => map,
            _ => {
                return Err(EngineError::Validation(
                    "query response must be an object of field updates".into(),
                ))
            }
        };

        // Locked fields stay locked even while the state is query-pending.
        for key in fields.keys() {
            if !query.field_unlocked(key) {
                return Err(EngineError::Validation(format!(
                    "field '{}' is locked for this query",
                    key
                )));
            }
        }
        // Every unlocked item must be addressed before acceptance.
        for key in &query.unlocked_fields {
            if !fields.contains_key(key) {
                return Err(EngineError::Validation(format!(
                    "unlocked field '{}' was not addressed",
                    key
                )));
            }
        }

        let workflow = self.registry.get(&app.service_key, app.workflow_version)?;
        let origin = workflow
            .definition
            .get_state(&query.originating_state)
            .ok_or_else(|| {
                EngineError::Validation(format!(
                    "originating state '{}' missing from definition",
                    query.originating_state
                ))
            })?
            .clone();

        let now = Utc::now();
        let expected_version = app.row_version;
        let mut updated = app.clone();

        for (key, value) in fields {
            updated.data[key] = value.clone();
        }
        // Return to the originating state by direct assignment; the graph
        // is a digraph with revisitable nodes, not a call stack.
        updated.state = query.originating_state.clone();
        updated.row_version += 1;
        updated.updated_at = now;
        self.sla_clock_for(&updated.authority_id).resume(&mut updated, now);

        self.store.update(updated.clone(), expected_version)?;

        query.status = QueryStatus::Responded;
        query.responded_at = Some(now);
        query.resubmission_count += 1;
        self.queries.insert(query.id.clone(), query.clone());

        if origin.actor == seva_types::ActorKind::Officer && !origin.terminal {
            self.open_task_for(&updated, &origin)?;
        }

        self.audit.append(DraftEvent::new(
            arn.clone(),
            AuditKind::QueryResponded,
            AuditActor::Citizen,
            serde_json::json!({
                "queryId": query.id.to_string(),
                "returnedToState": query.originating_state.to_string(),
            }),
        ));

        tracing::info!(
            %arn,
            query_id = %query.id,
            returned_to = %query.originating_state,
            "query responded, review resumed"
        );
        Ok(updated)
    }

    /// Mark pending queries whose response window elapsed. Called by the
    /// periodic sweep; expiry never holds a connection open.
    pub fn sweep_expired_queries(&self, now: DateTime<Utc>) -> Vec<QueryCycle> {
        let mut expired = Vec::new();

        for mut entry in self.queries.iter_mut() {
            let query = entry.value_mut();
            if query.status == QueryStatus::Pending && now > query.response_due_at {
                query.status = QueryStatus::Expired;
                expired.push(query.clone());

                self.audit.append(DraftEvent::new(
                    query.arn.clone(),
                    AuditKind::QueryExpired,
                    AuditActor::system("sweep"),
                    serde_json::json!({
                        "queryId": query.id.to_string(),
                        "responseDueAt": query.response_due_at.to_rfc3339(),
                    }),
                ));
                tracing::warn!(arn = %query.arn, query_id = %query.id, "query response window expired");
            }
        }

        expired
    }
}
