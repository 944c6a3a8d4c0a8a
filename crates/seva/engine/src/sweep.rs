//! Periodic deadline sweeps.
//!
//! Deadlines here are calendar facts, not timers: nothing blocks waiting
//! for a citizen or an officer. A sweep pass walks the open work, marks
//! expired query windows, and reports SLA breaches (each breach is audited
//! once, not on every pass).

use crate::engine::WorkflowEngine;
use chrono::{DateTime, Utc};
use seva_audit::{AuditActor, AuditKind, DraftEvent};
use seva_types::{QueryCycle, Task};
use std::sync::Arc;
use std::time::Duration;

/// What one sweep pass found.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Pending queries whose response window elapsed.
    pub expired_queries: Vec<QueryCycle>,
    /// Open tasks past their SLA deadline, newly reported this pass.
    pub breached_tasks: Vec<Task>,
}

impl WorkflowEngine {
    /// Run one sweep pass at `now`.
    pub fn run_sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let expired_queries = self.sweep_expired_queries(now);

        let mut breached_tasks = Vec::new();
        for task in self.tasks.overdue(now) {
            if self.sla_breach_reported.contains_key(&task.id) {
                continue;
            }
            self.sla_breach_reported.insert(task.id.clone(), ());
            self.audit.append(DraftEvent::new(
                task.arn.clone(),
                AuditKind::SlaBreached,
                AuditActor::system("sweep"),
                serde_json::json!({
                    "taskId": task.id.to_string(),
                    "state": task.state.to_string(),
                    "slaDueAt": task.sla_due_at.map(|d| d.to_rfc3339()),
                }),
            ));
            tracing::warn!(arn = %task.arn, task_id = %task.id, "stage SLA breached");
            breached_tasks.push(task);
        }

        SweepReport {
            expired_queries,
            breached_tasks,
        }
    }

    /// Drive [`run_sweep`](Self::run_sweep) on an interval until the
    /// returned handle is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let report = engine.run_sweep(Utc::now());
                if !report.expired_queries.is_empty() || !report.breached_tasks.is_empty() {
                    tracing::info!(
                        expired_queries = report.expired_queries.len(),
                        breached_tasks = report.breached_tasks.len(),
                        "sweep pass completed"
                    );
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineBuilder;
    use crate::registry::StaticDefinitionSource;
    use crate::fixtures::three_officer_chain;
    use seva_types::{Arn, AuthorityId, ServiceKey};

    async fn engine_with_app() -> WorkflowEngine {
        let engine = EngineBuilder::new(Arc::new(StaticDefinitionSource::with_definition(
            three_officer_chain(),
        )))
        .build();
        engine
            .submit_application(
                Arn::new("ARN-1"),
                ServiceKey::new("water_connection"),
                1,
                AuthorityId::new("DIST-01"),
                serde_json::json!({"applicant": {"age": 34}, "fee_paid": true}),
            )
            .await
            .unwrap();
        engine
    }

    #[tokio::test]
    async fn breach_is_reported_once() {
        let engine = engine_with_app().await;

        // The clerk stage has a 3-working-day SLA; jump past it.
        let late = Utc::now() + chrono::Duration::days(30);
        let report = engine.run_sweep(late);
        assert_eq!(report.breached_tasks.len(), 1);

        // The next pass stays quiet about the same task.
        let report = engine.run_sweep(late);
        assert!(report.breached_tasks.is_empty());
    }

    #[tokio::test]
    async fn quiet_sweep_reports_nothing() {
        let engine = engine_with_app().await;
        let report = engine.run_sweep(Utc::now());
        assert!(report.breached_tasks.is_empty());
        assert!(report.expired_queries.is_empty());
    }

    #[tokio::test]
    async fn sweep_audits_each_finding() {
        let engine = engine_with_app().await;
        let before = engine.audit_log().len();

        let late = Utc::now() + chrono::Duration::days(30);
        let report = engine.run_sweep(late);
        assert_eq!(report.breached_tasks.len(), 1);
        assert_eq!(engine.audit_log().len(), before + 1);

        let verification = engine.verify_audit();
        assert!(verification.ok);
    }
}
