//! The transition executor: the sole state-mutating path.
//!
//! One successful call traverses exactly one edge, bumps `row_version` by
//! one, completes/opens at most one task each, and appends exactly one
//! audit event. The per-ARN lock serializes calls for one application;
//! the store's compare-and-swap is the secondary defense for deployments
//! that cannot share the lock.

use crate::engine::WorkflowEngine;
use chrono::Utc;
use seva_audit::{AuditActor, AuditKind, DraftEvent};
use seva_guard::GuardContext;
use seva_types::{
    ActorKind, Application, Arn, Decision, EngineError, EngineResult, OfficerId, RoleId, StateId,
    TaskId, TransitionId, TriggerKind,
};

/// Who is firing a transition.
#[derive(Clone, Debug)]
pub enum Actor {
    Officer { id: OfficerId, roles: Vec<RoleId> },
    Citizen,
    System,
}

impl Actor {
    pub fn officer(id: impl Into<String>, roles: Vec<RoleId>) -> Self {
        Self::Officer {
            id: OfficerId::new(id),
            roles,
        }
    }

    fn roles(&self) -> &[RoleId] {
        match self {
            Self::Officer { roles, .. } => roles,
            _ => &[],
        }
    }

    fn audit_actor(&self) -> AuditActor {
        match self {
            Self::Officer { id, .. } => AuditActor::officer(id.to_string()),
            Self::Citizen => AuditActor::Citizen,
            Self::System => AuditActor::system("engine"),
        }
    }
}

/// A transition request.
#[derive(Clone, Debug)]
pub struct TransitionRequest {
    pub arn: Arn,
    pub transition_id: TransitionId,
    pub actor: Actor,
    /// Extra context for guard evaluation (inspection results, fee
    /// receipts). Not merged into the application data.
    pub payload: serde_json::Value,
    pub remarks: Option<String>,
    pub reason_codes: Vec<String>,
}

impl TransitionRequest {
    pub fn new(arn: Arn, transition_id: impl Into<String>, actor: Actor) -> Self {
        Self {
            arn,
            transition_id: TransitionId::new(transition_id),
            actor,
            payload: serde_json::Value::Null,
            remarks: None,
            reason_codes: Vec::new(),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into());
        self
    }

    pub fn with_reason_codes(mut self, codes: Vec<String>) -> Self {
        self.reason_codes = codes;
        self
    }
}

/// What a successful transition reports back.
#[derive(Clone, Debug)]
pub struct TransitionOutcome {
    pub arn: Arn,
    pub from: StateId,
    pub to: StateId,
    /// The task opened for the destination state, if one was.
    pub task_id: Option<TaskId>,
    /// Sequence number of the appended audit event.
    pub audit_seq: u64,
}

impl WorkflowEngine {
    /// Execute one transition.
    ///
    /// Steps: acquire the ARN lock; load the application and its pinned
    /// definition; resolve the transition from the current state; check
    /// roles; evaluate the guard; apply the atomic mutation; release the
    /// lock and enqueue actions.
    pub async fn execute_transition(
        &self,
        request: TransitionRequest,
    ) -> EngineResult<TransitionOutcome> {
        let lock = self.lock_for(&request.arn);
        let _guard = lock.lock().await;

        let app = self.store.get(&request.arn)?;
        let workflow = self.registry.get(&app.service_key, app.workflow_version)?;

        // The named transition must leave the application's current state.
        let transition = workflow
            .definition
            .get_transition(&request.transition_id)
            .filter(|t| t.from == app.state)
            .ok_or_else(|| EngineError::TransitionNotFound {
                transition: request.transition_id.clone(),
                state: app.state.clone(),
            })?
            .clone();

        // Role gate. System-triggered transitions bypass it.
        if transition.trigger != TriggerKind::System {
            let actor_roles = request.actor.roles();
            if !transition
                .allowed_roles
                .iter()
                .any(|role| actor_roles.contains(role))
                && transition.trigger == TriggerKind::Officer
            {
                return Err(EngineError::Forbidden);
            }
        }

        // Guard gate. Pure evaluation; a failure changes nothing.
        if let Some(guard) = workflow.guard_for(&transition.id) {
            let ctx = self.guard_context(&app, &request);
            if !seva_guard::evaluate(guard, &ctx) {
                let reason = transition
                    .guard
                    .clone()
                    .unwrap_or_else(|| "guard".to_string());
                tracing::info!(arn = %app.arn, transition = %transition.id, %reason, "guard failed");
                return Err(EngineError::GuardFailed { reason });
            }
        }

        let to_state = workflow
            .definition
            .get_state(&transition.to)
            .ok_or_else(|| {
                EngineError::Validation(format!("to-state '{}' missing", transition.to))
            })?
            .clone();

        // ── Atomic mutation ──────────────────────────────────────────
        // Everything below commits together: the CAS write is the commit
        // point, and task/decision/audit bookkeeping happens under the
        // same ARN lock, so no caller observes a partial step.

        let now = Utc::now();
        let expected_version = app.row_version;
        let mut updated = app.clone();
        let from_state = updated.state.clone();

        updated.state = to_state.id.clone();
        updated.row_version += 1;
        updated.updated_at = now;

        let clock = self.sla_clock_for(&updated.authority_id);
        if to_state.terminal {
            updated.disposal = to_state.disposal;
            updated.sla_due_at = None;
            updated.sla_paused_at = None;
            updated.sla_remaining_secs = None;
        } else {
            clock.start(&mut updated, to_state.sla_days, now);
        }

        self.store.update(updated.clone(), expected_version)?;

        let completed = self.tasks.complete_active(
            &request.arn,
            transition.decision,
            request.remarks.clone(),
        );

        if let (Some(outcome), Some(task)) = (transition.decision, &completed) {
            if let Actor::Officer { id, .. } = &request.actor {
                let decision = Decision::new(request.arn.clone(), task.id.clone(), outcome, id.clone())
                    .with_reason_codes(request.reason_codes.clone());
                let decision = match &request.remarks {
                    Some(remarks) => decision.with_remarks(remarks.clone()),
                    None => decision,
                };
                self.decisions.write().push(decision);
            }
        }

        let task_id = if !to_state.terminal && to_state.actor == ActorKind::Officer {
            Some(self.open_task_for(&updated, &to_state)?.id)
        } else {
            None
        };

        let event = self.audit.append(DraftEvent::new(
            request.arn.clone(),
            AuditKind::TransitionExecuted,
            request.actor.audit_actor(),
            serde_json::json!({
                "fromState": from_state.to_string(),
                "toState": to_state.id.to_string(),
                "transitionId": transition.id.to_string(),
            }),
        ));

        tracing::info!(
            arn = %request.arn,
            from = %from_state,
            to = %to_state.id,
            transition = %transition.id,
            "transition executed"
        );

        // ── End of atomic block ──────────────────────────────────────
        drop(_guard);

        // Side effects are decoupled: enqueueing never blocks or fails
        // the committed transition.
        self.dispatcher
            .enqueue(&request.arn, &transition.id, &transition.actions);

        Ok(TransitionOutcome {
            arn: request.arn,
            from: from_state,
            to: to_state.id,
            task_id,
            audit_seq: event.seq,
        })
    }

    /// Build the guard context: application data, actor, authority, the
    /// injected clock, the request payload under `payload.*`, and any
    /// external lookups the guard references.
    fn guard_context(&self, app: &Application, request: &TransitionRequest) -> GuardContext {
        let mut ctx = GuardContext::new(app.data.clone(), Utc::now())
            .with_authority(app.authority_id.to_string());

        if let Actor::Officer { id, roles } = &request.actor {
            ctx = ctx.with_actor(
                id.to_string(),
                roles.iter().map(|r| r.to_string()).collect(),
            );
        }

        if let serde_json::Value::Object(fields) = &request.payload {
            for (key, value) in fields {
                ctx = ctx.with_extra(format!("payload.{}", key), seva_guard::Value::from(value));
            }
        }

        // Pre-resolve external lookup variables so evaluation stays pure.
        // A variable the lookup cannot resolve simply stays Undefined.
        if let Ok(workflow) = self.registry.get(&app.service_key, app.workflow_version) {
            if let Some(guard) = workflow.guard_for(&request.transition_id) {
                for variable in guard.variables() {
                    if !ctx.extras.contains_key(variable) {
                        if let Some(value) = self.lookup.lookup(variable) {
                            ctx = ctx.with_extra(variable.to_string(), value);
                        }
                    }
                }
            }
        }

        ctx
    }
}
