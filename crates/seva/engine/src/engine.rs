//! The engine: composition root and application lifecycle surfaces.

use crate::dispatcher::{
    ActionDispatcher, CertificateGenerator, IntegrationClient, LoggingCollaborators, Notifier,
};
use crate::registry::{DefinitionSource, WorkflowRegistry};
use crate::store::{ApplicationStore, InMemoryApplicationStore};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use seva_audit::{AuditActor, AuditEvent, AuditKind, AuditLog, ChainVerification, DraftEvent};
use seva_calendar::{CalendarBook, CarryRule, WorkingCalendar};
use seva_tasks::{InboxFilter, SlaClock, TaskManager};
use seva_types::{
    Application, Arn, AuthorityId, Decision, EngineResult, OfficerId, QueryCycle, QueryId, RoleId,
    ServiceKey, StateDef, Task, TaskId,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Read-only data source for guard context variables (property records,
/// ledger balances). A failed lookup is an unresolved variable, never a
/// fatal error.
pub trait LedgerLookup: Send + Sync {
    fn lookup(&self, key: &str) -> Option<seva_guard::Value>;
}

/// The default lookup: resolves nothing.
struct NoLookup;

impl LedgerLookup for NoLookup {
    fn lookup(&self, _key: &str) -> Option<seva_guard::Value> {
        None
    }
}

/// The workflow orchestration engine.
///
/// All mutation of an application flows through [`execute_transition`]
/// (crate::executor) or the query controller (crate::query), both of which
/// serialize on the per-ARN lock and commit through the store's
/// compare-and-swap.
pub struct WorkflowEngine {
    pub(crate) registry: WorkflowRegistry,
    pub(crate) store: Arc<dyn ApplicationStore>,
    pub(crate) tasks: TaskManager,
    pub(crate) audit: Arc<AuditLog>,
    pub(crate) calendars: CalendarBook,
    pub(crate) carry_rule: CarryRule,
    pub(crate) lookup: Arc<dyn LedgerLookup>,
    pub(crate) dispatcher: ActionDispatcher,
    pub(crate) locks: DashMap<Arn, Arc<Mutex<()>>>,
    pub(crate) decisions: RwLock<Vec<Decision>>,
    pub(crate) queries: DashMap<QueryId, QueryCycle>,
    pub(crate) sla_breach_reported: DashMap<TaskId, ()>,
}

/// Builder for [`WorkflowEngine`].
pub struct EngineBuilder {
    source: Arc<dyn DefinitionSource>,
    store: Option<Arc<dyn ApplicationStore>>,
    calendars: Option<CalendarBook>,
    carry_rule: CarryRule,
    lookup: Option<Arc<dyn LedgerLookup>>,
    notifier: Option<Arc<dyn Notifier>>,
    certificates: Option<Arc<dyn CertificateGenerator>>,
    integrations: Option<Arc<dyn IntegrationClient>>,
    max_action_attempts: u32,
    action_backoff: Duration,
}

impl EngineBuilder {
    pub fn new(source: Arc<dyn DefinitionSource>) -> Self {
        Self {
            source,
            store: None,
            calendars: None,
            carry_rule: CarryRule::ExactSeconds,
            lookup: None,
            notifier: None,
            certificates: None,
            integrations: None,
            max_action_attempts: 5,
            action_backoff: Duration::from_millis(250),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ApplicationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_calendars(mut self, calendars: CalendarBook) -> Self {
        self.calendars = Some(calendars);
        self
    }

    pub fn with_carry_rule(mut self, rule: CarryRule) -> Self {
        self.carry_rule = rule;
        self
    }

    pub fn with_lookup(mut self, lookup: Arc<dyn LedgerLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_certificates(mut self, certificates: Arc<dyn CertificateGenerator>) -> Self {
        self.certificates = Some(certificates);
        self
    }

    pub fn with_integrations(mut self, integrations: Arc<dyn IntegrationClient>) -> Self {
        self.integrations = Some(integrations);
        self
    }

    pub fn with_action_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_action_attempts = max_attempts;
        self.action_backoff = backoff;
        self
    }

    /// Build the engine, spawning the dispatch worker on the current
    /// runtime.
    pub fn build(self) -> WorkflowEngine {
        let audit = Arc::new(AuditLog::new());
        let dispatcher = ActionDispatcher::spawn(
            self.notifier.unwrap_or_else(|| Arc::new(LoggingCollaborators)),
            self.certificates
                .unwrap_or_else(|| Arc::new(LoggingCollaborators)),
            self.integrations
                .unwrap_or_else(|| Arc::new(LoggingCollaborators)),
            Arc::clone(&audit),
            self.max_action_attempts,
            self.action_backoff,
        );

        WorkflowEngine {
            registry: WorkflowRegistry::new(self.source),
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryApplicationStore::new())),
            tasks: TaskManager::new(),
            audit,
            calendars: self
                .calendars
                .unwrap_or_else(|| CalendarBook::new(WorkingCalendar::sundays_off())),
            carry_rule: self.carry_rule,
            lookup: self.lookup.unwrap_or_else(|| Arc::new(NoLookup)),
            dispatcher,
            locks: DashMap::new(),
            decisions: RwLock::new(Vec::new()),
            queries: DashMap::new(),
            sla_breach_reported: DashMap::new(),
        }
    }
}

impl WorkflowEngine {
    // ── Submission ───────────────────────────────────────────────────

    /// Create an application at the initial state of the pinned
    /// definition, snapshot the payload, start the stage SLA, and open
    /// the first officer task.
    pub async fn submit_application(
        &self,
        arn: Arn,
        service_key: ServiceKey,
        version: u32,
        authority_id: AuthorityId,
        data: serde_json::Value,
    ) -> EngineResult<Application> {
        let workflow = self.registry.get(&service_key, version)?;
        let initial = workflow
            .definition
            .initial_state()
            .ok_or_else(|| {
                seva_types::EngineError::Validation("definition has no initial state".into())
            })?
            .clone();

        let mut app = Application::submit(
            arn.clone(),
            service_key,
            version,
            authority_id,
            initial.id.clone(),
            data,
        );

        let now = Utc::now();
        let calendar = self.calendars.for_authority(&app.authority_id);
        SlaClock::new(calendar, self.carry_rule).start(&mut app, initial.sla_days, now);

        self.store.insert(app.clone())?;

        if initial.actor == seva_types::ActorKind::Officer && !initial.terminal {
            self.open_task_for(&app, &initial)?;
        }

        self.audit.append(DraftEvent::new(
            arn.clone(),
            AuditKind::ApplicationSubmitted,
            AuditActor::Citizen,
            serde_json::json!({
                "serviceKey": app.service_key.to_string(),
                "workflowVersion": app.workflow_version,
                "initialState": app.state.to_string(),
            }),
        ));

        tracing::info!(%arn, state = %app.state, "application submitted");
        Ok(app)
    }

    // ── Read surfaces ────────────────────────────────────────────────

    pub fn application(&self, arn: &Arn) -> EngineResult<Application> {
        self.store.get(arn)
    }

    /// The officer inbox, pre-filtered to the caller's roles.
    pub fn inbox(&self, filter: &InboxFilter) -> Vec<Task> {
        self.tasks.inbox(filter)
    }

    pub fn active_task(&self, arn: &Arn) -> Option<Task> {
        self.tasks.active_task(arn)
    }

    /// Number of open tasks for an application. Always 0 or 1.
    pub fn open_task_count(&self, arn: &Arn) -> usize {
        self.tasks.open_count(arn)
    }

    /// Decision records for an application, in decision order.
    pub fn decisions_for(&self, arn: &Arn) -> Vec<Decision> {
        self.decisions
            .read()
            .iter()
            .filter(|d| &d.arn == arn)
            .cloned()
            .collect()
    }

    pub fn query_cycles_for(&self, arn: &Arn) -> Vec<QueryCycle> {
        let mut cycles: Vec<QueryCycle> = self
            .queries
            .iter()
            .filter(|e| &e.value().arn == arn)
            .map(|e| e.value().clone())
            .collect();
        cycles.sort_by_key(|c| c.raised_at);
        cycles
    }

    // ── Task claiming (role pool) ────────────────────────────────────

    /// Claim a pending task. Any officer holding the required role may
    /// claim; claiming is separate from transitioning.
    pub fn claim_task(
        &self,
        task_id: &TaskId,
        officer: &OfficerId,
        roles: &[RoleId],
    ) -> EngineResult<Task> {
        let task = self.tasks.claim(task_id, officer, roles)?;
        self.audit.append(DraftEvent::new(
            task.arn.clone(),
            AuditKind::TaskClaimed,
            AuditActor::officer(officer.to_string()),
            serde_json::json!({"taskId": task.id.to_string(), "state": task.state.to_string()}),
        ));
        Ok(task)
    }

    /// Return a claimed task to the role pool.
    pub fn release_task(&self, task_id: &TaskId, officer: &OfficerId) -> EngineResult<Task> {
        let task = self.tasks.release(task_id, officer)?;
        self.audit.append(DraftEvent::new(
            task.arn.clone(),
            AuditKind::TaskReleased,
            AuditActor::officer(officer.to_string()),
            serde_json::json!({"taskId": task.id.to_string()}),
        ));
        Ok(task)
    }

    // ── Audit surfaces ───────────────────────────────────────────────

    pub fn audit_log(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn audit_events_for(&self, arn: &Arn) -> Vec<AuditEvent> {
        self.audit.events_for(arn)
    }

    /// Replay the whole chain and report integrity.
    pub fn verify_audit(&self) -> ChainVerification {
        self.audit.verify_integrity()
    }

    /// Dead-lettered actions awaiting manual follow-up.
    pub fn dead_letters(&self) -> Vec<crate::dispatcher::DeadLetter> {
        self.dispatcher.dead_letters()
    }

    /// Registry surface for operator-driven reloads.
    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    /// Test/shutdown helper: wait for in-flight actions to settle.
    pub async fn quiesce_actions(&self) {
        self.dispatcher.quiesce().await;
    }

    // ── Internals shared across executor and query controller ────────

    /// The per-application lock. Serializes every transition on one ARN;
    /// different ARNs proceed independently.
    pub(crate) fn lock_for(&self, arn: &Arn) -> Arc<Mutex<()>> {
        self.locks
            .entry(arn.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub(crate) fn sla_clock_for(&self, authority: &AuthorityId) -> SlaClock<'_> {
        SlaClock::new(self.calendars.for_authority(authority), self.carry_rule)
    }

    /// Open the task for a state the application just entered.
    pub(crate) fn open_task_for(&self, app: &Application, state: &StateDef) -> EngineResult<Task> {
        let role = state
            .allowed_roles
            .first()
            .cloned()
            .unwrap_or_else(|| RoleId::new("UNASSIGNED"));
        self.tasks.create(Task::new(
            app.arn.clone(),
            state.id.clone(),
            role,
            app.authority_id.clone(),
            app.sla_due_at,
        ))
    }
}
