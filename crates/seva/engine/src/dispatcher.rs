//! Asynchronous side-effect dispatch.
//!
//! Transitions never execute actions inline: they enqueue envelopes after
//! the state change commits. Each envelope carries an idempotency key
//! derived from `(arn, transition, action index)` so a retry after partial
//! failure cannot double-execute. Failures back off and retry up to a
//! bounded attempt count, then land in a dead-letter record for manual
//! follow-up. Nothing here can roll back a committed transition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use seva_audit::{AuditActor, AuditKind, AuditLog, DraftEvent};
use seva_types::{ActionSpec, Arn, TransitionId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

// ── Collaborator traits ──────────────────────────────────────────────

/// The notification service collaborator. Failures are logged and retried;
/// they never block the engine.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        event_type: &str,
        recipients: &[String],
        template_data: &serde_json::Value,
    ) -> anyhow::Result<()>;
}

/// The output/certificate generator collaborator. Returns an opaque
/// artifact reference.
#[async_trait]
pub trait CertificateGenerator: Send + Sync {
    async fn generate(&self, arn: &Arn, template_id: &str) -> anyhow::Result<String>;
}

/// Generic external integration collaborator.
#[async_trait]
pub trait IntegrationClient: Send + Sync {
    async fn call(&self, integration: &str, payload: &serde_json::Value) -> anyhow::Result<()>;
}

/// Default collaborators that log instead of calling out. Useful for
/// development and as the fallback wiring.
pub struct LoggingCollaborators;

#[async_trait]
impl Notifier for LoggingCollaborators {
    async fn notify(
        &self,
        event_type: &str,
        recipients: &[String],
        _template_data: &serde_json::Value,
    ) -> anyhow::Result<()> {
        tracing::info!(event_type, ?recipients, "notification dispatched");
        Ok(())
    }
}

#[async_trait]
impl CertificateGenerator for LoggingCollaborators {
    async fn generate(&self, arn: &Arn, template_id: &str) -> anyhow::Result<String> {
        tracing::info!(%arn, template_id, "certificate generated");
        Ok(format!("artifact://{}/{}", arn, template_id))
    }
}

#[async_trait]
impl IntegrationClient for LoggingCollaborators {
    async fn call(&self, integration: &str, _payload: &serde_json::Value) -> anyhow::Result<()> {
        tracing::info!(integration, "integration called");
        Ok(())
    }
}

// ── Dispatcher ───────────────────────────────────────────────────────

/// One enqueued action. The key encodes `(arn, transition, action index)`.
#[derive(Clone, Debug)]
struct ActionEnvelope {
    key: String,
    arn: Arn,
    transition: TransitionId,
    spec: ActionSpec,
    attempt: u32,
}

/// An action that exhausted its retries.
#[derive(Clone, Debug)]
pub struct DeadLetter {
    pub key: String,
    pub arn: Arn,
    pub transition: TransitionId,
    pub spec: ActionSpec,
    pub attempts: u32,
    pub last_error: String,
    pub at: DateTime<Utc>,
}

struct DispatcherInner {
    notifier: Arc<dyn Notifier>,
    certificates: Arc<dyn CertificateGenerator>,
    integrations: Arc<dyn IntegrationClient>,
    audit: Arc<AuditLog>,
    completed: DashMap<String, ()>,
    dead_letters: RwLock<Vec<DeadLetter>>,
    pending: AtomicUsize,
    max_attempts: u32,
    base_backoff: Duration,
}

/// The action dispatcher: an mpsc-fed worker that routes envelopes to
/// collaborator handlers.
pub struct ActionDispatcher {
    tx: mpsc::UnboundedSender<ActionEnvelope>,
    inner: Arc<DispatcherInner>,
}

impl ActionDispatcher {
    /// Spawn the dispatch worker on the current runtime.
    pub fn spawn(
        notifier: Arc<dyn Notifier>,
        certificates: Arc<dyn CertificateGenerator>,
        integrations: Arc<dyn IntegrationClient>,
        audit: Arc<AuditLog>,
        max_attempts: u32,
        base_backoff: Duration,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<ActionEnvelope>();
        let inner = Arc::new(DispatcherInner {
            notifier,
            certificates,
            integrations,
            audit,
            completed: DashMap::new(),
            dead_letters: RwLock::new(Vec::new()),
            pending: AtomicUsize::new(0),
            max_attempts: max_attempts.max(1),
            base_backoff,
        });

        let worker_inner = Arc::clone(&inner);
        let worker_tx = tx.clone();
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let inner = Arc::clone(&worker_inner);
                let requeue = worker_tx.clone();
                tokio::spawn(async move {
                    process(inner, requeue, envelope).await;
                });
            }
        });

        Self { tx, inner }
    }

    /// Enqueue a transition's action list. Never blocks and never fails
    /// the caller; an enqueue problem is logged and the transition stands.
    pub fn enqueue(&self, arn: &Arn, transition: &TransitionId, actions: &[ActionSpec]) {
        for (index, spec) in actions.iter().enumerate() {
            let envelope = ActionEnvelope {
                key: idempotency_key(arn, transition, index),
                arn: arn.clone(),
                transition: transition.clone(),
                spec: spec.clone(),
                attempt: 0,
            };
            self.inner.pending.fetch_add(1, Ordering::SeqCst);
            if self.tx.send(envelope).is_err() {
                self.inner.pending.fetch_sub(1, Ordering::SeqCst);
                tracing::error!(
                    %arn,
                    %transition,
                    action_index = index,
                    "action dispatch failure: worker is gone"
                );
            }
        }
    }

    /// Actions neither completed nor dead-lettered yet.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Wait until every enqueued action has settled. Test and shutdown
    /// helper; production callers never wait on actions.
    pub async fn quiesce(&self) {
        while self.pending_count() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.inner.dead_letters.read().clone()
    }

    /// Whether an idempotency key already executed.
    pub fn is_completed(&self, arn: &Arn, transition: &TransitionId, index: usize) -> bool {
        self.inner
            .completed
            .contains_key(&idempotency_key(arn, transition, index))
    }
}

fn idempotency_key(arn: &Arn, transition: &TransitionId, index: usize) -> String {
    format!("{}|{}|{}", arn, transition, index)
}

async fn process(
    inner: Arc<DispatcherInner>,
    requeue: mpsc::UnboundedSender<ActionEnvelope>,
    mut envelope: ActionEnvelope,
) {
    // Idempotency: a key that already completed is skipped, not re-run.
    if inner.completed.contains_key(&envelope.key) {
        tracing::debug!(key = %envelope.key, "action already completed, skipping");
        inner.pending.fetch_sub(1, Ordering::SeqCst);
        return;
    }

    match execute(&inner, &envelope).await {
        Ok(()) => {
            inner.completed.insert(envelope.key.clone(), ());
            inner.pending.fetch_sub(1, Ordering::SeqCst);
        }
        Err(error) => {
            envelope.attempt += 1;
            if envelope.attempt < inner.max_attempts {
                let delay = inner.base_backoff * 2u32.saturating_pow(envelope.attempt - 1);
                tracing::warn!(
                    key = %envelope.key,
                    attempt = envelope.attempt,
                    ?delay,
                    %error,
                    "action failed, backing off"
                );
                tokio::time::sleep(delay).await;
                if requeue.send(envelope).is_err() {
                    inner.pending.fetch_sub(1, Ordering::SeqCst);
                }
            } else {
                tracing::error!(
                    key = %envelope.key,
                    attempts = envelope.attempt,
                    %error,
                    "action exhausted retries, dead-lettering"
                );
                inner.audit.append(DraftEvent::new(
                    envelope.arn.clone(),
                    AuditKind::ActionDeadLettered,
                    AuditActor::system("action-dispatcher"),
                    serde_json::json!({
                        "key": envelope.key,
                        "transitionId": envelope.transition.to_string(),
                        "attempts": envelope.attempt,
                        "error": error.to_string(),
                    }),
                ));
                inner.dead_letters.write().push(DeadLetter {
                    key: envelope.key,
                    arn: envelope.arn,
                    transition: envelope.transition,
                    spec: envelope.spec,
                    attempts: envelope.attempt,
                    last_error: error.to_string(),
                    at: Utc::now(),
                });
                inner.pending.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }
}

async fn execute(inner: &DispatcherInner, envelope: &ActionEnvelope) -> anyhow::Result<()> {
    match &envelope.spec {
        ActionSpec::AssignTask { role } => {
            inner
                .notifier
                .notify(
                    "task_ready",
                    std::slice::from_ref(&role.0),
                    &serde_json::json!({"arn": envelope.arn.to_string()}),
                )
                .await
        }
        ActionSpec::Notify {
            event_type,
            template,
            recipients,
        } => {
            inner
                .notifier
                .notify(
                    event_type,
                    recipients,
                    &serde_json::json!({
                        "arn": envelope.arn.to_string(),
                        "template": template,
                    }),
                )
                .await
        }
        ActionSpec::GenerateCertificate { template_id } => {
            let artifact = inner
                .certificates
                .generate(&envelope.arn, template_id)
                .await?;
            tracing::info!(arn = %envelope.arn, artifact, "certificate artifact recorded");
            Ok(())
        }
        ActionSpec::CallIntegration {
            integration,
            payload,
        } => inner.integrations.call(integration, payload).await,
    }
}
