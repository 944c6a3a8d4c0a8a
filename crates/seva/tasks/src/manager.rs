//! The task manager: create, claim, release, complete, and the inbox.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use seva_types::{
    Arn, AuthorityId, DecisionOutcome, EngineError, EngineResult, OfficerId, RoleId, Task, TaskId,
    TaskStatus,
};

/// Shared task state.
///
/// `active` tracks the single non-completed task per application; every
/// mutation goes through its entry so the invariant holds under concurrent
/// callers.
pub struct TaskManager {
    tasks: DashMap<TaskId, Task>,
    active: DashMap<Arn, TaskId>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
            active: DashMap::new(),
        }
    }

    /// Register a freshly created task as the application's active task.
    ///
    /// Fails if the application already has a non-completed task. The
    /// check-and-set goes through the entry so two racing creators cannot
    /// both succeed.
    pub fn create(&self, task: Task) -> EngineResult<Task> {
        match self.active.entry(task.arn.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(EngineError::Validation(format!(
                "application '{}' already has an open task",
                task.arn
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                tracing::debug!(
                    task_id = %task.id,
                    arn = %task.arn,
                    state = %task.state,
                    "task created"
                );
                slot.insert(task.id.clone());
                self.tasks.insert(task.id.clone(), task.clone());
                Ok(task)
            }
        }
    }

    pub fn get(&self, id: &TaskId) -> EngineResult<Task> {
        self.tasks
            .get(id)
            .map(|t| t.clone())
            .ok_or_else(|| EngineError::TaskNotFound(id.clone()))
    }

    /// The application's current non-completed task, if any.
    pub fn active_task(&self, arn: &Arn) -> Option<Task> {
        let id = self.active.get(arn)?.clone();
        self.tasks.get(&id).map(|t| t.clone())
    }

    /// Claim a pending task from the role pool.
    ///
    /// Any officer holding the required role may claim; a claimed task is
    /// no longer offered to the rest of the pool.
    pub fn claim(
        &self,
        id: &TaskId,
        officer: &OfficerId,
        officer_roles: &[RoleId],
    ) -> EngineResult<Task> {
        let mut task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| EngineError::TaskNotFound(id.clone()))?;

        if !officer_roles.contains(&task.role_required) {
            return Err(EngineError::Forbidden);
        }
        if task.status != TaskStatus::Pending {
            return Err(EngineError::Validation(format!(
                "task '{}' is not claimable in status {:?}",
                id, task.status
            )));
        }

        task.status = TaskStatus::InProgress;
        task.assignee = Some(officer.clone());
        tracing::info!(task_id = %id, officer = %officer, "task claimed");
        Ok(task.clone())
    }

    /// Return a claimed task to the pool.
    pub fn release(&self, id: &TaskId, officer: &OfficerId) -> EngineResult<Task> {
        let mut task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| EngineError::TaskNotFound(id.clone()))?;

        if task.assignee.as_ref() != Some(officer) {
            return Err(EngineError::Forbidden);
        }
        if task.status != TaskStatus::InProgress {
            return Err(EngineError::Validation(format!(
                "task '{}' is not releasable in status {:?}",
                id, task.status
            )));
        }

        task.status = TaskStatus::Pending;
        task.assignee = None;
        tracing::info!(task_id = %id, officer = %officer, "task released to pool");
        Ok(task.clone())
    }

    /// Complete the application's active task, recording the decision
    /// outcome. Returns the completed task, or `None` when no task was
    /// open (citizen and system states carry none).
    pub fn complete_active(
        &self,
        arn: &Arn,
        outcome: Option<DecisionOutcome>,
        remarks: Option<String>,
    ) -> Option<Task> {
        let (_, id) = self.active.remove(arn)?;
        let mut task = self.tasks.get_mut(&id)?;
        task.status = TaskStatus::Completed;
        task.decision = outcome;
        task.remarks = remarks;
        task.completed_at = Some(Utc::now());
        tracing::debug!(task_id = %id, arn = %arn, "task completed");
        Some(task.clone())
    }

    /// The officer inbox, pre-filtered to the caller's roles.
    ///
    /// A task whose required role the caller does not hold is never
    /// returned, regardless of the other filters. Pending tasks sort
    /// first, then by SLA deadline (earliest first).
    pub fn inbox(&self, filter: &InboxFilter) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|entry| {
                let task = entry.value();
                if !filter.roles.contains(&task.role_required) {
                    return false;
                }
                if let Some(authority) = &filter.authority {
                    if &task.authority_id != authority {
                        return false;
                    }
                }
                match filter.status {
                    Some(status) => task.status == status,
                    None => task.is_open(),
                }
            })
            .map(|entry| entry.value().clone())
            .collect();

        tasks.sort_by(|a, b| {
            let pending = |t: &Task| (t.status != TaskStatus::Pending) as u8;
            pending(a)
                .cmp(&pending(b))
                .then_with(|| match (a.sla_due_at, b.sla_due_at) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        tasks
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect()
    }

    /// Open tasks whose SLA deadline has passed, for the periodic sweep.
    pub fn overdue(&self, now: DateTime<Utc>) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|entry| entry.value().is_overdue(now))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of open (non-completed) tasks for an application. The engine
    /// asserts this never exceeds one.
    pub fn open_count(&self, arn: &Arn) -> usize {
        self.tasks
            .iter()
            .filter(|entry| &entry.value().arn == arn && entry.value().is_open())
            .count()
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Inbox query parameters.
#[derive(Clone, Debug)]
pub struct InboxFilter {
    /// Roles the calling officer holds. The inbox never shows work the
    /// caller cannot act on.
    pub roles: Vec<RoleId>,
    /// Restrict to one authority.
    pub authority: Option<AuthorityId>,
    /// Restrict to one status; `None` means all open tasks.
    pub status: Option<TaskStatus>,
    pub limit: usize,
    pub offset: usize,
}

impl InboxFilter {
    pub fn for_roles(roles: Vec<RoleId>) -> Self {
        Self {
            roles,
            authority: None,
            status: None,
            limit: 50,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_authority(mut self, authority: AuthorityId) -> Self {
        self.authority = Some(authority);
        self
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use seva_types::StateId;

    fn task_for(arn: &str, role: &str, due_in_hours: i64) -> Task {
        Task::new(
            Arn::new(arn),
            StateId::new("CLERK_REVIEW"),
            RoleId::new(role),
            AuthorityId::new("DIST-01"),
            Some(Utc::now() + Duration::hours(due_in_hours)),
        )
    }

    #[test]
    fn single_open_task_invariant() {
        let manager = TaskManager::new();
        manager.create(task_for("ARN-1", "CLERK", 24)).unwrap();

        let result = manager.create(task_for("ARN-1", "CLERK", 24));
        assert!(matches!(result, Err(EngineError::Validation(_))));
        assert_eq!(manager.open_count(&Arn::new("ARN-1")), 1);
    }

    #[test]
    fn complete_then_create_is_allowed() {
        let manager = TaskManager::new();
        manager.create(task_for("ARN-1", "CLERK", 24)).unwrap();
        let done = manager
            .complete_active(&Arn::new("ARN-1"), Some(DecisionOutcome::Approve), None)
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.decision, Some(DecisionOutcome::Approve));

        manager.create(task_for("ARN-1", "SENIOR_ASSISTANT", 24)).unwrap();
        assert_eq!(manager.open_count(&Arn::new("ARN-1")), 1);
    }

    #[test]
    fn claim_requires_the_role() {
        let manager = TaskManager::new();
        let task = manager.create(task_for("ARN-1", "CLERK", 24)).unwrap();

        let result = manager.claim(
            &task.id,
            &OfficerId::new("off-1"),
            &[RoleId::new("ACCOUNT_OFFICER")],
        );
        assert!(matches!(result, Err(EngineError::Forbidden)));

        let claimed = manager
            .claim(&task.id, &OfficerId::new("off-1"), &[RoleId::new("CLERK")])
            .unwrap();
        assert_eq!(claimed.status, TaskStatus::InProgress);
        assert_eq!(claimed.assignee, Some(OfficerId::new("off-1")));
    }

    #[test]
    fn double_claim_is_rejected() {
        let manager = TaskManager::new();
        let task = manager.create(task_for("ARN-1", "CLERK", 24)).unwrap();
        let clerk = vec![RoleId::new("CLERK")];

        manager.claim(&task.id, &OfficerId::new("off-1"), &clerk).unwrap();
        let result = manager.claim(&task.id, &OfficerId::new("off-2"), &clerk);
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[test]
    fn release_returns_to_pool() {
        let manager = TaskManager::new();
        let task = manager.create(task_for("ARN-1", "CLERK", 24)).unwrap();
        let clerk = vec![RoleId::new("CLERK")];
        let officer = OfficerId::new("off-1");

        manager.claim(&task.id, &officer, &clerk).unwrap();
        // Only the assignee may release.
        let result = manager.release(&task.id, &OfficerId::new("off-2"));
        assert!(matches!(result, Err(EngineError::Forbidden)));

        let released = manager.release(&task.id, &officer).unwrap();
        assert_eq!(released.status, TaskStatus::Pending);
        assert!(released.assignee.is_none());

        // Another officer can now claim it.
        manager.claim(&task.id, &OfficerId::new("off-2"), &clerk).unwrap();
    }

    #[test]
    fn inbox_never_shows_foreign_roles() {
        let manager = TaskManager::new();
        manager.create(task_for("ARN-1", "CLERK", 24)).unwrap();
        manager.create(task_for("ARN-2", "ACCOUNT_OFFICER", 24)).unwrap();

        let inbox = manager.inbox(&InboxFilter::for_roles(vec![RoleId::new("CLERK")]));
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].arn, Arn::new("ARN-1"));
    }

    #[test]
    fn inbox_orders_by_deadline() {
        let manager = TaskManager::new();
        manager.create(task_for("ARN-1", "CLERK", 72)).unwrap();
        manager.create(task_for("ARN-2", "CLERK", 2)).unwrap();
        manager.create(task_for("ARN-3", "CLERK", 24)).unwrap();

        let inbox = manager.inbox(&InboxFilter::for_roles(vec![RoleId::new("CLERK")]));
        let arns: Vec<_> = inbox.iter().map(|t| t.arn.as_str().to_string()).collect();
        assert_eq!(arns, vec!["ARN-2", "ARN-3", "ARN-1"]);
    }

    #[test]
    fn inbox_paging() {
        let manager = TaskManager::new();
        for i in 0..5 {
            manager.create(task_for(&format!("ARN-{}", i), "CLERK", 24 + i)).unwrap();
        }

        let page = manager.inbox(
            &InboxFilter::for_roles(vec![RoleId::new("CLERK")]).page(2, 2),
        );
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].arn, Arn::new("ARN-2"));
    }

    #[test]
    fn inbox_status_filter() {
        let manager = TaskManager::new();
        let task = manager.create(task_for("ARN-1", "CLERK", 24)).unwrap();
        manager.create(task_for("ARN-2", "CLERK", 24)).unwrap();
        manager
            .claim(&task.id, &OfficerId::new("off-1"), &[RoleId::new("CLERK")])
            .unwrap();

        let pending = manager.inbox(
            &InboxFilter::for_roles(vec![RoleId::new("CLERK")])
                .with_status(TaskStatus::Pending),
        );
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].arn, Arn::new("ARN-2"));
    }

    #[test]
    fn overdue_sweep_finds_late_tasks() {
        let manager = TaskManager::new();
        manager.create(task_for("ARN-1", "CLERK", -2)).unwrap();
        manager.create(task_for("ARN-2", "CLERK", 2)).unwrap();

        let overdue = manager.overdue(Utc::now());
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].arn, Arn::new("ARN-1"));
    }
}
