//! Application storage with optimistic concurrency.
//!
//! The store trait is the persistence seam: the engine only ever reads an
//! application and writes it back with a compare-and-swap on `row_version`.
//! The in-memory backend is authoritative here; a SQL backend slots in
//! behind the same trait.

use dashmap::DashMap;
use seva_types::{Application, Arn, EngineError, EngineResult};

/// Versioned application storage.
pub trait ApplicationStore: Send + Sync {
    /// Insert a new application. Fails if the ARN already exists.
    fn insert(&self, app: Application) -> EngineResult<()>;

    /// Fetch an application by ARN.
    fn get(&self, arn: &Arn) -> EngineResult<Application>;

    /// Write back an application whose `row_version` has already been
    /// bumped by the caller. The write succeeds only if the stored row
    /// still carries `expected_version`; a mismatch means a concurrent
    /// writer won and the caller must retry from a fresh read.
    fn update(&self, app: Application, expected_version: u64) -> EngineResult<()>;

    /// All ARNs currently stored, for sweeps.
    fn arns(&self) -> Vec<Arn>;
}

/// DashMap-backed store.
pub struct InMemoryApplicationStore {
    applications: DashMap<Arn, Application>,
}

impl InMemoryApplicationStore {
    pub fn new() -> Self {
        Self {
            applications: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.applications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }
}

impl Default for InMemoryApplicationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationStore for InMemoryApplicationStore {
    fn insert(&self, app: Application) -> EngineResult<()> {
        let arn = app.arn.clone();
        match self.applications.entry(arn.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(EngineError::Validation(format!(
                "application '{}' already exists",
                arn
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(app);
                Ok(())
            }
        }
    }

    fn get(&self, arn: &Arn) -> EngineResult<Application> {
        self.applications
            .get(arn)
            .map(|a| a.clone())
            .ok_or_else(|| EngineError::ApplicationNotFound(arn.clone()))
    }

    fn update(&self, app: Application, expected_version: u64) -> EngineResult<()> {
        let arn = app.arn.clone();
        let mut entry = self
            .applications
            .get_mut(&arn)
            .ok_or_else(|| EngineError::ApplicationNotFound(arn.clone()))?;

        if entry.row_version != expected_version {
            return Err(EngineError::ConcurrencyConflict { arn });
        }

        *entry = app;
        Ok(())
    }

    fn arns(&self) -> Vec<Arn> {
        self.applications.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seva_types::{AuthorityId, ServiceKey, StateId};

    fn app(arn: &str) -> Application {
        Application::submit(
            Arn::new(arn),
            ServiceKey::new("water_connection"),
            1,
            AuthorityId::new("DIST-01"),
            StateId::new("CLERK_REVIEW"),
            serde_json::json!({}),
        )
    }

    #[test]
    fn insert_then_get() {
        let store = InMemoryApplicationStore::new();
        store.insert(app("ARN-1")).unwrap();

        let loaded = store.get(&Arn::new("ARN-1")).unwrap();
        assert_eq!(loaded.row_version, 0);

        assert!(matches!(
            store.get(&Arn::new("ARN-9")),
            Err(EngineError::ApplicationNotFound(_))
        ));
    }

    #[test]
    fn duplicate_insert_rejected() {
        let store = InMemoryApplicationStore::new();
        store.insert(app("ARN-1")).unwrap();
        assert!(matches!(
            store.insert(app("ARN-1")),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn cas_detects_conflicting_writer() {
        let store = InMemoryApplicationStore::new();
        store.insert(app("ARN-1")).unwrap();

        // Two readers both load version 0.
        let mut first = store.get(&Arn::new("ARN-1")).unwrap();
        let mut second = store.get(&Arn::new("ARN-1")).unwrap();

        first.row_version += 1;
        store.update(first, 0).unwrap();

        // The second writer's expected version is stale.
        second.row_version += 1;
        let result = store.update(second, 0);
        assert!(matches!(result, Err(EngineError::ConcurrencyConflict { .. })));
    }

    #[test]
    fn retry_after_conflict_succeeds() {
        let store = InMemoryApplicationStore::new();
        store.insert(app("ARN-1")).unwrap();

        let mut writer = store.get(&Arn::new("ARN-1")).unwrap();
        writer.row_version += 1;
        store.update(writer, 0).unwrap();

        // Retry from a fresh read.
        let mut retry = store.get(&Arn::new("ARN-1")).unwrap();
        assert_eq!(retry.row_version, 1);
        retry.row_version += 1;
        store.update(retry, 1).unwrap();

        assert_eq!(store.get(&Arn::new("ARN-1")).unwrap().row_version, 2);
    }
}
