//! The definition registry: validated, guard-compiled workflow definitions
//! behind an explicitly owned cache.
//!
//! Definitions are immutable once cached. A config edit publishes a new
//! version; `invalidate`/`reload` exist for operator-driven refresh, and an
//! application pinned to an old version keeps running against it.

use dashmap::DashMap;
use seva_guard::GuardExpr;
use seva_types::{
    EngineError, EngineResult, ServiceKey, TransitionId, WorkflowDefinition,
};
use std::collections::HashMap;
use std::sync::Arc;

/// The Config Registry collaborator: the engine's only source of workflow
/// definitions. Read-only and versioned.
pub trait DefinitionSource: Send + Sync {
    fn load(&self, service_key: &ServiceKey, version: u32) -> EngineResult<WorkflowDefinition>;
}

/// A definition that passed validation, with every guard compiled.
pub struct CompiledWorkflow {
    pub definition: WorkflowDefinition,
    guards: HashMap<TransitionId, GuardExpr>,
}

impl CompiledWorkflow {
    /// Validate a definition and compile its guards.
    ///
    /// This is the load-time rejection point: structural problems, unknown
    /// action kinds (already rejected by deserialization), and malformed
    /// guard expressions all fail here, never during a transition.
    pub fn compile(definition: WorkflowDefinition) -> EngineResult<Self> {
        definition.validate()?;

        let mut guards = HashMap::new();
        for transition in &definition.transitions {
            if let Some(source) = &transition.guard {
                let expr = seva_guard::compile(source).map_err(|e| {
                    EngineError::Validation(format!(
                        "guard on transition '{}' is malformed: {}",
                        transition.id, e
                    ))
                })?;
                guards.insert(transition.id.clone(), expr);
            }
        }

        Ok(Self { definition, guards })
    }

    /// The compiled guard for a transition, if it has one.
    pub fn guard_for(&self, transition: &TransitionId) -> Option<&GuardExpr> {
        self.guards.get(transition)
    }
}

/// Cache of compiled workflows keyed by `(service_key, version)`.
pub struct WorkflowRegistry {
    source: Arc<dyn DefinitionSource>,
    cache: DashMap<(ServiceKey, u32), Arc<CompiledWorkflow>>,
}

impl WorkflowRegistry {
    pub fn new(source: Arc<dyn DefinitionSource>) -> Self {
        Self {
            source,
            cache: DashMap::new(),
        }
    }

    /// Get a compiled workflow, loading and validating on a cache miss.
    pub fn get(
        &self,
        service_key: &ServiceKey,
        version: u32,
    ) -> EngineResult<Arc<CompiledWorkflow>> {
        let key = (service_key.clone(), version);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(Arc::clone(&cached));
        }

        let definition = self.source.load(service_key, version)?;
        let compiled = Arc::new(CompiledWorkflow::compile(definition)?);
        tracing::info!(service = %service_key, version, "workflow definition loaded");
        self.cache.insert(key, Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Drop a cached entry. In-flight holders keep their `Arc`; the next
    /// `get` reloads from the source.
    pub fn invalidate(&self, service_key: &ServiceKey, version: u32) {
        self.cache.remove(&(service_key.clone(), version));
    }

    /// Invalidate and immediately reload.
    pub fn reload(
        &self,
        service_key: &ServiceKey,
        version: u32,
    ) -> EngineResult<Arc<CompiledWorkflow>> {
        self.invalidate(service_key, version);
        self.get(service_key, version)
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

/// An in-memory definition source for seeding and tests.
pub struct StaticDefinitionSource {
    definitions: HashMap<(ServiceKey, u32), WorkflowDefinition>,
}

impl StaticDefinitionSource {
    pub fn new() -> Self {
        Self {
            definitions: HashMap::new(),
        }
    }

    pub fn with_definition(definition: WorkflowDefinition) -> Self {
        let mut source = Self::new();
        source.insert(definition);
        source
    }

    pub fn insert(&mut self, definition: WorkflowDefinition) {
        self.definitions.insert(
            (definition.service_key.clone(), definition.version),
            definition,
        );
    }
}

impl Default for StaticDefinitionSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DefinitionSource for StaticDefinitionSource {
    fn load(&self, service_key: &ServiceKey, version: u32) -> EngineResult<WorkflowDefinition> {
        self.definitions
            .get(&(service_key.clone(), version))
            .cloned()
            .ok_or_else(|| EngineError::DefinitionNotFound {
                service_key: service_key.clone(),
                version,
            })
    }
}
