//! The Seva workflow orchestration engine.
//!
//! The engine moves citizen applications through officer review stages
//! described by versioned workflow definitions. It coordinates, it does not
//! perform side effects inline: transitions commit under a per-application
//! lock, append one audit event each, and enqueue their side-effect actions
//! for asynchronous dispatch.
//!
//! # Architecture
//!
//! [`WorkflowEngine`] composes specialized components:
//!
//! - [`WorkflowRegistry`] — caches validated, guard-compiled definitions
//! - [`ApplicationStore`] — versioned application state with CAS updates
//! - `TaskManager` (from `seva-tasks`) — officer tasks and the inbox
//! - `AuditLog` (from `seva-audit`) — the hash-chained trail
//! - [`ActionDispatcher`] — retried, idempotent side-effect execution
//!
//! # Example
//!
//! ```rust
//! use seva_engine::{EngineBuilder, StaticDefinitionSource};
//! use seva_engine::fixtures::three_officer_chain;
//! use seva_types::{Arn, AuthorityId, ServiceKey};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let source = StaticDefinitionSource::with_definition(three_officer_chain());
//! let engine = EngineBuilder::new(Arc::new(source)).build();
//!
//! let app = engine
//!     .submit_application(
//!         Arn::new("ARN-1"),
//!         ServiceKey::new("water_connection"),
//!         1,
//!         AuthorityId::new("DIST-01"),
//!         serde_json::json!({"applicant": {"age": 34}}),
//!     )
//!     .await
//!     .unwrap();
//! assert_eq!(app.state.as_str(), "CLERK_REVIEW");
//! # }
//! ```

#![deny(unsafe_code)]

pub mod dispatcher;
pub mod engine;
pub mod executor;
pub mod fixtures;
pub mod query;
pub mod registry;
pub mod store;
pub mod sweep;

pub use dispatcher::{
    ActionDispatcher, CertificateGenerator, DeadLetter, IntegrationClient, LoggingCollaborators,
    Notifier,
};
pub use engine::{EngineBuilder, LedgerLookup, WorkflowEngine};
pub use executor::{Actor, TransitionOutcome, TransitionRequest};
pub use registry::{CompiledWorkflow, DefinitionSource, StaticDefinitionSource, WorkflowRegistry};
pub use store::{ApplicationStore, InMemoryApplicationStore};
pub use sweep::SweepReport;
