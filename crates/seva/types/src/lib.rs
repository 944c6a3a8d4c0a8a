//! Domain types for the Seva workflow engine.
//!
//! Applications move through officer review stages described by a
//! [`WorkflowDefinition`]. The definition is pinned to the application at
//! submission time, so config edits never retroactively alter an in-flight
//! case. Everything stateful (tasks, query cycles, decisions) hangs off the
//! application's ARN.

#![deny(unsafe_code)]

pub mod application;
pub mod decision;
pub mod definition;
pub mod error;
pub mod ids;
pub mod query;
pub mod task;

pub use application::{Application, DisposalType};
pub use decision::{Decision, DecisionOutcome};
pub use definition::{
    ActionSpec, ActorKind, QueryPolicy, StateDef, TransitionDef, TriggerKind, WorkflowDefinition,
};
pub use error::{EngineError, EngineResult};
pub use ids::{
    Arn, AuthorityId, DecisionId, OfficerId, QueryId, RoleId, ServiceKey, StateId, TaskId,
    TransitionId,
};
pub use query::{QueryCycle, QueryStatus};
pub use task::{Task, TaskStatus};
