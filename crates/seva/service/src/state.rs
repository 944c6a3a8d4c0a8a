//! Shared application state for API handlers.

use seva_engine::WorkflowEngine;
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub version: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(engine: Arc<WorkflowEngine>) -> Self {
        Self {
            engine,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }
}
