//! HTTP surface for the Seva workflow engine.
//!
//! The service is deliberately thin: request parsing, role extraction, and
//! error-to-status mapping. Every state change goes through the engine's
//! transition executor or query controller; the service adds nothing of its
//! own to the semantics.

#![deny(unsafe_code)]

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
