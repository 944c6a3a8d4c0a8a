//! Error-to-response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use seva_types::EngineError;

pub type ApiResult<T> = Result<T, ApiError>;

/// An engine error carried to the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Engine(err) => match err {
                EngineError::Validation(_) | EngineError::GuardFailed { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                EngineError::Forbidden => StatusCode::FORBIDDEN,
                // Stale client state: the application moved on. Refetch
                // and retry.
                EngineError::TransitionNotFound { .. }
                | EngineError::ConcurrencyConflict { .. }
                | EngineError::QueryBudgetExhausted { .. } => StatusCode::CONFLICT,
                EngineError::ApplicationNotFound(_)
                | EngineError::DefinitionNotFound { .. }
                | EngineError::TaskNotFound(_)
                | EngineError::QueryNotFound(_) => StatusCode::NOT_FOUND,
                EngineError::ActionDispatchFailure(_) | EngineError::AuditChainBroken { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Engine(err) => err.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        }
        let body = Json(serde_json::json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
