//! Guard language error types.

/// Errors raised while compiling a guard expression.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("parse error at line {line}, column {col}: {message}")]
    ParseError {
        line: usize,
        col: usize,
        message: String,
    },

    #[error("unexpected token: expected {expected}, found '{found}'")]
    UnexpectedToken { expected: String, found: String },

    #[error("unexpected end of expression: expected {0}")]
    UnexpectedEof(String),
}

pub type GuardResult<T> = Result<T, GuardError>;
