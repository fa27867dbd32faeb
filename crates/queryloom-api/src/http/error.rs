//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use queryloom_core::engine::executor::EngineError;
use queryloom_core::service::SessionError;

use super::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Session/engine-related errors.
    Session(SessionError),
    /// Authentication failure.
    Unauthorized(String),
    /// Validation error.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::Session(e)
    }
}

impl AppError {
    /// The HTTP status, machine code, and message this error maps to.
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Session(e @ SessionError::EmptyRequest)
            | AppError::Session(e @ SessionError::EmptyInput) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
            }
            AppError::Session(e @ SessionError::UnknownThread(_))
            | AppError::Session(e @ SessionError::Engine(EngineError::UnknownThread(_))) => {
                (StatusCode::NOT_FOUND, "THREAD_NOT_FOUND", e.to_string())
            }
            AppError::Session(e @ SessionError::Engine(EngineError::DuplicateThread(_))) => {
                (StatusCode::CONFLICT, "THREAD_CONFLICT", e.to_string())
            }
            AppError::Session(e @ SessionError::Engine(EngineError::NotSuspended(_))) => {
                (StatusCode::CONFLICT, "NOT_SUSPENDED", e.to_string())
            }
            AppError::Session(e @ SessionError::Engine(EngineError::Checkpoint(_)))
            | AppError::Session(e @ SessionError::Checkpoint(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "STORE_UNAVAILABLE",
                e.to_string(),
            ),
            AppError::Session(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "ENGINE_ERROR", e.to_string())
            }
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        ApiResponse::failure(status, code, message, Uuid::now_v7().to_string()).into_response()
    }
}
