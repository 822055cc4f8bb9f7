use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use procura_core::error::CoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `procura_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut partial = None;
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::InvalidInput(msg) => {
                    (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg.clone())
                }
                CoreError::IncompleteExtraction { message, partial: draft } => {
                    partial = Some(draft.clone());
                    (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "INCOMPLETE_EXTRACTION",
                        message.clone(),
                    )
                }
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::IllegalTransition { .. } => {
                    (StatusCode::CONFLICT, "ILLEGAL_TRANSITION", core.to_string())
                }
                CoreError::EvaluationPrecondition(msg) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "EVALUATION_PRECONDITION",
                    msg.clone(),
                ),
                CoreError::ConcurrencyConflict { .. } => {
                    (StatusCode::CONFLICT, "CONCURRENCY_CONFLICT", core.to_string())
                }
                CoreError::DependencyUnavailable { dependency, message } => {
                    tracing::warn!(dependency, error = %message, "Dependency unavailable");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "DEPENDENCY_UNAVAILABLE",
                        format!("{dependency} is unavailable"),
                    )
                }
                CoreError::Timeout { .. } => {
                    (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", core.to_string())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(partial) = partial {
            body["partial"] = partial;
        }

        (status, axum::Json(body)).into_response()
    }
}
