//! Handlers for `/intake`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use procura_pipeline::{InboundMessage, IntakeReport};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Queued {
    /// Messages waiting for the next intake pass.
    pub pending: usize,
}

/// POST /api/v1/intake/messages
pub async fn push_message(
    State(state): State<AppState>,
    Json(message): Json<InboundMessage>,
) -> AppResult<(StatusCode, Json<DataResponse<Queued>>)> {
    if message.from.trim().is_empty() {
        return Err(AppError::BadRequest("'from' must not be empty".into()));
    }
    if message.body.trim().is_empty() {
        return Err(AppError::BadRequest("'body' must not be empty".into()));
    }
    state.mailbox.push(message).await;
    let pending = state.mailbox.len().await;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: Queued { pending } })))
}

/// POST /api/v1/intake/check
pub async fn check(State(state): State<AppState>) -> AppResult<Json<DataResponse<IntakeReport>>> {
    let report = state.intake.check_for_new_proposals().await?;
    Ok(Json(DataResponse { data: report }))
}
