//! Read-only view of the notification outbox.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use procura_core::error::CoreError;
use procura_core::pagination::{clamp_limit, DEFAULT_LIMIT, MAX_LIMIT};
use procura_db::models::outbox::OutboundNotification;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NotificationListParams {
    pub limit: Option<i64>,
}

/// GET /api/v1/notifications
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<NotificationListParams>,
) -> AppResult<Json<DataResponse<Vec<OutboundNotification>>>> {
    let limit = clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT);
    let rows = state
        .store
        .list_notifications(limit)
        .await
        .map_err(CoreError::from)?;
    Ok(Json(DataResponse { data: rows }))
}
