//! Handlers for the `/rfps` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use procura_core::evaluation::ComparisonResult;
use procura_core::types::DbId;
use procura_db::models::proposal::Proposal;
use procura_db::models::rfp::{
    AwardRfp, CreateRfp, CreateRfpFromText, DispatchRfp, Rfp, RfpListParams, UpdateRfp,
};
use procura_pipeline::DispatchOutcome;

use crate::error::AppResult;
use crate::response::{DataResponse, Extracted};
use crate::state::AppState;

/// The accepted proposal and the RFP it won.
#[derive(Debug, Serialize)]
pub struct AwardResponse {
    pub proposal: Proposal,
    pub rfp: Rfp,
}

/// GET /api/v1/rfps
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<RfpListParams>,
) -> AppResult<Json<DataResponse<Vec<Rfp>>>> {
    let rfps = state.rfps.list(&params).await?;
    Ok(Json(DataResponse { data: rfps }))
}

/// POST /api/v1/rfps
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateRfp>,
) -> AppResult<(StatusCode, Json<DataResponse<Rfp>>)> {
    let rfp = state.rfps.create(input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: rfp })))
}

/// POST /api/v1/rfps/from-text
pub async fn create_from_text(
    State(state): State<AppState>,
    Json(input): Json<CreateRfpFromText>,
) -> AppResult<(StatusCode, Json<DataResponse<Extracted<Rfp>>>)> {
    let (rfp, issues) = state.rfps.create_from_text(&input.text).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: Extracted { value: rfp, issues },
        }),
    ))
}

/// GET /api/v1/rfps/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Rfp>>> {
    let rfp = state.rfps.get(id).await?;
    Ok(Json(DataResponse { data: rfp }))
}

/// PUT /api/v1/rfps/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateRfp>,
) -> AppResult<Json<DataResponse<Rfp>>> {
    let rfp = state.rfps.update(id, input).await?;
    Ok(Json(DataResponse { data: rfp }))
}

/// DELETE /api/v1/rfps/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<DbId>) -> AppResult<StatusCode> {
    state.rfps.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/rfps/{id}/dispatch
pub async fn dispatch(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<DispatchRfp>,
) -> AppResult<Json<DataResponse<DispatchOutcome>>> {
    let outcome = state.dispatch.dispatch(id, &input.vendor_ids).await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// POST /api/v1/rfps/{id}/award
pub async fn award(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<AwardRfp>,
) -> AppResult<Json<DataResponse<AwardResponse>>> {
    let (proposal, rfp) = state.dispatch.award(id, input.vendor_id).await?;
    Ok(Json(DataResponse {
        data: AwardResponse { proposal, rfp },
    }))
}

/// POST /api/v1/rfps/{id}/close
pub async fn close(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Rfp>>> {
    let rfp = state.rfps.close(id).await?;
    Ok(Json(DataResponse { data: rfp }))
}

/// POST /api/v1/rfps/{id}/re-extract
pub async fn re_extract(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Extracted<Rfp>>>> {
    let (rfp, issues) = state.rfps.re_extract(id).await?;
    Ok(Json(DataResponse {
        data: Extracted { value: rfp, issues },
    }))
}

/// POST /api/v1/rfps/{id}/evaluate
pub async fn evaluate(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<ComparisonResult>>> {
    let result = state.evaluation.evaluate_rfp(id).await?;
    Ok(Json(DataResponse { data: result }))
}
