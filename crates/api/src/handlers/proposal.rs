//! Handlers for the `/proposals` resource.

use axum::extract::{Path, Query, State};
use axum::Json;

use procura_core::types::DbId;
use procura_db::models::proposal::{Proposal, ProposalListParams};

use crate::error::AppResult;
use crate::handlers::rfp::AwardResponse;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/proposals?rfp_id=
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ProposalListParams>,
) -> AppResult<Json<DataResponse<Vec<Proposal>>>> {
    let proposals = state.proposals.list(&params).await?;
    Ok(Json(DataResponse { data: proposals }))
}

/// GET /api/v1/proposals/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Proposal>>> {
    let proposal = state.proposals.get(id).await?;
    Ok(Json(DataResponse { data: proposal }))
}

/// POST /api/v1/proposals/{id}/parse
pub async fn parse(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Proposal>>> {
    let proposal = state.proposals.parse(id).await?;
    Ok(Json(DataResponse { data: proposal }))
}

/// POST /api/v1/proposals/{id}/accept
pub async fn accept(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<AwardResponse>>> {
    let (proposal, rfp) = state.dispatch.accept(id).await?;
    Ok(Json(DataResponse {
        data: AwardResponse { proposal, rfp },
    }))
}

/// DELETE /api/v1/proposals/{id}
///
/// Soft delete; the DELETED proposal is returned.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Proposal>>> {
    let proposal = state.proposals.delete(id).await?;
    Ok(Json(DataResponse { data: proposal }))
}
