//! Handlers for the `/vendors` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use procura_core::types::DbId;
use procura_db::models::vendor::{CreateVendor, UpdateVendor, Vendor, VendorListParams};
use procura_pipeline::vendor::VendorRemoval;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/vendors
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<VendorListParams>,
) -> AppResult<Json<DataResponse<Vec<Vendor>>>> {
    let vendors = state.vendors.list(&params).await?;
    Ok(Json(DataResponse { data: vendors }))
}

/// POST /api/v1/vendors
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateVendor>,
) -> AppResult<(StatusCode, Json<DataResponse<Vendor>>)> {
    let vendor = state.vendors.create(input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: vendor })))
}

/// GET /api/v1/vendors/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vendor>>> {
    let vendor = state.vendors.get(id).await?;
    Ok(Json(DataResponse { data: vendor }))
}

/// PUT /api/v1/vendors/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateVendor>,
) -> AppResult<Json<DataResponse<Vendor>>> {
    let vendor = state.vendors.update(id, input).await?;
    Ok(Json(DataResponse { data: vendor }))
}

/// POST /api/v1/vendors/{id}/toggle-active
pub async fn toggle_active(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vendor>>> {
    let vendor = state.vendors.toggle_active(id).await?;
    Ok(Json(DataResponse { data: vendor }))
}

/// DELETE /api/v1/vendors/{id}
///
/// Referenced vendors are deactivated rather than removed; the body says
/// which happened.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<VendorRemoval>>> {
    let removal = state.vendors.delete(id).await?;
    Ok(Json(DataResponse { data: removal }))
}
