//! Extraction previews. Nothing is persisted.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use procura_core::extraction::{ProposalFields, RfpDraft};
use procura_core::types::DbId;

use crate::error::AppResult;
use crate::response::{DataResponse, Extracted};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExtractRfpRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ExtractProposalRequest {
    pub text: String,
    /// Match specifications against this RFP's requirements.
    #[serde(default)]
    pub rfp_id: Option<DbId>,
}

/// POST /api/v1/extract/rfp
pub async fn rfp(
    State(state): State<AppState>,
    Json(input): Json<ExtractRfpRequest>,
) -> AppResult<Json<DataResponse<Extracted<RfpDraft>>>> {
    let (draft, issues) = state.rfps.preview(&input.text).await?;
    Ok(Json(DataResponse {
        data: Extracted { value: draft, issues },
    }))
}

/// POST /api/v1/extract/proposal
pub async fn proposal(
    State(state): State<AppState>,
    Json(input): Json<ExtractProposalRequest>,
) -> AppResult<Json<DataResponse<Extracted<ProposalFields>>>> {
    let (fields, issues) = state.proposals.preview(&input.text, input.rfp_id).await?;
    Ok(Json(DataResponse {
        data: Extracted { value: fields, issues },
    }))
}
