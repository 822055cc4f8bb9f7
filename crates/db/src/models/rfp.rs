//! RFP entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use procura_core::lifecycle::RfpStatus;
use procura_core::requirements::Requirements;
use procura_core::types::{DbId, Timestamp};

/// A row from the `rfps` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Rfp {
    pub id: DbId,
    pub title: String,
    pub description: String,
    pub requirements: Json<Requirements>,
    pub budget: Option<f64>,
    pub deadline: Option<Timestamp>,
    #[sqlx(try_from = "String")]
    pub status: RfpStatus,
    /// Sorted, duplicate-free.
    pub selected_vendors: Vec<DbId>,
    pub awarded_vendor: Option<DbId>,
    pub natural_language_input: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// The buyer-editable content of an RFP.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RfpContent {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub requirements: Requirements,
    pub budget: Option<f64>,
    pub deadline: Option<Timestamp>,
}

/// Insert payload for a new DRAFT RFP.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRfp {
    pub content: RfpContent,
    pub natural_language_input: Option<String>,
}

/// DTO for creating an RFP from structured fields.
pub type CreateRfp = RfpContent;

/// DTO for updating a DRAFT RFP. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRfp {
    pub title: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<Requirements>,
    pub budget: Option<f64>,
    pub deadline: Option<Timestamp>,
}

impl UpdateRfp {
    /// Apply the present fields over `current`.
    pub fn apply_to(self, current: &Rfp) -> RfpContent {
        RfpContent {
            title: self.title.unwrap_or_else(|| current.title.clone()),
            description: self
                .description
                .unwrap_or_else(|| current.description.clone()),
            requirements: self
                .requirements
                .unwrap_or_else(|| current.requirements.0.clone()),
            budget: self.budget.or(current.budget),
            deadline: self.deadline.or(current.deadline),
        }
    }
}

/// DTO for creating an RFP from natural language.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRfpFromText {
    pub text: String,
}

/// DTO for dispatching an RFP.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchRfp {
    pub vendor_ids: Vec<DbId>,
}

/// DTO for awarding an RFP.
#[derive(Debug, Clone, Deserialize)]
pub struct AwardRfp {
    pub vendor_id: DbId,
}

/// Query parameters for listing RFPs.
#[derive(Debug, Default, Deserialize)]
pub struct RfpListParams {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
