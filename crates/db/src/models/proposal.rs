//! Proposal entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use procura_core::evaluation::{Candidate, ProposalEvaluation};
use procura_core::extraction::{ExtractionIssue, ProposalFields};
use procura_core::hashing::content_hash;
use procura_core::lifecycle::ProposalStatus;
use procura_core::types::{DbId, Timestamp};

/// A row from the `proposals` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Proposal {
    pub id: DbId,
    pub rfp_id: DbId,
    pub vendor_id: DbId,
    pub proposal_content: String,
    pub content_hash: String,
    pub email_message_id: Option<String>,
    pub parsed_data: Option<Json<ProposalFields>>,
    pub extraction_issues: Json<Vec<ExtractionIssue>>,
    pub score: Option<f64>,
    pub evaluation: Option<Json<ProposalEvaluation>>,
    #[sqlx(try_from = "String")]
    pub status: ProposalStatus,
    pub received_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Proposal {
    /// The view of this proposal the evaluation engine consumes.
    pub fn as_candidate(&self) -> Candidate {
        Candidate {
            proposal_id: self.id,
            rfp_id: self.rfp_id,
            vendor_id: self.vendor_id,
            status: self.status,
            received_at: self.received_at,
            fields: self.parsed_data.as_ref().map(|j| j.0.clone()),
        }
    }
}

/// Insert payload for a newly received proposal.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProposal {
    pub rfp_id: DbId,
    pub vendor_id: DbId,
    pub proposal_content: String,
    pub content_hash: String,
    pub email_message_id: Option<String>,
    pub received_at: Timestamp,
}

impl NewProposal {
    pub fn new(
        rfp_id: DbId,
        vendor_id: DbId,
        proposal_content: String,
        email_message_id: Option<String>,
        received_at: Timestamp,
    ) -> Self {
        Self {
            rfp_id,
            vendor_id,
            content_hash: content_hash(&proposal_content),
            proposal_content,
            email_message_id,
            received_at,
        }
    }
}

/// One proposal's score write within an all-or-nothing commit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreUpdate {
    pub proposal_id: DbId,
    /// Status the proposal must still have.
    pub expected: ProposalStatus,
    pub next: ProposalStatus,
    pub score: f64,
    pub evaluation: ProposalEvaluation,
}

/// Query parameters for listing proposals.
#[derive(Debug, Default, Deserialize)]
pub struct ProposalListParams {
    pub rfp_id: Option<DbId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
