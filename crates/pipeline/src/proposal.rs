//! Proposal parsing and removal.

use std::time::Duration;

use procura_core::error::CoreError;
use procura_core::extraction::{ExtractionIssue, ProposalFields};
use procura_core::lifecycle::{validate_proposal_transition, ProposalStatus};
use procura_core::pagination::{clamp_limit, clamp_offset, DEFAULT_LIMIT, MAX_LIMIT};
use procura_core::requirements::Requirements;
use procura_core::types::DbId;
use procura_db::models::proposal::{Proposal, ProposalListParams};

use crate::extractor::StructuredExtractor;
use crate::lifecycle::Lifecycle;
use crate::timeout::with_timeout;

#[derive(Clone)]
pub struct ProposalService {
    lifecycle: Lifecycle,
    extractor: StructuredExtractor,
    extraction_timeout: Duration,
}

impl ProposalService {
    pub fn new(
        lifecycle: Lifecycle,
        extractor: StructuredExtractor,
        extraction_timeout: Duration,
    ) -> Self {
        Self {
            lifecycle,
            extractor,
            extraction_timeout,
        }
    }

    pub async fn list(&self, params: &ProposalListParams) -> Result<Vec<Proposal>, CoreError> {
        let limit = clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT);
        let offset = clamp_offset(params.offset);
        Ok(self
            .lifecycle
            .store()
            .list_proposals(params.rfp_id, limit, offset)
            .await?)
    }

    pub async fn get(&self, id: DbId) -> Result<Proposal, CoreError> {
        self.lifecycle.load_proposal(id).await
    }

    /// Extract fields from the stored content and move RECEIVED -> PARSED.
    ///
    /// Fields that cannot be derived stay absent; only a fatal issue (a
    /// non-object extraction) keeps the proposal in RECEIVED.
    pub async fn parse(&self, id: DbId) -> Result<Proposal, CoreError> {
        let proposal = self.lifecycle.load_proposal(id).await?;
        validate_proposal_transition(id, proposal.status, ProposalStatus::Parsed)?;
        let rfp = self.lifecycle.load_rfp(proposal.rfp_id).await?;

        let (fields, issues) = self
            .extract(&proposal.proposal_content, &rfp.requirements.0)
            .await?;
        self.lifecycle.record_parse(id, &fields, &issues).await
    }

    /// Extraction only, against an RFP's requirements when one is given.
    pub async fn preview(
        &self,
        text: &str,
        rfp_id: Option<DbId>,
    ) -> Result<(ProposalFields, Vec<ExtractionIssue>), CoreError> {
        let requirements = match rfp_id {
            Some(id) => self.lifecycle.load_rfp(id).await?.requirements.0,
            None => Requirements::default(),
        };
        self.extract(text, &requirements).await
    }

    async fn extract(
        &self,
        text: &str,
        requirements: &Requirements,
    ) -> Result<(ProposalFields, Vec<ExtractionIssue>), CoreError> {
        with_timeout(
            "extraction",
            self.extraction_timeout,
            self.extractor.extract_proposal_fields(text, requirements),
        )
        .await
    }

    /// Soft-delete: the proposal moves to DELETED and drops out of ranking.
    pub async fn delete(&self, id: DbId) -> Result<Proposal, CoreError> {
        self.lifecycle.delete_proposal(id).await
    }
}
