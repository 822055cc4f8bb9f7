//! The Structured Extractor.
//!
//! Wraps an [`ExtractionCapability`] with input validation, normalization
//! and the mandatory-field check. An optional fallback capability fills
//! proposal fields the primary one left absent. Never touches the store.

use procura_core::error::CoreError;
use procura_core::extraction::{
    normalize_proposal, normalize_rfp, validate_input_text, ExtractionIssue, ProposalFields,
    RfpDraft,
};
use procura_core::requirements::Requirements;

use crate::capability::SharedCapability;

#[derive(Clone)]
pub struct StructuredExtractor {
    primary: SharedCapability,
    fallback: Option<SharedCapability>,
}

impl StructuredExtractor {
    pub fn new(primary: SharedCapability) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    /// Fill fields the primary capability could not derive from `fallback`.
    pub fn with_fallback(mut self, fallback: SharedCapability) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn capability_name(&self) -> &'static str {
        self.primary.name()
    }

    /// Text to a complete RFP draft.
    ///
    /// Fails with `IncompleteExtraction` (carrying the partial draft) when
    /// the title or description could not be derived.
    pub async fn extract_rfp(
        &self,
        text: &str,
    ) -> Result<(RfpDraft, Vec<ExtractionIssue>), CoreError> {
        let (draft, issues) = self.draft_rfp(text).await?;
        draft.ensure_complete()?;
        Ok((draft, issues))
    }

    /// Like [`Self::extract_rfp`] but returns incomplete drafts as-is.
    pub async fn draft_rfp(
        &self,
        text: &str,
    ) -> Result<(RfpDraft, Vec<ExtractionIssue>), CoreError> {
        validate_input_text(text)?;
        let raw = self.primary.extract_rfp(text).await?;
        let (mut draft, mut issues) = normalize_rfp(&raw);

        if let Some(fallback) = &self.fallback {
            if !draft.missing_mandatory().is_empty() {
                let raw = fallback.extract_rfp(text).await?;
                let (secondary, _) = normalize_rfp(&raw);
                let before = draft.present_fields();
                draft = RfpDraft::merge_monotonic(&secondary, draft);
                for field in draft.present_fields() {
                    if !before.contains(&field) {
                        issues.push(ExtractionIssue::info(
                            field,
                            format!("filled by {} fallback", fallback.name()),
                        ));
                    }
                }
            }
        }

        tracing::debug!(
            capability = self.primary.name(),
            fields = ?draft.present_fields(),
            issues = issues.len(),
            "RFP extracted",
        );
        Ok((draft, issues))
    }

    /// Proposal text to typed fields. Missing fields stay `None`.
    pub async fn extract_proposal_fields(
        &self,
        text: &str,
        requirements: &Requirements,
    ) -> Result<(ProposalFields, Vec<ExtractionIssue>), CoreError> {
        validate_input_text(text)?;
        let raw = self.primary.extract_proposal(text, requirements).await?;
        let (mut fields, mut issues) = normalize_proposal(&raw);

        if let Some(fallback) = &self.fallback {
            let raw = fallback.extract_proposal(text, requirements).await?;
            let (secondary, _) = normalize_proposal(&raw);
            for field in fields.fill_absent_from(&secondary) {
                issues.push(ExtractionIssue::info(
                    field,
                    format!("filled by {} fallback", fallback.name()),
                ));
            }
        }

        tracing::debug!(
            capability = self.primary.name(),
            issues = issues.len(),
            "Proposal fields extracted",
        );
        Ok((fields, issues))
    }
}
