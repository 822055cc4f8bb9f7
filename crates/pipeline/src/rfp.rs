//! RFP authoring: create, extract from text, edit, re-extract, delete.
//!
//! Content may only change while the RFP is DRAFT. Status changes are
//! delegated to the [`Lifecycle`].

use std::time::Duration;

use serde_json::json;

use procura_core::error::CoreError;
use procura_core::extraction::{ExtractionIssue, RfpDraft, MAX_TITLE_LENGTH};
use procura_core::lifecycle::{RfpStatus, RFP_ENTITY};
use procura_core::pagination::{clamp_limit, clamp_offset, DEFAULT_LIMIT, MAX_LIMIT};
use procura_core::requirements::validate_requirements;
use procura_core::types::DbId;
use procura_db::models::rfp::{NewRfp, Rfp, RfpContent, RfpListParams, UpdateRfp};
use procura_events::bus::event_types;
use procura_events::ProcurementEvent;

use crate::extractor::StructuredExtractor;
use crate::lifecycle::Lifecycle;
use crate::timeout::with_timeout;

#[derive(Clone)]
pub struct RfpService {
    lifecycle: Lifecycle,
    extractor: StructuredExtractor,
    extraction_timeout: Duration,
}

impl RfpService {
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

    pub async fn list(&self, params: &RfpListParams) -> Result<Vec<Rfp>, CoreError> {
        let status = params
            .status
            .as_deref()
            .map(str::parse::<RfpStatus>)
            .transpose()?;
        let limit = clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT);
        let offset = clamp_offset(params.offset);
        Ok(self.lifecycle.store().list_rfps(status, limit, offset).await?)
    }

    pub async fn get(&self, id: DbId) -> Result<Rfp, CoreError> {
        self.lifecycle.load_rfp(id).await
    }

    /// Create a DRAFT RFP from structured fields.
    pub async fn create(&self, content: RfpContent) -> Result<Rfp, CoreError> {
        self.insert(NewRfp {
            content: normalize_content(content)?,
            natural_language_input: None,
        })
        .await
    }

    /// Extract a draft from `text` and create a DRAFT RFP from it. The text
    /// is retained for re-extraction.
    pub async fn create_from_text(
        &self,
        text: &str,
    ) -> Result<(Rfp, Vec<ExtractionIssue>), CoreError> {
        let (draft, issues) = self.preview(text).await?;
        let rfp = self
            .insert(NewRfp {
                content: normalize_content(content_of(draft)?)?,
                natural_language_input: Some(text.to_string()),
            })
            .await?;
        Ok((rfp, issues))
    }

    /// Extraction only; nothing is written.
    pub async fn preview(&self, text: &str) -> Result<(RfpDraft, Vec<ExtractionIssue>), CoreError> {
        with_timeout(
            "extraction",
            self.extraction_timeout,
            self.extractor.extract_rfp(text),
        )
        .await
    }

    async fn insert(&self, input: NewRfp) -> Result<Rfp, CoreError> {
        let rfp = self.lifecycle.store().create_rfp(&input).await?;
        tracing::info!(rfp_id = rfp.id, status = %rfp.status, title = %rfp.title, "RFP created");
        self.lifecycle.bus().publish(
            ProcurementEvent::new(event_types::RFP_CREATED)
                .with_entity(RFP_ENTITY, rfp.id)
                .with_payload(json!({
                    "from_text": input.natural_language_input.is_some(),
                })),
        );
        Ok(rfp)
    }

    /// Edit a DRAFT RFP. Absent fields keep their current value.
    pub async fn update(&self, id: DbId, input: UpdateRfp) -> Result<Rfp, CoreError> {
        let input = &input;
        let rfp = self
            .lifecycle
            .with_retry(move || async move {
                let current = self.lifecycle.load_rfp(id).await?;
                ensure_draft(&current, "edited")?;
                let content = normalize_content(input.clone().apply_to(&current))?;
                Ok(self
                    .lifecycle
                    .store()
                    .update_rfp_content(id, RfpStatus::Draft, &content)
                    .await?)
            })
            .await?;
        self.published_update(&rfp, "edit");
        Ok(rfp)
    }

    /// Re-run extraction on the retained text and merge it over the current
    /// content without losing any field the RFP already has.
    pub async fn re_extract(&self, id: DbId) -> Result<(Rfp, Vec<ExtractionIssue>), CoreError> {
        let current = self.lifecycle.load_rfp(id).await?;
        ensure_draft(&current, "re-extracted")?;
        let Some(text) = current.natural_language_input.clone() else {
            return Err(CoreError::InvalidInput(format!(
                "RFP {id} was not created from text and cannot be re-extracted"
            )));
        };

        let (fresh, issues) = with_timeout(
            "extraction",
            self.extraction_timeout,
            self.extractor.draft_rfp(&text),
        )
        .await?;

        let fresh = &fresh;
        let rfp = self
            .lifecycle
            .with_retry(move || async move {
                let current = self.lifecycle.load_rfp(id).await?;
                ensure_draft(&current, "re-extracted")?;
                let merged = RfpDraft::merge_monotonic(&draft_of(&current), fresh.clone());
                let content = normalize_content(content_of(merged)?)?;
                Ok(self
                    .lifecycle
                    .store()
                    .update_rfp_content(id, RfpStatus::Draft, &content)
                    .await?)
            })
            .await?;
        self.published_update(&rfp, "re-extract");
        Ok((rfp, issues))
    }

    /// Delete a DRAFT RFP that has no proposals.
    pub async fn delete(&self, id: DbId) -> Result<(), CoreError> {
        let current = self.lifecycle.load_rfp(id).await?;
        ensure_draft(&current, "deleted")?;
        self.lifecycle
            .store()
            .delete_rfp(id, RfpStatus::Draft)
            .await
            .map_err(|e| match CoreError::from(e) {
                CoreError::Conflict(_) => {
                    CoreError::Conflict(format!("RFP {id} still has proposals"))
                }
                other => other,
            })?;
        tracing::info!(rfp_id = id, "RFP deleted");
        Ok(())
    }

    /// Manual SENT -> CLOSED.
    pub async fn close(&self, id: DbId) -> Result<Rfp, CoreError> {
        self.lifecycle.close_rfp(id, false).await
    }

    fn published_update(&self, rfp: &Rfp, reason: &str) {
        tracing::info!(rfp_id = rfp.id, reason, "RFP content updated");
        self.lifecycle.bus().publish(
            ProcurementEvent::new(event_types::RFP_UPDATED)
                .with_entity(RFP_ENTITY, rfp.id)
                .with_payload(json!({ "reason": reason })),
        );
    }
}

fn ensure_draft(rfp: &Rfp, action: &str) -> Result<(), CoreError> {
    if rfp.status == RfpStatus::Draft {
        return Ok(());
    }
    Err(CoreError::IllegalTransition {
        entity: RFP_ENTITY,
        id: rfp.id,
        from: rfp.status.to_string(),
        to: rfp.status.to_string(),
        reason: format!("only DRAFT RFPs can be {action}"),
    })
}

/// The stored content as a draft, for monotonic merging.
fn draft_of(rfp: &Rfp) -> RfpDraft {
    RfpDraft {
        title: Some(rfp.title.clone()),
        description: Some(rfp.description.clone()),
        requirements: rfp.requirements.0.clone(),
        budget: rfp.budget,
        deadline: rfp.deadline,
    }
}

fn content_of(draft: RfpDraft) -> Result<RfpContent, CoreError> {
    draft.ensure_complete()?;
    let RfpDraft {
        title: Some(title),
        description: Some(description),
        requirements,
        budget,
        deadline,
    } = draft
    else {
        return Err(CoreError::Internal("complete draft lost a mandatory field".into()));
    };
    Ok(RfpContent {
        title,
        description,
        requirements,
        budget,
        deadline,
    })
}

fn normalize_content(mut content: RfpContent) -> Result<RfpContent, CoreError> {
    content.title = content.title.trim().to_string();
    content.description = content.description.trim().to_string();
    if content.title.is_empty() {
        return Err(CoreError::InvalidInput("RFP title must not be empty".into()));
    }
    if content.title.chars().count() > MAX_TITLE_LENGTH {
        return Err(CoreError::InvalidInput(format!(
            "RFP title must be at most {MAX_TITLE_LENGTH} characters"
        )));
    }
    if content.description.is_empty() {
        return Err(CoreError::InvalidInput("RFP description must not be empty".into()));
    }
    if let Some(budget) = content.budget {
        if !budget.is_finite() || budget < 0.0 {
            return Err(CoreError::InvalidInput(format!(
                "RFP budget must be a non-negative number, got {budget}"
            )));
        }
    }
    validate_requirements(&content.requirements)?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use procura_core::requirements::{Criterion, Measure, Requirements};
    use procura_db::MemoryStore;
    use procura_events::EventBus;

    use super::*;
    use crate::capability::RuleCapability;

    fn service() -> RfpService {
        let lifecycle = Lifecycle::new(Arc::new(MemoryStore::new()), Arc::new(EventBus::default()));
        let extractor = StructuredExtractor::new(Arc::new(RuleCapability::new()));
        RfpService::new(lifecycle, extractor, Duration::from_secs(5))
    }

    fn content(title: &str) -> RfpContent {
        RfpContent {
            title: title.into(),
            description: "Laptops for the new office".into(),
            requirements: Requirements {
                criteria: vec![Criterion::new("price", None, Measure::Price { ceiling: None })],
                items: Vec::new(),
            },
            budget: Some(10_000.0),
            deadline: None,
        }
    }

    #[tokio::test]
    async fn create_starts_in_draft() {
        let rfp = service().create(content("  Laptops ")).await.unwrap();
        assert_eq!(rfp.status, RfpStatus::Draft);
        assert_eq!(rfp.title, "Laptops");
        assert!(rfp.selected_vendors.is_empty());
    }

    #[tokio::test]
    async fn blank_title_and_negative_budget_are_rejected() {
        let svc = service();
        assert_matches!(svc.create(content(" ")).await, Err(CoreError::InvalidInput(_)));
        let mut bad = content("Laptops");
        bad.budget = Some(-1.0);
        assert_matches!(svc.create(bad).await, Err(CoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn from_text_retains_the_input() {
        let text = "Need 20 monitors. Budget of $4,000. Delivery within 2 weeks.";
        let (rfp, _issues) = service().create_from_text(text).await.unwrap();
        assert_eq!(rfp.title, "Need 20 monitors");
        assert_eq!(rfp.budget, Some(4_000.0));
        assert_eq!(rfp.natural_language_input.as_deref(), Some(text));
    }

    #[tokio::test]
    async fn update_changes_only_present_fields() {
        let svc = service();
        let rfp = svc.create(content("Laptops")).await.unwrap();
        let updated = svc
            .update(
                rfp.id,
                UpdateRfp {
                    budget: Some(12_000.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Laptops");
        assert_eq!(updated.budget, Some(12_000.0));
    }

    #[tokio::test]
    async fn re_extract_requires_retained_text() {
        let svc = service();
        let rfp = svc.create(content("Laptops")).await.unwrap();
        assert_matches!(svc.re_extract(rfp.id).await, Err(CoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn delete_removes_a_draft() {
        let svc = service();
        let rfp = svc.create(content("Laptops")).await.unwrap();
        svc.delete(rfp.id).await.unwrap();
        assert_matches!(svc.get(rfp.id).await, Err(CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn list_rejects_unknown_status() {
        let params = RfpListParams {
            status: Some("OPEN".into()),
            ..Default::default()
        };
        assert_matches!(service().list(&params).await, Err(CoreError::InvalidInput(_)));
    }
}
