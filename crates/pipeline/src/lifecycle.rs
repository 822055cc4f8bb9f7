//! The Lifecycle State Machine.
//!
//! Every status change in the system goes through [`Lifecycle`]. Each call
//! loads the entity, evaluates the guard from `procura_core::lifecycle`, and
//! applies the change as a compare-and-swap on the loaded status. A lost
//! race reloads and re-validates, up to [`MAX_TRANSITION_ATTEMPTS`] times.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use procura_core::error::CoreError;
use procura_core::extraction::{has_fatal, ExtractionIssue, ProposalFields};
use procura_core::lifecycle::{
    guard_proposal_accept, guard_proposal_delete, guard_proposal_evaluate, guard_proposal_parse,
    guard_rfp_award, guard_rfp_close, guard_rfp_dispatch, union_vendors, validate_proposal_transition,
    validate_rfp_transition, ProposalStatus, RfpStatus, PROPOSAL_ENTITY, RFP_ENTITY,
};
use procura_core::types::{DbId, Timestamp};
use procura_db::models::outbox::NewNotification;
use procura_db::models::proposal::{Proposal, ScoreUpdate};
use procura_db::models::rfp::Rfp;
use procura_db::store::{AwardCommit, RfpChange};
use procura_db::SharedStore;
use procura_events::bus::event_types;
use procura_events::{EventBus, ProcurementEvent};

/// Compare-and-swap attempts before giving up with `ConcurrencyConflict`.
pub const MAX_TRANSITION_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct Lifecycle {
    store: SharedStore,
    bus: Arc<EventBus>,
}

impl Lifecycle {
    pub fn new(store: SharedStore, bus: Arc<EventBus>) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub async fn load_rfp(&self, id: DbId) -> Result<Rfp, CoreError> {
        self.store.get_rfp(id).await?.ok_or(CoreError::NotFound {
            entity: RFP_ENTITY,
            id,
        })
    }

    pub async fn load_proposal(&self, id: DbId) -> Result<Proposal, CoreError> {
        self.store.get_proposal(id).await?.ok_or(CoreError::NotFound {
            entity: PROPOSAL_ENTITY,
            id,
        })
    }

    /// Run `attempt` until it stops failing with `ConcurrencyConflict`, at
    /// most [`MAX_TRANSITION_ATTEMPTS`] times.
    pub async fn with_retry<T, F, Fut>(&self, mut attempt: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut last = None;
        for n in 1..=MAX_TRANSITION_ATTEMPTS {
            match attempt().await {
                Err(e @ CoreError::ConcurrencyConflict { .. }) => {
                    tracing::debug!(attempt = n, error = %e, "Lost a status race, reloading");
                    last = Some(e);
                }
                other => return other,
            }
        }
        Err(last.unwrap_or_else(|| CoreError::Internal("no transition attempt was made".into())))
    }

    // -----------------------------------------------------------------------
    // RFP transitions
    // -----------------------------------------------------------------------

    /// DRAFT -> SENT with `vendor_ids` merged into `selected_vendors`. On a
    /// SENT RFP the merge is applied without a status change.
    pub async fn dispatch_rfp(&self, id: DbId, vendor_ids: &[DbId]) -> Result<Rfp, CoreError> {
        if vendor_ids.is_empty() {
            return Err(CoreError::InvalidInput(format!(
                "RFP {id} cannot be dispatched to an empty vendor list"
            )));
        }
        let (before, rfp) = self
            .with_retry(move || self.try_dispatch_rfp(id, vendor_ids))
            .await?;

        if before == RfpStatus::Draft {
            tracing::info!(rfp_id = id, from = %before, to = %rfp.status, "RFP status changed");
        } else {
            tracing::info!(rfp_id = id, vendors = ?rfp.selected_vendors, "RFP vendor selection extended");
        }
        self.bus.publish(
            ProcurementEvent::new(event_types::RFP_DISPATCHED)
                .with_entity(RFP_ENTITY, id)
                .with_payload(json!({
                    "from": before,
                    "to": rfp.status,
                    "selected_vendors": rfp.selected_vendors,
                })),
        );
        Ok(rfp)
    }

    async fn try_dispatch_rfp(
        &self,
        id: DbId,
        vendor_ids: &[DbId],
    ) -> Result<(RfpStatus, Rfp), CoreError> {
        let rfp = self.load_rfp(id).await?;
        let selected = union_vendors(&rfp.selected_vendors, vendor_ids);
        let next = match rfp.status {
            RfpStatus::Draft => {
                guard_rfp_dispatch(id, rfp.status, &selected)?;
                RfpStatus::Sent
            }
            RfpStatus::Sent => RfpStatus::Sent,
            other => {
                validate_rfp_transition(id, other, RfpStatus::Sent)?;
                other
            }
        };
        let change = RfpChange {
            expected: rfp.status,
            next,
            selected_vendors: Some(selected),
        };
        let updated = self.store.transition_rfp(id, &change).await?;
        Ok((rfp.status, updated))
    }

    /// SENT -> CLOSED. With `require_deadline_passed` the RFP must have an
    /// elapsed deadline.
    pub async fn close_rfp(
        &self,
        id: DbId,
        require_deadline_passed: bool,
    ) -> Result<Rfp, CoreError> {
        let rfp = self
            .with_retry(move || self.try_close_rfp(id, require_deadline_passed, Utc::now()))
            .await?;
        tracing::info!(
            rfp_id = id,
            from = %RfpStatus::Sent,
            to = %rfp.status,
            by_deadline = require_deadline_passed,
            "RFP status changed",
        );
        self.bus.publish(
            ProcurementEvent::new(event_types::RFP_CLOSED)
                .with_entity(RFP_ENTITY, id)
                .with_payload(json!({ "by_deadline": require_deadline_passed })),
        );
        Ok(rfp)
    }

    async fn try_close_rfp(
        &self,
        id: DbId,
        require_deadline_passed: bool,
        now: Timestamp,
    ) -> Result<Rfp, CoreError> {
        let rfp = self.load_rfp(id).await?;
        guard_rfp_close(id, rfp.status, rfp.deadline, now, require_deadline_passed)?;
        let change = RfpChange {
            expected: rfp.status,
            next: RfpStatus::Closed,
            selected_vendors: None,
        };
        Ok(self.store.transition_rfp(id, &change).await?)
    }

    /// Close every SENT RFP whose deadline is before `now`. Failures are
    /// logged and skipped; returns the RFPs that were closed.
    pub async fn sweep_deadlines(&self, now: Timestamp) -> Result<Vec<Rfp>, CoreError> {
        let overdue = self.store.list_overdue_rfps(now).await?;
        let mut closed = Vec::with_capacity(overdue.len());
        for rfp in overdue {
            match self.close_rfp(rfp.id, true).await {
                Ok(rfp) => closed.push(rfp),
                Err(e) => tracing::warn!(rfp_id = rfp.id, error = %e, "Deadline close skipped"),
            }
        }
        Ok(closed)
    }

    // -----------------------------------------------------------------------
    // Accept / award
    // -----------------------------------------------------------------------

    /// EVALUATED -> ACCEPTED together with RFP -> AWARDED and the queued
    /// acceptance notification, as one store commit.
    pub async fn accept_proposal(
        &self,
        proposal_id: DbId,
        notification: Option<NewNotification>,
    ) -> Result<(Proposal, Rfp), CoreError> {
        let notification = notification.as_ref();
        let (from, proposal, rfp) = self
            .with_retry(move || self.try_accept(proposal_id, notification))
            .await?;

        tracing::info!(
            proposal_id,
            rfp_id = rfp.id,
            vendor_id = proposal.vendor_id,
            from = %from,
            to = %proposal.status,
            "Proposal accepted and RFP awarded",
        );
        self.bus.publish(
            ProcurementEvent::new(event_types::PROPOSAL_ACCEPTED)
                .with_entity(PROPOSAL_ENTITY, proposal_id)
                .with_payload(json!({ "rfp_id": rfp.id, "vendor_id": proposal.vendor_id })),
        );
        self.bus.publish(
            ProcurementEvent::new(event_types::RFP_AWARDED)
                .with_entity(RFP_ENTITY, rfp.id)
                .with_payload(json!({ "vendor_id": proposal.vendor_id, "proposal_id": proposal_id })),
        );
        Ok((proposal, rfp))
    }

    async fn try_accept(
        &self,
        proposal_id: DbId,
        notification: Option<&NewNotification>,
    ) -> Result<(ProposalStatus, Proposal, Rfp), CoreError> {
        let proposal = self.load_proposal(proposal_id).await?;
        let rfp = self.load_rfp(proposal.rfp_id).await?;
        let siblings = self.store.proposals_for_rfp(rfp.id).await?;
        let rfp_has_accepted = siblings
            .iter()
            .any(|p| p.id != proposal.id && p.status == ProposalStatus::Accepted);

        guard_proposal_accept(proposal.id, proposal.status, rfp_has_accepted)?;
        if let Some(latest) = authoritative_proposal(&siblings, proposal.vendor_id) {
            if latest.id != proposal.id {
                return Err(CoreError::IllegalTransition {
                    entity: PROPOSAL_ENTITY,
                    id: proposal.id,
                    from: proposal.status.to_string(),
                    to: ProposalStatus::Accepted.to_string(),
                    reason: format!("superseded by proposal {}", latest.id),
                });
            }
        }
        guard_rfp_award(
            rfp.id,
            rfp.status,
            proposal.vendor_id,
            &rfp.selected_vendors,
            Some(proposal.status),
        )?;

        let commit = AwardCommit {
            rfp_id: rfp.id,
            rfp_expected: rfp.status,
            proposal_id: proposal.id,
            proposal_expected: proposal.status,
            vendor_id: proposal.vendor_id,
            notification: notification.cloned(),
        };
        let (accepted, awarded) = self.store.commit_award(&commit).await?;
        Ok((proposal.status, accepted, awarded))
    }

    // -----------------------------------------------------------------------
    // Proposal transitions
    // -----------------------------------------------------------------------

    /// RECEIVED -> PARSED, storing the extracted fields and issues.
    pub async fn record_parse(
        &self,
        id: DbId,
        fields: &ProposalFields,
        issues: &[ExtractionIssue],
    ) -> Result<Proposal, CoreError> {
        let proposal = self
            .with_retry(move || async move {
                let current = self.load_proposal(id).await?;
                guard_proposal_parse(id, current.status, has_fatal(issues))?;
                Ok(self
                    .store
                    .record_parse(id, current.status, fields, issues)
                    .await?)
            })
            .await?;

        tracing::info!(
            proposal_id = id,
            from = %ProposalStatus::Received,
            to = %proposal.status,
            issues = issues.len(),
            "Proposal status changed",
        );
        self.bus.publish(
            ProcurementEvent::new(event_types::PROPOSAL_PARSED)
                .with_entity(PROPOSAL_ENTITY, id)
                .with_payload(json!({ "rfp_id": proposal.rfp_id })),
        );
        Ok(proposal)
    }

    /// Any non-terminal status -> DELETED.
    pub async fn delete_proposal(&self, id: DbId) -> Result<Proposal, CoreError> {
        let (from, proposal) = self
            .with_retry(move || async move {
                let current = self.load_proposal(id).await?;
                guard_proposal_delete(id, current.status)?;
                let deleted = self
                    .store
                    .transition_proposal(id, current.status, ProposalStatus::Deleted)
                    .await?;
                Ok((current.status, deleted))
            })
            .await?;

        tracing::info!(proposal_id = id, from = %from, to = %proposal.status, "Proposal status changed");
        self.bus.publish(
            ProcurementEvent::new(event_types::PROPOSAL_DELETED)
                .with_entity(PROPOSAL_ENTITY, id)
                .with_payload(json!({ "rfp_id": proposal.rfp_id })),
        );
        Ok(proposal)
    }

    /// Commit a batch of scores all-or-nothing. PARSED proposals move to
    /// EVALUATED; EVALUATED proposals only have their score refreshed.
    ///
    /// Not retried here: a lost race invalidates the whole ranking, so the
    /// caller re-runs the evaluation.
    pub async fn commit_scores(&self, updates: &[ScoreUpdate]) -> Result<Vec<Proposal>, CoreError> {
        for update in updates {
            match update.expected {
                ProposalStatus::Parsed => {
                    guard_proposal_evaluate(update.proposal_id, update.expected, Some(update.score))?;
                }
                ProposalStatus::Evaluated if update.next == ProposalStatus::Evaluated => {
                    if !(0.0..=100.0).contains(&update.score) {
                        return Err(CoreError::Internal(format!(
                            "score {} for proposal {} is outside 0..=100",
                            update.score, update.proposal_id
                        )));
                    }
                }
                other => {
                    validate_proposal_transition(update.proposal_id, other, update.next)?;
                }
            }
        }

        let committed = self.store.commit_scores(updates).await?;
        for (update, proposal) in updates.iter().zip(&committed) {
            if update.expected != update.next {
                tracing::info!(
                    proposal_id = proposal.id,
                    from = %update.expected,
                    to = %update.next,
                    score = update.score,
                    "Proposal status changed",
                );
            }
            self.bus.publish(
                ProcurementEvent::new(event_types::PROPOSAL_EVALUATED)
                    .with_entity(PROPOSAL_ENTITY, proposal.id)
                    .with_payload(json!({ "rfp_id": proposal.rfp_id, "score": update.score })),
            );
        }
        Ok(committed)
    }
}

/// The vendor's most recent non-deleted proposal, ties broken by id. Only
/// this proposal can be ranked or accepted.
pub fn authoritative_proposal(proposals: &[Proposal], vendor_id: DbId) -> Option<&Proposal> {
    proposals
        .iter()
        .filter(|p| p.vendor_id == vendor_id && p.status != ProposalStatus::Deleted)
        .max_by_key(|p| (p.received_at, p.id))
}
