//! The Entity Store seam.
//!
//! Every status-changing method is a compare-and-swap: it names the status
//! the entity must still have and fails with [`StoreError::StaleStatus`]
//! when a competing writer got there first. Multi-entity writes
//! ([`EntityStore::commit_scores`], [`EntityStore::commit_award`]) are
//! all-or-nothing.

use std::sync::Arc;

use async_trait::async_trait;

use procura_core::extraction::{ExtractionIssue, ProposalFields};
use procura_core::lifecycle::{ProposalStatus, RfpStatus};
use procura_core::types::{DbId, Timestamp};

use crate::error::StoreError;
use crate::models::outbox::{NewNotification, OutboundNotification};
use crate::models::proposal::{NewProposal, Proposal, ScoreUpdate};
use crate::models::rfp::{NewRfp, Rfp, RfpContent};
use crate::models::vendor::{CreateVendor, UpdateVendor, Vendor};

/// Shared handle used across the pipeline and API layers.
pub type SharedStore = Arc<dyn EntityStore>;

/// An RFP status change, optionally replacing `selected_vendors`.
#[derive(Debug, Clone, PartialEq)]
pub struct RfpChange {
    pub expected: RfpStatus,
    pub next: RfpStatus,
    pub selected_vendors: Option<Vec<DbId>>,
}

/// The cross-entity accept: proposal ACCEPTED, RFP AWARDED, notification
/// queued, in one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct AwardCommit {
    pub rfp_id: DbId,
    pub rfp_expected: RfpStatus,
    pub proposal_id: DbId,
    pub proposal_expected: ProposalStatus,
    pub vendor_id: DbId,
    pub notification: Option<NewNotification>,
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Cheap liveness probe.
    async fn ping(&self) -> Result<(), StoreError>;

    // -- Vendors --

    async fn create_vendor(&self, input: &CreateVendor) -> Result<Vendor, StoreError>;
    async fn get_vendor(&self, id: DbId) -> Result<Option<Vendor>, StoreError>;
    async fn find_vendor_by_email(&self, email: &str) -> Result<Option<Vendor>, StoreError>;
    async fn list_vendors(
        &self,
        include_inactive: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Vendor>, StoreError>;
    async fn update_vendor(
        &self,
        id: DbId,
        input: &UpdateVendor,
    ) -> Result<Option<Vendor>, StoreError>;
    async fn set_vendor_active(&self, id: DbId, active: bool)
        -> Result<Option<Vendor>, StoreError>;
    /// Hard delete. Returns `false` if the vendor did not exist and
    /// `Referenced` while [`vendor_is_referenced`](Self::vendor_is_referenced) holds.
    async fn delete_vendor(&self, id: DbId) -> Result<bool, StoreError>;
    /// Whether any proposal or RFP refers to the vendor.
    async fn vendor_is_referenced(&self, id: DbId) -> Result<bool, StoreError>;

    // -- RFPs --

    async fn create_rfp(&self, input: &NewRfp) -> Result<Rfp, StoreError>;
    async fn get_rfp(&self, id: DbId) -> Result<Option<Rfp>, StoreError>;
    async fn list_rfps(
        &self,
        status: Option<RfpStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Rfp>, StoreError>;
    /// SENT RFPs whose deadline is before `now`.
    async fn list_overdue_rfps(&self, now: Timestamp) -> Result<Vec<Rfp>, StoreError>;
    /// Replace the editable content while the RFP still has `expected` status.
    async fn update_rfp_content(
        &self,
        id: DbId,
        expected: RfpStatus,
        content: &RfpContent,
    ) -> Result<Rfp, StoreError>;
    async fn transition_rfp(&self, id: DbId, change: &RfpChange) -> Result<Rfp, StoreError>;
    async fn delete_rfp(&self, id: DbId, expected: RfpStatus) -> Result<(), StoreError>;

    // -- Proposals --

    /// Insert a RECEIVED proposal. Returns `None` when the message id or the
    /// `(rfp_id, vendor_id, content_hash)` triple was already recorded.
    async fn insert_proposal(&self, input: &NewProposal) -> Result<Option<Proposal>, StoreError>;
    async fn get_proposal(&self, id: DbId) -> Result<Option<Proposal>, StoreError>;
    async fn list_proposals(
        &self,
        rfp_id: Option<DbId>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Proposal>, StoreError>;
    /// Every proposal for an RFP, including DELETED ones.
    async fn proposals_for_rfp(&self, rfp_id: DbId) -> Result<Vec<Proposal>, StoreError>;
    /// Store extraction output and move the proposal to PARSED.
    async fn record_parse(
        &self,
        id: DbId,
        expected: ProposalStatus,
        fields: &ProposalFields,
        issues: &[ExtractionIssue],
    ) -> Result<Proposal, StoreError>;
    async fn transition_proposal(
        &self,
        id: DbId,
        expected: ProposalStatus,
        next: ProposalStatus,
    ) -> Result<Proposal, StoreError>;
    /// Write every score or none of them.
    async fn commit_scores(&self, updates: &[ScoreUpdate]) -> Result<Vec<Proposal>, StoreError>;
    async fn commit_award(&self, award: &AwardCommit) -> Result<(Proposal, Rfp), StoreError>;

    // -- Outbox --

    async fn enqueue_notifications(
        &self,
        items: &[NewNotification],
    ) -> Result<Vec<OutboundNotification>, StoreError>;
    /// Pending rows with fewer than `max_attempts` attempts, oldest first.
    async fn pending_notifications(
        &self,
        limit: i64,
        max_attempts: i32,
    ) -> Result<Vec<OutboundNotification>, StoreError>;
    async fn mark_notification_sent(&self, id: DbId) -> Result<(), StoreError>;
    /// Count a failed attempt; the row becomes `failed` once `max_attempts` is reached.
    async fn mark_notification_failed(
        &self,
        id: DbId,
        error: &str,
        max_attempts: i32,
    ) -> Result<(), StoreError>;
    async fn list_notifications(&self, limit: i64) -> Result<Vec<OutboundNotification>, StoreError>;
}
