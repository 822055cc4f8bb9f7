//! Postgres-backed [`EntityStore`].

use async_trait::async_trait;
use sqlx::PgPool;

use procura_core::extraction::{ExtractionIssue, ProposalFields};
use procura_core::lifecycle::{ProposalStatus, RfpStatus, PROPOSAL_ENTITY, RFP_ENTITY};
use procura_core::types::{DbId, Timestamp};

use crate::error::StoreError;
use crate::models::outbox::{NewNotification, OutboundNotification};
use crate::models::proposal::{NewProposal, Proposal, ScoreUpdate};
use crate::models::rfp::{NewRfp, Rfp, RfpContent};
use crate::models::vendor::{CreateVendor, UpdateVendor, Vendor};
use crate::repositories::{OutboxRepo, ProposalRepo, RfpRepo, VendorRepo};
use crate::store::{AwardCommit, EntityStore, RfpChange};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Turn a compare-and-swap miss into `NotFound` or `StaleStatus`.
    async fn rfp_cas_miss(&self, id: DbId) -> StoreError {
        match RfpRepo::exists(&self.pool, id).await {
            Ok(true) => StoreError::StaleStatus {
                entity: RFP_ENTITY,
                id,
            },
            Ok(false) => StoreError::NotFound {
                entity: RFP_ENTITY,
                id,
            },
            Err(e) => e.into(),
        }
    }

    async fn proposal_cas_miss(&self, id: DbId) -> StoreError {
        match ProposalRepo::exists(&self.pool, id).await {
            Ok(true) => StoreError::StaleStatus {
                entity: PROPOSAL_ENTITY,
                id,
            },
            Ok(false) => StoreError::NotFound {
                entity: PROPOSAL_ENTITY,
                id,
            },
            Err(e) => e.into(),
        }
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }

    async fn create_vendor(&self, input: &CreateVendor) -> Result<Vendor, StoreError> {
        Ok(VendorRepo::create(&self.pool, input).await?)
    }

    async fn get_vendor(&self, id: DbId) -> Result<Option<Vendor>, StoreError> {
        Ok(VendorRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_vendor_by_email(&self, email: &str) -> Result<Option<Vendor>, StoreError> {
        Ok(VendorRepo::find_by_email(&self.pool, email).await?)
    }

    async fn list_vendors(
        &self,
        include_inactive: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Vendor>, StoreError> {
        Ok(VendorRepo::list(&self.pool, include_inactive, limit, offset).await?)
    }

    async fn update_vendor(
        &self,
        id: DbId,
        input: &UpdateVendor,
    ) -> Result<Option<Vendor>, StoreError> {
        Ok(VendorRepo::update(&self.pool, id, input).await?)
    }

    async fn set_vendor_active(
        &self,
        id: DbId,
        active: bool,
    ) -> Result<Option<Vendor>, StoreError> {
        Ok(VendorRepo::set_active(&self.pool, id, active).await?)
    }

    async fn delete_vendor(&self, id: DbId) -> Result<bool, StoreError> {
        if VendorRepo::is_referenced(&self.pool, id).await? {
            return Err(StoreError::Referenced(format!("Vendor {id} is still referenced")));
        }
        Ok(VendorRepo::delete(&self.pool, id).await?)
    }

    async fn vendor_is_referenced(&self, id: DbId) -> Result<bool, StoreError> {
        Ok(VendorRepo::is_referenced(&self.pool, id).await?)
    }

    async fn create_rfp(&self, input: &NewRfp) -> Result<Rfp, StoreError> {
        Ok(RfpRepo::create(&self.pool, input).await?)
    }

    async fn get_rfp(&self, id: DbId) -> Result<Option<Rfp>, StoreError> {
        Ok(RfpRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_rfps(
        &self,
        status: Option<RfpStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Rfp>, StoreError> {
        Ok(RfpRepo::list(&self.pool, status, limit, offset).await?)
    }

    async fn list_overdue_rfps(&self, now: Timestamp) -> Result<Vec<Rfp>, StoreError> {
        Ok(RfpRepo::list_overdue(&self.pool, now).await?)
    }

    async fn update_rfp_content(
        &self,
        id: DbId,
        expected: RfpStatus,
        content: &RfpContent,
    ) -> Result<Rfp, StoreError> {
        match RfpRepo::update_content(&self.pool, id, expected, content).await? {
            Some(rfp) => Ok(rfp),
            None => Err(self.rfp_cas_miss(id).await),
        }
    }

    async fn transition_rfp(&self, id: DbId, change: &RfpChange) -> Result<Rfp, StoreError> {
        let updated = RfpRepo::transition(
            &self.pool,
            id,
            change.expected,
            change.next,
            change.selected_vendors.as_deref(),
        )
        .await?;
        match updated {
            Some(rfp) => Ok(rfp),
            None => Err(self.rfp_cas_miss(id).await),
        }
    }

    async fn delete_rfp(&self, id: DbId, expected: RfpStatus) -> Result<(), StoreError> {
        if RfpRepo::delete(&self.pool, id, expected).await? {
            Ok(())
        } else {
            Err(self.rfp_cas_miss(id).await)
        }
    }

    async fn insert_proposal(&self, input: &NewProposal) -> Result<Option<Proposal>, StoreError> {
        Ok(ProposalRepo::insert_dedup(&self.pool, input).await?)
    }

    async fn get_proposal(&self, id: DbId) -> Result<Option<Proposal>, StoreError> {
        Ok(ProposalRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_proposals(
        &self,
        rfp_id: Option<DbId>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Proposal>, StoreError> {
        Ok(ProposalRepo::list(&self.pool, rfp_id, limit, offset).await?)
    }

    async fn proposals_for_rfp(&self, rfp_id: DbId) -> Result<Vec<Proposal>, StoreError> {
        Ok(ProposalRepo::list_for_rfp(&self.pool, rfp_id).await?)
    }

    async fn record_parse(
        &self,
        id: DbId,
        expected: ProposalStatus,
        fields: &ProposalFields,
        issues: &[ExtractionIssue],
    ) -> Result<Proposal, StoreError> {
        match ProposalRepo::record_parse(&self.pool, id, expected, fields, issues).await? {
            Some(p) => Ok(p),
            None => Err(self.proposal_cas_miss(id).await),
        }
    }

    async fn transition_proposal(
        &self,
        id: DbId,
        expected: ProposalStatus,
        next: ProposalStatus,
    ) -> Result<Proposal, StoreError> {
        match ProposalRepo::transition(&self.pool, id, expected, next).await? {
            Some(p) => Ok(p),
            None => Err(self.proposal_cas_miss(id).await),
        }
    }

    async fn commit_scores(&self, updates: &[ScoreUpdate]) -> Result<Vec<Proposal>, StoreError> {
        ProposalRepo::commit_scores(&self.pool, updates).await
    }

    async fn commit_award(&self, award: &AwardCommit) -> Result<(Proposal, Rfp), StoreError> {
        ProposalRepo::commit_award(&self.pool, award).await
    }

    async fn enqueue_notifications(
        &self,
        items: &[NewNotification],
    ) -> Result<Vec<OutboundNotification>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            rows.push(OutboxRepo::insert_in_tx(&mut *tx, item).await?);
        }
        tx.commit().await?;
        Ok(rows)
    }

    async fn pending_notifications(
        &self,
        limit: i64,
        max_attempts: i32,
    ) -> Result<Vec<OutboundNotification>, StoreError> {
        Ok(OutboxRepo::list_pending(&self.pool, limit, max_attempts).await?)
    }

    async fn mark_notification_sent(&self, id: DbId) -> Result<(), StoreError> {
        Ok(OutboxRepo::mark_sent(&self.pool, id).await?)
    }

    async fn mark_notification_failed(
        &self,
        id: DbId,
        error: &str,
        max_attempts: i32,
    ) -> Result<(), StoreError> {
        Ok(OutboxRepo::mark_failed(&self.pool, id, error, max_attempts).await?)
    }

    async fn list_notifications(&self, limit: i64) -> Result<Vec<OutboundNotification>, StoreError> {
        Ok(OutboxRepo::list_recent(&self.pool, limit).await?)
    }
}
