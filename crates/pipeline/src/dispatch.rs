//! Sends RFPs to vendors and awards them.
//!
//! Dispatch changes status first and mails second: a vendor whose message
//! fails stays in `selected_vendors`, is reported as undelivered and gets a
//! pending outbox row so the relay retries it.

use std::collections::HashSet;

use futures::future::join_all;
use serde::Serialize;

use procura_core::error::CoreError;
use procura_core::lifecycle::guard_rfp_award;
use procura_core::types::DbId;
use procura_db::models::outbox::{kind, NewNotification};
use procura_db::models::proposal::Proposal;
use procura_db::models::rfp::Rfp;
use procura_db::models::vendor::Vendor;
use procura_events::{OutgoingMessage, SharedChannel};

use crate::lifecycle::{authoritative_proposal, Lifecycle};
use crate::notices::{acceptance_notification, dispatch_message};

const VENDOR_ENTITY: &str = "Vendor";

/// Per-vendor result of a dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorDelivery {
    pub vendor_id: DbId,
    pub email: String,
    pub delivered: bool,
    pub error: Option<String>,
    /// An undelivered message was written to the outbox for retry.
    pub queued_for_retry: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchOutcome {
    pub rfp: Rfp,
    pub deliveries: Vec<VendorDelivery>,
}

impl DispatchOutcome {
    pub fn failed(&self) -> usize {
        self.deliveries.iter().filter(|d| !d.delivered).count()
    }
}

#[derive(Clone)]
pub struct DispatchCoordinator {
    lifecycle: Lifecycle,
    channel: SharedChannel,
}

impl DispatchCoordinator {
    pub fn new(lifecycle: Lifecycle, channel: SharedChannel) -> Self {
        Self { lifecycle, channel }
    }

    /// Send `rfp_id` to `vendor_ids`. A DRAFT RFP becomes SENT; a SENT RFP
    /// gains the new vendors.
    pub async fn dispatch(
        &self,
        rfp_id: DbId,
        vendor_ids: &[DbId],
    ) -> Result<DispatchOutcome, CoreError> {
        if vendor_ids.is_empty() {
            return Err(CoreError::InvalidInput(format!(
                "RFP {rfp_id} cannot be dispatched to an empty vendor list"
            )));
        }

        let mut seen = HashSet::new();
        let mut vendors = Vec::new();
        for &id in vendor_ids.iter().filter(|id| seen.insert(**id)) {
            let vendor = self.load_vendor(id).await?;
            if !vendor.active {
                return Err(CoreError::InvalidInput(format!(
                    "Vendor {id} is inactive and cannot receive RFPs"
                )));
            }
            vendors.push(vendor);
        }

        let rfp = self.lifecycle.dispatch_rfp(rfp_id, vendor_ids).await?;

        let sends = vendors.iter().map(|vendor| {
            let message = dispatch_message(&rfp, vendor);
            async move {
                let result = self.channel.send(&message).await;
                (vendor, message, result)
            }
        });
        let results = join_all(sends).await;

        let mut deliveries = Vec::with_capacity(results.len());
        for (vendor, message, result) in results {
            let delivery = match result {
                Ok(()) => VendorDelivery {
                    vendor_id: vendor.id,
                    email: vendor.email.clone(),
                    delivered: true,
                    error: None,
                    queued_for_retry: false,
                },
                Err(e) => {
                    tracing::warn!(
                        rfp_id,
                        vendor_id = vendor.id,
                        channel = self.channel.name(),
                        error = %e,
                        "RFP delivery failed",
                    );
                    let queued = self.queue_retry(rfp_id, &message).await;
                    VendorDelivery {
                        vendor_id: vendor.id,
                        email: vendor.email.clone(),
                        delivered: false,
                        error: Some(e.to_string()),
                        queued_for_retry: queued,
                    }
                }
            };
            deliveries.push(delivery);
        }

        let outcome = DispatchOutcome { rfp, deliveries };
        tracing::info!(
            rfp_id,
            vendors = outcome.deliveries.len(),
            failed = outcome.failed(),
            "RFP dispatched",
        );
        Ok(outcome)
    }

    async fn queue_retry(&self, rfp_id: DbId, message: &OutgoingMessage) -> bool {
        let row = NewNotification {
            kind: kind::RFP_DISPATCH.to_string(),
            recipient: message.to.clone(),
            subject: message.subject.clone(),
            body: message.body.clone(),
            rfp_id: Some(rfp_id),
            proposal_id: None,
        };
        match self.lifecycle.store().enqueue_notifications(&[row]).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(rfp_id, error = %e, "Failed to queue RFP delivery retry");
                false
            }
        }
    }

    /// Accept a proposal and award its RFP. The winning vendor is notified
    /// through the outbox in the same commit.
    pub async fn accept(&self, proposal_id: DbId) -> Result<(Proposal, Rfp), CoreError> {
        let proposal = self.lifecycle.load_proposal(proposal_id).await?;
        let rfp = self.lifecycle.load_rfp(proposal.rfp_id).await?;
        let vendor = self.load_vendor(proposal.vendor_id).await?;
        let notification = acceptance_notification(&rfp, &proposal, &vendor);
        self.lifecycle
            .accept_proposal(proposal_id, Some(notification))
            .await
    }

    /// Award `rfp_id` to `vendor_id` by accepting the vendor's latest
    /// non-deleted proposal.
    pub async fn award(&self, rfp_id: DbId, vendor_id: DbId) -> Result<(Proposal, Rfp), CoreError> {
        let rfp = self.lifecycle.load_rfp(rfp_id).await?;
        let proposals = self.lifecycle.store().proposals_for_rfp(rfp_id).await?;
        let authoritative = authoritative_proposal(&proposals, vendor_id);

        guard_rfp_award(
            rfp_id,
            rfp.status,
            vendor_id,
            &rfp.selected_vendors,
            authoritative.map(|p| p.status),
        )?;
        let Some(proposal) = authoritative else {
            return Err(CoreError::Internal(format!(
                "award guard passed without a proposal from vendor {vendor_id}"
            )));
        };
        self.accept(proposal.id).await
    }

    async fn load_vendor(&self, id: DbId) -> Result<Vendor, CoreError> {
        self.lifecycle
            .store()
            .get_vendor(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: VENDOR_ENTITY,
                id,
            })
    }
}
