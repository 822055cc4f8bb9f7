//! Inbound mail to RECEIVED proposals.
//!
//! A message becomes a proposal when its sender is an active vendor and it
//! names a SENT RFP that vendor was selected for. Redelivered messages are
//! recognised by message id or by content hash and counted as duplicates.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;

use procura_core::error::CoreError;
use procura_core::intake::{extract_rfp_reference, extract_sender_address};
use procura_core::lifecycle::{RfpStatus, PROPOSAL_ENTITY};
use procura_core::types::{DbId, Timestamp};
use procura_db::models::proposal::NewProposal;
use procura_events::bus::event_types;
use procura_events::ProcurementEvent;

use crate::lifecycle::Lifecycle;
use crate::proposal::ProposalService;

/// One message as delivered by a mailbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub message_id: Option<String>,
    pub from: String,
    #[serde(default)]
    pub subject: String,
    pub body: String,
    #[serde(default = "Utc::now")]
    pub received_at: Timestamp,
}

/// Source of inbound mail.
#[async_trait]
pub trait InboundMailbox: Send + Sync {
    fn name(&self) -> &'static str;

    /// Messages not yet handed out. Each message is returned once.
    async fn fetch_new(&self) -> Result<Vec<InboundMessage>, CoreError>;

    /// Hand `messages` out again on the next fetch.
    async fn requeue(&self, messages: Vec<InboundMessage>) -> Result<(), CoreError>;
}

/// In-process mailbox fed over HTTP or by tests.
#[derive(Debug, Default)]
pub struct BufferedMailbox {
    queue: Mutex<VecDeque<InboundMessage>>,
}

impl BufferedMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, message: InboundMessage) {
        self.queue.lock().await.push_back(message);
    }

    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }
}

#[async_trait]
impl InboundMailbox for BufferedMailbox {
    fn name(&self) -> &'static str {
        "buffered"
    }

    async fn fetch_new(&self) -> Result<Vec<InboundMessage>, CoreError> {
        Ok(self.queue.lock().await.drain(..).collect())
    }

    async fn requeue(&self, messages: Vec<InboundMessage>) -> Result<(), CoreError> {
        let mut queue = self.queue.lock().await;
        for message in messages.into_iter().rev() {
            queue.push_front(message);
        }
        Ok(())
    }
}

/// Counts from one intake pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntakeReport {
    pub ingested: usize,
    pub duplicates: usize,
    pub skipped: usize,
    /// Ingested proposals that were also parsed in the same pass.
    pub parsed: usize,
    /// Messages that hit a store error and were put back in the mailbox.
    pub failed: usize,
    pub proposal_ids: Vec<DbId>,
}

enum Disposition {
    Ingested(DbId),
    Duplicate,
    Skipped(String),
}

#[derive(Clone)]
pub struct IntakeBridge {
    lifecycle: Lifecycle,
    mailbox: Arc<dyn InboundMailbox>,
    parser: Option<ProposalService>,
}

impl IntakeBridge {
    pub fn new(lifecycle: Lifecycle, mailbox: Arc<dyn InboundMailbox>) -> Self {
        Self {
            lifecycle,
            mailbox,
            parser: None,
        }
    }

    /// Parse each new proposal right after it is stored.
    pub fn with_auto_parse(mut self, parser: ProposalService) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Drain the mailbox and record every matching message as a proposal.
    ///
    /// Messages that match nothing are skipped. A message that hits a store
    /// error is returned to the mailbox for the next pass and the rest of
    /// the batch is still processed.
    pub async fn check_for_new_proposals(&self) -> Result<IntakeReport, CoreError> {
        let messages = self.mailbox.fetch_new().await?;
        let fetched = messages.len();
        let mut report = IntakeReport::default();
        let mut retry = Vec::new();

        for message in messages {
            let disposition = match self.ingest(&message).await {
                Ok(disposition) => disposition,
                Err(e) => {
                    tracing::warn!(
                        from = %message.from,
                        message_id = ?message.message_id,
                        error = %e,
                        "Inbound message failed, returning it to the mailbox",
                    );
                    report.failed += 1;
                    retry.push(message);
                    continue;
                }
            };
            match disposition {
                Disposition::Ingested(id) => {
                    report.ingested += 1;
                    report.proposal_ids.push(id);
                    if self.auto_parse(id).await {
                        report.parsed += 1;
                    }
                }
                Disposition::Duplicate => report.duplicates += 1,
                Disposition::Skipped(reason) => {
                    tracing::debug!(
                        from = %message.from,
                        subject = %message.subject,
                        reason = %reason,
                        "Inbound message skipped",
                    );
                    report.skipped += 1;
                }
            }
        }

        if !retry.is_empty() {
            self.mailbox.requeue(retry).await?;
        }
        if fetched > 0 {
            tracing::info!(
                mailbox = self.mailbox.name(),
                fetched,
                ingested = report.ingested,
                duplicates = report.duplicates,
                skipped = report.skipped,
                failed = report.failed,
                "Intake pass complete",
            );
        }
        Ok(report)
    }

    async fn ingest(&self, message: &InboundMessage) -> Result<Disposition, CoreError> {
        let store = self.lifecycle.store();

        let Some(sender) = extract_sender_address(&message.from) else {
            return Ok(Disposition::Skipped("no sender address".into()));
        };
        let Some(vendor) = store.find_vendor_by_email(&sender).await? else {
            return Ok(Disposition::Skipped(format!("{sender} is not a known vendor")));
        };
        if !vendor.active {
            return Ok(Disposition::Skipped(format!("vendor {} is inactive", vendor.id)));
        }
        let Some(rfp_id) = extract_rfp_reference(&message.subject, &message.body) else {
            return Ok(Disposition::Skipped("no RFP reference".into()));
        };
        let Some(rfp) = store.get_rfp(rfp_id).await? else {
            return Ok(Disposition::Skipped(format!("RFP {rfp_id} does not exist")));
        };
        if rfp.status != RfpStatus::Sent {
            return Ok(Disposition::Skipped(format!(
                "RFP {rfp_id} is {} and not accepting proposals",
                rfp.status
            )));
        }
        if !rfp.selected_vendors.contains(&vendor.id) {
            return Ok(Disposition::Skipped(format!(
                "vendor {} was not invited to RFP {rfp_id}",
                vendor.id
            )));
        }

        let input = NewProposal::new(
            rfp_id,
            vendor.id,
            message.body.trim().to_string(),
            message.message_id.clone(),
            message.received_at,
        );
        let Some(proposal) = store.insert_proposal(&input).await? else {
            tracing::debug!(rfp_id, vendor_id = vendor.id, "Duplicate proposal message ignored");
            return Ok(Disposition::Duplicate);
        };

        tracing::info!(
            proposal_id = proposal.id,
            rfp_id,
            vendor_id = vendor.id,
            status = %proposal.status,
            "Proposal received",
        );
        self.lifecycle.bus().publish(
            ProcurementEvent::new(event_types::PROPOSAL_RECEIVED)
                .with_entity(PROPOSAL_ENTITY, proposal.id)
                .with_payload(json!({ "rfp_id": rfp_id, "vendor_id": vendor.id })),
        );
        Ok(Disposition::Ingested(proposal.id))
    }

    /// A failed parse leaves the proposal RECEIVED for a manual retry.
    async fn auto_parse(&self, proposal_id: DbId) -> bool {
        let Some(parser) = &self.parser else {
            return false;
        };
        match parser.parse(proposal_id).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(proposal_id, error = %e, "Automatic proposal parse failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use procura_core::requirements::Requirements;
    use procura_db::models::rfp::{NewRfp, Rfp, RfpContent};
    use procura_db::models::vendor::{CreateVendor, Vendor};
    use procura_db::memory::FailPoint;
    use procura_db::MemoryStore;
    use procura_events::EventBus;

    use super::*;

    struct Fixture {
        store: Arc<MemoryStore>,
        lifecycle: Lifecycle,
        mailbox: Arc<BufferedMailbox>,
        bridge: IntakeBridge,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let lifecycle = Lifecycle::new(store.clone(), Arc::new(EventBus::default()));
        let mailbox = Arc::new(BufferedMailbox::new());
        let bridge = IntakeBridge::new(lifecycle.clone(), mailbox.clone());
        Fixture {
            store,
            lifecycle,
            mailbox,
            bridge,
        }
    }

    async fn vendor(lifecycle: &Lifecycle, email: &str) -> Vendor {
        lifecycle
            .store()
            .create_vendor(&CreateVendor {
                name: "Desk Co".into(),
                email: email.into(),
                contact_person: None,
                phone: None,
                address: None,
                city: None,
                country: None,
                website: None,
                notes: None,
                active: None,
            })
            .await
            .unwrap()
    }

    async fn sent_rfp(lifecycle: &Lifecycle, vendor_id: DbId) -> Rfp {
        let rfp = lifecycle
            .store()
            .create_rfp(&NewRfp {
                content: RfpContent {
                    title: "Standing desks".into(),
                    description: "12 standing desks".into(),
                    requirements: Requirements::default(),
                    budget: None,
                    deadline: None,
                },
                natural_language_input: None,
            })
            .await
            .unwrap();
        lifecycle.dispatch_rfp(rfp.id, &[vendor_id]).await.unwrap()
    }

    fn reply(message_id: Option<&str>, from: &str, subject: &str, body: &str) -> InboundMessage {
        InboundMessage {
            message_id: message_id.map(String::from),
            from: from.into(),
            subject: subject.into(),
            body: body.into(),
            received_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn matching_reply_becomes_a_received_proposal() {
        let f = fixture();
        let v = vendor(&f.lifecycle, "quotes@desk.test").await;
        let rfp = sent_rfp(&f.lifecycle, v.id).await;

        f.mailbox
            .push(reply(
                Some("<m1@desk.test>"),
                "Desk Co <Quotes@Desk.test>",
                &format!("Re: [RFP {}] Request for Proposal", rfp.id),
                "Total price $4,800, delivery in 3 weeks.",
            ))
            .await;

        let report = f.bridge.check_for_new_proposals().await.unwrap();
        assert_eq!(report.ingested, 1);
        assert_eq!(report.parsed, 0);

        let proposal = f.lifecycle.load_proposal(report.proposal_ids[0]).await.unwrap();
        assert_eq!(proposal.rfp_id, rfp.id);
        assert_eq!(proposal.vendor_id, v.id);
        assert_eq!(proposal.status, procura_core::lifecycle::ProposalStatus::Received);
        assert_eq!(f.mailbox.len().await, 0);
    }

    #[tokio::test]
    async fn redelivery_is_a_duplicate() {
        let f = fixture();
        let v = vendor(&f.lifecycle, "quotes@desk.test").await;
        let rfp = sent_rfp(&f.lifecycle, v.id).await;
        let msg = reply(
            Some("<m1@desk.test>"),
            "quotes@desk.test",
            &format!("RFP {}", rfp.id),
            "Price 4800",
        );

        f.mailbox.push(msg.clone()).await;
        f.mailbox.push(msg).await;
        let report = f.bridge.check_for_new_proposals().await.unwrap();
        assert_eq!((report.ingested, report.duplicates), (1, 1));
    }

    #[tokio::test]
    async fn unmatched_messages_are_skipped() {
        let f = fixture();
        let invited = vendor(&f.lifecycle, "quotes@desk.test").await;
        let outsider = vendor(&f.lifecycle, "other@desk.test").await;
        let rfp = sent_rfp(&f.lifecycle, invited.id).await;
        let subject = format!("RFP {}", rfp.id);

        f.mailbox.push(reply(None, "stranger@nowhere.test", &subject, "hi")).await;
        f.mailbox.push(reply(None, "quotes@desk.test", "Our quote", "no reference")).await;
        f.mailbox.push(reply(None, "quotes@desk.test", "RFP 9999", "missing rfp")).await;
        f.mailbox.push(reply(None, "other@desk.test", &subject, "not invited")).await;

        let report = f.bridge.check_for_new_proposals().await.unwrap();
        assert_eq!(report.skipped, 4);
        assert_eq!(report.ingested, 0);
        assert!(f
            .lifecycle
            .store()
            .proposals_for_rfp(rfp.id)
            .await
            .unwrap()
            .iter()
            .all(|p| p.vendor_id != outsider.id));
    }

    #[tokio::test]
    async fn store_error_requeues_the_message_and_keeps_going() {
        let f = fixture();
        let v = vendor(&f.lifecycle, "quotes@desk.test").await;
        let rfp = sent_rfp(&f.lifecycle, v.id).await;
        let subject = format!("RFP {}", rfp.id);

        for (id, body) in [
            ("<m1@desk.test>", "Price 4800"),
            ("<m2@desk.test>", "Price 4700"),
            ("<m3@desk.test>", "Price 4600"),
        ] {
            f.mailbox.push(reply(Some(id), "quotes@desk.test", &subject, body)).await;
        }
        f.store.inject_failure(FailPoint::ProposalInsert);

        let report = f.bridge.check_for_new_proposals().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.ingested, 2);
        assert_eq!(f.mailbox.len().await, 1);

        let retry = f.bridge.check_for_new_proposals().await.unwrap();
        assert_eq!(retry.failed, 0);
        assert_eq!(retry.ingested, 1);
        assert_eq!(f.mailbox.len().await, 0);

        let stored = f.lifecycle.store().proposals_for_rfp(rfp.id).await.unwrap();
        let mut ids: Vec<_> = stored.iter().filter_map(|p| p.email_message_id.clone()).collect();
        ids.sort();
        assert_eq!(ids, vec!["<m1@desk.test>", "<m2@desk.test>", "<m3@desk.test>"]);
    }

    #[test]
    fn inbound_message_defaults_received_at() {
        let msg: InboundMessage = serde_json::from_value(json!({
            "from": "a@b.test",
            "body": "hello",
        }))
        .unwrap();
        assert!(msg.message_id.is_none());
        assert!(msg.subject.is_empty());
        assert!(msg.received_at <= Utc::now());
    }
}
