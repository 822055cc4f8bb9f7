//! Shared harness for pipeline integration tests.
//!
//! Wires every service against one in-memory store, a recording channel and
//! a buffered mailbox, the same way the API does at startup.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use procura_core::requirements::{Criterion, Measure, Requirements};
use procura_core::types::DbId;
use procura_db::models::rfp::{Rfp, RfpContent};
use procura_db::models::vendor::{CreateVendor, Vendor};
use procura_db::MemoryStore;
use procura_events::{EventBus, RecordingChannel};
use procura_pipeline::{
    BufferedMailbox, DispatchCoordinator, EvaluationService, InboundMessage, IntakeBridge,
    Lifecycle, ProposalService, RfpService, RuleCapability, SharedCapability, StructuredExtractor,
    VendorService,
};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub lifecycle: Lifecycle,
    pub channel: Arc<RecordingChannel>,
    pub mailbox: Arc<BufferedMailbox>,
    pub vendors: VendorService,
    pub rfps: RfpService,
    pub proposals: ProposalService,
    pub evaluation: EvaluationService,
    pub dispatch: DispatchCoordinator,
    pub intake: IntakeBridge,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_capability(Arc::new(RuleCapability::new()), TIMEOUT)
    }

    pub fn with_capability(capability: SharedCapability, extraction_timeout: Duration) -> Self {
        let store = Arc::new(MemoryStore::new());
        let lifecycle = Lifecycle::new(store.clone(), Arc::new(EventBus::default()));
        let extractor = StructuredExtractor::new(capability);
        let channel = Arc::new(RecordingChannel::new());
        let mailbox = Arc::new(BufferedMailbox::new());

        let proposals = ProposalService::new(lifecycle.clone(), extractor.clone(), extraction_timeout);
        Self {
            vendors: VendorService::new(store.clone()),
            rfps: RfpService::new(lifecycle.clone(), extractor, extraction_timeout),
            evaluation: EvaluationService::new(lifecycle.clone(), TIMEOUT),
            dispatch: DispatchCoordinator::new(lifecycle.clone(), channel.clone()),
            intake: IntakeBridge::new(lifecycle.clone(), mailbox.clone()),
            proposals,
            store,
            lifecycle,
            channel,
            mailbox,
        }
    }

    pub async fn vendor(&self, name: &str, email: &str) -> Vendor {
        self.vendors
            .create(CreateVendor {
                name: name.into(),
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

    /// A DRAFT RFP scored on price (weight 2) and delivery time (weight 1).
    pub async fn price_and_delivery_rfp(&self) -> Rfp {
        self.rfps
            .create(RfpContent {
                title: "Laptops".into(),
                description: "50 business laptops".into(),
                requirements: Requirements {
                    criteria: vec![
                        Criterion::new("price", Some(2.0), Measure::Price { ceiling: None }),
                        Criterion::new(
                            "delivery",
                            Some(1.0),
                            Measure::DeliveryTime { max_days: None },
                        ),
                    ],
                    items: Vec::new(),
                },
                budget: None,
                deadline: None,
            })
            .await
            .unwrap()
    }

    /// Push a reply from `email` into the mailbox and ingest it.
    pub async fn reply(&self, rfp_id: DbId, email: &str, message_id: &str, body: &str) -> DbId {
        self.mailbox
            .push(InboundMessage {
                message_id: Some(message_id.into()),
                from: email.into(),
                subject: format!("Re: [RFP {rfp_id}] Request for Proposal"),
                body: body.into(),
                received_at: Utc::now(),
            })
            .await;
        let report = self.intake.check_for_new_proposals().await.unwrap();
        assert_eq!(report.ingested, 1, "reply from {email} was not ingested");
        report.proposal_ids[0]
    }
}

