//! In-process [`EntityStore`] used by tests and `STORE_BACKEND=memory`.
//!
//! All state lives behind one `RwLock`; every mutating method takes the
//! write lock for its whole body, which makes each compare-and-swap and
//! each multi-entity commit linearizable.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use tokio::sync::RwLock;

use procura_core::extraction::{ExtractionIssue, ProposalFields};
use procura_core::lifecycle::{ProposalStatus, RfpStatus, PROPOSAL_ENTITY, RFP_ENTITY};
use procura_core::types::{DbId, Timestamp};

use crate::error::StoreError;
use crate::models::outbox::{delivery_status, NewNotification, OutboundNotification};
use crate::models::proposal::{NewProposal, Proposal, ScoreUpdate};
use crate::models::rfp::{NewRfp, Rfp, RfpContent};
use crate::models::vendor::{CreateVendor, UpdateVendor, Vendor};
use crate::store::{AwardCommit, EntityStore, RfpChange};

const VENDOR_ENTITY: &str = "Vendor";

/// Operations whose next invocation can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// `commit_award` fails after validating, before anything is applied.
    Award,
    /// `commit_scores` fails after validating, before anything is applied.
    Scores,
    /// `insert_proposal` fails before the duplicate check.
    ProposalInsert,
}

#[derive(Default)]
struct State {
    next_id: DbId,
    vendors: BTreeMap<DbId, Vendor>,
    rfps: BTreeMap<DbId, Rfp>,
    proposals: BTreeMap<DbId, Proposal>,
    outbox: BTreeMap<DbId, OutboundNotification>,
}

impl State {
    fn allocate_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn email_taken(&self, email: &str, except: Option<DbId>) -> bool {
        self.vendors
            .values()
            .any(|v| v.email == email && Some(v.id) != except)
    }

    /// A proposal or an RFP's vendor selection still points at the vendor.
    fn vendor_referenced(&self, id: DbId) -> bool {
        self.proposals.values().any(|p| p.vendor_id == id)
            || self
                .rfps
                .values()
                .any(|r| r.selected_vendors.contains(&id) || r.awarded_vendor == Some(id))
    }

    fn rfp_cas(&mut self, id: DbId, expected: RfpStatus) -> Result<&mut Rfp, StoreError> {
        let rfp = self.rfps.get_mut(&id).ok_or(StoreError::NotFound {
            entity: RFP_ENTITY,
            id,
        })?;
        if rfp.status != expected {
            return Err(StoreError::StaleStatus {
                entity: RFP_ENTITY,
                id,
            });
        }
        Ok(rfp)
    }

    fn proposal_cas(
        &mut self,
        id: DbId,
        expected: ProposalStatus,
    ) -> Result<&mut Proposal, StoreError> {
        let proposal = self.proposals.get_mut(&id).ok_or(StoreError::NotFound {
            entity: PROPOSAL_ENTITY,
            id,
        })?;
        if proposal.status != expected {
            return Err(StoreError::StaleStatus {
                entity: PROPOSAL_ENTITY,
                id,
            });
        }
        Ok(proposal)
    }

    fn push_notification(&mut self, item: &NewNotification) -> OutboundNotification {
        let row = OutboundNotification {
            id: self.allocate_id(),
            kind: item.kind.clone(),
            recipient: item.recipient.clone(),
            subject: item.subject.clone(),
            body: item.body.clone(),
            rfp_id: item.rfp_id,
            proposal_id: item.proposal_id,
            status: delivery_status::PENDING.to_string(),
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            sent_at: None,
        };
        self.outbox.insert(row.id, row.clone());
        row
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    fail_award: AtomicBool,
    fail_scores: AtomicBool,
    fail_proposal_insert: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call at `point` fail with [`StoreError::Unavailable`].
    pub fn inject_failure(&self, point: FailPoint) {
        match point {
            FailPoint::Award => self.fail_award.store(true, Ordering::SeqCst),
            FailPoint::Scores => self.fail_scores.store(true, Ordering::SeqCst),
            FailPoint::ProposalInsert => self.fail_proposal_insert.store(true, Ordering::SeqCst),
        }
    }

    fn take_failure(flag: &AtomicBool, what: &str) -> Result<(), StoreError> {
        if flag.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("injected failure in {what}")));
        }
        Ok(())
    }
}

fn page<T: Clone>(items: impl Iterator<Item = T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .skip(usize::try_from(offset).unwrap_or(0))
        .take(usize::try_from(limit).unwrap_or(0))
        .collect()
}

fn apply_if_some(target: &mut Option<String>, value: &Option<String>) {
    if value.is_some() {
        target.clone_from(value);
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    // -- Vendors --

    async fn create_vendor(&self, input: &CreateVendor) -> Result<Vendor, StoreError> {
        let mut state = self.state.write().await;
        if state.email_taken(&input.email, None) {
            return Err(StoreError::UniqueViolation(
                "duplicate value violates unique constraint: uq_vendors_email".to_string(),
            ));
        }
        let now = Utc::now();
        let vendor = Vendor {
            id: state.allocate_id(),
            name: input.name.clone(),
            email: input.email.clone(),
            contact_person: input.contact_person.clone(),
            phone: input.phone.clone(),
            address: input.address.clone(),
            city: input.city.clone(),
            country: input.country.clone(),
            website: input.website.clone(),
            notes: input.notes.clone(),
            active: input.active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        state.vendors.insert(vendor.id, vendor.clone());
        Ok(vendor)
    }

    async fn get_vendor(&self, id: DbId) -> Result<Option<Vendor>, StoreError> {
        Ok(self.state.read().await.vendors.get(&id).cloned())
    }

    async fn find_vendor_by_email(&self, email: &str) -> Result<Option<Vendor>, StoreError> {
        let state = self.state.read().await;
        Ok(state.vendors.values().find(|v| v.email == email).cloned())
    }

    async fn list_vendors(
        &self,
        include_inactive: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Vendor>, StoreError> {
        let state = self.state.read().await;
        let mut vendors: Vec<&Vendor> = state
            .vendors
            .values()
            .filter(|v| include_inactive || v.active)
            .collect();
        vendors.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(page(vendors.into_iter().cloned(), limit, offset))
    }

    async fn update_vendor(
        &self,
        id: DbId,
        input: &UpdateVendor,
    ) -> Result<Option<Vendor>, StoreError> {
        let mut state = self.state.write().await;
        if let Some(email) = &input.email {
            if state.email_taken(email, Some(id)) {
                return Err(StoreError::UniqueViolation(
                    "duplicate value violates unique constraint: uq_vendors_email".to_string(),
                ));
            }
        }
        let Some(vendor) = state.vendors.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = &input.name {
            vendor.name.clone_from(name);
        }
        if let Some(email) = &input.email {
            vendor.email.clone_from(email);
        }
        apply_if_some(&mut vendor.contact_person, &input.contact_person);
        apply_if_some(&mut vendor.phone, &input.phone);
        apply_if_some(&mut vendor.address, &input.address);
        apply_if_some(&mut vendor.city, &input.city);
        apply_if_some(&mut vendor.country, &input.country);
        apply_if_some(&mut vendor.website, &input.website);
        apply_if_some(&mut vendor.notes, &input.notes);
        vendor.updated_at = Utc::now();
        Ok(Some(vendor.clone()))
    }

    async fn set_vendor_active(
        &self,
        id: DbId,
        active: bool,
    ) -> Result<Option<Vendor>, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.vendors.get_mut(&id).map(|v| {
            v.active = active;
            v.updated_at = Utc::now();
            v.clone()
        }))
    }

    async fn delete_vendor(&self, id: DbId) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        if state.vendor_referenced(id) {
            return Err(StoreError::Referenced(format!(
                "{VENDOR_ENTITY} {id} is still referenced"
            )));
        }
        Ok(state.vendors.remove(&id).is_some())
    }

    async fn vendor_is_referenced(&self, id: DbId) -> Result<bool, StoreError> {
        Ok(self.state.read().await.vendor_referenced(id))
    }

    // -- RFPs --

    async fn create_rfp(&self, input: &NewRfp) -> Result<Rfp, StoreError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let c = &input.content;
        let rfp = Rfp {
            id: state.allocate_id(),
            title: c.title.clone(),
            description: c.description.clone(),
            requirements: Json(c.requirements.clone()),
            budget: c.budget,
            deadline: c.deadline,
            status: RfpStatus::Draft,
            selected_vendors: Vec::new(),
            awarded_vendor: None,
            natural_language_input: input.natural_language_input.clone(),
            created_at: now,
            updated_at: now,
        };
        state.rfps.insert(rfp.id, rfp.clone());
        Ok(rfp)
    }

    async fn get_rfp(&self, id: DbId) -> Result<Option<Rfp>, StoreError> {
        Ok(self.state.read().await.rfps.get(&id).cloned())
    }

    async fn list_rfps(
        &self,
        status: Option<RfpStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Rfp>, StoreError> {
        let state = self.state.read().await;
        let rows = state
            .rfps
            .values()
            .rev()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned();
        Ok(page(rows, limit, offset))
    }

    async fn list_overdue_rfps(&self, now: Timestamp) -> Result<Vec<Rfp>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .rfps
            .values()
            .filter(|r| r.status == RfpStatus::Sent && r.deadline.is_some_and(|d| d < now))
            .cloned()
            .collect())
    }

    async fn update_rfp_content(
        &self,
        id: DbId,
        expected: RfpStatus,
        content: &RfpContent,
    ) -> Result<Rfp, StoreError> {
        let mut state = self.state.write().await;
        let rfp = state.rfp_cas(id, expected)?;
        rfp.title.clone_from(&content.title);
        rfp.description.clone_from(&content.description);
        rfp.requirements = Json(content.requirements.clone());
        rfp.budget = content.budget;
        rfp.deadline = content.deadline;
        rfp.updated_at = Utc::now();
        Ok(rfp.clone())
    }

    async fn transition_rfp(&self, id: DbId, change: &RfpChange) -> Result<Rfp, StoreError> {
        let mut state = self.state.write().await;
        let rfp = state.rfp_cas(id, change.expected)?;
        rfp.status = change.next;
        if let Some(vendors) = &change.selected_vendors {
            rfp.selected_vendors.clone_from(vendors);
        }
        rfp.updated_at = Utc::now();
        Ok(rfp.clone())
    }

    async fn delete_rfp(&self, id: DbId, expected: RfpStatus) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.rfp_cas(id, expected)?;
        if state.proposals.values().any(|p| p.rfp_id == id) {
            return Err(StoreError::UniqueViolation(format!(
                "{RFP_ENTITY} {id} still has proposals"
            )));
        }
        state.rfps.remove(&id);
        Ok(())
    }

    // -- Proposals --

    async fn insert_proposal(&self, input: &NewProposal) -> Result<Option<Proposal>, StoreError> {
        Self::take_failure(&self.fail_proposal_insert, "insert_proposal")?;
        let mut state = self.state.write().await;
        let duplicate = state.proposals.values().any(|p| {
            (input.email_message_id.is_some() && p.email_message_id == input.email_message_id)
                || (p.rfp_id == input.rfp_id
                    && p.vendor_id == input.vendor_id
                    && p.content_hash == input.content_hash)
        });
        if duplicate {
            return Ok(None);
        }
        if !state.rfps.contains_key(&input.rfp_id) {
            return Err(StoreError::NotFound {
                entity: RFP_ENTITY,
                id: input.rfp_id,
            });
        }
        if !state.vendors.contains_key(&input.vendor_id) {
            return Err(StoreError::NotFound {
                entity: VENDOR_ENTITY,
                id: input.vendor_id,
            });
        }
        let proposal = Proposal {
            id: state.allocate_id(),
            rfp_id: input.rfp_id,
            vendor_id: input.vendor_id,
            proposal_content: input.proposal_content.clone(),
            content_hash: input.content_hash.clone(),
            email_message_id: input.email_message_id.clone(),
            parsed_data: None,
            extraction_issues: Json(Vec::new()),
            score: None,
            evaluation: None,
            status: ProposalStatus::Received,
            received_at: input.received_at,
            updated_at: Utc::now(),
        };
        state.proposals.insert(proposal.id, proposal.clone());
        Ok(Some(proposal))
    }

    async fn get_proposal(&self, id: DbId) -> Result<Option<Proposal>, StoreError> {
        Ok(self.state.read().await.proposals.get(&id).cloned())
    }

    async fn list_proposals(
        &self,
        rfp_id: Option<DbId>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Proposal>, StoreError> {
        let state = self.state.read().await;
        let mut rows: Vec<&Proposal> = state
            .proposals
            .values()
            .filter(|p| rfp_id.map_or(true, |id| p.rfp_id == id))
            .collect();
        rows.sort_by(|a, b| b.received_at.cmp(&a.received_at).then(b.id.cmp(&a.id)));
        Ok(page(rows.into_iter().cloned(), limit, offset))
    }

    async fn proposals_for_rfp(&self, rfp_id: DbId) -> Result<Vec<Proposal>, StoreError> {
        let state = self.state.read().await;
        let mut rows: Vec<Proposal> = state
            .proposals
            .values()
            .filter(|p| p.rfp_id == rfp_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.received_at.cmp(&b.received_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn record_parse(
        &self,
        id: DbId,
        expected: ProposalStatus,
        fields: &ProposalFields,
        issues: &[ExtractionIssue],
    ) -> Result<Proposal, StoreError> {
        let mut state = self.state.write().await;
        let proposal = state.proposal_cas(id, expected)?;
        proposal.parsed_data = Some(Json(fields.clone()));
        proposal.extraction_issues = Json(issues.to_vec());
        proposal.status = ProposalStatus::Parsed;
        proposal.updated_at = Utc::now();
        Ok(proposal.clone())
    }

    async fn transition_proposal(
        &self,
        id: DbId,
        expected: ProposalStatus,
        next: ProposalStatus,
    ) -> Result<Proposal, StoreError> {
        let mut state = self.state.write().await;
        let proposal = state.proposal_cas(id, expected)?;
        proposal.status = next;
        proposal.updated_at = Utc::now();
        Ok(proposal.clone())
    }

    async fn commit_scores(&self, updates: &[ScoreUpdate]) -> Result<Vec<Proposal>, StoreError> {
        let mut state = self.state.write().await;
        for update in updates {
            state.proposal_cas(update.proposal_id, update.expected)?;
        }
        Self::take_failure(&self.fail_scores, "commit_scores")?;

        let now = Utc::now();
        let mut results = Vec::with_capacity(updates.len());
        for update in updates {
            let proposal = state.proposal_cas(update.proposal_id, update.expected)?;
            proposal.score = Some(update.score);
            proposal.evaluation = Some(Json(update.evaluation.clone()));
            proposal.status = update.next;
            proposal.updated_at = now;
            results.push(proposal.clone());
        }
        Ok(results)
    }

    async fn commit_award(&self, award: &AwardCommit) -> Result<(Proposal, Rfp), StoreError> {
        let mut state = self.state.write().await;

        let rfp = state.rfp_cas(award.rfp_id, award.rfp_expected)?;
        if !rfp.selected_vendors.contains(&award.vendor_id) {
            return Err(StoreError::StaleStatus {
                entity: RFP_ENTITY,
                id: award.rfp_id,
            });
        }
        let proposal = state.proposal_cas(award.proposal_id, award.proposal_expected)?;
        if proposal.rfp_id != award.rfp_id {
            return Err(StoreError::StaleStatus {
                entity: PROPOSAL_ENTITY,
                id: award.proposal_id,
            });
        }
        let already_accepted = state
            .proposals
            .values()
            .any(|p| p.rfp_id == award.rfp_id && p.status == ProposalStatus::Accepted);
        if already_accepted {
            return Err(StoreError::UniqueViolation(
                "duplicate value violates unique constraint: uq_proposals_one_accepted"
                    .to_string(),
            ));
        }
        Self::take_failure(&self.fail_award, "commit_award")?;

        let now = Utc::now();
        let rfp = state.rfp_cas(award.rfp_id, award.rfp_expected)?;
        rfp.status = RfpStatus::Awarded;
        rfp.awarded_vendor = Some(award.vendor_id);
        rfp.updated_at = now;
        let rfp = rfp.clone();

        let proposal = state.proposal_cas(award.proposal_id, award.proposal_expected)?;
        proposal.status = ProposalStatus::Accepted;
        proposal.updated_at = now;
        let proposal = proposal.clone();

        if let Some(notification) = &award.notification {
            state.push_notification(notification);
        }
        Ok((proposal, rfp))
    }

    // -- Outbox --

    async fn enqueue_notifications(
        &self,
        items: &[NewNotification],
    ) -> Result<Vec<OutboundNotification>, StoreError> {
        let mut state = self.state.write().await;
        Ok(items.iter().map(|i| state.push_notification(i)).collect())
    }

    async fn pending_notifications(
        &self,
        limit: i64,
        max_attempts: i32,
    ) -> Result<Vec<OutboundNotification>, StoreError> {
        let state = self.state.read().await;
        let rows = state
            .outbox
            .values()
            .filter(|n| n.status == delivery_status::PENDING && n.attempts < max_attempts)
            .cloned();
        Ok(page(rows, limit, 0))
    }

    async fn mark_notification_sent(&self, id: DbId) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(n) = state.outbox.get_mut(&id) {
            n.status = delivery_status::SENT.to_string();
            n.attempts += 1;
            n.sent_at = Some(Utc::now());
            n.last_error = None;
        }
        Ok(())
    }

    async fn mark_notification_failed(
        &self,
        id: DbId,
        error: &str,
        max_attempts: i32,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(n) = state.outbox.get_mut(&id) {
            n.attempts += 1;
            n.last_error = Some(error.to_string());
            if n.attempts >= max_attempts {
                n.status = delivery_status::FAILED.to_string();
            }
        }
        Ok(())
    }

    async fn list_notifications(&self, limit: i64) -> Result<Vec<OutboundNotification>, StoreError> {
        let state = self.state.read().await;
        Ok(page(state.outbox.values().rev().cloned(), limit, 0))
    }
}
