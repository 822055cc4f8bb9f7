//! End-to-end procurement flows against the in-memory store.

mod common;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use procura_core::error::CoreError;
use procura_core::evaluation::Outcome;
use procura_core::lifecycle::{ProposalStatus, RfpStatus};
use procura_core::requirements::Requirements;
use procura_db::memory::FailPoint;
use procura_db::models::outbox::kind;
use procura_db::EntityStore;
use procura_pipeline::ExtractionCapability;

use common::Harness;

const OFFER_X: &str = "Thank you for the invitation. Our total price is $1,000 for all items. \
    We can deliver in 10 days.";
const OFFER_Y: &str = "Please find our offer. Our total price is $1,200 for all items. \
    We can deliver in 5 days.";

/// Dispatch to two vendors, ingest both replies and parse them.
async fn two_parsed_offers(h: &Harness) -> (i64, i64, i64, i64, i64) {
    let x = h.vendor("Vendor X", "sales@x.test").await;
    let y = h.vendor("Vendor Y", "sales@y.test").await;
    let rfp = h.price_and_delivery_rfp().await;
    h.dispatch.dispatch(rfp.id, &[x.id, y.id]).await.unwrap();

    let px = h.reply(rfp.id, "Sales X <sales@x.test>", "<x-1@x.test>", OFFER_X).await;
    let py = h.reply(rfp.id, "sales@y.test", "<y-1@y.test>", OFFER_Y).await;
    h.proposals.parse(px).await.unwrap();
    h.proposals.parse(py).await.unwrap();
    (rfp.id, x.id, y.id, px, py)
}

// ---------------------------------------------------------------------------
// Scenario A: weighted ranking and award
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cheaper_offer_wins_when_price_weighs_double() {
    let h = Harness::new();
    let (rfp_id, x, _y, px, py) = two_parsed_offers(&h).await;

    let parsed = h.proposals.get(px).await.unwrap();
    let fields = parsed.parsed_data.as_ref().unwrap();
    assert_eq!(fields.0.price, Some(1_000.0));
    assert_eq!(fields.0.delivery_days, Some(10.0));

    let result = h.evaluation.evaluate_rfp(rfp_id).await.unwrap();
    assert_eq!(result.ranking.len(), 2);
    assert_eq!(result.ranking[0].proposal_id, px);
    assert_eq!(result.ranking[1].proposal_id, py);
    assert!(result.ranking[0].score > result.ranking[1].score);
    assert!(result
        .ranking
        .iter()
        .all(|r| (0.0..=100.0).contains(&r.score) && r.status == ProposalStatus::Evaluated));
    assert_eq!(result.recommendation.as_ref().map(|r| r.vendor_id), Some(x));

    let stored = h.proposals.get(py).await.unwrap();
    assert_eq!(stored.status, ProposalStatus::Evaluated);
    assert!(stored.score.is_some());

    let (accepted, rfp) = h.dispatch.award(rfp_id, x).await.unwrap();
    assert_eq!(accepted.id, px);
    assert_eq!(accepted.status, ProposalStatus::Accepted);
    assert_eq!(rfp.status, RfpStatus::Awarded);
    assert_eq!(rfp.awarded_vendor, Some(x));

    let outbox = h.store.list_notifications(10).await.unwrap();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].kind, kind::PROPOSAL_ACCEPTED);
    assert_eq!(outbox[0].recipient, "sales@x.test");
}

#[tokio::test]
async fn re_evaluation_keeps_the_accepted_proposal() {
    let h = Harness::new();
    let (rfp_id, _x, _y, px, _py) = two_parsed_offers(&h).await;
    h.evaluation.evaluate_rfp(rfp_id).await.unwrap();
    h.dispatch.accept(px).await.unwrap();

    let again = h.evaluation.evaluate_rfp(rfp_id).await.unwrap();
    let winner = again.ranking.iter().find(|r| r.proposal_id == px).unwrap();
    assert_eq!(winner.status, ProposalStatus::Accepted);
    assert_eq!(h.proposals.get(px).await.unwrap().status, ProposalStatus::Accepted);
}

// ---------------------------------------------------------------------------
// Scenario B: empty dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dispatch_to_nobody_leaves_the_rfp_in_draft() {
    let h = Harness::new();
    let rfp = h.price_and_delivery_rfp().await;

    let err = h.dispatch.dispatch(rfp.id, &[]).await.unwrap_err();
    assert_matches!(err, CoreError::InvalidInput(_));

    let after = h.rfps.get(rfp.id).await.unwrap();
    assert_eq!(after.status, RfpStatus::Draft);
    assert!(after.selected_vendors.is_empty());
    assert!(h.channel.sent().await.is_empty());
}

// ---------------------------------------------------------------------------
// Scenario C: concurrent accepts
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn only_one_of_two_concurrent_accepts_succeeds() {
    let h = Harness::new();
    let (rfp_id, _x, _y, px, py) = two_parsed_offers(&h).await;
    h.evaluation.evaluate_rfp(rfp_id).await.unwrap();

    let (a, b) = tokio::join!(h.dispatch.accept(px), h.dispatch.accept(py));
    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = outcomes.into_iter().find_map(Result::err).unwrap();
    assert_matches!(
        loser,
        CoreError::ConcurrencyConflict { .. } | CoreError::IllegalTransition { .. }
    );

    let proposals = h.store.proposals_for_rfp(rfp_id).await.unwrap();
    let accepted = proposals
        .iter()
        .filter(|p| p.status == ProposalStatus::Accepted)
        .count();
    assert_eq!(accepted, 1);
    assert_eq!(h.rfps.get(rfp_id).await.unwrap().status, RfpStatus::Awarded);
    assert_eq!(h.store.list_notifications(10).await.unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Scenario D: redelivered message
// ---------------------------------------------------------------------------

#[tokio::test]
async fn the_same_message_twice_yields_one_proposal() {
    let h = Harness::new();
    let x = h.vendor("Vendor X", "sales@x.test").await;
    let rfp = h.price_and_delivery_rfp().await;
    h.dispatch.dispatch(rfp.id, &[x.id]).await.unwrap();

    h.reply(rfp.id, "sales@x.test", "<dup@x.test>", OFFER_X).await;

    h.mailbox
        .push(procura_pipeline::InboundMessage {
            message_id: Some("<dup@x.test>".into()),
            from: "sales@x.test".into(),
            subject: format!("Re: RFP {}", rfp.id),
            body: OFFER_X.into(),
            received_at: chrono::Utc::now(),
        })
        .await;
    let second = h.intake.check_for_new_proposals().await.unwrap();
    assert_eq!(second.ingested, 0);
    assert_eq!(second.duplicates, 1);

    assert_eq!(h.store.proposals_for_rfp(rfp.id).await.unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Scenario E: nothing recognizable
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unrecognizable_reply_is_parsed_and_scored_zero() {
    let h = Harness::new();
    let x = h.vendor("Vendor X", "sales@x.test").await;
    let rfp = h.price_and_delivery_rfp().await;
    h.dispatch.dispatch(rfp.id, &[x.id]).await.unwrap();

    let id = h
        .reply(rfp.id, "sales@x.test", "<vague@x.test>", "Hello, we are interested. Regards.")
        .await;
    let parsed = h.proposals.parse(id).await.unwrap();
    assert_eq!(parsed.status, ProposalStatus::Parsed);
    let fields = &parsed.parsed_data.as_ref().unwrap().0;
    assert!(fields.price.is_none());
    assert!(fields.delivery_days.is_none());

    let result = h.evaluation.evaluate_rfp(rfp.id).await.unwrap();
    let only = &result.ranking[0];
    assert_eq!(only.score, 0.0);
    assert_eq!(only.evaluation.criteria.len(), 2);
    assert!(only
        .evaluation
        .criteria
        .iter()
        .all(|c| c.outcome == Outcome::Missing && c.sub_score == 0.0));
}

// ---------------------------------------------------------------------------
// Atomic accept
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_award_commit_changes_nothing() {
    let h = Harness::new();
    let (rfp_id, _x, _y, px, _py) = two_parsed_offers(&h).await;
    h.evaluation.evaluate_rfp(rfp_id).await.unwrap();

    h.store.inject_failure(FailPoint::Award);
    let err = h.dispatch.accept(px).await.unwrap_err();
    assert_matches!(err, CoreError::DependencyUnavailable { .. });

    let rfp = h.rfps.get(rfp_id).await.unwrap();
    assert_eq!(rfp.status, RfpStatus::Sent);
    assert!(rfp.awarded_vendor.is_none());
    assert_eq!(h.proposals.get(px).await.unwrap().status, ProposalStatus::Evaluated);
    assert!(h.store.list_notifications(10).await.unwrap().is_empty());

    let (accepted, _) = h.dispatch.accept(px).await.unwrap();
    assert_eq!(accepted.status, ProposalStatus::Accepted);
}

#[tokio::test]
async fn failed_score_commit_writes_no_scores() {
    let h = Harness::new();
    let (rfp_id, _x, _y, px, py) = two_parsed_offers(&h).await;

    h.store.inject_failure(FailPoint::Scores);
    assert_matches!(
        h.evaluation.evaluate_rfp(rfp_id).await,
        Err(CoreError::DependencyUnavailable { .. })
    );
    for id in [px, py] {
        let p = h.proposals.get(id).await.unwrap();
        assert_eq!(p.status, ProposalStatus::Parsed);
        assert!(p.score.is_none());
    }
}

// ---------------------------------------------------------------------------
// Illegal transitions leave status unchanged
// ---------------------------------------------------------------------------

#[tokio::test]
async fn accepting_an_unevaluated_proposal_is_illegal() {
    let h = Harness::new();
    let (rfp_id, _x, _y, px, _py) = two_parsed_offers(&h).await;

    assert_matches!(
        h.dispatch.accept(px).await,
        Err(CoreError::IllegalTransition { .. })
    );
    assert_eq!(h.proposals.get(px).await.unwrap().status, ProposalStatus::Parsed);
    assert_eq!(h.rfps.get(rfp_id).await.unwrap().status, RfpStatus::Sent);
}

#[tokio::test]
async fn a_superseded_proposal_cannot_be_accepted() {
    let h = Harness::new();
    let x = h.vendor("Vendor X", "sales@x.test").await;
    let rfp = h.price_and_delivery_rfp().await;
    h.dispatch.dispatch(rfp.id, &[x.id]).await.unwrap();

    let old = h.reply(rfp.id, "sales@x.test", "<x-1@x.test>", OFFER_X).await;
    h.proposals.parse(old).await.unwrap();
    h.evaluation.evaluate_rfp(rfp.id).await.unwrap();
    assert_eq!(h.proposals.get(old).await.unwrap().status, ProposalStatus::Evaluated);

    let revised = "Revised offer. Our total price is $5,000 for all items. \
        We can deliver in 20 days.";
    let newer = h.reply(rfp.id, "sales@x.test", "<x-2@x.test>", revised).await;
    h.proposals.parse(newer).await.unwrap();
    let result = h.evaluation.evaluate_rfp(rfp.id).await.unwrap();
    assert_eq!(result.superseded, vec![old]);
    assert_eq!(result.ranking.len(), 1);
    assert_eq!(result.ranking[0].proposal_id, newer);

    let err = h.dispatch.accept(old).await.unwrap_err();
    assert_matches!(
        err,
        CoreError::IllegalTransition { id, ref reason, .. }
            if id == old && reason.contains(&format!("superseded by proposal {newer}"))
    );
    assert_eq!(h.proposals.get(old).await.unwrap().status, ProposalStatus::Evaluated);
    assert_eq!(h.rfps.get(rfp.id).await.unwrap().status, RfpStatus::Sent);
    assert!(h.store.list_notifications(10).await.unwrap().is_empty());

    let (accepted, awarded) = h.dispatch.award(rfp.id, x.id).await.unwrap();
    assert_eq!(accepted.id, newer);
    assert_eq!(awarded.status, RfpStatus::Awarded);
}

#[tokio::test]
async fn sent_rfps_cannot_be_edited_or_deleted() {
    let h = Harness::new();
    let x = h.vendor("Vendor X", "sales@x.test").await;
    let rfp = h.price_and_delivery_rfp().await;
    h.dispatch.dispatch(rfp.id, &[x.id]).await.unwrap();

    assert_matches!(
        h.rfps.delete(rfp.id).await,
        Err(CoreError::IllegalTransition { .. })
    );
    assert_matches!(
        h.rfps.update(rfp.id, Default::default()).await,
        Err(CoreError::IllegalTransition { .. })
    );
    assert_eq!(h.rfps.get(rfp.id).await.unwrap().status, RfpStatus::Sent);
}

#[tokio::test]
async fn a_draft_rfp_cannot_be_evaluated() {
    let h = Harness::new();
    let rfp = h.price_and_delivery_rfp().await;
    assert_matches!(
        h.evaluation.evaluate_rfp(rfp.id).await,
        Err(CoreError::EvaluationPrecondition(_))
    );
}

#[tokio::test]
async fn closed_rfp_still_awards_but_takes_no_new_replies() {
    let h = Harness::new();
    let (rfp_id, x, _y, px, _py) = two_parsed_offers(&h).await;
    h.rfps.close(rfp_id).await.unwrap();

    h.mailbox
        .push(procura_pipeline::InboundMessage {
            message_id: Some("<late@x.test>".into()),
            from: "sales@x.test".into(),
            subject: format!("RFP {rfp_id} revised"),
            body: "Revised total price is $900.".into(),
            received_at: chrono::Utc::now(),
        })
        .await;
    let report = h.intake.check_for_new_proposals().await.unwrap();
    assert_eq!(report.skipped, 1);

    h.evaluation.evaluate_rfp(rfp_id).await.unwrap();
    let (accepted, rfp) = h.dispatch.award(rfp_id, x).await.unwrap();
    assert_eq!(accepted.id, px);
    assert_eq!(rfp.status, RfpStatus::Awarded);
}

// ---------------------------------------------------------------------------
// Re-extraction and timeouts
// ---------------------------------------------------------------------------

/// Returns queued RFP extractions in order.
struct Scripted {
    replies: Mutex<VecDeque<Value>>,
}

impl Scripted {
    fn new(replies: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
        })
    }
}

#[async_trait]
impl ExtractionCapability for Scripted {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn extract_rfp(&self, _text: &str) -> Result<Value, CoreError> {
        self.replies
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| CoreError::Internal("script exhausted".into()))
    }

    async fn extract_proposal(
        &self,
        _text: &str,
        _requirements: &Requirements,
    ) -> Result<Value, CoreError> {
        Ok(json!({}))
    }
}

#[tokio::test]
async fn re_extraction_never_drops_a_known_field() {
    let capability = Scripted::new(vec![
        json!({
            "title": "Monitors",
            "description": "20 monitors for the design team",
            "budget": "$4,000",
            "deadline": "2030-06-30",
        }),
        json!({
            "title": "Monitors (27 inch)",
            "description": "20 monitors for the design team",
        }),
    ]);
    let h = Harness::with_capability(capability, common::TIMEOUT);

    let (rfp, _) = h.rfps.create_from_text("20 monitors, budget $4,000").await.unwrap();
    assert_eq!(rfp.budget, Some(4_000.0));
    assert!(rfp.deadline.is_some());

    let (again, _) = h.rfps.re_extract(rfp.id).await.unwrap();
    assert_eq!(again.title, "Monitors (27 inch)");
    assert_eq!(again.budget, Some(4_000.0));
    assert_eq!(again.deadline, rfp.deadline);
}

struct Stalled;

#[async_trait]
impl ExtractionCapability for Stalled {
    fn name(&self) -> &'static str {
        "stalled"
    }

    async fn extract_rfp(&self, _text: &str) -> Result<Value, CoreError> {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        Ok(json!({ "title": "late", "description": "late" }))
    }

    async fn extract_proposal(
        &self,
        _text: &str,
        _requirements: &Requirements,
    ) -> Result<Value, CoreError> {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        Ok(json!({}))
    }
}

#[tokio::test(start_paused = true)]
async fn slow_extraction_times_out_without_writing() {
    let h = Harness::with_capability(Arc::new(Stalled), Duration::from_secs(2));

    let err = h.rfps.create_from_text("We need chairs").await.unwrap_err();
    assert_matches!(err, CoreError::Timeout { operation: "extraction", .. });
    assert!(h
        .store
        .list_rfps(None, 10, 0)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_proposal_parse_keeps_it_received() {
    let h = Harness::with_capability(Arc::new(Stalled), Duration::from_secs(2));
    let x = h.vendor("Vendor X", "sales@x.test").await;
    let rfp = h.price_and_delivery_rfp().await;
    h.dispatch.dispatch(rfp.id, &[x.id]).await.unwrap();
    let id = h.reply(rfp.id, "sales@x.test", "<slow@x.test>", OFFER_X).await;

    assert_matches!(h.proposals.parse(id).await, Err(CoreError::Timeout { .. }));
    assert_eq!(h.proposals.get(id).await.unwrap().status, ProposalStatus::Received);
}
