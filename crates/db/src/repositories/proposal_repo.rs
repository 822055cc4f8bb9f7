//! Repository for the `proposals` table, including the transactional
//! score and award commits.

use sqlx::types::Json;
use sqlx::PgPool;

use procura_core::extraction::{ExtractionIssue, ProposalFields};
use procura_core::lifecycle::{ProposalStatus, RfpStatus, PROPOSAL_ENTITY, RFP_ENTITY};
use procura_core::types::DbId;

use crate::error::StoreError;
use crate::models::proposal::{NewProposal, Proposal, ScoreUpdate};
use crate::models::rfp::Rfp;
use crate::repositories::outbox_repo::OutboxRepo;
use crate::repositories::rfp_repo;
use crate::store::AwardCommit;

/// Column list for `proposals` queries.
const COLUMNS: &str = "\
    id, rfp_id, vendor_id, proposal_content, content_hash, email_message_id, \
    parsed_data, extraction_issues, score, evaluation, status, received_at, updated_at";

/// Provides CRUD and compare-and-swap status operations for proposals.
pub struct ProposalRepo;

impl ProposalRepo {
    /// Insert a RECEIVED proposal unless it is a redelivery.
    ///
    /// Returns `None` when either dedupe key (message id, or rfp/vendor/content
    /// hash) already exists.
    pub async fn insert_dedup(
        pool: &PgPool,
        input: &NewProposal,
    ) -> Result<Option<Proposal>, sqlx::Error> {
        let query = format!(
            "INSERT INTO proposals \
                (rfp_id, vendor_id, proposal_content, content_hash, email_message_id, received_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Proposal>(&query)
            .bind(input.rfp_id)
            .bind(input.vendor_id)
            .bind(&input.proposal_content)
            .bind(&input.content_hash)
            .bind(&input.email_message_id)
            .bind(input.received_at)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Proposal>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM proposals WHERE id = $1");
        sqlx::query_as::<_, Proposal>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn exists(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM proposals WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    /// List proposals, optionally for one RFP, most recent first.
    pub async fn list(
        pool: &PgPool,
        rfp_id: Option<DbId>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Proposal>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM proposals \
             WHERE ($1::BIGINT IS NULL OR rfp_id = $1) \
             ORDER BY received_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Proposal>(&query)
            .bind(rfp_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Every proposal for an RFP in submission order.
    pub async fn list_for_rfp(pool: &PgPool, rfp_id: DbId) -> Result<Vec<Proposal>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM proposals WHERE rfp_id = $1 ORDER BY received_at, id"
        );
        sqlx::query_as::<_, Proposal>(&query)
            .bind(rfp_id)
            .fetch_all(pool)
            .await
    }

    /// Store extraction output and move to PARSED if the status is still `expected`.
    pub async fn record_parse(
        pool: &PgPool,
        id: DbId,
        expected: ProposalStatus,
        fields: &ProposalFields,
        issues: &[ExtractionIssue],
    ) -> Result<Option<Proposal>, sqlx::Error> {
        let query = format!(
            "UPDATE proposals SET \
                parsed_data = $3, extraction_issues = $4, status = $5, updated_at = NOW() \
             WHERE id = $1 AND status = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Proposal>(&query)
            .bind(id)
            .bind(expected.as_str())
            .bind(Json(fields))
            .bind(Json(issues))
            .bind(ProposalStatus::Parsed.as_str())
            .fetch_optional(pool)
            .await
    }

    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        expected: ProposalStatus,
        next: ProposalStatus,
    ) -> Result<Option<Proposal>, sqlx::Error> {
        let query = format!(
            "UPDATE proposals SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Proposal>(&query)
            .bind(id)
            .bind(expected.as_str())
            .bind(next.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Write all scores in one transaction; any compare-and-swap miss rolls
    /// the whole batch back.
    pub async fn commit_scores(
        pool: &PgPool,
        updates: &[ScoreUpdate],
    ) -> Result<Vec<Proposal>, StoreError> {
        let mut tx = pool.begin().await?;
        let mut results = Vec::with_capacity(updates.len());

        let query = format!(
            "UPDATE proposals SET \
                score = $3, evaluation = $4, status = $5, updated_at = NOW() \
             WHERE id = $1 AND status = $2 \
             RETURNING {COLUMNS}"
        );

        for update in updates {
            let row = sqlx::query_as::<_, Proposal>(&query)
                .bind(update.proposal_id)
                .bind(update.expected.as_str())
                .bind(update.score)
                .bind(Json(&update.evaluation))
                .bind(update.next.as_str())
                .fetch_optional(&mut *tx)
                .await?;
            match row {
                Some(row) => results.push(row),
                None => {
                    tx.rollback().await?;
                    return Err(StoreError::StaleStatus {
                        entity: PROPOSAL_ENTITY,
                        id: update.proposal_id,
                    });
                }
            }
        }

        tx.commit().await?;
        Ok(results)
    }

    /// Accept a proposal, award its RFP and queue the acceptance notification
    /// atomically.
    ///
    /// The RFP row is updated first so competing accepts for the same RFP
    /// serialize on its row lock; the loser sees a stale status.
    pub async fn commit_award(
        pool: &PgPool,
        award: &AwardCommit,
    ) -> Result<(Proposal, Rfp), StoreError> {
        let mut tx = pool.begin().await?;

        let rfp_query = format!(
            "UPDATE rfps SET status = $3, awarded_vendor = $4, updated_at = NOW() \
             WHERE id = $1 AND status = $2 AND $4 = ANY(selected_vendors) \
             RETURNING {}",
            rfp_repo::COLUMNS
        );
        let rfp = sqlx::query_as::<_, Rfp>(&rfp_query)
            .bind(award.rfp_id)
            .bind(award.rfp_expected.as_str())
            .bind(RfpStatus::Awarded.as_str())
            .bind(award.vendor_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(rfp) = rfp else {
            tx.rollback().await?;
            return Err(StoreError::StaleStatus {
                entity: RFP_ENTITY,
                id: award.rfp_id,
            });
        };

        let proposal_query = format!(
            "UPDATE proposals SET status = $4, updated_at = NOW() \
             WHERE id = $1 AND status = $2 AND rfp_id = $3 \
             RETURNING {COLUMNS}"
        );
        let proposal = sqlx::query_as::<_, Proposal>(&proposal_query)
            .bind(award.proposal_id)
            .bind(award.proposal_expected.as_str())
            .bind(award.rfp_id)
            .bind(ProposalStatus::Accepted.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(proposal) = proposal else {
            tx.rollback().await?;
            return Err(StoreError::StaleStatus {
                entity: PROPOSAL_ENTITY,
                id: award.proposal_id,
            });
        };

        if let Some(notification) = &award.notification {
            OutboxRepo::insert_in_tx(&mut *tx, notification).await?;
        }

        tx.commit().await?;
        Ok((proposal, rfp))
    }
}
