//! Repository for the `outbound_notifications` table.

use sqlx::{PgConnection, PgPool};

use procura_core::types::DbId;

use crate::models::outbox::{delivery_status, NewNotification, OutboundNotification};

/// Column list for `outbound_notifications` queries.
const COLUMNS: &str = "\
    id, kind, recipient, subject, body, rfp_id, proposal_id, \
    status, attempts, last_error, created_at, sent_at";

/// Provides outbox operations.
pub struct OutboxRepo;

impl OutboxRepo {
    /// Insert on an open connection, so the row commits with the caller's transaction.
    pub async fn insert_in_tx(
        conn: &mut PgConnection,
        item: &NewNotification,
    ) -> Result<OutboundNotification, sqlx::Error> {
        let query = format!(
            "INSERT INTO outbound_notifications \
                (kind, recipient, subject, body, rfp_id, proposal_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, OutboundNotification>(&query)
            .bind(&item.kind)
            .bind(&item.recipient)
            .bind(&item.subject)
            .bind(&item.body)
            .bind(item.rfp_id)
            .bind(item.proposal_id)
            .fetch_one(&mut *conn)
            .await
    }

    /// Pending rows still under the attempt limit, oldest first.
    pub async fn list_pending(
        pool: &PgPool,
        limit: i64,
        max_attempts: i32,
    ) -> Result<Vec<OutboundNotification>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM outbound_notifications \
             WHERE status = $1 AND attempts < $2 \
             ORDER BY created_at, id \
             LIMIT $3"
        );
        sqlx::query_as::<_, OutboundNotification>(&query)
            .bind(delivery_status::PENDING)
            .bind(max_attempts)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    pub async fn list_recent(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<OutboundNotification>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM outbound_notifications ORDER BY id DESC LIMIT $1"
        );
        sqlx::query_as::<_, OutboundNotification>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    pub async fn mark_sent(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE outbound_notifications \
             SET status = $2, attempts = attempts + 1, sent_at = NOW(), last_error = NULL \
             WHERE id = $1",
        )
        .bind(id)
        .bind(delivery_status::SENT)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record a failed attempt; flips to `failed` once attempts reach `max_attempts`.
    pub async fn mark_failed(
        pool: &PgPool,
        id: DbId,
        error: &str,
        max_attempts: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE outbound_notifications \
             SET attempts = attempts + 1, \
                 last_error = $2, \
                 status = CASE WHEN attempts + 1 >= $3 THEN $4 ELSE status END \
             WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .bind(max_attempts)
        .bind(delivery_status::FAILED)
        .execute(pool)
        .await?;
        Ok(())
    }
}
