//! Repository for the `rfps` table.

use sqlx::types::Json;
use sqlx::PgPool;

use procura_core::lifecycle::RfpStatus;
use procura_core::types::{DbId, Timestamp};

use crate::models::rfp::{NewRfp, Rfp, RfpContent};

/// Column list for `rfps` queries.
pub(crate) const COLUMNS: &str = "\
    id, title, description, requirements, budget, deadline, status, \
    selected_vendors, awarded_vendor, natural_language_input, created_at, updated_at";

/// Provides CRUD and compare-and-swap status operations for RFPs.
pub struct RfpRepo;

impl RfpRepo {
    /// Insert a DRAFT RFP.
    pub async fn create(pool: &PgPool, input: &NewRfp) -> Result<Rfp, sqlx::Error> {
        let query = format!(
            "INSERT INTO rfps \
                (title, description, requirements, budget, deadline, natural_language_input) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        let c = &input.content;
        sqlx::query_as::<_, Rfp>(&query)
            .bind(&c.title)
            .bind(&c.description)
            .bind(Json(&c.requirements))
            .bind(c.budget)
            .bind(c.deadline)
            .bind(&input.natural_language_input)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Rfp>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM rfps WHERE id = $1");
        sqlx::query_as::<_, Rfp>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn exists(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM rfps WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    /// List RFPs newest-first, optionally filtered by status.
    pub async fn list(
        pool: &PgPool,
        status: Option<RfpStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Rfp>, sqlx::Error> {
        match status {
            Some(s) => {
                let query = format!(
                    "SELECT {COLUMNS} FROM rfps WHERE status = $1 \
                     ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
                );
                sqlx::query_as::<_, Rfp>(&query)
                    .bind(s.as_str())
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(pool)
                    .await
            }
            None => {
                let query = format!(
                    "SELECT {COLUMNS} FROM rfps \
                     ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
                );
                sqlx::query_as::<_, Rfp>(&query)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(pool)
                    .await
            }
        }
    }

    /// SENT RFPs whose deadline has passed.
    pub async fn list_overdue(pool: &PgPool, now: Timestamp) -> Result<Vec<Rfp>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM rfps \
             WHERE status = 'SENT' AND deadline IS NOT NULL AND deadline < $1 \
             ORDER BY deadline"
        );
        sqlx::query_as::<_, Rfp>(&query)
            .bind(now)
            .fetch_all(pool)
            .await
    }

    /// Replace editable content if the status is still `expected`.
    pub async fn update_content(
        pool: &PgPool,
        id: DbId,
        expected: RfpStatus,
        content: &RfpContent,
    ) -> Result<Option<Rfp>, sqlx::Error> {
        let query = format!(
            "UPDATE rfps SET \
                title = $3, description = $4, requirements = $5, \
                budget = $6, deadline = $7, updated_at = NOW() \
             WHERE id = $1 AND status = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Rfp>(&query)
            .bind(id)
            .bind(expected.as_str())
            .bind(&content.title)
            .bind(&content.description)
            .bind(Json(&content.requirements))
            .bind(content.budget)
            .bind(content.deadline)
            .fetch_optional(pool)
            .await
    }

    /// Compare-and-swap the status, optionally replacing `selected_vendors`.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        expected: RfpStatus,
        next: RfpStatus,
        selected_vendors: Option<&[DbId]>,
    ) -> Result<Option<Rfp>, sqlx::Error> {
        let query = format!(
            "UPDATE rfps SET \
                status = $3, \
                selected_vendors = COALESCE($4, selected_vendors), \
                updated_at = NOW() \
             WHERE id = $1 AND status = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Rfp>(&query)
            .bind(id)
            .bind(expected.as_str())
            .bind(next.as_str())
            .bind(selected_vendors)
            .fetch_optional(pool)
            .await
    }

    /// Delete the RFP if its status is still `expected`.
    pub async fn delete(pool: &PgPool, id: DbId, expected: RfpStatus) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM rfps WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(expected.as_str())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
