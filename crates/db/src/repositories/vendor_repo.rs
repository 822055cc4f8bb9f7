//! Repository for the `vendors` table.

use sqlx::PgPool;

use procura_core::types::DbId;

use crate::models::vendor::{CreateVendor, UpdateVendor, Vendor};

/// Column list for `vendors` queries.
const COLUMNS: &str = "\
    id, name, email, contact_person, phone, address, city, country, \
    website, notes, active, created_at, updated_at";

/// Provides CRUD operations for vendors.
pub struct VendorRepo;

impl VendorRepo {
    /// Create a vendor, returning the full row. `input` must be normalized.
    pub async fn create(pool: &PgPool, input: &CreateVendor) -> Result<Vendor, sqlx::Error> {
        let query = format!(
            "INSERT INTO vendors \
                (name, email, contact_person, phone, address, city, country, website, notes, active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, COALESCE($10, true)) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Vendor>(&query)
            .bind(&input.name)
            .bind(&input.email)
            .bind(&input.contact_person)
            .bind(&input.phone)
            .bind(&input.address)
            .bind(&input.city)
            .bind(&input.country)
            .bind(&input.website)
            .bind(&input.notes)
            .bind(input.active)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Vendor>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM vendors WHERE id = $1");
        sqlx::query_as::<_, Vendor>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a vendor by its (lower-cased) email.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Vendor>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM vendors WHERE email = $1");
        sqlx::query_as::<_, Vendor>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// List vendors by name. Inactive vendors are skipped unless requested.
    pub async fn list(
        pool: &PgPool,
        include_inactive: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Vendor>, sqlx::Error> {
        let filter = if include_inactive { "" } else { "WHERE active = true" };
        let query = format!(
            "SELECT {COLUMNS} FROM vendors {filter} \
             ORDER BY name, id \
             LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, Vendor>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Update a vendor. Only non-`None` fields are applied.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateVendor,
    ) -> Result<Option<Vendor>, sqlx::Error> {
        let query = format!(
            "UPDATE vendors SET \
                name = COALESCE($2, name), \
                email = COALESCE($3, email), \
                contact_person = COALESCE($4, contact_person), \
                phone = COALESCE($5, phone), \
                address = COALESCE($6, address), \
                city = COALESCE($7, city), \
                country = COALESCE($8, country), \
                website = COALESCE($9, website), \
                notes = COALESCE($10, notes), \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Vendor>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.email)
            .bind(&input.contact_person)
            .bind(&input.phone)
            .bind(&input.address)
            .bind(&input.city)
            .bind(&input.country)
            .bind(&input.website)
            .bind(&input.notes)
            .fetch_optional(pool)
            .await
    }

    pub async fn set_active(
        pool: &PgPool,
        id: DbId,
        active: bool,
    ) -> Result<Option<Vendor>, sqlx::Error> {
        let query = format!(
            "UPDATE vendors SET active = $2, updated_at = NOW() WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Vendor>(&query)
            .bind(id)
            .bind(active)
            .fetch_optional(pool)
            .await
    }

    /// Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM vendors WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether a proposal or RFP refers to the vendor.
    pub async fn is_referenced(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM proposals WHERE vendor_id = $1) \
                 OR EXISTS (SELECT 1 FROM rfps WHERE $1 = ANY(selected_vendors))",
        )
        .bind(id)
        .fetch_one(pool)
        .await
    }
}
