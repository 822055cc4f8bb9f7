use procura_core::error::CoreError;
use procura_core::types::DbId;

/// Errors raised by an [`EntityStore`](crate::store::EntityStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    /// Compare-and-swap miss: the stored status was not the expected one.
    #[error("{entity} {id} no longer has the expected status")]
    StaleStatus { entity: &'static str, id: DbId },

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The row is still referenced and cannot be removed.
    #[error("Still referenced: {0}")]
    Referenced(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// The backend refused the operation (used by the in-memory store's
    /// failure injection and for lost connections).
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                return StoreError::UniqueViolation(format!(
                    "duplicate value violates unique constraint: {constraint}"
                ));
            }
            // Foreign key violation: error code 23503
            if db_err.code().as_deref() == Some("23503") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                return StoreError::Referenced(format!(
                    "row is referenced through foreign key: {constraint}"
                ));
            }
        }
        StoreError::Database(err)
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => CoreError::NotFound { entity, id },
            StoreError::StaleStatus { entity, id } => CoreError::ConcurrencyConflict { entity, id },
            StoreError::UniqueViolation(msg) | StoreError::Referenced(msg) => {
                CoreError::Conflict(msg)
            }
            StoreError::Database(sqlx::Error::RowNotFound) => {
                CoreError::Internal("query returned no rows".to_string())
            }
            StoreError::Database(e) => CoreError::DependencyUnavailable {
                dependency: "database",
                message: e.to_string(),
            },
            StoreError::Unavailable(message) => CoreError::DependencyUnavailable {
                dependency: "database",
                message,
            },
        }
    }
}
