use crate::types::DbId;

/// Domain error taxonomy shared by every layer.
///
/// Each variant carries enough context (entity, id, field) for a caller to
/// act on it. The API layer maps variants onto HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Empty or malformed input, or a missing required field.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Extraction could not derive mandatory fields. `partial` holds what
    /// was derived so a human can complete it.
    #[error("Incomplete extraction: {message}")]
    IncompleteExtraction {
        message: String,
        partial: serde_json::Value,
    },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// A status change that the transition tables do not allow.
    #[error("Illegal transition for {entity} {id}: {from} -> {to} ({reason})")]
    IllegalTransition {
        entity: &'static str,
        id: DbId,
        from: String,
        to: String,
        reason: String,
    },

    #[error("Evaluation precondition failed: {0}")]
    EvaluationPrecondition(String),

    /// A competing writer changed the entity between read and write.
    #[error("Concurrency conflict on {entity} {id}; reload and retry")]
    ConcurrencyConflict { entity: &'static str, id: DbId },

    #[error("Dependency unavailable: {dependency}: {message}")]
    DependencyUnavailable {
        dependency: &'static str,
        message: String,
    },

    #[error("{operation} timed out after {elapsed_ms}ms")]
    Timeout {
        operation: &'static str,
        elapsed_ms: u64,
    },

    /// Uniqueness violation (e.g. a second vendor with the same email).
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Stable machine-readable code for the variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::IncompleteExtraction { .. } => "INCOMPLETE_EXTRACTION",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
            Self::EvaluationPrecondition(_) => "EVALUATION_PRECONDITION",
            Self::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            Self::DependencyUnavailable { .. } => "DEPENDENCY_UNAVAILABLE",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
