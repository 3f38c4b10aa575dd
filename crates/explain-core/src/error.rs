//! Centralized error types for the explanation pipeline.
//!
//! Retrieval and generation failures are deliberately absent: both degrade
//! in place (empty context, deterministic fallback prose) so the user
//! always gets a response.

use explain_db::DbError;
use explain_redis::KvError;
use thiserror::Error;

/// Main error type for pipeline operations.
#[derive(Error, Debug)]
pub enum ExplainError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid tenant identifier: {0}")]
    BadTenant(String),

    #[error("Tenant schema incomplete: {0}")]
    SchemaIncomplete(String),

    #[error("Database error: {0}")]
    Database(DbError),

    #[error("Cache error: {0}")]
    Cache(#[from] KvError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for pipeline operations.
pub type ExplainResult<T> = Result<T, ExplainError>;

impl From<DbError> for ExplainError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::InvalidTenant(raw) => Self::BadTenant(raw),
            other => Self::Database(other),
        }
    }
}

impl ExplainError {
    /// Create a bad-request error.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// HTTP status this error surfaces as.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::BadTenant(_) => 400,
            Self::SchemaIncomplete(_) | Self::Database(_) | Self::Cache(_) | Self::Json(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_tenant_maps_to_bad_tenant() {
        let err: ExplainError = DbError::InvalidTenant("Bad;Name".to_string()).into();
        assert!(matches!(err, ExplainError::BadTenant(_)));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn other_db_errors_stay_server_side() {
        let err: ExplainError = DbError::NotFound("x".to_string()).into();
        assert_eq!(err.status_code(), 500);
    }
}
