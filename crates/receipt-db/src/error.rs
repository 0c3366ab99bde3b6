//! # Database Error Types
//!
//! Error types for counter allocation and sale persistence.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  PostgreSQL / memory store error                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← StorageUnavailable | LockTimeout | Core ...   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Sale Persistence Transaction ← ALWAYS aborts, no degraded mode        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Caller retries the whole sale if `is_retryable()`                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::borrow::Cow;

use receipt_core::CoreError;
use thiserror::Error;

use crate::config::ConfigError;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// The backing store cannot be reached.
    ///
    /// ## When This Occurs
    /// - Connection refused / reset, TLS failure
    /// - Pool timed out waiting for a connection, or pool closed
    /// - Server shutting down
    /// - Memory store switched off in tests
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The key lock was not acquired within the lock/statement timeout.
    ///
    /// Extremely unlikely with one-increment critical sections. Retrying the
    /// whole sale is safe: nothing was committed.
    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    /// Receipt-number domain error (format invariant, parse failure).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Two transactions create the same counter without holding its lock
    /// - Duplicate receipt number for a tenant (must never happen)
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether retrying the entire sale-creation attempt may succeed.
    ///
    /// Format invariant violations are defects and never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::StorageUnavailable(_) | DbError::LockTimeout(_))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// SQLSTATE 55P03 lock_not_available   → DbError::LockTimeout
/// SQLSTATE 57014 query_canceled       → DbError::LockTimeout (statement_timeout)
/// SQLSTATE 08xxx connection exception → DbError::StorageUnavailable
/// SQLSTATE 57P01-57P03 shutdown       → DbError::StorageUnavailable
/// SQLSTATE 23505 unique_violation     → DbError::UniqueViolation
/// SQLSTATE 23503 foreign_key          → DbError::ForeignKeyViolation
/// PoolTimedOut / PoolClosed / Io / Tls → DbError::StorageUnavailable
/// RowNotFound                         → DbError::NotFound
/// Other                               → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let code: Option<Cow<'_, str>> = db_err.code();
                let message = db_err.message().to_string();

                match code.as_deref() {
                    Some("55P03") | Some("57014") => DbError::LockTimeout(message),
                    Some("57P01") | Some("57P02") | Some("57P03") => {
                        DbError::StorageUnavailable(message)
                    }
                    Some(c) if c.starts_with("08") => DbError::StorageUnavailable(message),
                    Some("23505") => DbError::UniqueViolation {
                        field: db_err.constraint().unwrap_or("unknown").to_string(),
                        value: message,
                    },
                    Some("23503") => DbError::ForeignKeyViolation { message },
                    _ => DbError::QueryFailed(message),
                }
            }

            sqlx::Error::PoolTimedOut => {
                DbError::StorageUnavailable("Timed out waiting for a pooled connection".to_string())
            }

            sqlx::Error::PoolClosed => DbError::StorageUnavailable("Pool is closed".to_string()),

            sqlx::Error::Io(e) => DbError::StorageUnavailable(e.to_string()),

            sqlx::Error::Tls(e) => DbError::StorageUnavailable(e.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(DbError::StorageUnavailable("down".into()).is_retryable());
        assert!(DbError::LockTimeout("slow".into()).is_retryable());

        let defect: DbError = CoreError::invariant("counter must be positive, got 0").into();
        assert!(!defect.is_retryable());
        assert!(!DbError::duplicate("receipt_number", "T1-R-20251117-0001").is_retryable());
    }

    #[test]
    fn test_pool_errors_mean_storage_unavailable() {
        assert!(matches!(
            DbError::from(sqlx::Error::PoolTimedOut),
            DbError::StorageUnavailable(_)
        ));
        assert!(matches!(
            DbError::from(sqlx::Error::PoolClosed),
            DbError::StorageUnavailable(_)
        ));

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(DbError::from(sqlx::Error::Io(io)), DbError::StorageUnavailable(_)));
    }

    #[test]
    fn test_core_errors_pass_through_unchanged() {
        let err: DbError = CoreError::invariant("counter must be positive, got -1").into();
        assert_eq!(
            err.to_string(),
            "Receipt format invariant violated: counter must be positive, got -1"
        );
    }
}
