//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  PostgreSQL error (sqlx::Error)     in-memory lock wait timeout         │
//! │       │                                    │                            │
//! │       ▼                                    ▼                            │
//! │  DbError (this module) ← SQLSTATE classification, Busy                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ServiceError (orderdesk-service) ← is_retryable()                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Caller retries the whole operation, or gives up                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and retry decisions.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - A second Stock row for the same (location, product)
    /// - Duplicate receipt number, or a second receipt for one payment
    /// - Any UNIQUE index violation
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A CHECK constraint rejected the row.
    ///
    /// ## When This Occurs
    /// - A product price below zero, on insert or on price update
    /// - Any other CHECK on a column value
    ///
    /// Both stores raise this for a negative product price, so callers see
    /// the same error regardless of the backend.
    #[error("Check violation: {message}")]
    CheckViolation { message: String },

    /// A row lock could not be acquired in time, or the store aborted the
    /// transaction to break a deadlock or serialization conflict.
    ///
    /// ## When This Occurs
    /// - `lock_timeout` elapsed while waiting on `SELECT ... FOR UPDATE`
    /// - PostgreSQL deadlock detection picked this transaction
    /// - In-memory row mutex wait exceeded the configured timeout
    ///
    /// The whole operation may be retried from scratch.
    #[error("Database busy: {reason}")]
    Busy { reason: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A stored row could not be converted into a domain value.
    #[error("Invalid {entity} row: {reason}")]
    InvalidRow { entity: String, reason: String },

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

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

    /// Creates a Busy error.
    pub fn busy(reason: impl Into<String>) -> Self {
        DbError::Busy {
            reason: reason.into(),
        }
    }

    /// Creates a CheckViolation error.
    pub fn check_violation(message: impl ToString) -> Self {
        DbError::CheckViolation {
            message: message.to_string(),
        }
    }

    /// Creates an InvalidRow error.
    pub fn invalid_row(entity: impl Into<String>, reason: impl ToString) -> Self {
        DbError::InvalidRow {
            entity: entity.into(),
            reason: reason.to_string(),
        }
    }

    /// True when retrying the whole operation may succeed without changing
    /// its input.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Busy { .. } | DbError::PoolExhausted)
    }
}

// PostgreSQL SQLSTATE codes we classify.
const LOCK_NOT_AVAILABLE: &str = "55P03";
const DEADLOCK_DETECTED: &str = "40P01";
const SERIALIZATION_FAILURE: &str = "40001";
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound            → DbError::NotFound
/// SQLSTATE 55P03 / 40P01 / 40001      → DbError::Busy
/// SQLSTATE 23505                      → DbError::UniqueViolation
/// SQLSTATE 23503                      → DbError::ForeignKeyViolation
/// SQLSTATE 23514                      → DbError::CheckViolation
/// other sqlx::Error::Database         → DbError::QueryFailed
/// sqlx::Error::PoolTimedOut           → DbError::PoolExhausted
/// Other                               → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();
                let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();

                match code.as_str() {
                    LOCK_NOT_AVAILABLE | DEADLOCK_DETECTED | SERIALIZATION_FAILURE => {
                        DbError::Busy { reason: msg }
                    }
                    UNIQUE_VIOLATION => DbError::UniqueViolation {
                        field: db_err.constraint().unwrap_or("unknown").to_string(),
                        value: "unknown".to_string(),
                    },
                    FOREIGN_KEY_VIOLATION => DbError::ForeignKeyViolation { message: msg },
                    CHECK_VIOLATION => DbError::CheckViolation { message: msg },
                    _ => DbError::QueryFailed(msg),
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::invalid_row("Receipt", err)
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DbError::busy("lock wait timeout").is_transient());
        assert!(DbError::PoolExhausted.is_transient());

        assert!(!DbError::not_found("Order", "o-1").is_transient());
        assert!(!DbError::duplicate("receipt_number", "R-1").is_transient());
        assert!(!DbError::QueryFailed("syntax".into()).is_transient());
        assert!(!DbError::check_violation("price must be >= 0").is_transient());
    }

    #[test]
    fn test_pool_errors_map() {
        assert!(matches!(DbError::from(sqlx::Error::PoolTimedOut), DbError::PoolExhausted));
        assert!(matches!(
            DbError::from(sqlx::Error::RowNotFound),
            DbError::NotFound { .. }
        ));
    }
}
