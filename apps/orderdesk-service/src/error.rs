//! Error types for the OrderDesk service.

use orderdesk_core::{CoreError, ValidationError};
use orderdesk_db::DbError;

/// Service errors: a business rule said no, or the store failed.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl ServiceError {
    /// True only for transient storage failures (lock wait timeout, deadlock,
    /// pool exhaustion). The caller retries the whole operation from scratch.
    /// Every other error needs a different input first.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Db(err) => err.is_transient(),
            ServiceError::Core(_) => false,
        }
    }

    /// Returns the business error, if this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            ServiceError::Core(err) => Some(err),
            ServiceError::Db(_) => None,
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Core(CoreError::Validation(err))
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
