//! Error handling module
//!
//! Centralized error type for the command side.

use crate::domain::DomainError;
use crate::event_store::EventStoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Command rejected by validation; nothing was appended
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    #[error("Idempotency error: {0}")]
    Idempotency(#[from] crate::idempotency::IdempotencyError),
}

impl AppError {
    /// Whether the command was rejected by the account itself
    pub fn is_rejection(&self) -> bool {
        matches!(self, AppError::Domain(_))
    }

    /// Whether the same command may succeed once the store recovers
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::EventStore(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Domain(domain_err) => match domain_err {
                DomainError::InsufficientFunds { .. } => "insufficient_funds",
                DomainError::InsufficientLocked { .. } => "insufficient_locked",
                DomainError::AccountFrozen => "account_frozen",
                DomainError::AlreadyFrozen => "already_frozen",
                DomainError::NotFrozen => "not_frozen",
                DomainError::AccountNotFound(_) => "account_not_found",
                DomainError::AccountAlreadyExists(_) => "account_already_exists",
                DomainError::SameAccountTransfer => "same_account_transfer",
                DomainError::BalanceLimitExceeded { .. } => "balance_limit_exceeded",
            },
            AppError::EventStore(EventStoreError::ConcurrencyConflict { .. }) => "version_conflict",
            AppError::EventStore(EventStoreError::MaxRetriesExceeded) => "max_retries_exceeded",
            AppError::EventStore(_) => "event_store_error",
            AppError::Idempotency(_) => "idempotency_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_conversion() {
        let err: AppError = DomainError::AlreadyFrozen.into();
        assert!(err.is_rejection());
        assert!(!err.is_retryable());
        assert_eq!(err.error_code(), "already_frozen");
        assert_eq!(err.to_string(), "Account is already frozen");
    }

    #[test]
    fn test_event_store_error_code() {
        let err: AppError = EventStoreError::MaxRetriesExceeded.into();
        assert!(!err.is_rejection());
        assert!(err.is_retryable());
        assert_eq!(err.error_code(), "max_retries_exceeded");
    }

    #[test]
    fn test_corrupt_event_is_not_retryable() {
        let err: AppError = EventStoreError::InvalidEventData("bad".to_string()).into();
        assert!(!err.is_retryable());
        assert_eq!(err.error_code(), "event_store_error");
    }
}
