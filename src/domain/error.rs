//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;

use super::AccountId;

/// Validation failures raised by the account aggregate.
///
/// A command that fails with one of these produced no events and changed
/// nothing; it is never retried automatically.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Available balance does not cover the requested amount
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    /// Locked pool does not cover the amount to confirm or unlock
    #[error("Insufficient locked amount: required {required}, locked {locked}")]
    InsufficientLocked { required: u64, locked: u64 },

    /// Account is frozen and cannot send money
    #[error("Account is frozen")]
    AccountFrozen,

    #[error("Account is already frozen")]
    AlreadyFrozen,

    #[error("Account is not frozen")]
    NotFrozen,

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Account already exists: {0}")]
    AccountAlreadyExists(AccountId),

    /// Transfer to same account
    #[error("Cannot transfer to the same account")]
    SameAccountTransfer,

    /// Opening balance above the largest representable balance
    #[error("Balance limit exceeded: {requested} > {limit}")]
    BalanceLimitExceeded { requested: u64, limit: u64 },
}

impl DomainError {
    /// Create an insufficient funds error
    pub fn insufficient_funds(required: u64, available: u64) -> Self {
        Self::InsufficientFunds {
            required,
            available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_funds_error() {
        let err = DomainError::insufficient_funds(150, 100);

        assert!(err.to_string().contains("150"));
        assert!(err.to_string().contains("100"));
    }

    #[test]
    fn test_not_found_names_account() {
        let err = DomainError::AccountNotFound(AccountId::from("ghost"));
        assert!(err.to_string().contains("ghost"));
    }
}
