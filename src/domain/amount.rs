//! Amount type
//!
//! Domain primitives for monetary values. Money is counted in integer
//! minor units; fractional values do not exist in this system.
//! Amounts are validated at construction time, so a command can never
//! carry a zero or out-of-range value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum allowed amount or balance (1 trillion units)
pub const MAX_AMOUNT: u64 = 1_000_000_000_000;

/// Amount represents a validated, strictly positive monetary value.
///
/// # Invariants
/// - Value is always positive (> 0)
/// - Maximum value is [`MAX_AMOUNT`]
///
/// # Example
/// ```
/// use account_transfer::domain::Amount;
///
/// let amount = Amount::new(100).unwrap();
/// assert_eq!(amount.value(), 100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Amount(u64);

/// Errors that can occur when creating an Amount or changing a Balance
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Amount must be positive (got {0})")]
    NotPositive(u64),

    #[error("Amount exceeds maximum allowed value ({MAX_AMOUNT})")]
    Overflow,

    #[error("Balance would drop below zero (have {available}, need {required})")]
    Underflow { available: u64, required: u64 },
}

impl Amount {
    /// Create a new Amount with validation.
    ///
    /// # Errors
    /// - `AmountError::NotPositive` if value is 0
    /// - `AmountError::Overflow` if value > [`MAX_AMOUNT`]
    pub fn new(value: u64) -> Result<Self, AmountError> {
        if value == 0 {
            return Err(AmountError::NotPositive(value));
        }

        if value > MAX_AMOUNT {
            return Err(AmountError::Overflow);
        }

        Ok(Self(value))
    }

    /// Get the underlying value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u64> for Amount {
    type Error = AmountError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl From<Amount> for u64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Balance represents a non-negative account figure (available or locked funds).
/// Unlike Amount, Balance can be zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(u64);

impl Balance {
    /// Create a new balance
    pub fn new(value: u64) -> Result<Self, AmountError> {
        if value > MAX_AMOUNT {
            return Err(AmountError::Overflow);
        }
        Ok(Self(value))
    }

    /// Create a zero balance
    pub fn zero() -> Self {
        Self(0)
    }

    /// Get the underlying value
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Check if balance covers the given value
    pub fn is_sufficient_for(&self, value: u64) -> bool {
        self.0 >= value
    }

    /// Add to balance
    pub fn credit(&self, value: u64) -> Result<Balance, AmountError> {
        let new_value = self.0.checked_add(value).ok_or(AmountError::Overflow)?;
        Balance::new(new_value)
    }

    /// Subtract from balance
    pub fn debit(&self, value: u64) -> Result<Balance, AmountError> {
        self.0
            .checked_sub(value)
            .map(Self)
            .ok_or(AmountError::Underflow {
                available: self.0,
                required: value,
            })
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_positive() {
        let amount = Amount::new(100);
        assert_eq!(amount.unwrap().value(), 100);
    }

    #[test]
    fn test_amount_zero_rejected() {
        assert!(matches!(Amount::new(0), Err(AmountError::NotPositive(0))));
    }

    #[test]
    fn test_amount_overflow() {
        assert!(matches!(Amount::new(MAX_AMOUNT + 1), Err(AmountError::Overflow)));
        assert!(Amount::new(MAX_AMOUNT).is_ok());
    }

    #[test]
    fn test_amount_serde_rejects_zero() {
        let ok: Amount = serde_json::from_str("7").unwrap();
        assert_eq!(ok.value(), 7);
        assert!(serde_json::from_str::<Amount>("0").is_err());
    }

    #[test]
    fn test_balance_credit_debit() {
        let balance = Balance::zero().credit(100).unwrap();
        assert_eq!(balance.value(), 100);

        let balance = balance.debit(30).unwrap();
        assert_eq!(balance.value(), 70);
    }

    #[test]
    fn test_balance_underflow() {
        let balance = Balance::new(50).unwrap();
        assert!(!balance.is_sufficient_for(100));
        assert_eq!(
            balance.debit(100),
            Err(AmountError::Underflow {
                available: 50,
                required: 100
            })
        );
    }
}
