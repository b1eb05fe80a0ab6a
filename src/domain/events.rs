//! Domain Events
//!
//! Event definitions for Event Sourcing.
//! Events are immutable facts that have happened to an account. Each one
//! carries only what folding and the transfer choreography need.

use serde::{Deserialize, Serialize};

use super::AccountId;

/// Account-related events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AccountEvent {
    /// Account was created with an opening balance
    AccountCreated { name: String, balance: u64 },

    /// Funds moved from available balance into the locked pool
    AmountLocked { amount: u64 },

    /// Outgoing transfer announced; funds for it are already locked
    Prepared { to: AccountId, amount: u64 },

    /// Incoming transfer credited to the available balance
    AmountEntered { source_id: AccountId, amount: u64 },

    /// Incoming transfer refused because this account is frozen
    EntryFailed { source_id: AccountId, amount: u64 },

    /// Locked funds released for good (debit finalized)
    Confirmed { amount: u64 },

    /// Locked funds returned to the available balance (debit reversed)
    AmountUnlocked { amount: u64 },

    /// Account was frozen
    AccountFrozen { reason: String },

    /// Account was unfrozen
    AccountUnfrozen { reason: String },
}

impl AccountEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            AccountEvent::AccountCreated { .. } => "AccountCreated",
            AccountEvent::AmountLocked { .. } => "AmountLocked",
            AccountEvent::Prepared { .. } => "Prepared",
            AccountEvent::AmountEntered { .. } => "AmountEntered",
            AccountEvent::EntryFailed { .. } => "EntryFailed",
            AccountEvent::Confirmed { .. } => "Confirmed",
            AccountEvent::AmountUnlocked { .. } => "AmountUnlocked",
            AccountEvent::AccountFrozen { .. } => "AccountFrozen",
            AccountEvent::AccountUnfrozen { .. } => "AccountUnfrozen",
        }
    }

    /// Whether this event closes an outstanding reservation on the source account
    pub fn is_transfer_resolution(&self) -> bool {
        matches!(
            self,
            AccountEvent::Confirmed { .. } | AccountEvent::AmountUnlocked { .. }
        )
    }
}
