//! Account State
//!
//! Projection of an account's event stream into its current balances.
//! Folding performs no validation; the handler guarantees the events it
//! produces keep every figure non-negative.

use serde::{Deserialize, Serialize};

use crate::domain::{AccountEvent, AccountId, Balance};

use super::Aggregate;

/// Current state of one account, derived from events and never mutated directly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    id: AccountId,

    /// Set by AccountCreated, `None` before it
    name: Option<String>,

    /// Available (unlocked) funds
    balance_amount: Balance,

    /// Funds reserved by in-flight outgoing transfers
    locked_amount: Balance,

    frozen: bool,

    /// Number of events applied
    version: i64,
}

impl AccountState {
    pub fn is_created(&self) -> bool {
        self.name.is_some()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn balance_amount(&self) -> u64 {
        self.balance_amount.value()
    }

    pub fn locked_amount(&self) -> u64 {
        self.locked_amount.value()
    }

    /// Available plus locked funds. Both are capped at `MAX_AMOUNT`, so the
    /// sum fits in a u64.
    pub fn total_amount(&self) -> u64 {
        self.balance_amount.value() + self.locked_amount.value()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub(crate) fn balance(&self) -> &Balance {
        &self.balance_amount
    }

    pub(crate) fn locked(&self) -> &Balance {
        &self.locked_amount
    }

    fn credit_available(&mut self, amount: u64, event_type: &str) {
        match self.balance_amount.credit(amount) {
            Ok(balance) => self.balance_amount = balance,
            Err(e) => tracing::error!(
                account_id = %self.id,
                event_type,
                error = %e,
                "Balance overflow during replay"
            ),
        }
    }

    fn debit_available(&mut self, amount: u64, event_type: &str) {
        match self.balance_amount.debit(amount) {
            Ok(balance) => self.balance_amount = balance,
            Err(e) => tracing::error!(
                account_id = %self.id,
                event_type,
                error = %e,
                "Balance underflow during replay"
            ),
        }
    }

    fn credit_locked(&mut self, amount: u64, event_type: &str) {
        match self.locked_amount.credit(amount) {
            Ok(locked) => self.locked_amount = locked,
            Err(e) => tracing::error!(
                account_id = %self.id,
                event_type,
                error = %e,
                "Locked amount overflow during replay"
            ),
        }
    }

    fn debit_locked(&mut self, amount: u64, event_type: &str) {
        match self.locked_amount.debit(amount) {
            Ok(locked) => self.locked_amount = locked,
            Err(e) => tracing::error!(
                account_id = %self.id,
                event_type,
                error = %e,
                "Locked amount underflow during replay"
            ),
        }
    }
}

impl Aggregate for AccountState {
    type Id = AccountId;
    type Event = AccountEvent;

    fn aggregate_type() -> &'static str {
        "Account"
    }

    fn init(id: AccountId) -> Self {
        Self {
            id,
            name: None,
            balance_amount: Balance::zero(),
            locked_amount: Balance::zero(),
            frozen: false,
            version: 0,
        }
    }

    fn id(&self) -> &AccountId {
        &self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(mut self, event: &AccountEvent) -> Self {
        let event_type = event.event_type();
        match event {
            AccountEvent::AccountCreated { name, balance } => {
                self.name = Some(name.clone());
                self.balance_amount = Balance::zero();
                self.credit_available(*balance, event_type);
            }

            AccountEvent::AmountLocked { amount } => {
                self.debit_available(*amount, event_type);
                self.credit_locked(*amount, event_type);
            }

            AccountEvent::AmountEntered { amount, .. } => {
                self.credit_available(*amount, event_type);
            }

            AccountEvent::Confirmed { amount } => {
                self.debit_locked(*amount, event_type);
            }

            AccountEvent::AmountUnlocked { amount } => {
                self.debit_locked(*amount, event_type);
                self.credit_available(*amount, event_type);
            }

            AccountEvent::AccountFrozen { .. } => {
                self.frozen = true;
            }

            AccountEvent::AccountUnfrozen { .. } => {
                self.frozen = false;
            }

            // Announcements only; balances already moved or stay put
            AccountEvent::Prepared { .. } | AccountEvent::EntryFailed { .. } => {}
        }

        self.version += 1;
        self
    }
}
