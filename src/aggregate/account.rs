//! Account Aggregate
//!
//! Command side of the account: validates one command against the folded
//! [`AccountState`] and returns the events to append. Nothing here performs
//! I/O or mutates state.

use crate::domain::{AccountCommand, AccountEvent, DomainError, MAX_AMOUNT};

use super::{Aggregate, AccountState};

/// Command handler for accounts
#[derive(Debug, Clone, Copy, Default)]
pub struct Account;

impl Account {
    /// Decide which events a command produces.
    ///
    /// Events are returned in append order. On error nothing was produced.
    pub fn handle(
        state: &AccountState,
        command: AccountCommand,
    ) -> Result<Vec<AccountEvent>, DomainError> {
        if command.is_creation() == state.is_created() {
            return Err(if state.is_created() {
                DomainError::AccountAlreadyExists(state.id().clone())
            } else {
                DomainError::AccountNotFound(state.id().clone())
            });
        }

        match command {
            AccountCommand::CreateAccount { name, balance } => {
                if balance > MAX_AMOUNT {
                    return Err(DomainError::BalanceLimitExceeded {
                        requested: balance,
                        limit: MAX_AMOUNT,
                    });
                }
                Ok(vec![AccountEvent::AccountCreated { name, balance }])
            }

            AccountCommand::Prepare { to, amount } => {
                if &to == state.id() {
                    return Err(DomainError::SameAccountTransfer);
                }
                if state.is_frozen() {
                    return Err(DomainError::AccountFrozen);
                }
                Self::ensure_available(state, amount.value())?;

                Ok(vec![
                    AccountEvent::AmountLocked {
                        amount: amount.value(),
                    },
                    AccountEvent::Prepared {
                        to,
                        amount: amount.value(),
                    },
                ])
            }

            // Never rejected: a destination that cannot take the credit
            // still has to answer so the source can be compensated.
            AccountCommand::Entry { source_id, amount } => {
                let amount = amount.value();
                if state.is_frozen() || state.balance().credit(amount).is_err() {
                    Ok(vec![AccountEvent::EntryFailed { source_id, amount }])
                } else {
                    Ok(vec![AccountEvent::AmountEntered { source_id, amount }])
                }
            }

            AccountCommand::Confirm { amount, .. } => {
                Self::ensure_locked(state, amount.value())?;
                Ok(vec![AccountEvent::Confirmed {
                    amount: amount.value(),
                }])
            }

            AccountCommand::LockAmount { amount } => {
                Self::ensure_available(state, amount.value())?;
                Ok(vec![AccountEvent::AmountLocked {
                    amount: amount.value(),
                }])
            }

            AccountCommand::UnlockAmount { amount, .. } => {
                Self::ensure_locked(state, amount.value())?;
                Ok(vec![AccountEvent::AmountUnlocked {
                    amount: amount.value(),
                }])
            }

            AccountCommand::FreezeAccount { reason } => {
                if state.is_frozen() {
                    return Err(DomainError::AlreadyFrozen);
                }
                Ok(vec![AccountEvent::AccountFrozen { reason }])
            }

            AccountCommand::UnfreezeAccount { reason } => {
                if !state.is_frozen() {
                    return Err(DomainError::NotFrozen);
                }
                Ok(vec![AccountEvent::AccountUnfrozen { reason }])
            }
        }
    }

    fn ensure_available(state: &AccountState, amount: u64) -> Result<(), DomainError> {
        if !state.balance().is_sufficient_for(amount) {
            return Err(DomainError::insufficient_funds(
                amount,
                state.balance_amount(),
            ));
        }
        if state.locked().credit(amount).is_err() {
            return Err(DomainError::BalanceLimitExceeded {
                requested: state.locked_amount().saturating_add(amount),
                limit: MAX_AMOUNT,
            });
        }
        Ok(())
    }

    fn ensure_locked(state: &AccountState, amount: u64) -> Result<(), DomainError> {
        if !state.locked().is_sufficient_for(amount) {
            return Err(DomainError::InsufficientLocked {
                required: amount,
                locked: state.locked_amount(),
            });
        }
        Ok(())
    }
}
