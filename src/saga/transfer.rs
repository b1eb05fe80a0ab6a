//! Transfer choreography
//!
//! Maps one published account event to at most one follow-up command.
//! Holds no state: everything it needs travels on the event, and the
//! outcome of a transfer is fully recorded in the two account streams.
//!
//! ```text
//! S: Prepare ──► AmountLocked, Prepared{to: D}
//!                               │
//!                               ▼
//! D: Entry{source: S} ──► AmountEntered ──► S: Confirm      ──► Confirmed
//!                     └─► EntryFailed   ──► S: UnlockAmount ──► AmountUnlocked
//! ```

use crate::domain::{AccountCommand, AccountEvent, AccountId, Amount};

/// A command addressed to a specific account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUp {
    pub target: AccountId,
    pub command: AccountCommand,
}

impl FollowUp {
    /// What the command is for; with the triggering event id this identifies
    /// one dispatch for deduplication
    pub fn purpose(&self) -> &'static str {
        self.command.command_type()
    }
}

/// React to an event emitted by account `origin`
pub fn react(event: &AccountEvent, origin: &AccountId) -> Option<FollowUp> {
    match event {
        AccountEvent::Prepared { to, amount } => Some(FollowUp {
            target: to.clone(),
            command: AccountCommand::Entry {
                source_id: origin.clone(),
                amount: saga_amount(*amount)?,
            },
        }),

        AccountEvent::AmountEntered { source_id, amount } => Some(FollowUp {
            target: source_id.clone(),
            command: AccountCommand::Confirm {
                source_id: source_id.clone(),
                amount: saga_amount(*amount)?,
            },
        }),

        AccountEvent::EntryFailed { source_id, amount } => Some(FollowUp {
            target: source_id.clone(),
            command: AccountCommand::UnlockAmount {
                source_id: origin.clone(),
                amount: saga_amount(*amount)?,
            },
        }),

        _ => None,
    }
}

/// Events only ever carry amounts that passed command validation
fn saga_amount(amount: u64) -> Option<Amount> {
    match Amount::new(amount) {
        Ok(amount) => Some(amount),
        Err(e) => {
            tracing::error!(amount, error = %e, "Transfer event carries an invalid amount");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(value: u64) -> Amount {
        Amount::new(value).unwrap()
    }

    #[test]
    fn test_prepared_becomes_entry_on_destination() {
        let source = AccountId::from("S");
        let destination = AccountId::from("D");

        let follow_up = react(
            &AccountEvent::Prepared {
                to: destination.clone(),
                amount: 40,
            },
            &source,
        )
        .unwrap();

        assert_eq!(follow_up.target, destination);
        assert_eq!(
            follow_up.command,
            AccountCommand::Entry {
                source_id: source,
                amount: amount(40)
            }
        );
        assert_eq!(follow_up.purpose(), "Entry");
    }

    #[test]
    fn test_amount_entered_becomes_confirm_on_source() {
        let source = AccountId::from("S");

        let follow_up = react(
            &AccountEvent::AmountEntered {
                source_id: source.clone(),
                amount: 40,
            },
            &AccountId::from("D"),
        )
        .unwrap();

        assert_eq!(follow_up.target, source);
        assert_eq!(
            follow_up.command,
            AccountCommand::Confirm {
                source_id: source,
                amount: amount(40)
            }
        );
    }

    #[test]
    fn test_entry_failed_becomes_unlock_on_source() {
        let source = AccountId::from("S");
        let destination = AccountId::from("D");

        let follow_up = react(
            &AccountEvent::EntryFailed {
                source_id: source.clone(),
                amount: 40,
            },
            &destination,
        )
        .unwrap();

        assert_eq!(follow_up.target, source);
        assert_eq!(
            follow_up.command,
            AccountCommand::UnlockAmount {
                source_id: destination,
                amount: amount(40)
            }
        );
        assert_eq!(follow_up.purpose(), "UnlockAmount");
    }

    #[test]
    fn test_other_events_produce_nothing() {
        let origin = AccountId::from("S");
        let quiet = [
            AccountEvent::AccountCreated {
                name: "n".to_string(),
                balance: 1,
            },
            AccountEvent::AmountLocked { amount: 1 },
            AccountEvent::Confirmed { amount: 1 },
            AccountEvent::AmountUnlocked { amount: 1 },
            AccountEvent::AccountFrozen {
                reason: String::new(),
            },
            AccountEvent::AccountUnfrozen {
                reason: String::new(),
            },
        ];

        for event in &quiet {
            assert!(react(event, &origin).is_none(), "{}", event.event_type());
        }
    }

    #[test]
    fn test_reaction_is_deterministic() {
        let event = AccountEvent::Prepared {
            to: AccountId::from("D"),
            amount: 7,
        };
        let origin = AccountId::from("S");
        assert_eq!(react(&event, &origin), react(&event, &origin));
    }
}
