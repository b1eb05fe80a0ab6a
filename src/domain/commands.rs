//! Command definitions
//!
//! Commands represent intentions to change one account. The account they
//! address travels beside the command, never inside it.

use serde::{Deserialize, Serialize};

use super::{AccountId, Amount};

/// Commands accepted by the account aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AccountCommand {
    /// Open the account with an opening balance (may be zero)
    CreateAccount { name: String, balance: u64 },

    /// Reserve funds and announce an outgoing transfer to `to`
    Prepare { to: AccountId, amount: Amount },

    /// Credit an incoming transfer from `source_id`
    Entry { source_id: AccountId, amount: Amount },

    /// Finalize a reservation after the destination was credited
    Confirm { source_id: AccountId, amount: Amount },

    /// Reserve funds without announcing a transfer
    LockAmount { amount: Amount },

    /// Return reserved funds after the destination refused them
    UnlockAmount { source_id: AccountId, amount: Amount },

    FreezeAccount { reason: String },

    UnfreezeAccount { reason: String },
}

impl AccountCommand {
    pub fn create(name: impl Into<String>, balance: u64) -> Self {
        Self::CreateAccount {
            name: name.into(),
            balance,
        }
    }

    pub fn prepare(to: AccountId, amount: Amount) -> Self {
        Self::Prepare { to, amount }
    }

    pub fn freeze(reason: impl Into<String>) -> Self {
        Self::FreezeAccount {
            reason: reason.into(),
        }
    }

    pub fn unfreeze(reason: impl Into<String>) -> Self {
        Self::UnfreezeAccount {
            reason: reason.into(),
        }
    }

    /// Get the command type as a string
    pub fn command_type(&self) -> &'static str {
        match self {
            AccountCommand::CreateAccount { .. } => "CreateAccount",
            AccountCommand::Prepare { .. } => "Prepare",
            AccountCommand::Entry { .. } => "Entry",
            AccountCommand::Confirm { .. } => "Confirm",
            AccountCommand::LockAmount { .. } => "LockAmount",
            AccountCommand::UnlockAmount { .. } => "UnlockAmount",
            AccountCommand::FreezeAccount { .. } => "FreezeAccount",
            AccountCommand::UnfreezeAccount { .. } => "UnfreezeAccount",
        }
    }

    pub fn is_creation(&self) -> bool {
        matches!(self, AccountCommand::CreateAccount { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_constructors() {
        let cmd = AccountCommand::create("alice", 100);
        assert!(cmd.is_creation());
        assert_eq!(cmd.command_type(), "CreateAccount");

        let cmd = AccountCommand::prepare(AccountId::from("bob"), Amount::new(5).unwrap());
        assert!(!cmd.is_creation());
        assert_eq!(cmd.command_type(), "Prepare");
    }

    #[test]
    fn test_command_deserialization_validates_amount() {
        let json = r#"{"type":"LockAmount","amount":0}"#;
        assert!(serde_json::from_str::<AccountCommand>(json).is_err());

        let json = r#"{"type":"LockAmount","amount":10}"#;
        let cmd: AccountCommand = serde_json::from_str(json).unwrap();
        assert_eq!(
            cmd,
            AccountCommand::LockAmount {
                amount: Amount::new(10).unwrap()
            }
        );
    }
}
