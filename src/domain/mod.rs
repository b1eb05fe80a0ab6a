//! Domain module
//!
//! Core domain types and business logic.

pub mod account_id;
pub mod amount;
pub mod commands;
pub mod context;
pub mod error;
pub mod events;

pub use account_id::AccountId;
pub use amount::{Amount, AmountError, Balance, MAX_AMOUNT};
pub use commands::AccountCommand;
pub use context::OperationContext;
pub use error::DomainError;
pub use events::AccountEvent;
