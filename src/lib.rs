//! account_transfer library
//!
//! Event-sourced accounts with a choreographed two-account transfer.
//! Re-exports modules for integration testing and the binaries.

pub mod aggregate;
pub mod bus;
pub mod config;
pub mod db;
pub mod domain;
pub mod event_store;
pub mod handlers;
pub mod idempotency;
pub mod jobs;
pub mod projection;
pub mod saga;

mod error;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use domain::{AccountCommand, AccountEvent, AccountId, Amount, DomainError, OperationContext};
