//! Command Handlers module
//!
//! Coordinates the account aggregate, the event store and delivery.

mod command_handler;


pub use command_handler::{AccountCommandHandler, RetryPolicy};
