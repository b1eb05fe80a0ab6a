//! Projection module
//!
//! Read models derived from published events.

mod service;

pub use service::{PendingTransfer, PendingTransfers, TransferStage, TransferStats};
