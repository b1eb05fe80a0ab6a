//! Transfer saga
//!
//! `transfer` decides, `processor` delivers.

pub mod processor;
pub mod transfer;

pub use processor::{RedeliveryPolicy, TransferProcessor};
pub use transfer::{react, FollowUp};
