//! Idempotency module
//!
//! Prevents duplicate follow-up dispatch under at-least-once delivery.

mod repository;

pub use repository::{DispatchKey, DispatchRecord, DispatchStatus, IdempotencyError, ProcessedEvents};
