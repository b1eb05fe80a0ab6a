//! Event Store module
//!
//! Persistence layer for Event Sourcing.
//! Stores per-account event streams with optimistic concurrency, in
//! memory or in PostgreSQL.

mod error;
mod memory;
mod postgres;
mod repository;

pub use error::EventStoreError;
pub use memory::InMemoryEventStore;
pub use postgres::PgEventStore;
pub use repository::{load_aggregate, EventStore, NewEvent, StoredEvent};
