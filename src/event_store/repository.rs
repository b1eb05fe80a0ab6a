//! Event Store Repository
//!
//! The append/load contract every storage backend implements, plus the
//! generic replay that turns a stream back into aggregate state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::domain::{AccountId, OperationContext};

use super::EventStoreError;

/// Event as persisted in a stream
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: AccountId,
    /// Position in the stream, starting at 1
    pub version: i64,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub context: OperationContext,
    pub created_at: DateTime<Utc>,
}

impl StoredEvent {
    /// Deserialize the payload into a typed event
    pub fn decode<E: DeserializeOwned>(&self) -> Result<E, EventStoreError> {
        serde_json::from_value(self.event_data.clone()).map_err(|e| {
            EventStoreError::InvalidEventData(format!(
                "{} v{} ({}): {}",
                self.aggregate_id, self.version, self.event_type, e
            ))
        })
    }
}

/// Event waiting to be appended
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: String,
    pub event_data: serde_json::Value,
}

impl NewEvent {
    /// Serialize a typed event for storage
    pub fn new<E: Serialize>(event_type: &str, event: &E) -> Result<Self, EventStoreError> {
        let event_data = serde_json::to_value(event)?;
        Ok(Self {
            event_type: event_type.to_string(),
            event_data,
        })
    }
}

/// Durable, per-aggregate ordered event log with optimistic concurrency
#[async_trait]
pub trait EventStore: Send + Sync {
    /// All events of one stream in version order. Empty means not found.
    async fn load_events(&self, aggregate_id: &AccountId) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Append events if the stream is still at `expected_version`.
    ///
    /// Either every event is appended or none is. The returned events carry
    /// their assigned ids and versions.
    async fn append(
        &self,
        aggregate_type: &str,
        aggregate_id: &AccountId,
        expected_version: i64,
        events: Vec<NewEvent>,
        context: &OperationContext,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;
}

/// Load an aggregate by replaying its events
pub async fn load_aggregate<A, S>(
    store: &S,
    aggregate_id: &AccountId,
) -> Result<Option<A>, EventStoreError>
where
    A: Aggregate<Id = AccountId>,
    A::Event: DeserializeOwned,
    S: EventStore + ?Sized,
{
    let events = store.load_events(aggregate_id).await?;
    if events.is_empty() {
        return Ok(None);
    }

    let mut aggregate = A::init(aggregate_id.clone());
    for stored_event in &events {
        let event: A::Event = stored_event.decode()?;
        aggregate = aggregate.apply(&event);
    }

    Ok(Some(aggregate))
}
