//! In-memory event store
//!
//! Process-local backend used by tests, the demo runner and the load test.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{AccountId, OperationContext};

use super::{EventStore, EventStoreError, NewEvent, StoredEvent};

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<AccountId, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of events across all streams
    pub async fn event_count(&self) -> usize {
        self.streams.read().await.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn load_events(&self, aggregate_id: &AccountId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self.streams.read().await;
        Ok(streams.get(aggregate_id).cloned().unwrap_or_default())
    }

    async fn append(
        &self,
        aggregate_type: &str,
        aggregate_id: &AccountId,
        expected_version: i64,
        events: Vec<NewEvent>,
        context: &OperationContext,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let mut streams = self.streams.write().await;

        let current_version = streams.get(aggregate_id).map_or(0, Vec::len) as i64;
        if current_version != expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id: aggregate_id.clone(),
                expected: expected_version,
                actual: current_version,
            });
        }

        let now = Utc::now();
        let appended: Vec<StoredEvent> = events
            .into_iter()
            .enumerate()
            .map(|(idx, event)| StoredEvent {
                id: Uuid::new_v4(),
                aggregate_type: aggregate_type.to_string(),
                aggregate_id: aggregate_id.clone(),
                version: expected_version + idx as i64 + 1,
                event_type: event.event_type,
                event_data: event.event_data,
                context: context.clone(),
                created_at: now,
            })
            .collect();

        if !appended.is_empty() {
            streams
                .entry(aggregate_id.clone())
                .or_default()
                .extend(appended.iter().cloned());
        }

        Ok(appended)
    }
}
