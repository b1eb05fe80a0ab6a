//! PostgreSQL event store
//!
//! Streams live in the `events` table (see `migrations/`). The unique
//! `(aggregate_id, version)` constraint is the last line of the optimistic
//! concurrency check: a racing writer that passes the version read still
//! fails on insert.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{AccountId, OperationContext};

use super::{EventStore, EventStoreError, NewEvent, StoredEvent};

/// SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

type EventRow = (
    Uuid,
    String,
    String,
    i64,
    String,
    serde_json::Value,
    serde_json::Value,
    DateTime<Utc>,
);

/// Event Store backed by PostgreSQL
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Create a new PgEventStore with a database pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get current version of an aggregate
    async fn get_current_version(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        aggregate_id: &AccountId,
    ) -> Result<i64, EventStoreError> {
        let result: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(version) FROM events WHERE aggregate_id = $1
            "#,
        )
        .bind(aggregate_id.as_str())
        .fetch_optional(&mut **tx)
        .await?
        .flatten();

        Ok(result.unwrap_or(0))
    }

    fn into_stored_event(row: EventRow) -> Result<StoredEvent, EventStoreError> {
        let (id, aggregate_type, aggregate_id, version, event_type, event_data, context, created_at) =
            row;
        Ok(StoredEvent {
            id,
            aggregate_type,
            aggregate_id: AccountId::from(aggregate_id),
            version,
            event_type,
            event_data,
            context: serde_json::from_value(context)?,
            created_at,
        })
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db_error) => db_error.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn load_events(&self, aggregate_id: &AccountId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT id, aggregate_type, aggregate_id, version, event_type, event_data, context, created_at
            FROM events
            WHERE aggregate_id = $1
            ORDER BY version ASC
            "#,
        )
        .bind(aggregate_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::into_stored_event).collect()
    }

    async fn append(
        &self,
        aggregate_type: &str,
        aggregate_id: &AccountId,
        expected_version: i64,
        events: Vec<NewEvent>,
        context: &OperationContext,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let context_json = serde_json::to_value(context)?;

        let mut tx = self.pool.begin().await?;

        let current_version = self.get_current_version(&mut tx, aggregate_id).await?;
        if current_version != expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id: aggregate_id.clone(),
                expected: expected_version,
                actual: current_version,
            });
        }

        let mut appended = Vec::with_capacity(events.len());

        for (idx, event) in events.into_iter().enumerate() {
            let id = Uuid::new_v4();
            let version = expected_version + idx as i64 + 1;

            let inserted: Result<DateTime<Utc>, sqlx::Error> = sqlx::query_scalar(
                r#"
                INSERT INTO events (
                    id, aggregate_type, aggregate_id, version,
                    event_type, event_data, context
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING created_at
                "#,
            )
            .bind(id)
            .bind(aggregate_type)
            .bind(aggregate_id.as_str())
            .bind(version)
            .bind(&event.event_type)
            .bind(&event.event_data)
            .bind(&context_json)
            .fetch_one(&mut *tx)
            .await;

            let created_at = match inserted {
                Ok(created_at) => created_at,
                Err(e) if is_unique_violation(&e) => {
                    // Lost the race after the version read
                    return Err(EventStoreError::ConcurrencyConflict {
                        aggregate_id: aggregate_id.clone(),
                        expected: expected_version,
                        actual: version,
                    });
                }
                Err(e) => return Err(e.into()),
            };

            appended.push(StoredEvent {
                id,
                aggregate_type: aggregate_type.to_string(),
                aggregate_id: aggregate_id.clone(),
                version,
                event_type: event.event_type,
                event_data: event.event_data,
                context: context.clone(),
                created_at,
            });
        }

        tx.commit().await?;

        Ok(appended)
    }
}
