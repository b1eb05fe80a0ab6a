//! Processed-event ledger
//!
//! Remembers which (event, purpose) pairs already produced a follow-up
//! command so a redelivered event is not dispatched twice.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Dispatch status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for DispatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchStatus::Processing => write!(f, "processing"),
            DispatchStatus::Completed => write!(f, "completed"),
            DispatchStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One follow-up dispatch: the triggering event and what the command is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchKey {
    pub event_id: Uuid,
    pub purpose: &'static str,
}

impl DispatchKey {
    pub fn new(event_id: Uuid, purpose: &'static str) -> Self {
        Self { event_id, purpose }
    }
}

impl std::fmt::Display for DispatchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.event_id, self.purpose)
    }
}

/// Stored dispatch information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRecord {
    pub key: DispatchKey,
    pub status: DispatchStatus,
    /// Number of times the dispatch was claimed
    pub attempts: u32,
    /// Events appended by the follow-up command
    pub produced_event_ids: Vec<Uuid>,
    pub failure: Option<String>,
    pub processing_started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Idempotency errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdempotencyError {
    #[error("Key already exists and is being processed: {0}")]
    KeyInProgress(DispatchKey),

    #[error("Key not found: {0}")]
    NotFound(DispatchKey),
}

/// In-process ledger of follow-up dispatches
#[derive(Debug)]
pub struct ProcessedEvents {
    records: Mutex<HashMap<DispatchKey, DispatchRecord>>,
    /// A Processing entry older than this is considered abandoned
    processing_timeout: Duration,
}

impl Default for ProcessedEvents {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl ProcessedEvents {
    pub fn new(processing_timeout: Duration) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            processing_timeout,
        }
    }

    /// Get an existing record
    pub async fn get(&self, key: &DispatchKey) -> Option<DispatchRecord> {
        self.records.lock().await.get(key).cloned()
    }

    /// Claim a key before dispatching.
    ///
    /// Returns Ok(None) if the caller now owns the dispatch,
    /// Ok(Some(record)) if it already completed (caller should skip),
    /// Err(KeyInProgress) if another delivery is dispatching it right now.
    pub async fn start_processing(
        &self,
        key: DispatchKey,
    ) -> Result<Option<DispatchRecord>, IdempotencyError> {
        let now = Utc::now();
        let mut records = self.records.lock().await;

        if let Some(existing) = records.get_mut(&key) {
            match existing.status {
                DispatchStatus::Completed => return Ok(Some(existing.clone())),
                DispatchStatus::Processing if !self.is_abandoned(existing, now) => {
                    return Err(IdempotencyError::KeyInProgress(key));
                }
                // Failed or abandoned - take it over
                _ => {
                    existing.status = DispatchStatus::Processing;
                    existing.attempts += 1;
                    existing.failure = None;
                    existing.processing_started_at = now;
                    existing.updated_at = now;
                    return Ok(None);
                }
            }
        }

        records.insert(
            key,
            DispatchRecord {
                key,
                status: DispatchStatus::Processing,
                attempts: 1,
                produced_event_ids: Vec::new(),
                failure: None,
                processing_started_at: now,
                updated_at: now,
            },
        );

        Ok(None)
    }

    /// Mark a dispatch as completed
    pub async fn mark_completed(
        &self,
        key: &DispatchKey,
        produced_event_ids: Vec<Uuid>,
    ) -> Result<(), IdempotencyError> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(key)
            .ok_or(IdempotencyError::NotFound(*key))?;

        record.status = DispatchStatus::Completed;
        record.produced_event_ids = produced_event_ids;
        record.updated_at = Utc::now();
        Ok(())
    }

    /// Mark a dispatch as failed so a redelivery may try again.
    /// Returns the number of attempts made so far.
    pub async fn mark_failed(
        &self,
        key: &DispatchKey,
        failure: impl Into<String>,
    ) -> Result<u32, IdempotencyError> {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(key)
            .ok_or(IdempotencyError::NotFound(*key))?;

        record.status = DispatchStatus::Failed;
        record.failure = Some(failure.into());
        record.updated_at = Utc::now();
        Ok(record.attempts)
    }

    /// Reset Processing entries older than the processing timeout to Failed
    pub async fn reset_stale(&self) -> u64 {
        let now = Utc::now();
        let mut records = self.records.lock().await;
        let mut reset = 0;
        for record in records.values_mut() {
            if record.status == DispatchStatus::Processing && self.is_abandoned(record, now) {
                record.status = DispatchStatus::Failed;
                record.failure = Some("processing timed out".to_string());
                record.updated_at = now;
                reset += 1;
            }
        }
        reset
    }

    /// Delete settled entries last touched before `now - retention`
    pub async fn cleanup_expired(&self, retention: chrono::Duration, now: DateTime<Utc>) -> u64 {
        let cutoff = now - retention;

        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| {
            record.status == DispatchStatus::Processing || record.updated_at >= cutoff
        });
        (before - records.len()) as u64
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    fn is_abandoned(&self, record: &DispatchRecord, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.processing_timeout) {
            Ok(timeout) => now - record.processing_started_at >= timeout,
            Err(_) => false,
        }
    }
}
