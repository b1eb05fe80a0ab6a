//! Operation Context
//!
//! Metadata stored beside every event for tracing a transfer across
//! both account streams.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Context for an operation, used for auditing and tracing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationContext {
    /// Shared by every command and event belonging to one transfer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,

    /// Id of the event that triggered this command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<Uuid>,

    /// Free-form description of who submitted the command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initiated_by: Option<String>,
}

impl OperationContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create context with correlation ID
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Create context with the submitter's name
    pub fn with_initiator(mut self, initiated_by: impl Into<String>) -> Self {
        self.initiated_by = Some(initiated_by.into());
        self
    }

    /// Generate a new correlation ID if not present
    pub fn ensure_correlation_id(&mut self) -> Uuid {
        *self.correlation_id.get_or_insert_with(Uuid::new_v4)
    }

    /// Context for a follow-up command triggered by `event_id`.
    /// Keeps the correlation, replaces the causation.
    pub fn caused_by(&self, event_id: Uuid) -> Self {
        Self {
            correlation_id: self.correlation_id,
            causation_id: Some(event_id),
            initiated_by: self.initiated_by.clone(),
        }
    }
}
