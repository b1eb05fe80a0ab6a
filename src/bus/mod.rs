//! Event delivery
//!
//! After a successful append every event is handed to the delivery channel,
//! tagged with the account that emitted it. Consumers must treat delivery as
//! at-least-once: the same event may show up more than once.

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::{AccountEvent, AccountId, OperationContext};

/// An appended event as seen by subscribers
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEvent {
    pub event_id: Uuid,
    /// Account whose stream the event was appended to
    pub aggregate_id: AccountId,
    pub version: i64,
    pub event: AccountEvent,
    pub context: OperationContext,
}

/// Sending half of the delivery channel
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: mpsc::UnboundedSender<PublishedEvent>,
}

/// Receiving half of the delivery channel
pub type EventReceiver = mpsc::UnboundedReceiver<PublishedEvent>;

impl EventPublisher {
    /// Create a connected publisher/receiver pair
    pub fn channel() -> (Self, EventReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Publish events in order.
    ///
    /// The events are already durable, so a closed channel is logged rather
    /// than reported to the caller.
    pub fn publish(&self, events: &[PublishedEvent]) {
        for event in events {
            if self.sender.send(event.clone()).is_err() {
                tracing::warn!(
                    event_id = %event.event_id,
                    account_id = %event.aggregate_id,
                    event_type = event.event.event_type(),
                    "Delivery channel closed, event not published"
                );
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
