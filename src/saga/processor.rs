//! Transfer processor
//!
//! Consumes the delivery channel, feeds the pending-transfer projection and
//! dispatches the follow-up command chosen by [`react`], at most once per
//! (event, purpose) even when the event is delivered repeatedly.
//!
//! A follow-up that fails for an infrastructure reason is delivered again
//! after a backoff. Rejections by the target account are final.

use std::sync::Arc;
use std::time::Duration;

use crate::bus::{EventReceiver, PublishedEvent};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::handlers::AccountCommandHandler;
use crate::idempotency::{DispatchKey, IdempotencyError, ProcessedEvents};
use crate::projection::PendingTransfers;

use super::transfer::{react, FollowUp};

/// How often an event is delivered again after its follow-up failed to append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedeliveryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RedeliveryPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl RedeliveryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.redelivery_max_attempts.max(1),
            backoff: config.redelivery_backoff(),
        }
    }

    fn delay(&self, attempts: u32) -> Duration {
        self.backoff * attempts
    }
}

/// Saga consumer
#[derive(Clone)]
pub struct TransferProcessor {
    handler: AccountCommandHandler,
    processed: Arc<ProcessedEvents>,
    pending: Arc<PendingTransfers>,
    redelivery: RedeliveryPolicy,
}

impl TransferProcessor {
    pub fn new(
        handler: AccountCommandHandler,
        processed: Arc<ProcessedEvents>,
        pending: Arc<PendingTransfers>,
    ) -> Self {
        Self {
            handler,
            processed,
            pending,
            redelivery: RedeliveryPolicy::default(),
        }
    }

    pub fn with_redelivery_policy(mut self, redelivery: RedeliveryPolicy) -> Self {
        self.redelivery = redelivery;
        self
    }

    pub fn pending(&self) -> &Arc<PendingTransfers> {
        &self.pending
    }

    pub fn processed(&self) -> &Arc<ProcessedEvents> {
        &self.processed
    }

    /// Handle one delivered event.
    ///
    /// Returns the events produced by the follow-up command, or `None` when
    /// the event needs no reaction or its reaction was already dispatched.
    pub async fn handle(&self, published: &PublishedEvent) -> AppResult<Option<Vec<PublishedEvent>>> {
        self.pending.apply(published).await;

        let Some(follow_up) = react(&published.event, &published.aggregate_id) else {
            return Ok(None);
        };

        let key = DispatchKey::new(published.event_id, follow_up.purpose());
        match self.processed.start_processing(key).await {
            Ok(None) => {}
            Ok(Some(_)) | Err(IdempotencyError::KeyInProgress(_)) => {
                tracing::debug!(
                    event_id = %published.event_id,
                    purpose = key.purpose,
                    "Follow-up already dispatched, skipping redelivery"
                );
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }
        let attempts = self
            .processed
            .get(&key)
            .await
            .map_or(1, |record| record.attempts);

        match self.dispatch(published, follow_up, attempts).await {
            Ok(events) => {
                let produced = events.iter().map(|event| event.event_id).collect();
                self.processed.mark_completed(&key, produced).await?;
                Ok(Some(events))
            }
            Err(e) => {
                let attempts = self.processed.mark_failed(&key, e.to_string()).await?;
                if e.is_retryable() {
                    self.schedule_redelivery(published, key, attempts);
                }
                Err(e)
            }
        }
    }

    async fn dispatch(
        &self,
        published: &PublishedEvent,
        follow_up: FollowUp,
        attempts: u32,
    ) -> AppResult<Vec<PublishedEvent>> {
        // An earlier attempt may have appended before failing
        if attempts > 1 {
            let existing = self
                .handler
                .events_caused_by(&follow_up.target, published.event_id)
                .await?;
            if !existing.is_empty() {
                tracing::info!(
                    event_id = %published.event_id,
                    target = %follow_up.target,
                    attempts,
                    "Follow-up already appended, publishing it again"
                );
                self.handler.publisher().publish(&existing);
                return Ok(existing);
            }
        }

        let context = published.context.caused_by(published.event_id);
        tracing::debug!(
            event_id = %published.event_id,
            origin = %published.aggregate_id,
            target = %follow_up.target,
            command_type = follow_up.purpose(),
            attempts,
            "Dispatching follow-up"
        );

        self.handler
            .execute(&follow_up.target, follow_up.command, context)
            .await
    }

    fn schedule_redelivery(&self, published: &PublishedEvent, key: DispatchKey, attempts: u32) {
        if attempts >= self.redelivery.max_attempts {
            tracing::error!(
                dispatch_key = %key,
                attempts,
                "Giving up on follow-up, transfer stays pending"
            );
            return;
        }

        let delay = self.redelivery.delay(attempts);
        tracing::warn!(
            dispatch_key = %key,
            attempts,
            delay_ms = delay.as_millis() as u64,
            "Follow-up failed, scheduling redelivery"
        );

        let publisher = self.handler.publisher().clone();
        let published = published.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            publisher.publish(std::slice::from_ref(&published));
        });
    }

    /// Process deliveries until every publisher is gone
    pub async fn run(self, mut receiver: EventReceiver) {
        tracing::info!("Transfer processor started");

        while let Some(published) = receiver.recv().await {
            self.handle_logged(&published).await;
        }

        tracing::info!("Delivery channel closed, transfer processor stopped");
    }

    /// Process everything currently queued, including follow-ups published
    /// while draining. Returns the number of events handled.
    pub async fn drain(&self, receiver: &mut EventReceiver) -> usize {
        let mut handled = 0;
        while let Ok(published) = receiver.try_recv() {
            self.handle_logged(&published).await;
            handled += 1;
        }
        handled
    }

    async fn handle_logged(&self, published: &PublishedEvent) {
        if let Err(e) = self.handle(published).await {
            log_failure(published, &e);
        }
    }
}

fn log_failure(published: &PublishedEvent, error: &AppError) {
    if error.is_rejection() {
        tracing::warn!(
            event_id = %published.event_id,
            account_id = %published.aggregate_id,
            event_type = published.event.event_type(),
            error_code = error.error_code(),
            "Follow-up command rejected"
        );
    } else {
        tracing::error!(
            event_id = %published.event_id,
            account_id = %published.aggregate_id,
            event_type = published.event.event_type(),
            error = %error,
            "Follow-up dispatch failed"
        );
    }
}
