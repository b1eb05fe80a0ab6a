//! Account Command Handler
//!
//! Runs one command against one account: load, validate, append, publish.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::aggregate::{Account, AccountState, Aggregate};
use crate::bus::{EventPublisher, PublishedEvent};
use crate::config::Config;
use crate::domain::{AccountCommand, AccountEvent, AccountId, DomainError, OperationContext};
use crate::error::{AppError, AppResult};
use crate::event_store::{load_aggregate, EventStore, EventStoreError, NewEvent, StoredEvent};

/// How often a command is resubmitted after losing an append race
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.append_max_retries.max(1),
            backoff: config.append_retry_backoff(),
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.backoff * (attempt + 1)
    }
}

/// Handler for account commands
#[derive(Clone)]
pub struct AccountCommandHandler {
    event_store: Arc<dyn EventStore>,
    publisher: EventPublisher,
    retry: RetryPolicy,
}

impl AccountCommandHandler {
    pub fn new(event_store: Arc<dyn EventStore>, publisher: EventPublisher) -> Self {
        Self {
            event_store,
            publisher,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    /// Current folded state of an account
    pub async fn load(&self, account_id: &AccountId) -> AppResult<Option<AccountState>> {
        Ok(load_aggregate(self.event_store.as_ref(), account_id).await?)
    }

    /// Events already on `account_id` whose command was triggered by `causation_id`
    pub async fn events_caused_by(
        &self,
        account_id: &AccountId,
        causation_id: Uuid,
    ) -> AppResult<Vec<PublishedEvent>> {
        let stored: Vec<StoredEvent> = self
            .event_store
            .load_events(account_id)
            .await?
            .into_iter()
            .filter(|stored| stored.context.causation_id == Some(causation_id))
            .collect();
        let events = stored
            .iter()
            .map(StoredEvent::decode::<AccountEvent>)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::to_published(stored, events))
    }

    /// Execute one command against `account_id`.
    ///
    /// Returns the appended events in order, after they were published.
    /// Validation failures are returned as [`AppError::Domain`] and never
    /// retried; append conflicts reload and re-validate.
    pub async fn execute(
        &self,
        account_id: &AccountId,
        command: AccountCommand,
        context: OperationContext,
    ) -> AppResult<Vec<PublishedEvent>> {
        let mut context = context;
        let correlation_id = context.ensure_correlation_id();
        let command_type = command.command_type();

        for attempt in 0..self.retry.max_retries {
            let state = self.load_for(account_id, &command).await?;
            let expected_version = state.version();

            let events = match Account::handle(&state, command.clone()) {
                Ok(events) => events,
                Err(e) => {
                    tracing::info!(
                        account_id = %account_id,
                        command_type,
                        %correlation_id,
                        error = %e,
                        "Command rejected"
                    );
                    return Err(e.into());
                }
            };

            if events.is_empty() {
                return Ok(Vec::new());
            }

            match self
                .append(account_id, expected_version, &events, &context)
                .await
            {
                Ok(stored) => {
                    let published = Self::to_published(stored, events);
                    tracing::debug!(
                        account_id = %account_id,
                        command_type,
                        %correlation_id,
                        version = expected_version + published.len() as i64,
                        "Command applied"
                    );
                    self.publisher.publish(&published);
                    return Ok(published);
                }
                Err(EventStoreError::ConcurrencyConflict { .. })
                    if attempt + 1 < self.retry.max_retries =>
                {
                    tracing::warn!(
                        account_id = %account_id,
                        command_type,
                        "Concurrency conflict, retrying (attempt {}/{})",
                        attempt + 1,
                        self.retry.max_retries
                    );
                    tokio::time::sleep(self.retry.delay(attempt)).await;
                }
                Err(EventStoreError::ConcurrencyConflict { .. }) => break,
                Err(e) => {
                    tracing::error!(account_id = %account_id, command_type, error = %e, "Append failed");
                    return Err(e.into());
                }
            }
        }

        tracing::error!(account_id = %account_id, command_type, "Giving up after repeated conflicts");
        Err(EventStoreError::MaxRetriesExceeded.into())
    }

    /// Load the account, treating a missing stream as empty only for creation
    async fn load_for(
        &self,
        account_id: &AccountId,
        command: &AccountCommand,
    ) -> AppResult<AccountState> {
        match self.load(account_id).await? {
            Some(state) => Ok(state),
            None if command.is_creation() => Ok(AccountState::init(account_id.clone())),
            None => Err(AppError::Domain(DomainError::AccountNotFound(
                account_id.clone(),
            ))),
        }
    }

    async fn append(
        &self,
        account_id: &AccountId,
        expected_version: i64,
        events: &[AccountEvent],
        context: &OperationContext,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let new_events = events
            .iter()
            .map(|event| NewEvent::new(event.event_type(), event))
            .collect::<Result<Vec<_>, _>>()?;

        self.event_store
            .append(
                AccountState::aggregate_type(),
                account_id,
                expected_version,
                new_events,
                context,
            )
            .await
    }

    fn to_published(stored: Vec<StoredEvent>, events: Vec<AccountEvent>) -> Vec<PublishedEvent> {
        stored
            .into_iter()
            .zip(events)
            .map(|(stored, event)| PublishedEvent {
                event_id: stored.id,
                aggregate_id: stored.aggregate_id,
                version: stored.version,
                event,
                context: stored.context,
            })
            .collect()
    }
}
