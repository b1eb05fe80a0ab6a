//! Common test utilities
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tokio::sync::OnceCell;

use account_transfer::aggregate::AccountState;
use account_transfer::bus::{EventPublisher, EventReceiver};
use account_transfer::event_store::{EventStore, InMemoryEventStore};
use account_transfer::handlers::{AccountCommandHandler, RetryPolicy};
use account_transfer::idempotency::ProcessedEvents;
use account_transfer::projection::PendingTransfers;
use account_transfer::saga::TransferProcessor;
use account_transfer::{AccountCommand, AccountId, Amount, OperationContext};

/// Handler, processor and the delivery channel that connects them
pub struct TestStack {
    pub store: Arc<dyn EventStore>,
    pub handler: AccountCommandHandler,
    pub processor: TransferProcessor,
    pub receiver: EventReceiver,
}

impl TestStack {
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(InMemoryEventStore::new()))
    }

    pub fn with_store(store: Arc<dyn EventStore>) -> Self {
        let (publisher, receiver) = EventPublisher::channel();
        let handler = AccountCommandHandler::new(store.clone(), publisher).with_retry_policy(
            RetryPolicy {
                max_retries: 20,
                backoff: Duration::from_millis(1),
            },
        );
        let processor = TransferProcessor::new(
            handler.clone(),
            Arc::new(ProcessedEvents::default()),
            Arc::new(PendingTransfers::new()),
        );

        Self {
            store,
            handler,
            processor,
            receiver,
        }
    }

    /// Deliver everything queued until the channel is quiet
    pub async fn settle(&mut self) -> usize {
        self.processor.drain(&mut self.receiver).await
    }

    pub async fn open(&self, name: &str, balance: u64) -> AccountId {
        let id = AccountId::generate();
        self.handler
            .execute(&id, AccountCommand::create(name, balance), OperationContext::new())
            .await
            .expect("Failed to create account");
        id
    }

    pub async fn state(&self, id: &AccountId) -> AccountState {
        self.handler
            .load(id)
            .await
            .expect("Failed to load account")
            .expect("Account does not exist")
    }

    /// (balance, locked) of an account
    pub async fn amounts(&self, id: &AccountId) -> (u64, u64) {
        let state = self.state(id).await;
        (state.balance_amount(), state.locked_amount())
    }
}

pub fn amount(value: u64) -> Amount {
    Amount::new(value).expect("Invalid amount")
}

static SCHEMA: OnceCell<()> = OnceCell::const_new();

/// Connect to the test database and make sure the schema exists.
/// Returns `None` when DATABASE_URL is not set so Postgres tests can skip.
pub async fn setup_test_db() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.is_empty() => url,
        _ => {
            eprintln!("DATABASE_URL not set, skipping Postgres test");
            return None;
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    // Concurrent CREATE TABLE IF NOT EXISTS can still collide in the catalog
    SCHEMA
        .get_or_init(|| async {
            pool.execute(include_str!("../../migrations/0001_create_events.sql"))
                .await
                .expect("Failed to apply schema");
        })
        .await;

    Some(pool)
}
