//! account_transfer demo runner
//!
//! Wires the store, delivery channel, saga processor and maintenance jobs,
//! then runs one settled transfer and one compensated transfer.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use account_transfer::bus::EventPublisher;
use account_transfer::event_store::{EventStore, InMemoryEventStore, PgEventStore};
use account_transfer::handlers::{AccountCommandHandler, RetryPolicy};
use account_transfer::idempotency::ProcessedEvents;
use account_transfer::jobs::{JobScheduler, JobSchedulerConfig};
use account_transfer::projection::PendingTransfers;
use account_transfer::saga::{RedeliveryPolicy, TransferProcessor};
use account_transfer::{db, AccountCommand, AccountId, Amount, Config, OperationContext};

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "account_transfer=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Pick the event store from configuration
async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn EventStore>> {
    match db::connect(config).await? {
        Some(pool) => {
            if !db::check_schema(&pool).await? {
                tracing::error!("Database schema is not complete. Please run migrations.");
                return Err(anyhow::anyhow!("Database schema incomplete"));
            }
            tracing::info!("Database connected successfully");
            Ok(Arc::new(PgEventStore::new(pool)))
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory event store");
            Ok(Arc::new(InMemoryEventStore::new()))
        }
    }
}

/// Wait until the projection has seen `resolved` transfers settle
async fn wait_for_resolution(pending: &PendingTransfers, resolved: u64) -> anyhow::Result<()> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let stats = pending.stats().await;
            if stats.confirmed + stats.compensated >= resolved {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("Transfers did not resolve in time"))
}

async fn log_account(handler: &AccountCommandHandler, id: &AccountId) -> anyhow::Result<()> {
    match handler.load(id).await? {
        Some(state) => tracing::info!(
            account_id = %id,
            name = state.name().unwrap_or_default(),
            balance = state.balance_amount(),
            locked = state.locked_amount(),
            frozen = state.is_frozen(),
            "Account state"
        ),
        None => tracing::warn!(account_id = %id, "Account not found"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(environment = %config.environment, "Starting account_transfer");

    let store = build_store(&config).await?;
    let (publisher, receiver) = EventPublisher::channel();
    let handler = AccountCommandHandler::new(store, publisher)
        .with_retry_policy(RetryPolicy::from_config(&config));

    let processed = Arc::new(ProcessedEvents::default());
    let pending = Arc::new(PendingTransfers::new());

    let processor = TransferProcessor::new(handler.clone(), processed.clone(), pending.clone())
        .with_redelivery_policy(RedeliveryPolicy::from_config(&config));
    let processor_task = tokio::spawn(processor.run(receiver));

    let scheduler = JobScheduler::with_config(
        pending.clone(),
        processed.clone(),
        JobSchedulerConfig::from_config(&config),
    );
    let scheduler_task = scheduler.start();

    let source = AccountId::generate();
    let destination = AccountId::generate();
    let frozen = AccountId::generate();

    let context = OperationContext::new().with_initiator("demo");
    handler
        .execute(&source, AccountCommand::create("source", 100), context.clone())
        .await?;
    handler
        .execute(&destination, AccountCommand::create("destination", 0), context.clone())
        .await?;
    handler
        .execute(&frozen, AccountCommand::create("frozen", 0), context.clone())
        .await?;
    handler
        .execute(&frozen, AccountCommand::freeze("compliance hold"), context.clone())
        .await?;

    // Settles: destination credited, source confirmed
    handler
        .execute(
            &source,
            AccountCommand::prepare(destination.clone(), Amount::new(40)?),
            context.clone(),
        )
        .await?;

    // Compensates: frozen destination refuses, source unlocked
    handler
        .execute(
            &source,
            AccountCommand::prepare(frozen.clone(), Amount::new(25)?),
            context,
        )
        .await?;

    wait_for_resolution(&pending, 2).await?;

    for id in [&source, &destination, &frozen] {
        log_account(&handler, id).await?;
    }

    let stats = pending.stats().await;
    tracing::info!(
        confirmed = stats.confirmed,
        compensated = stats.compensated,
        pending = stats.pending,
        "Transfers resolved"
    );

    scheduler_task.abort();
    processor_task.abort();
    tracing::info!("Goodbye!");

    Ok(())
}
