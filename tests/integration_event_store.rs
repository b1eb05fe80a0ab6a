//! Integration tests for the Postgres event store
//!
//! Skipped unless DATABASE_URL points at a test database.

use std::sync::Arc;

use account_transfer::aggregate::{AccountState, Aggregate};
use account_transfer::domain::{AccountEvent, AccountId, OperationContext};
use account_transfer::event_store::{load_aggregate, EventStore, EventStoreError, NewEvent, PgEventStore};
use account_transfer::AccountCommand;
use uuid::Uuid;

mod common;

fn created(balance: u64) -> NewEvent {
    let event = AccountEvent::AccountCreated {
        name: "pg".to_string(),
        balance,
    };
    NewEvent::new(event.event_type(), &event).unwrap()
}

#[tokio::test]
async fn test_event_store_append_and_load() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let event_store = PgEventStore::new(pool);
    let account_id = AccountId::generate();
    let context = OperationContext::new().with_correlation_id(Uuid::new_v4());

    let appended = event_store
        .append("Account", &account_id, 0, vec![created(100)], &context)
        .await
        .unwrap();
    assert_eq!(appended.len(), 1);
    assert_eq!(appended[0].version, 1);

    let events = event_store.load_events(&account_id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "AccountCreated");
    assert_eq!(events[0].version, 1);
    assert_eq!(events[0].context, context);
}

#[tokio::test]
async fn test_event_store_concurrency_conflict() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let event_store = PgEventStore::new(pool);
    let account_id = AccountId::generate();
    let context = OperationContext::new();

    event_store
        .append("Account", &account_id, 0, vec![created(1)], &context)
        .await
        .unwrap();

    // Wrong expected version
    let locked = AccountEvent::AmountLocked { amount: 1 };
    let result = event_store
        .append(
            "Account",
            &account_id,
            0,
            vec![NewEvent::new(locked.event_type(), &locked).unwrap()],
            &context,
        )
        .await;

    assert!(matches!(
        result,
        Err(EventStoreError::ConcurrencyConflict {
            expected: 0,
            actual: 1,
            ..
        })
    ));
    assert_eq!(event_store.load_events(&account_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_event_store_batch_is_ordered() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let event_store = PgEventStore::new(pool);
    let account_id = AccountId::generate();
    let destination = AccountId::generate();

    let lock = AccountEvent::AmountLocked { amount: 40 };
    let prepared = AccountEvent::Prepared {
        to: destination,
        amount: 40,
    };
    event_store
        .append("Account", &account_id, 0, vec![created(100)], &OperationContext::new())
        .await
        .unwrap();
    event_store
        .append(
            "Account",
            &account_id,
            1,
            vec![
                NewEvent::new(lock.event_type(), &lock).unwrap(),
                NewEvent::new(prepared.event_type(), &prepared).unwrap(),
            ],
            &OperationContext::new(),
        )
        .await
        .unwrap();

    let state: AccountState = load_aggregate(&event_store, &account_id).await.unwrap().unwrap();
    assert_eq!(state.version(), 3);
    assert_eq!(state.balance_amount(), 60);
    assert_eq!(state.locked_amount(), 40);
}

#[tokio::test]
async fn test_transfer_over_postgres() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let mut stack = common::TestStack::with_store(Arc::new(PgEventStore::new(pool)));
    let source = stack.open("S", 100).await;
    let destination = stack.open("D", 0).await;

    stack
        .handler
        .execute(
            &source,
            AccountCommand::prepare(destination.clone(), common::amount(40)),
            OperationContext::new(),
        )
        .await
        .unwrap();
    stack.settle().await;

    assert_eq!(stack.amounts(&source).await, (60, 0));
    assert_eq!(stack.amounts(&destination).await, (40, 0));
}
