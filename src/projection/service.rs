//! Pending Transfers
//!
//! Read model of reservations that have been prepared but not yet resolved.
//! Built purely from published events; losing it loses no information since
//! the account streams hold the truth.
//!
//! A transfer is identified by its `Prepared` event. The destination's reply
//! names that event as its causation, and the source's resolution names the
//! reply, so the chain is followed without trusting correlation ids.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::bus::PublishedEvent;
use crate::domain::{AccountEvent, AccountId};

/// Where an in-flight transfer currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStage {
    /// Source funds locked, destination has not answered
    AwaitingEntry,
    /// Destination credited, source confirmation outstanding
    Credited,
    /// Destination refused, source unlock outstanding
    Rejected,
}

/// One unresolved reservation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransfer {
    /// Id of the `Prepared` event that opened the reservation
    pub transfer_id: Uuid,
    pub correlation_id: Option<Uuid>,
    pub source: AccountId,
    pub destination: AccountId,
    pub amount: u64,
    pub stage: TransferStage,
    pub prepared_at: DateTime<Utc>,
}

/// Resolution counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub pending: usize,
    pub confirmed: u64,
    pub compensated: u64,
}

#[derive(Debug, Default)]
struct Inner {
    pending: HashMap<Uuid, PendingTransfer>,
    /// Destination reply event id -> transfer id
    replies: HashMap<Uuid, Uuid>,
    /// Transfer id -> when it was resolved
    resolved: HashMap<Uuid, DateTime<Utc>>,
    confirmed: u64,
    compensated: u64,
}

/// Projection of in-flight transfers keyed by transfer id
#[derive(Debug, Default)]
pub struct PendingTransfers {
    inner: RwLock<Inner>,
}

impl PendingTransfers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one published event. Safe to call again with an event it has
    /// already seen.
    pub async fn apply(&self, published: &PublishedEvent) {
        self.apply_at(published, Utc::now()).await
    }

    pub(crate) async fn apply_at(&self, published: &PublishedEvent, now: DateTime<Utc>) {
        let mut inner = self.inner.write().await;

        match &published.event {
            AccountEvent::Prepared { to, amount } => {
                let transfer_id = published.event_id;
                if inner.resolved.contains_key(&transfer_id) {
                    return;
                }
                inner
                    .pending
                    .entry(transfer_id)
                    .or_insert_with(|| PendingTransfer {
                        transfer_id,
                        correlation_id: published.context.correlation_id,
                        source: published.aggregate_id.clone(),
                        destination: to.clone(),
                        amount: *amount,
                        stage: TransferStage::AwaitingEntry,
                        prepared_at: now,
                    });
            }
            AccountEvent::AmountEntered { .. } => {
                Self::record_reply(&mut inner, published, TransferStage::Credited)
            }
            AccountEvent::EntryFailed { .. } => {
                Self::record_reply(&mut inner, published, TransferStage::Rejected)
            }
            AccountEvent::Confirmed { .. } | AccountEvent::AmountUnlocked { .. } => {
                Self::resolve(&mut inner, published, now)
            }
            _ => {}
        }
    }

    fn record_reply(inner: &mut Inner, published: &PublishedEvent, stage: TransferStage) {
        let Some(transfer_id) = published.context.causation_id else {
            return;
        };
        let Some(transfer) = inner.pending.get_mut(&transfer_id) else {
            return;
        };
        if transfer.destination != published.aggregate_id {
            return;
        }

        transfer.stage = stage;
        inner.replies.insert(published.event_id, transfer_id);
    }

    fn resolve(inner: &mut Inner, published: &PublishedEvent, now: DateTime<Utc>) {
        let Some(reply_id) = published.context.causation_id else {
            return;
        };
        let Some(&transfer_id) = inner.replies.get(&reply_id) else {
            return;
        };
        let is_source = inner
            .pending
            .get(&transfer_id)
            .is_some_and(|transfer| transfer.source == published.aggregate_id);
        if !is_source {
            return;
        }

        let Some(transfer) = inner.pending.remove(&transfer_id) else {
            return;
        };
        inner.replies.retain(|_, id| *id != transfer_id);
        inner.resolved.insert(transfer_id, now);
        if matches!(published.event, AccountEvent::Confirmed { .. }) {
            inner.confirmed += 1;
        } else {
            inner.compensated += 1;
        }

        tracing::debug!(
            %transfer_id,
            source = %transfer.source,
            destination = %transfer.destination,
            amount = transfer.amount,
            outcome = published.event.event_type(),
            "Transfer resolved"
        );
    }

    pub async fn get(&self, transfer_id: &Uuid) -> Option<PendingTransfer> {
        self.inner.read().await.pending.get(transfer_id).cloned()
    }

    /// All unresolved transfers, oldest first
    pub async fn pending(&self) -> Vec<PendingTransfer> {
        let mut pending: Vec<_> = self.inner.read().await.pending.values().cloned().collect();
        pending.sort_by_key(|transfer| transfer.prepared_at);
        pending
    }

    /// Unresolved transfers prepared more than `older_than` before `now`
    pub async fn stalled(
        &self,
        older_than: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Vec<PendingTransfer> {
        let cutoff = now - older_than;

        self.pending()
            .await
            .into_iter()
            .filter(|transfer| transfer.prepared_at <= cutoff)
            .collect()
    }

    /// Forget transfers resolved before `now - retention`. A `Prepared`
    /// redelivered after that would open its reservation again.
    pub async fn prune_resolved(&self, retention: chrono::Duration, now: DateTime<Utc>) -> u64 {
        let cutoff = now - retention;

        let mut inner = self.inner.write().await;
        let before = inner.resolved.len();
        inner.resolved.retain(|_, resolved_at| *resolved_at >= cutoff);
        (before - inner.resolved.len()) as u64
    }

    pub async fn stats(&self) -> TransferStats {
        let inner = self.inner.read().await;
        TransferStats {
            pending: inner.pending.len(),
            confirmed: inner.confirmed,
            compensated: inner.compensated,
        }
    }
}
