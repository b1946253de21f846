//! Background retry of usage increments that failed after a successful generation.
//!
//! The user already has their campaign when an increment fails, so the request
//! path only logs and enqueues; this worker replays the increment with
//! exponential backoff and gives up after a bounded number of attempts.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::Identity;
use crate::storage::{ProfileStore, UsageChange};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Clone)]
pub struct UsageReconciler {
    tx: mpsc::UnboundedSender<Identity>,
}

impl UsageReconciler {
    /// Starts the worker. It exits once every `UsageReconciler` clone is dropped
    /// and the queue is drained.
    pub fn spawn(store: Arc<dyn ProfileStore>, policy: RetryPolicy) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(rx, store, policy));
        (Self { tx }, handle)
    }

    /// Returns false if the worker has stopped.
    pub fn enqueue(&self, identity: Identity) -> bool {
        self.tx.send(identity).is_ok()
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<Identity>,
    store: Arc<dyn ProfileStore>,
    policy: RetryPolicy,
) {
    while let Some(identity) = rx.recv().await {
        reconcile(&identity, store.as_ref(), policy).await;
    }
    tracing::debug!("usage reconciler stopped");
}

async fn reconcile(identity: &Identity, store: &dyn ProfileStore, policy: RetryPolicy) -> bool {
    let mut backoff = policy.initial_backoff;
    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(backoff).await;
        match store.persist_usage(identity, UsageChange::Increment).await {
            Ok(profile) => {
                tracing::info!(
                    user_id = %identity.user_id,
                    attempt,
                    generations_used = profile.generations_used,
                    "reconciled usage increment"
                );
                return true;
            }
            Err(error) => {
                tracing::warn!(user_id = %identity.user_id, attempt, %error, "usage increment retry failed");
                backoff = backoff.saturating_mul(2);
            }
        }
    }
    tracing::error!(
        user_id = %identity.user_id,
        attempts = policy.max_attempts,
        "giving up on usage increment; generation is unaccounted"
    );
    false
}
