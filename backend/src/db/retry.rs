//! Retryable unit-of-work runner
//!
//! A unit of work is a closure that receives the open transaction and returns
//! a boxed future borrowing it. Closures must own what they capture (clone
//! inputs into the closure, then into each `async move` block) because the
//! work may run more than once.

use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use super::{LedgerStore, LedgerTx};
use crate::config::LedgerConfig;
use crate::error::AppResult;

/// How often and how patiently a conflicting transaction is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Base delay; attempt `n` sleeps `backoff * n` before attempt `n + 1`
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(
            config.max_retry_attempts,
            Duration::from_millis(config.retry_backoff_ms),
        )
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100))
    }
}

/// Run `work` in a fresh transaction, committing on success.
///
/// Write conflicts raised by the work or by the commit are retried until the
/// policy runs out of attempts, after which the last conflict is returned.
/// Every other error, uniqueness violations included, is returned as is after
/// the transaction is rolled back.
pub async fn retry_transaction<S, T, F>(store: &S, policy: &RetryPolicy, mut work: F) -> AppResult<T>
where
    S: LedgerStore,
    T: Send,
    F: for<'t> FnMut(&'t mut S::Tx) -> BoxFuture<'t, AppResult<T>> + Send,
{
    let mut attempt = 1;
    loop {
        match run_once(store, &mut work).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "Transaction committed after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_write_conflict() && attempt < policy.max_attempts => {
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "Write conflict, retrying transaction"
                );
                tokio::time::sleep(policy.delay(attempt)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Run `work` on the caller's transaction when one is supplied, otherwise
/// behave like [`retry_transaction`]. The caller owns commit and retry of an
/// outer transaction.
pub async fn retry_transaction_in<S, T, F>(
    store: &S,
    outer: Option<&mut S::Tx>,
    policy: &RetryPolicy,
    mut work: F,
) -> AppResult<T>
where
    S: LedgerStore,
    T: Send,
    F: for<'t> FnMut(&'t mut S::Tx) -> BoxFuture<'t, AppResult<T>> + Send,
{
    match outer {
        Some(tx) => work(tx).await,
        None => retry_transaction(store, policy, work).await,
    }
}

async fn run_once<S, T, F>(store: &S, work: &mut F) -> AppResult<T>
where
    S: LedgerStore,
    T: Send,
    F: for<'t> FnMut(&'t mut S::Tx) -> BoxFuture<'t, AppResult<T>> + Send,
{
    let mut tx = store.begin().await?;
    let outcome = work(&mut tx).await;

    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, StoreError};
    use crate::error::AppError;
    use chrono::Utc;
    use shared::models::Admin;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use uuid::Uuid;

    fn quick_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn conflicting_commit_is_retried() {
        let store = MemoryStore::new();
        store.inject_write_conflicts(2);
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        retry_transaction(&store, &quick_policy(3), move |tx| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let admin = Admin {
                    id: Uuid::new_v4(),
                    external_id: "ops-1".to_string(),
                    name: "Ops".to_string(),
                    created_at: Utc::now(),
                };
                tx.insert_admin(&admin).await?;
                Ok(())
            })
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.commits(), 1);
        assert_eq!(store.committed().admins.len(), 1);
    }

    #[tokio::test]
    async fn exhaustion_returns_the_last_conflict() {
        let store = MemoryStore::new();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: AppResult<()> = retry_transaction(&store, &quick_policy(3), move |_tx| {
            let counter = counter.clone();
            Box::pin(async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Err(StoreError::WriteConflict(format!("attempt {}", n)).into())
            })
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(AppError::Store(StoreError::WriteConflict(msg))) => assert_eq!(msg, "attempt 3"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn unique_violation_is_not_retried() {
        let store = MemoryStore::new();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: AppResult<()> = retry_transaction(&store, &quick_policy(5), move |_tx| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::UniqueViolation("stock_lots_lot_number_key".into()).into())
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn outer_transaction_is_used_without_retry_or_commit() {
        let store = MemoryStore::new();
        let calls = Arc::new(AtomicU32::new(0));
        let mut outer = store.begin().await.unwrap();

        let counter = calls.clone();
        let result: AppResult<()> =
            retry_transaction_in(&store, Some(&mut outer), &quick_policy(3), move |_tx| {
                let counter = counter.clone();
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(StoreError::WriteConflict("nested".into()).into())
                })
            })
            .await;

        assert!(result.unwrap_err().is_write_conflict());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.commits(), 0);
        outer.rollback().await.unwrap();
    }

    #[test]
    fn backoff_grows_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
