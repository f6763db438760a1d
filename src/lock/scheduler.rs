//! Serialized chain access for swap operations

use super::classify::{classify, ChainFailure, ChainLockError};
use super::pacing::{self, PacingPolicy};
use super::table::{ChainSlot, LockTable, RequestId};
use crate::chain::{ChainId, ChainResolver};
use crate::metrics;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Point-in-time view of one chain's lock
#[derive(Debug, Clone, PartialEq)]
pub struct ChainLockStatus {
    pub chain: ChainId,
    pub held: bool,
    pub pending: usize,
    /// Time since the chain was last released, if ever
    pub last_release_age: Option<Duration>,
}

/// Serializes operations that share a chain identity.
///
/// One instance is built at startup and shared behind an `Arc`. Operations on
/// different chains run independently; operations on the same chain never
/// overlap, and consecutive ones are spaced out by the [`PacingPolicy`].
pub struct ChainScheduler {
    resolver: ChainResolver,
    table: LockTable,
    pacing: PacingPolicy,
    next_request: AtomicU64,
}

impl ChainScheduler {
    pub fn new(resolver: ChainResolver, pacing: PacingPolicy) -> Self {
        Self {
            resolver,
            table: LockTable::new(),
            pacing,
            next_request: AtomicU64::new(0),
        }
    }

    pub fn pacing(&self) -> &PacingPolicy {
        &self.pacing
    }

    /// Run `operation` while holding the chain that `asset` lives on.
    ///
    /// Pending-transaction and block-not-found failures come back as
    /// [`ChainLockError::Reschedule`], timelock execution failures as
    /// [`ChainLockError::PossibleTimelock`]; any other failure is returned
    /// unchanged in [`ChainLockError::Operation`]. The chain is released on
    /// every exit path, including when the returned future is dropped.
    pub async fn with_lock<F, Fut, T, E>(
        &self,
        asset: &str,
        operation: F,
    ) -> Result<T, ChainLockError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ChainFailure,
    {
        let request = self.next_request.fetch_add(1, Ordering::Relaxed) + 1;
        let chain = self
            .resolver
            .resolve(asset)
            .map_err(ChainLockError::Resolve)?;

        let guard = self.acquire(chain, request).await;

        let outcome = operation().await.map_err(|e| classify(&guard.chain, e));

        if let Err(e) = &outcome {
            debug!(
                "Operation on {} failed ({}) [#{}]: {}",
                guard.chain,
                e.kind(),
                request,
                e
            );
            metrics::record_lock_error(guard.chain.as_str(), e.kind());
        }

        drop(guard);
        outcome
    }

    /// Wait for the chain to be free, take it, then apply pacing
    async fn acquire(&self, chain: ChainId, request: RequestId) -> ChainGuard {
        let slot = self.table.slot(&chain);
        let wait_started = Instant::now();
        let pending = PendingGuard {
            slot: &slot,
            request,
        };

        loop {
            // Listen before checking so a release in between is not missed
            let released = slot.released();

            if slot.try_acquire() {
                break;
            }

            if let Some(count) = slot.add_pending(request) {
                debug!("{} actions pending for {} [#{}]", count, chain, request);
                metrics::set_pending_waiters(chain.as_str(), count);
            }

            released.await;
        }
        drop(pending);

        metrics::set_pending_waiters(chain.as_str(), slot.pending_count());
        metrics::record_lock_wait(chain.as_str(), wait_started.elapsed());

        let guard = ChainGuard {
            slot,
            chain,
            request,
        };

        let gap = self.pacing.sample_gap();
        if let Some(delay) = PacingPolicy::remaining(gap, guard.slot.last_release(), Instant::now()) {
            debug!(
                "Waiting for {}ms before using {} [#{}]",
                delay.as_millis(),
                guard.chain,
                request
            );
            metrics::record_pacing_delay(guard.chain.as_str(), delay);
            pacing::wait(delay).await;
        }

        debug!(
            "Got lock for {} [#{}] - (Pending: {:?})",
            guard.chain,
            request,
            guard.slot.pending_ids()
        );
        metrics::record_lock_acquired(guard.chain.as_str());

        guard
    }

    /// Current lock state of every chain seen so far
    pub fn snapshot(&self) -> Vec<ChainLockStatus> {
        let now = Instant::now();
        let mut statuses: Vec<_> = self
            .table
            .entries()
            .into_iter()
            .map(|(chain, slot)| ChainLockStatus {
                chain,
                held: slot.is_held(),
                pending: slot.pending_count(),
                last_release_age: slot
                    .last_release()
                    .map(|at| now.saturating_duration_since(at)),
            })
            .collect();
        statuses.sort_by(|a, b| a.chain.cmp(&b.chain));
        statuses
    }
}

/// Keeps a waiting request in the pending set only while it waits
struct PendingGuard<'a> {
    slot: &'a ChainSlot,
    request: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.slot.remove_pending(self.request);
    }
}

/// Holds a chain until dropped
struct ChainGuard {
    slot: Arc<ChainSlot>,
    chain: ChainId,
    request: RequestId,
}

impl Drop for ChainGuard {
    fn drop(&mut self) {
        self.slot.release();
        debug!(
            "Unlocked {} [#{}] - (Pending: {:?})",
            self.chain,
            self.request,
            self.slot.pending_ids()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::StaticAssetRegistry;
    use crate::lock::ChainClientError;

    use std::sync::atomic::AtomicUsize;

    fn scheduler(pacing: PacingPolicy) -> Arc<ChainScheduler> {
        let registry = StaticAssetRegistry::new()
            .with_native("BTC")
            .with_native("ETH")
            .with_token("DAI", "ETH")
            .with_token("USDC", "ETH");
        Arc::new(ChainScheduler::new(
            ChainResolver::new(Arc::new(registry)),
            pacing,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_operation_result() {
        let scheduler = scheduler(PacingPolicy::default());
        let result: Result<u32, ChainLockError<ChainClientError>> =
            scheduler.with_lock("BTC", || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_acquisition_is_not_paced() {
        let scheduler = scheduler(PacingPolicy::default());
        let start = Instant::now();

        scheduler
            .with_lock("ETH", || async { Ok::<_, ChainClientError>(()) })
            .await
            .unwrap();

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_acquisitions_are_paced() {
        let policy = PacingPolicy::new(Duration::from_millis(3500), Duration::from_millis(7000));
        let scheduler = scheduler(policy);

        scheduler
            .with_lock("BTC", || async { Ok::<_, ChainClientError>(()) })
            .await
            .unwrap();
        let released_at = Instant::now();

        let started_at = scheduler
            .with_lock("BTC", || async { Ok::<_, ChainClientError>(Instant::now()) })
            .await
            .unwrap();

        let gap = started_at - released_at;
        assert!(gap >= Duration::from_millis(3500), "gap was {:?}", gap);
        // Timer resolution may round the wake-up to the next millisecond
        assert!(gap <= Duration::from_millis(7000), "gap was {:?}", gap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_releases_after_failure() {
        let scheduler = scheduler(PacingPolicy::disabled());

        let err = scheduler
            .with_lock("BTC", || async {
                Err::<(), _>(ChainClientError::Rpc("boom".into()))
            })
            .await
            .unwrap_err();
        assert_eq!(err.into_operation(), Some(ChainClientError::Rpc("boom".into())));

        let status = &scheduler.snapshot()[0];
        assert!(!status.held);
        assert_eq!(status.pending, 0);

        // Chain is usable again
        scheduler
            .with_lock("BTC", || async { Ok::<_, ChainClientError>(()) })
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_classifies_failures() {
        let scheduler = scheduler(PacingPolicy::disabled());

        let err = scheduler
            .with_lock("DAI", || async {
                Err::<(), _>(ChainClientError::PendingTransaction("0xabc".into()))
            })
            .await
            .unwrap_err();
        assert!(err.is_reschedule());
        assert_eq!(err.chain(), Some(&ChainId::new("ETH")));

        let err = scheduler
            .with_lock("BTC", || async {
                Err::<(), _>(ChainClientError::Rpc("non-final (code 64)".into()))
            })
            .await
            .unwrap_err();
        assert!(err.is_possible_timelock());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_asset_takes_no_lock() {
        let scheduler = scheduler(PacingPolicy::disabled());
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_op = ran.clone();

        let err = scheduler
            .with_lock("DOGE", move || async move {
                ran_op.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ChainClientError>(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ChainLockError::Resolve(_)));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert!(scheduler.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_future_releases_lock() {
        let scheduler = scheduler(PacingPolicy::disabled());

        let (started_tx, started_rx) = tokio::sync::oneshot::channel();

        let stalled = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move {
                scheduler
                    .with_lock("BTC", move || async move {
                        let _ = started_tx.send(());
                        std::future::pending::<Result<(), ChainClientError>>().await
                    })
                    .await
            })
        };

        started_rx.await.unwrap();
        assert!(scheduler.snapshot()[0].held);

        stalled.abort();
        let _ = stalled.await;

        assert!(!scheduler.snapshot()[0].held);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_waiter_leaves_pending_set() {
        let scheduler = scheduler(PacingPolicy::disabled());
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (finish_tx, finish_rx) = tokio::sync::oneshot::channel::<()>();

        let holder = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move {
                scheduler
                    .with_lock("BTC", move || async move {
                        let _ = started_tx.send(());
                        let _ = finish_rx.await;
                        Ok::<_, ChainClientError>(())
                    })
                    .await
            })
        };
        started_rx.await.unwrap();

        let waiter = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move {
                scheduler
                    .with_lock("BTC", || async { Ok::<_, ChainClientError>(()) })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(scheduler.snapshot()[0].pending, 1);

        waiter.abort();
        let _ = waiter.await;
        assert_eq!(scheduler.snapshot()[0].pending, 0);

        finish_tx.send(()).unwrap();
        holder.await.unwrap().unwrap();

        let status = &scheduler.snapshot()[0];
        assert!(!status.held);
        assert_eq!(status.pending, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_share_host_chain() {
        let scheduler = scheduler(PacingPolicy::disabled());
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = ["ETH", "DAI", "USDC", "DAI", "ETH", "USDC"]
            .into_iter()
            .map(|asset| {
                let scheduler = scheduler.clone();
                let active = active.clone();
                let max_active = max_active.clone();
                tokio::spawn(async move {
                    scheduler
                        .with_lock(asset, move || async move {
                            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                            max_active.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            active.fetch_sub(1, Ordering::SeqCst);
                            Ok::<_, ChainClientError>(())
                        })
                        .await
                })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.snapshot().len(), 1);
    }
}
