//! Per-chain release broadcast

use tokio::sync::futures::Notified;
use tokio::sync::Notify;

/// Wakes every task waiting for a chain to be released.
///
/// Woken tasks are not handed the lock; each one races to re-acquire it
/// and the losers listen again. Waiters are not ordered, so a task that
/// started waiting first may lose to one that arrived later.
#[derive(Debug, Default)]
pub struct WaiterRegistry {
    notify: Notify,
}

impl WaiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in the next release.
    ///
    /// The returned future observes any broadcast issued after this call,
    /// even before it is first polled, so callers must create it *before*
    /// re-checking the lock state.
    pub fn listen(&self) -> Notified<'_> {
        self.notify.notified()
    }

    /// Wake all current listeners
    pub fn broadcast(&self) {
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_broadcast_wakes_all_listeners() {
        let registry = Arc::new(WaiterRegistry::new());
        let mut handles = Vec::new();

        for _ in 0..3 {
            let registry = registry.clone();
            let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
            handles.push(tokio::spawn(async move {
                let listener = registry.listen();
                ready_tx.send(()).unwrap();
                listener.await;
            }));
            ready_rx.await.unwrap();
        }

        registry.broadcast();

        for handle in handles {
            tokio::time::timeout(Duration::from_secs(1), handle)
                .await
                .expect("listener was not woken")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_listener_created_before_broadcast_is_not_missed() {
        let registry = WaiterRegistry::new();
        let listener = registry.listen();

        // Broadcast lands before the listener is ever polled
        registry.broadcast();

        tokio::time::timeout(Duration::from_secs(1), listener)
            .await
            .expect("wakeup was lost");
    }
}
