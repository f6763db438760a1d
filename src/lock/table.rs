//! Per-chain lock state
//!
//! Each chain gets a lazily created [`ChainSlot`] holding:
//! - The exclusive `held` flag
//! - The diagnostic set of request ids waiting on the chain
//! - The instant of the most recent release, used for pacing
//! - The release broadcast for blocked requests

use super::waiters::WaiterRegistry;
use crate::chain::ChainId;

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::futures::Notified;
use tokio::time::Instant;

/// Identifier assigned to every acquisition attempt
pub type RequestId = u64;

#[derive(Debug, Default)]
struct SlotState {
    held: bool,
    pending: HashSet<RequestId>,
    last_release: Option<Instant>,
}

/// Lock entry for a single chain
#[derive(Debug, Default)]
pub struct ChainSlot {
    state: Mutex<SlotState>,
    waiters: WaiterRegistry,
}

impl ChainSlot {
    /// Atomically flip `held` from false to true.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        if state.held {
            return false;
        }
        state.held = true;
        true
    }

    /// Record the release instant, clear `held` and wake every waiter.
    ///
    /// Must be called exactly once per successful [`try_acquire`](Self::try_acquire).
    pub fn release(&self) {
        {
            let mut state = self.state.lock();
            state.last_release = Some(Instant::now());
            state.held = false;
        }
        self.waiters.broadcast();
    }

    /// Listen for the next release. See [`WaiterRegistry::listen`].
    pub fn released(&self) -> Notified<'_> {
        self.waiters.listen()
    }

    /// Add a request to the pending set. Returns the new set size if the
    /// request was not already present.
    pub fn add_pending(&self, request: RequestId) -> Option<usize> {
        let mut state = self.state.lock();
        if state.pending.insert(request) {
            Some(state.pending.len())
        } else {
            None
        }
    }

    pub fn remove_pending(&self, request: RequestId) {
        self.state.lock().pending.remove(&request);
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Pending request ids in ascending order, for log lines
    pub fn pending_ids(&self) -> Vec<RequestId> {
        let state = self.state.lock();
        state
            .pending
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn last_release(&self) -> Option<Instant> {
        self.state.lock().last_release
    }

    pub fn is_held(&self) -> bool {
        self.state.lock().held
    }
}

/// All chain slots known to a scheduler
#[derive(Debug, Default)]
pub struct LockTable {
    slots: DashMap<ChainId, Arc<ChainSlot>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the slot for a chain, creating it unlocked on first reference
    pub fn slot(&self, chain: &ChainId) -> Arc<ChainSlot> {
        if let Some(slot) = self.slots.get(chain) {
            return slot.clone();
        }
        self.slots.entry(chain.clone()).or_default().clone()
    }

    /// Snapshot of every known chain and its slot
    pub fn entries(&self) -> Vec<(ChainId, Arc<ChainSlot>)> {
        self.slots
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}
