//! Chain-access scheduler
//!
//! Serializes outbound operations that share a chain identity so that no
//! two swap steps submit conflicting transactions from the same account:
//! 1. Resolves the asset to its chain
//! 2. Waits until the chain's lock is free
//! 3. Spaces consecutive acquisitions with a randomized gap
//! 4. Runs the operation and classifies its failure
//! 5. Releases the chain and wakes waiting requests
//!
//! Mutual exclusion is in-process only.

pub mod classify;
pub mod pacing;
pub mod scheduler;
pub mod table;
pub mod waiters;

pub use classify::{classify, ChainClientError, ChainFailure, ChainLockError, TransientCondition};
pub use pacing::{wait, wait_for_random, PacingPolicy};
pub use scheduler::{ChainLockStatus, ChainScheduler};
pub use table::{LockTable, RequestId};
pub use waiters::WaiterRegistry;
