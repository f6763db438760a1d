//! Classification of failures raised while a chain is held
//!
//! Handles:
//! - Transient chain conditions that should be retried later
//! - Execution failures that hint at an expired timelock
//! - Everything else, passed through untouched

use crate::chain::ChainId;
use crate::error::AgentError;

use std::fmt;
use thiserror::Error;

/// Message fragments reported by nodes when a timelocked script or
/// contract can no longer be executed on the happy path.
const TIMELOCK_MARKERS: [&str; 2] = [
    "non-final (code 64)",
    "invalid opcode: opcode 0xfe not defined",
];

/// Transient conditions a chain client can report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientCondition {
    /// A prerequisite transaction is not confirmed yet
    PendingTransaction,
    /// The requested block is not available yet
    BlockNotFound,
}

/// Errors returned by operations run under a chain lock
pub trait ChainFailure: fmt::Display {
    /// The transient condition this failure represents, if any
    fn transient_condition(&self) -> Option<TransientCondition> {
        None
    }

    /// Full failure text searched for timelock markers
    fn detail(&self) -> String {
        self.to_string()
    }
}

/// Error type for chain client calls
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainClientError {
    #[error("Pending transaction: {0}")]
    PendingTransaction(String),

    #[error("Block not found: {0}")]
    BlockNotFound(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Transaction reverted: {0}")]
    Reverted(String),
}

impl ChainFailure for ChainClientError {
    fn transient_condition(&self) -> Option<TransientCondition> {
        match self {
            ChainClientError::PendingTransaction(_) => Some(TransientCondition::PendingTransaction),
            ChainClientError::BlockNotFound(_) => Some(TransientCondition::BlockNotFound),
            _ => None,
        }
    }
}

impl ChainFailure for anyhow::Error {
    fn transient_condition(&self) -> Option<TransientCondition> {
        self.chain()
            .find_map(|cause| cause.downcast_ref::<ChainClientError>())
            .and_then(|e| e.transient_condition())
    }

    fn detail(&self) -> String {
        // Alternate form joins every cause, not just the outermost context
        format!("{:#}", self)
    }
}

/// Outcome of a failed `with_lock` call
#[derive(Error, Debug)]
pub enum ChainLockError<E> {
    /// The asset could not be mapped to a chain; no lock was taken
    #[error("Failed to resolve chain: {0}")]
    Resolve(AgentError),

    /// Retry the step later
    #[error("Reschedule on chain {chain}: {message}")]
    Reschedule { chain: ChainId, message: String },

    /// The step may only be completable through the refund path
    #[error("Possible timelock expiry on chain {chain}: {message}")]
    PossibleTimelock { chain: ChainId, message: String },

    /// Unclassified failure from the operation
    #[error(transparent)]
    Operation(E),
}

impl<E> ChainLockError<E> {
    pub fn is_reschedule(&self) -> bool {
        matches!(self, ChainLockError::Reschedule { .. })
    }

    pub fn is_possible_timelock(&self) -> bool {
        matches!(self, ChainLockError::PossibleTimelock { .. })
    }

    /// Chain the failure was classified on
    pub fn chain(&self) -> Option<&ChainId> {
        match self {
            ChainLockError::Reschedule { chain, .. }
            | ChainLockError::PossibleTimelock { chain, .. } => Some(chain),
            _ => None,
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ChainLockError::Resolve(_) => "resolve",
            ChainLockError::Reschedule { .. } => "reschedule",
            ChainLockError::PossibleTimelock { .. } => "possible_timelock",
            ChainLockError::Operation(_) => "operation",
        }
    }

    /// Unwrap the original operation error, if unclassified
    pub fn into_operation(self) -> Option<E> {
        match self {
            ChainLockError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

/// Classify an operation failure raised while `chain` was held
pub fn classify<E: ChainFailure>(chain: &ChainId, error: E) -> ChainLockError<E> {
    let message = error.detail();
    if error.transient_condition().is_some() {
        return ChainLockError::Reschedule {
            chain: chain.clone(),
            message,
        };
    }

    if TIMELOCK_MARKERS.iter().any(|marker| message.contains(marker)) {
        return ChainLockError::PossibleTimelock {
            chain: chain.clone(),
            message,
        };
    }

    ChainLockError::Operation(error)
}
