//! Step executor with reschedule and refund routing

use crate::chain::ChainId;
use crate::config::AgentConfig;
use crate::lock::{ChainFailure, ChainLockError, ChainScheduler};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// One chain-touching step of a swap
#[derive(Debug, Clone, PartialEq)]
pub struct SwapStep {
    pub order_id: String,
    /// Step name, e.g. `initiate`, `claim`, `refund`
    pub action: String,
    pub asset: String,
}

impl SwapStep {
    pub fn new(
        order_id: impl Into<String>,
        action: impl Into<String>,
        asset: impl Into<String>,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            action: action.into(),
            asset: asset.into(),
        }
    }
}

/// What the swap pipeline should do after a step ran
#[derive(Debug, Clone, PartialEq)]
pub enum StepDisposition<T> {
    /// Step succeeded
    Completed(T),
    /// Transient chain condition; run the step again after `delay`
    Requeue { delay: Duration, attempt: u32 },
    /// Timelock may have expired; move the swap to its refund path
    Refund { chain: ChainId, reason: String },
    /// Step failed permanently
    Fatal { reason: String },
}

impl<T> StepDisposition<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, StepDisposition::Completed(_))
    }
}

/// Runs swap steps under the chain scheduler
pub struct StepExecutor {
    scheduler: Arc<ChainScheduler>,
    max_retries: u32,
    retry_delay: Duration,
}

impl StepExecutor {
    pub fn new(scheduler: Arc<ChainScheduler>, config: &AgentConfig) -> Self {
        Self::with_retry_policy(
            scheduler,
            config.max_retries,
            Duration::from_millis(config.retry_delay_ms),
        )
    }

    pub fn with_retry_policy(
        scheduler: Arc<ChainScheduler>,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            scheduler,
            max_retries,
            retry_delay,
        }
    }

    /// Run a step once. `attempt` starts at 1.
    pub async fn run_step<F, Fut, T, E>(
        &self,
        step: &SwapStep,
        attempt: u32,
        operation: F,
    ) -> StepDisposition<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ChainFailure,
    {
        match self.scheduler.with_lock(&step.asset, operation).await {
            Ok(value) => {
                info!(
                    "Step {} of order {} completed (attempt {})",
                    step.action, step.order_id, attempt
                );
                StepDisposition::Completed(value)
            }
            Err(ChainLockError::Reschedule { chain, message }) => {
                if attempt >= self.max_retries {
                    error!(
                        "Step {} of order {} still blocked on {} after {} attempts: {}",
                        step.action, step.order_id, chain, attempt, message
                    );
                    return StepDisposition::Fatal {
                        reason: format!("Retries exhausted on {}: {}", chain, message),
                    };
                }
                warn!(
                    "Rescheduling step {} of order {} on {} (attempt {}/{}): {}",
                    step.action, step.order_id, chain, attempt, self.max_retries, message
                );
                StepDisposition::Requeue {
                    delay: self.retry_delay,
                    attempt: attempt + 1,
                }
            }
            Err(ChainLockError::PossibleTimelock { chain, message }) => {
                warn!(
                    "Order {} may have passed its timelock on {}: {}",
                    step.order_id, chain, message
                );
                StepDisposition::Refund {
                    chain,
                    reason: message,
                }
            }
            Err(e) => {
                error!(
                    "Step {} of order {} failed: {}",
                    step.action, step.order_id, e
                );
                StepDisposition::Fatal {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Run a step, requeueing it after each reschedule until it settles
    pub async fn run_until_settled<F, Fut, T, E>(
        &self,
        step: &SwapStep,
        mut operation: F,
    ) -> StepDisposition<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ChainFailure,
    {
        let mut attempt = 1;
        loop {
            match self.run_step(step, attempt, &mut operation).await {
                StepDisposition::Requeue {
                    delay,
                    attempt: next,
                } => {
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                settled => return settled,
            }
        }
    }
}
