//! Minimum spacing between successive acquisitions of the same chain
//!
//! Back-to-back submissions from one account can collide in the mempool
//! before the previous transaction has propagated. After a request wins a
//! chain, it waits until a randomly drawn gap has passed since the chain's
//! last release.

use crate::config::ChainLockConfig;

use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

/// Randomized pacing between acquisitions
#[derive(Debug, Clone, PartialEq)]
pub struct PacingPolicy {
    min_gap: Duration,
    max_gap: Duration,
}

impl PacingPolicy {
    /// Create a policy drawing gaps from `[min_gap, max_gap)`
    pub fn new(min_gap: Duration, max_gap: Duration) -> Self {
        Self { min_gap, max_gap }
    }

    pub fn from_config(config: &ChainLockConfig) -> Self {
        Self::new(config.min_gap(), config.max_gap())
    }

    /// Policy that never delays
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn min_gap(&self) -> Duration {
        self.min_gap
    }

    pub fn max_gap(&self) -> Duration {
        self.max_gap
    }

    /// Draw a fresh gap for one acquisition
    pub fn sample_gap(&self) -> Duration {
        random_between(self.min_gap, self.max_gap)
    }

    /// Remaining delay before an acquisition may proceed, if any.
    ///
    /// A chain that has never been released is not paced.
    pub fn remaining(gap: Duration, last_release: Option<Instant>, now: Instant) -> Option<Duration> {
        let elapsed = now.saturating_duration_since(last_release?);
        gap.checked_sub(elapsed).filter(|d| !d.is_zero())
    }
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self::from_config(&ChainLockConfig::default())
    }
}

/// Sleep for a fixed duration
pub async fn wait(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Sleep for a random duration in `[min, max)`
pub async fn wait_for_random(min: Duration, max: Duration) {
    wait(random_between(min, max)).await;
}

fn random_between(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    rand::thread_rng().gen_range(min..max)
}
