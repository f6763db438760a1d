//! Swap Agent - cross-chain swap execution with serialized chain access
//!
//! Every swap step that submits a transaction runs through a shared
//! [`ChainScheduler`], which guarantees that steps touching the same chain
//! account never overlap and classifies chain failures for the swap
//! pipeline.

pub mod chain;
pub mod config;
pub mod error;
pub mod lock;
pub mod metrics;
pub mod pipeline;

pub use chain::{AssetKind, AssetRegistry, ChainId, ChainResolver, StaticAssetRegistry};
pub use config::Settings;
pub use error::{AgentError, AgentResult};
pub use lock::{ChainClientError, ChainFailure, ChainLockError, ChainScheduler, PacingPolicy};
pub use pipeline::{StepDisposition, StepExecutor, SwapStep};
