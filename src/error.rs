//! Error types for the swap agent

use thiserror::Error;

/// Main error type for the agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Asset {asset} is not registered")]
    UnknownAsset { asset: String },

    #[error("Token asset {asset} has no host chain configured")]
    MissingHostChain { asset: String },

    #[error("Metrics server error: {0}")]
    Metrics(#[from] std::io::Error),
}

impl AgentError {
    /// Check if error is caused by operator configuration
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            AgentError::UnknownAsset { .. } | AgentError::MissingHostChain { .. }
        )
    }
}

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;
