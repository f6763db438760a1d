//! Maps asset identifiers to the chain identity they serialize on

use super::{AssetKind, AssetRegistry, ChainId};
use crate::error::{AgentError, AgentResult};

use std::sync::Arc;

/// Resolves assets to chain identities
#[derive(Clone)]
pub struct ChainResolver {
    registry: Arc<dyn AssetRegistry>,
}

impl ChainResolver {
    pub fn new(registry: Arc<dyn AssetRegistry>) -> Self {
        Self { registry }
    }

    /// Tokens resolve to their host ledger; every other asset is its own chain.
    pub fn resolve(&self, asset: &str) -> AgentResult<ChainId> {
        match self.registry.classify(asset) {
            Some(AssetKind::Token { host }) => Ok(host),
            Some(AssetKind::Native) => Ok(ChainId::new(asset)),
            None => Err(AgentError::UnknownAsset {
                asset: asset.to_string(),
            }),
        }
    }
}
