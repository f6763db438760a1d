//! Asset metadata lookup used to classify assets as native or token

use super::ChainId;
use crate::config::{AssetKindConfig, Settings};
use crate::error::{AgentError, AgentResult};

use std::collections::HashMap;
use tracing::debug;

/// Classification of an asset symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetKind {
    /// The ledger's own currency
    Native,
    /// A token issued on a host ledger
    Token { host: ChainId },
}

/// Asset metadata registry
#[cfg_attr(test, mockall::automock)]
pub trait AssetRegistry: Send + Sync {
    /// Classify an asset, or `None` if the asset is unknown
    fn classify(&self, asset: &str) -> Option<AssetKind>;
}

/// Registry backed by the `[assets]` configuration table
#[derive(Debug, Default)]
pub struct StaticAssetRegistry {
    assets: HashMap<String, AssetKind>,
}

impl StaticAssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from validated settings
    pub fn from_settings(settings: &Settings) -> AgentResult<Self> {
        let mut registry = Self::new();

        for (symbol, asset) in &settings.assets {
            let kind = match asset.kind {
                AssetKindConfig::Native => AssetKind::Native,
                AssetKindConfig::Token => {
                    let host = asset.chain.as_deref().ok_or(AgentError::MissingHostChain {
                        asset: symbol.clone(),
                    })?;
                    AssetKind::Token {
                        host: ChainId::new(host),
                    }
                }
            };
            registry.register(symbol, kind);
        }

        debug!("Asset registry loaded with {} assets", registry.len());
        Ok(registry)
    }

    /// Register an asset, replacing any previous classification
    pub fn register(&mut self, symbol: impl Into<String>, kind: AssetKind) {
        self.assets.insert(symbol.into(), kind);
    }

    pub fn with_native(mut self, symbol: &str) -> Self {
        self.register(symbol, AssetKind::Native);
        self
    }

    pub fn with_token(mut self, symbol: &str, host: &str) -> Self {
        self.register(
            symbol,
            AssetKind::Token {
                host: ChainId::new(host),
            },
        );
        self
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl AssetRegistry for StaticAssetRegistry {
    fn classify(&self, asset: &str) -> Option<AssetKind> {
        self.assets.get(asset).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentConfig, AssetConfig, ChainLockConfig, LogFormat, MetricsConfig};

    fn settings(assets: Vec<(&str, AssetConfig)>) -> Settings {
        Settings {
            agent: AgentConfig {
                instance_id: "test".to_string(),
                log_format: LogFormat::Text,
                health_check_interval_secs: 30,
                max_retries: 3,
                retry_delay_ms: 1000,
            },
            chain_lock: ChainLockConfig::default(),
            metrics: MetricsConfig {
                enabled: false,
                port: 0,
            },
            assets: assets
                .into_iter()
                .map(|(symbol, cfg)| (symbol.to_string(), cfg))
                .collect(),
        }
    }

    #[test]
    fn test_from_settings() {
        let settings = settings(vec![
            (
                "ETH",
                AssetConfig {
                    kind: AssetKindConfig::Native,
                    chain: None,
                },
            ),
            (
                "USDC",
                AssetConfig {
                    kind: AssetKindConfig::Token,
                    chain: Some("ETH".to_string()),
                },
            ),
        ]);

        let registry = StaticAssetRegistry::from_settings(&settings).unwrap();
        assert_eq!(registry.classify("ETH"), Some(AssetKind::Native));
        assert_eq!(
            registry.classify("USDC"),
            Some(AssetKind::Token {
                host: ChainId::new("ETH")
            })
        );
        assert_eq!(registry.classify("BTC"), None);
    }

    #[test]
    fn test_token_without_host_is_rejected() {
        let settings = settings(vec![(
            "USDC",
            AssetConfig {
                kind: AssetKindConfig::Token,
                chain: None,
            },
        )]);

        let err = StaticAssetRegistry::from_settings(&settings).unwrap_err();
        assert!(err.is_config());
    }
}
