//! Configuration management for the swap agent
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub agent: AgentConfig,
    #[serde(default)]
    pub chain_lock: ChainLockConfig,
    pub metrics: MetricsConfig,
    pub assets: HashMap<String, AssetConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub instance_id: String,
    #[serde(default)]
    pub log_format: LogFormat,
    pub health_check_interval_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Pacing bounds applied between successive acquisitions of one chain
#[derive(Debug, Clone, Deserialize)]
pub struct ChainLockConfig {
    pub min_gap_ms: u64,
    pub max_gap_ms: u64,
}

impl Default for ChainLockConfig {
    fn default() -> Self {
        Self {
            min_gap_ms: 3500,
            max_gap_ms: 7000,
        }
    }
}

impl ChainLockConfig {
    pub fn min_gap(&self) -> Duration {
        Duration::from_millis(self.min_gap_ms)
    }

    pub fn max_gap(&self) -> Duration {
        Duration::from_millis(self.max_gap_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AssetConfig {
    pub kind: AssetKindConfig,
    /// Host ledger for token assets
    pub chain: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AssetKindConfig {
    Native,
    Token,
}

impl Settings {
    /// Load settings from the configured file
    pub fn load() -> Result<Self> {
        let config_path = env::var("SWAP_AGENT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_str)
    }

    /// Parse settings from TOML text
    pub fn parse(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.agent.health_check_interval_secs == 0 {
            anyhow::bail!("agent.health_check_interval_secs must be greater than zero");
        }

        if self.chain_lock.min_gap_ms > self.chain_lock.max_gap_ms {
            anyhow::bail!(
                "chain_lock.min_gap_ms ({}) exceeds max_gap_ms ({})",
                self.chain_lock.min_gap_ms,
                self.chain_lock.max_gap_ms
            );
        }

        if self.assets.is_empty() {
            anyhow::bail!("At least one asset must be configured");
        }

        for (symbol, asset) in &self.assets {
            match (asset.kind, asset.chain.as_deref()) {
                (AssetKindConfig::Token, None) => {
                    anyhow::bail!("Token asset {} has no host chain configured", symbol);
                }
                (AssetKindConfig::Token, Some(host)) => {
                    let host_is_native = self
                        .assets
                        .get(host)
                        .is_some_and(|h| h.kind == AssetKindConfig::Native);
                    if !host_is_native {
                        anyhow::bail!(
                            "Token asset {} is hosted on {}, which is not a native asset",
                            symbol,
                            host
                        );
                    }
                }
                (AssetKindConfig::Native, Some(_)) => {
                    tracing::warn!("Native asset {} declares a host chain - ignoring", symbol);
                }
                (AssetKindConfig::Native, None) => {}
            }
        }

        Ok(())
    }

    /// Get the symbols of all native assets
    pub fn native_assets(&self) -> Vec<&String> {
        self.assets
            .iter()
            .filter(|(_, a)| a.kind == AssetKindConfig::Native)
            .map(|(symbol, _)| symbol)
            .collect()
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
