//! Chain identities and asset-to-chain resolution
//!
//! Every outbound operation is serialized on the chain identity that owns
//! the account and nonce sequence it spends from. Token assets share the
//! identity of the ledger that hosts them.

pub mod registry;
pub mod resolver;

pub use registry::{AssetKind, AssetRegistry, StaticAssetRegistry};
pub use resolver::ChainResolver;

use std::fmt;

/// Logical ledger scope that outbound operations are serialized on
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainId(String);

impl ChainId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChainId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
