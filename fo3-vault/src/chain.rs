//! Chain namespaces
//!
//! Every account lives in exactly one chain namespace. A [`Chain`] is the
//! validated name of that namespace; the [`ChainRegistry`] maps known names to
//! the EIP-155 chain id used when signing.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A validated chain namespace name, trimmed and lowercased
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Chain(String);

impl Chain {
    /// Parse a chain selector. Empty or blank names are rejected.
    pub fn new(name: &str) -> Result<Self> {
        let normalized = name.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(Error::InvalidArgument("chain must not be empty".to_string()));
        }
        if !normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::InvalidArgument(format!("Invalid chain name: {}", name)));
        }
        Ok(Self(normalized))
    }

    /// The normalized name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Chain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Chain {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<Chain> for String {
    fn from(chain: Chain) -> Self {
        chain.0
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Known chains and their EIP-155 chain ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainRegistry {
    chains: BTreeMap<Chain, u64>,
}

impl Default for ChainRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for (name, chain_id) in [
            ("mainnet", 61),
            ("morden", 62),
            ("eth", 1),
            ("ropsten", 3),
            ("rinkeby", 4),
            ("goerli", 5),
            ("sepolia", 11155111),
        ] {
            registry.chains.insert(Chain(name.to_string()), chain_id);
        }
        registry
    }
}

impl ChainRegistry {
    /// A registry with no chains
    pub fn empty() -> Self {
        Self { chains: BTreeMap::new() }
    }

    /// Add or replace a chain
    pub fn register(&mut self, chain: Chain, chain_id: u64) {
        self.chains.insert(chain, chain_id);
    }

    /// Chain id for a known chain, `InvalidArgument` for anything else
    pub fn chain_id(&self, chain: &Chain) -> Result<u64> {
        self.chains
            .get(chain)
            .copied()
            .ok_or_else(|| Error::InvalidArgument(format!("Unknown chain: {}", chain)))
    }

    /// Whether the chain is known
    pub fn contains(&self, chain: &Chain) -> bool {
        self.chains.contains_key(chain)
    }

    /// Known chains in name order
    pub fn chains(&self) -> impl Iterator<Item = (&Chain, u64)> {
        self.chains.iter().map(|(chain, id)| (chain, *id))
    }
}
