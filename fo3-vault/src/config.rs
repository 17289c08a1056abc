//! Vault configuration
//!
//! Configuration is plain data with defaults. It can be read from a JSON file and
//! overridden from `FO3_VAULT_*` environment variables.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::chain::{Chain, ChainRegistry};
use crate::crypto::keyfile::ScryptConfig;
use crate::error::{Error, Result};

/// Storage backend selected by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Accounts kept in process memory
    Memory,
    /// One encrypted keyfile per account on disk
    Keyfile,
}

impl std::str::FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "keyfile" | "file" => Ok(Self::Keyfile),
            other => Err(Error::InvalidArgument(format!("Unknown backend: {}", other))),
        }
    }
}

/// Vault configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Provider backend
    pub backend: BackendKind,
    /// Root directory of the keyfile backend, one subdirectory per chain
    pub keystore_dir: PathBuf,
    /// Cost parameters for newly encrypted keys
    pub scrypt: ScryptConfig,
    /// Chains added to (or overriding) the built-in registry, name to chain id
    pub chains: BTreeMap<String, u64>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            keystore_dir: PathBuf::from("./data/keystore"),
            scrypt: ScryptConfig::default(),
            chains: BTreeMap::new(),
        }
    }
}

impl VaultConfig {
    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Read a JSON config file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: VaultConfig = serde_json::from_str(&data)
            .map_err(|e| Error::InvalidArgument(format!("Invalid config {}: {}", path.display(), e)))?;
        config.with_env_overrides()
    }

    fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("FO3_VAULT_BACKEND") {
            self.backend = backend.parse()?;
        }
        if let Some(dir) = lookup("FO3_VAULT_KEYSTORE_DIR") {
            self.keystore_dir = PathBuf::from(dir);
        }
        if let Some(log_n) = lookup("FO3_VAULT_SCRYPT_LOG_N") {
            self.scrypt.log_n = parse_number("FO3_VAULT_SCRYPT_LOG_N", &log_n)?;
        }
        if let Some(r) = lookup("FO3_VAULT_SCRYPT_R") {
            self.scrypt.r = parse_number("FO3_VAULT_SCRYPT_R", &r)?;
        }
        if let Some(p) = lookup("FO3_VAULT_SCRYPT_P") {
            self.scrypt.p = parse_number("FO3_VAULT_SCRYPT_P", &p)?;
        }
        Ok(self)
    }

    /// Built-in chains plus the configured ones
    pub fn chain_registry(&self) -> Result<ChainRegistry> {
        let mut registry = ChainRegistry::default();
        for (name, chain_id) in &self.chains {
            registry.register(Chain::new(name)?, *chain_id);
        }
        Ok(registry)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("Invalid value for {}: {}", key, value)))
}
