//! FO3 Vault - Chain-scoped account custody
//!
//! This library stores signing keys per chain namespace behind a single
//! [`AccountProvider`] contract, with in-memory, encrypted keyfile and hardware
//! backends. The [`Vault`] facade validates the chain and forwards calls to the
//! provider. Keys are exchanged as Web3 Secret Storage V3 keyfiles.

pub mod error;
pub mod config;
pub mod chain;
pub mod crypto;
pub mod account;
pub mod transaction;
pub mod provider;
pub mod vault;

// Re-export commonly used types for convenience
pub use account::{Account, Address};
pub use chain::{Chain, ChainRegistry};
pub use config::{BackendKind, VaultConfig};
pub use crypto::keyfile::{KeyFile, ScryptConfig};
pub use crypto::passphrase::Passphrase;
pub use error::{Error, Result};
pub use provider::{
    AccountProvider, Backend, HardwareDevice, HardwareProvider, KeyFileProvider, MemoryProvider,
    ProviderFactory,
};
pub use transaction::{SignedTransaction, TransactionRequest};
pub use vault::{AccountUpdate, ListOptions, Vault};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
