//! Account providers
//!
//! A provider owns account records and key material for any number of chain
//! namespaces, and signs with that material. Three backends implement the
//! [`AccountProvider`] contract:
//!
//! - [`MemoryProvider`] keeps encrypted keyfiles in process memory.
//! - [`KeyFileProvider`] keeps one encrypted keyfile per account on disk.
//! - [`HardwareProvider`] delegates key custody and signing to an external device.
//!
//! Contract shared by all of them:
//!
//! - `new_account` and `import_account` are atomic: a fully usable account is
//!   stored, or nothing is.
//! - Listings are in creation order.
//! - Hiding an account only changes listings; it still signs and exports.
//! - Importing an address that already exists in the chain fails with
//!   [`Error::DuplicateAccount`]. Existing records are never overwritten.
//! - Mutations of one address are serialized.
//! - Passphrases are consumed by the call they were passed to.

mod memory;
mod keystore;
mod hardware;

pub use memory::*;
pub use keystore::*;
pub use hardware::*;

use async_trait::async_trait;

use crate::account::{Account, Address};
use crate::chain::{Chain, ChainRegistry};
use crate::config::{BackendKind, VaultConfig};
use crate::crypto::keyfile::KeyFile;
use crate::crypto::passphrase::Passphrase;
use crate::error::{Error, Result};
use crate::transaction::{SignedTransaction, TransactionRequest};

/// Chain-scoped account storage, custody and signing
#[async_trait]
pub trait AccountProvider: Send + Sync {
    /// Generate and store a new key, returning its address
    async fn new_account(
        &self,
        passphrase: Passphrase,
        name: &str,
        description: &str,
        chain: &Chain,
    ) -> Result<Address>;

    /// Accounts in the chain, hidden ones only when `show_hidden` is set
    async fn list_accounts(&self, chain: &Chain, show_hidden: bool) -> Result<Vec<Account>>;

    /// Sign with the account named by `tx.from`
    async fn sign_transaction(
        &self,
        tx: &TransactionRequest,
        passphrase: Passphrase,
        chain: &Chain,
    ) -> Result<SignedTransaction>;

    /// Admit a V3 keyfile document
    async fn import_account(&self, data: &str, chain: &Chain) -> Result<Address>;

    /// Exclude an account from default listings
    async fn hide_account(&self, address: &Address, chain: &Chain) -> Result<()>;

    /// Include a hidden account in default listings again
    async fn unhide_account(&self, address: &Address, chain: &Chain) -> Result<()>;

    /// Replace the name and description
    async fn update_account(
        &self,
        address: &Address,
        name: &str,
        description: &str,
        chain: &Chain,
    ) -> Result<()>;

    /// Keyfile suitable for re-import elsewhere
    async fn export_account(&self, address: &Address, chain: &Chain) -> Result<KeyFile>;
}

/// Run CPU-heavy key work off the async executor
pub(crate) async fn run_blocking<F, T>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Provider(format!("Key task failed: {}", e)))?
}

pub(crate) fn not_found(address: &Address, chain: &Chain) -> Error {
    Error::NotFound(format!("{} in chain {}", address, chain))
}

pub(crate) fn duplicate(address: &Address, chain: &Chain) -> Error {
    Error::DuplicateAccount(format!("{} already exists in chain {}", address, chain))
}

/// Any of the supported backends
pub enum Backend {
    Memory(MemoryProvider),
    KeyFile(KeyFileProvider),
    Hardware(HardwareProvider),
}

macro_rules! dispatch {
    ($self:ident, $provider:ident => $call:expr) => {
        match $self {
            Backend::Memory($provider) => $call,
            Backend::KeyFile($provider) => $call,
            Backend::Hardware($provider) => $call,
        }
    };
}

#[async_trait]
impl AccountProvider for Backend {
    async fn new_account(
        &self,
        passphrase: Passphrase,
        name: &str,
        description: &str,
        chain: &Chain,
    ) -> Result<Address> {
        dispatch!(self, p => p.new_account(passphrase, name, description, chain).await)
    }

    async fn list_accounts(&self, chain: &Chain, show_hidden: bool) -> Result<Vec<Account>> {
        dispatch!(self, p => p.list_accounts(chain, show_hidden).await)
    }

    async fn sign_transaction(
        &self,
        tx: &TransactionRequest,
        passphrase: Passphrase,
        chain: &Chain,
    ) -> Result<SignedTransaction> {
        dispatch!(self, p => p.sign_transaction(tx, passphrase, chain).await)
    }

    async fn import_account(&self, data: &str, chain: &Chain) -> Result<Address> {
        dispatch!(self, p => p.import_account(data, chain).await)
    }

    async fn hide_account(&self, address: &Address, chain: &Chain) -> Result<()> {
        dispatch!(self, p => p.hide_account(address, chain).await)
    }

    async fn unhide_account(&self, address: &Address, chain: &Chain) -> Result<()> {
        dispatch!(self, p => p.unhide_account(address, chain).await)
    }

    async fn update_account(
        &self,
        address: &Address,
        name: &str,
        description: &str,
        chain: &Chain,
    ) -> Result<()> {
        dispatch!(self, p => p.update_account(address, name, description, chain).await)
    }

    async fn export_account(&self, address: &Address, chain: &Chain) -> Result<KeyFile> {
        dispatch!(self, p => p.export_account(address, chain).await)
    }
}

/// Provider factory
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create the software backend named by the configuration
    pub fn create_provider(config: &VaultConfig) -> Result<Backend> {
        let registry = config.chain_registry()?;
        match config.backend {
            BackendKind::Memory => Ok(Backend::Memory(MemoryProvider::new(registry, config.scrypt))),
            BackendKind::Keyfile => {
                let provider = KeyFileProvider::new(&config.keystore_dir, registry, config.scrypt)?;
                Ok(Backend::KeyFile(provider))
            }
        }
    }

    /// Create a hardware backend around a device driver
    pub fn create_hardware_provider(
        device: std::sync::Arc<dyn HardwareDevice>,
        registry: ChainRegistry,
    ) -> Backend {
        Backend::Hardware(HardwareProvider::new(device, registry))
    }
}
