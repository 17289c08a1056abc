//! Chain-scoped vault facade
//!
//! [`Vault`] is the entry point callers use. It owns one provider, checks that a
//! chain was named, and forwards every call to the provider unchanged.

use tracing::debug;

use crate::account::{Account, Address};
use crate::chain::Chain;
use crate::crypto::keyfile::KeyFile;
use crate::crypto::passphrase::Passphrase;
use crate::error::Result;
use crate::provider::AccountProvider;
use crate::transaction::{SignedTransaction, TransactionRequest};

/// Listing options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Include hidden accounts
    pub show_hidden: bool,
}

impl ListOptions {
    /// Listing that includes hidden accounts
    pub fn all() -> Self {
        Self { show_hidden: true }
    }
}

/// New name and description for an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountUpdate {
    pub name: String,
    pub description: String,
}

impl AccountUpdate {
    /// Rename, clearing the description
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Account vault over a single provider
pub struct Vault<P> {
    provider: P,
}

impl<P: AccountProvider> Vault<P> {
    /// Create a vault over `provider`
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Generate a new account in `chain`
    pub async fn new_account(
        &self,
        passphrase: impl Into<Passphrase>,
        name: &str,
        description: &str,
        chain: &str,
    ) -> Result<Address> {
        let chain = Chain::new(chain)?;
        debug!(%chain, "vault: new_account");
        self.provider
            .new_account(passphrase.into(), name, description, &chain)
            .await
    }

    /// Accounts in `chain`
    pub async fn list_accounts(&self, chain: &str, options: ListOptions) -> Result<Vec<Account>> {
        let chain = Chain::new(chain)?;
        debug!(%chain, show_hidden = options.show_hidden, "vault: list_accounts");
        self.provider.list_accounts(&chain, options.show_hidden).await
    }

    /// Sign `tx` with the account named by its `from` field
    pub async fn sign_transaction(
        &self,
        tx: &TransactionRequest,
        passphrase: impl Into<Passphrase>,
        chain: &str,
    ) -> Result<SignedTransaction> {
        let chain = Chain::new(chain)?;
        debug!(%chain, "vault: sign_transaction");
        self.provider
            .sign_transaction(tx, passphrase.into(), &chain)
            .await
    }

    /// Import a V3 keyfile document
    pub async fn import_account(&self, data: &str, chain: &str) -> Result<Address> {
        let chain = Chain::new(chain)?;
        debug!(%chain, "vault: import_account");
        self.provider.import_account(data, &chain).await
    }

    /// Exclude an account from default listings
    pub async fn hide_account(&self, address: &Address, chain: &str) -> Result<()> {
        let chain = Chain::new(chain)?;
        self.provider.hide_account(address, &chain).await
    }

    /// Show a hidden account in default listings again
    pub async fn unhide_account(&self, address: &Address, chain: &str) -> Result<()> {
        let chain = Chain::new(chain)?;
        self.provider.unhide_account(address, &chain).await
    }

    /// Replace an account's name and description
    pub async fn update_account(
        &self,
        address: &Address,
        update: &AccountUpdate,
        chain: &str,
    ) -> Result<()> {
        let chain = Chain::new(chain)?;
        self.provider
            .update_account(address, &update.name, &update.description, &chain)
            .await
    }

    /// Export an account as a V3 keyfile
    pub async fn export_account(&self, address: &Address, chain: &str) -> Result<KeyFile> {
        let chain = Chain::new(chain)?;
        debug!(%chain, %address, "vault: export_account");
        self.provider.export_account(address, &chain).await
    }
}
