//! In-memory account provider

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::account::{Account, Address};
use crate::chain::{Chain, ChainRegistry};
use crate::crypto::keyfile::{KeyFile, ScryptConfig};
use crate::crypto::keys::generate_secret_key;
use crate::crypto::passphrase::Passphrase;
use crate::error::Result;
use crate::transaction::{sign_with_key, SignedTransaction, TransactionRequest};
use super::{duplicate, not_found, run_blocking, AccountProvider};

#[derive(Debug, Clone)]
struct StoredAccount {
    account: Account,
    keyfile: KeyFile,
}

/// Provider holding encrypted keyfiles in process memory.
///
/// Keys are encrypted exactly as the keyfile backend would store them, so
/// exports from here import anywhere. Nothing survives the process.
pub struct MemoryProvider {
    registry: ChainRegistry,
    scrypt: ScryptConfig,
    accounts: RwLock<HashMap<Chain, Vec<StoredAccount>>>,
}

impl MemoryProvider {
    /// Create an empty provider
    pub fn new(registry: ChainRegistry, scrypt: ScryptConfig) -> Self {
        Self {
            registry,
            scrypt,
            accounts: RwLock::new(HashMap::new()),
        }
    }

    async fn find_account(&self, address: &Address, chain: &Chain) -> Result<StoredAccount> {
        let accounts = self.accounts.read().await;
        accounts
            .get(chain)
            .and_then(|entries| entries.iter().find(|e| e.account.address == *address))
            .cloned()
            .ok_or_else(|| not_found(address, chain))
    }

    async fn modify<F>(&self, address: &Address, chain: &Chain, change: F) -> Result<()>
    where
        F: FnOnce(&mut Account) + Send,
    {
        self.registry.chain_id(chain)?;
        let mut accounts = self.accounts.write().await;
        let entry = accounts
            .get_mut(chain)
            .and_then(|entries| entries.iter_mut().find(|e| e.account.address == *address))
            .ok_or_else(|| not_found(address, chain))?;
        change(&mut entry.account);
        Ok(())
    }

    async fn insert(&self, account: Account, keyfile: KeyFile, chain: &Chain) -> Result<Address> {
        let address = account.address;
        let mut accounts = self.accounts.write().await;
        let entries = accounts.entry(chain.clone()).or_default();
        if entries.iter().any(|e| e.account.address == address) {
            return Err(duplicate(&address, chain));
        }
        entries.push(StoredAccount { account, keyfile });
        Ok(address)
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new(ChainRegistry::default(), ScryptConfig::default())
    }
}

#[async_trait]
impl AccountProvider for MemoryProvider {
    async fn new_account(
        &self,
        passphrase: Passphrase,
        name: &str,
        description: &str,
        chain: &Chain,
    ) -> Result<Address> {
        self.registry.chain_id(chain)?;

        let scrypt = self.scrypt;
        let keyfile = run_blocking(move || {
            let secret = generate_secret_key();
            KeyFile::encrypt(&secret, &passphrase, &scrypt)
        })
        .await?;

        let account = Account::new(keyfile.address()?, name, description);
        let address = self.insert(account, keyfile, chain).await?;
        info!(%address, %chain, "Created account");
        Ok(address)
    }

    async fn list_accounts(&self, chain: &Chain, show_hidden: bool) -> Result<Vec<Account>> {
        self.registry.chain_id(chain)?;
        let accounts = self.accounts.read().await;
        let listed: Vec<Account> = accounts
            .get(chain)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.account.is_visible(show_hidden))
                    .map(|e| e.account.clone())
                    .collect()
            })
            .unwrap_or_default();
        debug!(%chain, show_hidden, count = listed.len(), "Listed accounts");
        Ok(listed)
    }

    async fn sign_transaction(
        &self,
        tx: &TransactionRequest,
        passphrase: Passphrase,
        chain: &Chain,
    ) -> Result<SignedTransaction> {
        let chain_id = self.registry.chain_id(chain)?;
        let from = tx.sender()?;
        let stored = self.find_account(&from, chain).await?;

        let tx = tx.clone();
        let signed = run_blocking(move || {
            let secret = stored.keyfile.decrypt(&passphrase)?;
            sign_with_key(&tx, chain_id, &secret)
        })
        .await?;
        debug!(address = %from, %chain, hash = %signed.hash, "Signed transaction");
        Ok(signed)
    }

    async fn import_account(&self, data: &str, chain: &Chain) -> Result<Address> {
        self.registry.chain_id(chain)?;
        let mut keyfile = KeyFile::from_json(data)?;
        let account = Account::new(
            keyfile.address()?,
            keyfile.name.as_deref().unwrap_or_default(),
            keyfile.description.as_deref().unwrap_or_default(),
        );
        keyfile.hidden = false;

        let address = self.insert(account, keyfile, chain).await?;
        info!(%address, %chain, "Imported account");
        Ok(address)
    }

    async fn hide_account(&self, address: &Address, chain: &Chain) -> Result<()> {
        self.modify(address, chain, |account| account.hidden = true).await?;
        info!(%address, %chain, "Hid account");
        Ok(())
    }

    async fn unhide_account(&self, address: &Address, chain: &Chain) -> Result<()> {
        self.modify(address, chain, |account| account.hidden = false).await?;
        info!(%address, %chain, "Unhid account");
        Ok(())
    }

    async fn update_account(
        &self,
        address: &Address,
        name: &str,
        description: &str,
        chain: &Chain,
    ) -> Result<()> {
        let (name, description) = (name.to_string(), description.to_string());
        self.modify(address, chain, move |account| {
            account.name = name;
            account.description = description;
        })
        .await?;
        info!(%address, %chain, "Updated account");
        Ok(())
    }

    async fn export_account(&self, address: &Address, chain: &Chain) -> Result<KeyFile> {
        self.registry.chain_id(chain)?;
        let stored = self.find_account(address, chain).await?;
        Ok(stored
            .keyfile
            .with_metadata(&stored.account.name, &stored.account.description))
    }
}
