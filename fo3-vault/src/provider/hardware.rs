//! Hardware wallet provider
//!
//! Keys never leave the device. The provider only tracks which derivation
//! indices have been handed out per chain, plus the account metadata.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::account::{Account, Address};
use crate::chain::{Chain, ChainRegistry};
use crate::crypto::keyfile::KeyFile;
use crate::crypto::keys::RecoverableSignature;
use crate::crypto::passphrase::Passphrase;
use crate::error::{Error, Result};
use crate::transaction::{assemble, build_transaction, SignedTransaction, TransactionRequest};
use super::{duplicate, not_found, AccountProvider};

/// Driver for an external signing device
#[async_trait]
pub trait HardwareDevice: Send + Sync {
    /// Whether the device is attached and unlocked
    async fn is_connected(&self) -> bool;

    /// Address of the key at a derivation index
    async fn derive_address(&self, index: u32) -> Result<Address>;

    /// Sign a 32-byte digest with the key behind `address`
    async fn sign_hash(&self, address: &Address, hash: [u8; 32]) -> Result<RecoverableSignature>;
}

#[derive(Debug, Clone)]
struct DeviceAccount {
    account: Account,
    index: u32,
}

#[derive(Debug, Default)]
struct ChainAccounts {
    accounts: Vec<DeviceAccount>,
    /// Next derivation index to hand out, including reservations still in flight
    next_index: u32,
}

impl ChainAccounts {
    fn find(&self, address: &Address) -> Option<&DeviceAccount> {
        self.accounts.iter().find(|e| e.account.address == *address)
    }
}

/// Provider delegating custody and signing to a [`HardwareDevice`]
pub struct HardwareProvider {
    device: Arc<dyn HardwareDevice>,
    registry: ChainRegistry,
    chains: RwLock<HashMap<Chain, ChainAccounts>>,
}

impl HardwareProvider {
    /// Create a provider around a device driver
    pub fn new(device: Arc<dyn HardwareDevice>, registry: ChainRegistry) -> Self {
        Self {
            device,
            registry,
            chains: RwLock::new(HashMap::new()),
        }
    }

    async fn ensure_connected(&self) -> Result<()> {
        if self.device.is_connected().await {
            Ok(())
        } else {
            warn!("Hardware device not connected");
            Err(Error::HardwareUnavailable("device not connected".to_string()))
        }
    }

    async fn modify<F>(&self, address: &Address, chain: &Chain, change: F) -> Result<()>
    where
        F: FnOnce(&mut Account) + Send,
    {
        self.registry.chain_id(chain)?;
        let mut chains = self.chains.write().await;
        let entry = chains
            .get_mut(chain)
            .and_then(|c| c.accounts.iter_mut().find(|e| e.account.address == *address))
            .ok_or_else(|| not_found(address, chain))?;
        change(&mut entry.account);
        Ok(())
    }

    /// Derivation index of a registered account
    async fn index_of(&self, address: &Address, chain: &Chain) -> Result<u32> {
        let chains = self.chains.read().await;
        chains
            .get(chain)
            .and_then(|c| c.find(address))
            .map(|e| e.index)
            .ok_or_else(|| not_found(address, chain))
    }
}

#[async_trait]
impl AccountProvider for HardwareProvider {
    /// Register the next unused derivation index. The passphrase is not used,
    /// the device guards its own keys. The lock is not held while the device
    /// derives the address.
    async fn new_account(
        &self,
        _passphrase: Passphrase,
        name: &str,
        description: &str,
        chain: &Chain,
    ) -> Result<Address> {
        self.registry.chain_id(chain)?;
        self.ensure_connected().await?;

        let index = {
            let mut chains = self.chains.write().await;
            let entry = chains.entry(chain.clone()).or_default();
            let index = entry.next_index;
            entry.next_index += 1;
            index
        };
        let address = self.device.derive_address(index).await?;

        let mut account = Account::new(address, name, description);
        account.hardware = true;
        {
            let mut chains = self.chains.write().await;
            let entry = chains.entry(chain.clone()).or_default();
            if entry.find(&address).is_some() {
                return Err(duplicate(&address, chain));
            }
            entry.accounts.push(DeviceAccount { account, index });
        }

        info!(%address, %chain, index, "Registered hardware account");
        Ok(address)
    }

    async fn list_accounts(&self, chain: &Chain, show_hidden: bool) -> Result<Vec<Account>> {
        self.registry.chain_id(chain)?;
        let chains = self.chains.read().await;
        Ok(chains
            .get(chain)
            .map(|c| {
                c.accounts
                    .iter()
                    .filter(|e| e.account.is_visible(show_hidden))
                    .map(|e| e.account.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn sign_transaction(
        &self,
        tx: &TransactionRequest,
        _passphrase: Passphrase,
        chain: &Chain,
    ) -> Result<SignedTransaction> {
        let chain_id = self.registry.chain_id(chain)?;
        let from = tx.sender()?;
        let index = self.index_of(&from, chain).await?;
        self.ensure_connected().await?;

        let typed = build_transaction(tx, chain_id)?;
        let sighash = typed.sighash();
        let signature = self.device.sign_hash(&from, sighash.to_fixed_bytes()).await?;
        let signed = assemble(&typed, from, chain_id, signature)?;

        let recovered = signed
            .signature
            .recover(signed.sighash)
            .map_err(|e| Error::Provider(format!("Device returned an invalid signature: {}", e)))?;
        if recovered.as_bytes() != &from.as_bytes()[..] {
            return Err(Error::Provider(format!(
                "Device signed with a different key than {} (index {})",
                from, index
            )));
        }

        debug!(address = %from, %chain, index, hash = %signed.hash, "Signed transaction on device");
        Ok(signed)
    }

    async fn import_account(&self, _data: &str, chain: &Chain) -> Result<Address> {
        self.registry.chain_id(chain)?;
        Err(Error::Unsupported(
            "hardware accounts cannot import keyfiles".to_string(),
        ))
    }

    async fn hide_account(&self, address: &Address, chain: &Chain) -> Result<()> {
        self.modify(address, chain, |account| account.hidden = true).await?;
        info!(%address, %chain, "Hid hardware account");
        Ok(())
    }

    async fn unhide_account(&self, address: &Address, chain: &Chain) -> Result<()> {
        self.modify(address, chain, |account| account.hidden = false).await?;
        info!(%address, %chain, "Unhid hardware account");
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
        info!(%address, %chain, "Updated hardware account");
        Ok(())
    }

    async fn export_account(&self, address: &Address, chain: &Chain) -> Result<KeyFile> {
        self.registry.chain_id(chain)?;
        self.index_of(address, chain).await?;
        Err(Error::Unsupported(
            "hardware keys cannot be exported".to_string(),
        ))
    }
}
