//! Encrypted keyfile directory provider
//!
//! Layout: `<root>/<chain>/UTC--<timestamp>--<address>.json`, one V3 keyfile per
//! account. Account metadata lives in the keyfile's extension fields. Every write
//! goes to a hidden temporary file that is renamed over the target, so a reader
//! never sees a partially written keyfile.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::account::{Account, Address};
use crate::chain::{Chain, ChainRegistry};
use crate::crypto::keyfile::{KeyFile, ScryptConfig};
use crate::crypto::keys::generate_secret_key;
use crate::crypto::passphrase::Passphrase;
use crate::error::{Error, Result};
use crate::transaction::{sign_with_key, SignedTransaction, TransactionRequest};
use super::{duplicate, not_found, run_blocking, AccountProvider};

/// Provider storing accounts as keyfiles on disk
pub struct KeyFileProvider {
    root: PathBuf,
    registry: ChainRegistry,
    scrypt: ScryptConfig,
    lock: RwLock<()>,
}

impl KeyFileProvider {
    /// Open (and create if missing) a keystore rooted at `root`
    pub fn new(root: &Path, registry: ChainRegistry, scrypt: ScryptConfig) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            registry,
            scrypt,
            lock: RwLock::new(()),
        })
    }

    /// Root directory of the keystore
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn chain_dir(&self, chain: &Chain) -> PathBuf {
        self.root.join(chain.as_str())
    }

    /// All parseable keyfiles of a chain in file-name (creation) order
    async fn load_all(&self, chain: &Chain) -> Result<Vec<(PathBuf, KeyFile)>> {
        let dir = self.chain_dir(chain);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keyfiles = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_keyfile = path.extension().map_or(false, |ext| ext == "json")
                && !path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map_or(true, |name| name.starts_with('.'));
            if !is_keyfile {
                continue;
            }

            let data = match fs::read_to_string(&path).await {
                Ok(data) => data,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable keyfile");
                    continue;
                }
            };
            match KeyFile::from_json(&data) {
                Ok(keyfile) => keyfiles.push((path, keyfile)),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable keyfile"),
            }
        }

        keyfiles.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(keyfiles)
    }

    async fn find(&self, address: &Address, chain: &Chain) -> Result<(PathBuf, KeyFile)> {
        let keyfiles = self.load_all(chain).await?;
        keyfiles
            .into_iter()
            .find(|(_, keyfile)| keyfile.address().ok().as_ref() == Some(address))
            .ok_or_else(|| not_found(address, chain))
    }

    /// Store a keyfile under a fresh name. Caller holds the write lock.
    async fn store_new(&self, keyfile: &KeyFile, chain: &Chain) -> Result<Address> {
        let address = keyfile.address()?;
        let existing = self.load_all(chain).await?;
        if existing
            .iter()
            .any(|(_, k)| k.address().ok().as_ref() == Some(&address))
        {
            return Err(duplicate(&address, chain));
        }

        let dir = self.chain_dir(chain);
        fs::create_dir_all(&dir).await?;
        let file_name = format!(
            "UTC--{}--{}.json",
            Utc::now().format("%Y-%m-%dT%H-%M-%S%.9fZ"),
            address.without_prefix()
        );
        write_atomic(&dir.join(file_name), keyfile).await?;
        Ok(address)
    }

    async fn modify<F>(&self, address: &Address, chain: &Chain, change: F) -> Result<()>
    where
        F: FnOnce(&mut KeyFile) + Send,
    {
        self.registry.chain_id(chain)?;
        let _guard = self.lock.write().await;
        let (path, mut keyfile) = self.find(address, chain).await?;
        change(&mut keyfile);
        write_atomic(&path, &keyfile).await
    }
}

fn to_account(keyfile: &KeyFile) -> Result<Account> {
    Ok(Account {
        address: keyfile.address()?,
        name: keyfile.name.clone().unwrap_or_default(),
        description: keyfile.description.clone().unwrap_or_default(),
        hidden: keyfile.hidden,
        hardware: false,
    })
}

async fn write_atomic(path: &Path, keyfile: &KeyFile) -> Result<()> {
    let json = keyfile.to_json()?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::Provider(format!("Invalid keyfile path: {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    let written = async {
        write_private(&tmp, json.as_bytes()).await?;
        fs::rename(&tmp, path).await
    }
    .await;
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Create `path` readable by the owner only and write `data` to it
async fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}

#[async_trait]
impl AccountProvider for KeyFileProvider {
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
        .await?
        .with_metadata(name, description);

        let _guard = self.lock.write().await;
        let address = self.store_new(&keyfile, chain).await?;
        info!(%address, %chain, "Created account keyfile");
        Ok(address)
    }

    async fn list_accounts(&self, chain: &Chain, show_hidden: bool) -> Result<Vec<Account>> {
        self.registry.chain_id(chain)?;
        let _guard = self.lock.read().await;

        let mut accounts = Vec::new();
        for (_, keyfile) in self.load_all(chain).await? {
            let account = to_account(&keyfile)?;
            if account.is_visible(show_hidden) {
                accounts.push(account);
            }
        }
        debug!(%chain, show_hidden, count = accounts.len(), "Listed keyfiles");
        Ok(accounts)
    }

    async fn sign_transaction(
        &self,
        tx: &TransactionRequest,
        passphrase: Passphrase,
        chain: &Chain,
    ) -> Result<SignedTransaction> {
        let chain_id = self.registry.chain_id(chain)?;
        let from = tx.sender()?;
        let (_, keyfile) = {
            let _guard = self.lock.read().await;
            self.find(&from, chain).await?
        };

        let tx = tx.clone();
        let signed = run_blocking(move || {
            let secret = keyfile.decrypt(&passphrase)?;
            sign_with_key(&tx, chain_id, &secret)
        })
        .await?;
        debug!(address = %from, %chain, hash = %signed.hash, "Signed transaction");
        Ok(signed)
    }

    async fn import_account(&self, data: &str, chain: &Chain) -> Result<Address> {
        self.registry.chain_id(chain)?;
        let mut keyfile = KeyFile::from_json(data)?;
        keyfile.hidden = false;

        let _guard = self.lock.write().await;
        let address = self.store_new(&keyfile, chain).await?;
        info!(%address, %chain, "Imported account keyfile");
        Ok(address)
    }

    async fn hide_account(&self, address: &Address, chain: &Chain) -> Result<()> {
        self.modify(address, chain, |keyfile| keyfile.hidden = true).await?;
        info!(%address, %chain, "Hid account");
        Ok(())
    }

    async fn unhide_account(&self, address: &Address, chain: &Chain) -> Result<()> {
        self.modify(address, chain, |keyfile| keyfile.hidden = false).await?;
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
        self.modify(address, chain, move |keyfile| {
            keyfile.name = Some(name);
            keyfile.description = Some(description);
        })
        .await?;
        info!(%address, %chain, "Updated account");
        Ok(())
    }

    async fn export_account(&self, address: &Address, chain: &Chain) -> Result<KeyFile> {
        self.registry.chain_id(chain)?;
        let _guard = self.lock.read().await;
        let (_, mut keyfile) = self.find(address, chain).await?;

        keyfile.hidden = false;
        let account = to_account(&keyfile)?;
        Ok(keyfile.with_metadata(&account.name, &account.description))
    }
}
