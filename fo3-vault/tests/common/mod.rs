//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use fo3_vault::crypto::keys::{secret_key_to_address, sign_hash, RecoverableSignature};
use fo3_vault::{
    Address, Backend, ChainRegistry, Error, HardwareDevice, KeyFileProvider, MemoryProvider,
    ProviderFactory, Result, ScryptConfig, Vault,
};
use tempfile::TempDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a test subscriber honouring `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "fo3_vault=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// Cheap scrypt cost so tests do not spend seconds per key
pub fn test_scrypt() -> ScryptConfig {
    ScryptConfig { log_n: 10, r: 8, p: 1 }
}

pub fn memory_vault() -> Vault<Backend> {
    init_tracing();
    Vault::new(Backend::Memory(MemoryProvider::new(
        ChainRegistry::default(),
        test_scrypt(),
    )))
}

/// Keyfile vault rooted in a fresh temporary directory
pub fn keyfile_vault() -> (TempDir, Vault<Backend>) {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let provider = KeyFileProvider::new(dir.path(), ChainRegistry::default(), test_scrypt()).unwrap();
    (dir, Vault::new(Backend::KeyFile(provider)))
}

pub fn hardware_vault() -> (Arc<MockDevice>, Vault<Backend>) {
    init_tracing();
    let device = Arc::new(MockDevice::new(3));
    let backend = ProviderFactory::create_hardware_provider(device.clone(), ChainRegistry::default());
    (device, Vault::new(backend))
}

/// Software stand-in for a hardware wallet with fixed keys 1..=n
pub struct MockDevice {
    pub connected: AtomicBool,
    keys: Vec<[u8; 32]>,
}

impl MockDevice {
    pub fn new(count: u8) -> Self {
        let keys = (1..=count)
            .map(|i| {
                let mut key = [0u8; 32];
                key[31] = i;
                key
            })
            .collect();
        Self {
            connected: AtomicBool::new(true),
            keys,
        }
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl HardwareDevice for MockDevice {
    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn derive_address(&self, index: u32) -> Result<Address> {
        let key = self
            .keys
            .get(index as usize)
            .ok_or_else(|| Error::HardwareUnavailable(format!("no key at index {}", index)))?;
        secret_key_to_address(key)
    }

    async fn sign_hash(&self, address: &Address, hash: [u8; 32]) -> Result<RecoverableSignature> {
        for key in &self.keys {
            if secret_key_to_address(key)? == *address {
                return sign_hash(key, &hash);
            }
        }
        Err(Error::NotFound(address.to_string()))
    }
}
