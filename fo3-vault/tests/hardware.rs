//! Hardware provider against a software device

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::MockDevice;
use fo3_vault::crypto::keys::RecoverableSignature;
use fo3_vault::{
    AccountProvider, Address, Chain, ChainRegistry, Error, HardwareDevice, HardwareProvider,
    Result, TransactionRequest,
};
use tokio::sync::Notify;

fn setup() -> (Arc<MockDevice>, HardwareProvider) {
    common::init_tracing();
    let device = Arc::new(MockDevice::new(4));
    let provider = HardwareProvider::new(device.clone(), ChainRegistry::default());
    (device, provider)
}

fn mainnet() -> Chain {
    Chain::new("mainnet").unwrap()
}

#[tokio::test]
async fn test_accounts_use_successive_indices() {
    let (_, provider) = setup();
    let first = provider
        .new_account("ignored".into(), "a", "", &mainnet())
        .await
        .unwrap();
    let second = provider
        .new_account("ignored".into(), "b", "", &mainnet())
        .await
        .unwrap();

    assert_eq!(first.to_string(), "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf");
    assert_ne!(first, second);

    let accounts = provider.list_accounts(&mainnet(), false).await.unwrap();
    assert_eq!(accounts.len(), 2);
    assert!(accounts.iter().all(|a| a.hardware));
}

#[tokio::test]
async fn test_signs_through_device() {
    let (_, provider) = setup();
    let from = provider
        .new_account("ignored".into(), "a", "", &mainnet())
        .await
        .unwrap();
    let to: Address = "0x742d35cc6634c0532925a3b844bc454e4438f44e".parse().unwrap();

    let mut tx = TransactionRequest::transfer(&from, &to, "1000");
    tx.nonce = Some(0);
    tx.gas_price = Some("1".to_string());
    tx.gas_limit = Some("21000".to_string());

    let signed = provider
        .sign_transaction(&tx, "any".into(), &mainnet())
        .await
        .unwrap();
    assert_eq!(signed.from, from);
    assert_eq!(signed.chain_id, 61);
}

#[tokio::test]
async fn test_disconnected_device() {
    let (device, provider) = setup();
    let from = provider
        .new_account("ignored".into(), "a", "", &mainnet())
        .await
        .unwrap();
    device.disconnect();

    let result = provider.new_account("x".into(), "b", "", &mainnet()).await;
    assert!(matches!(result, Err(Error::HardwareUnavailable(_))));

    let tx = TransactionRequest::transfer(&from, &from, "1");
    let result = provider.sign_transaction(&tx, "x".into(), &mainnet()).await;
    assert!(matches!(result, Err(Error::HardwareUnavailable(_))));

    // Metadata operations do not need the device
    provider.hide_account(&from, &mainnet()).await.unwrap();
    assert!(provider.list_accounts(&mainnet(), false).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_import_and_export_unsupported() {
    let (_, provider) = setup();
    let address = provider
        .new_account("ignored".into(), "a", "", &mainnet())
        .await
        .unwrap();

    assert!(matches!(
        provider.export_account(&address, &mainnet()).await,
        Err(Error::Unsupported(_))
    ));
    assert!(matches!(
        provider.import_account("{}", &mainnet()).await,
        Err(Error::Unsupported(_))
    ));

    let missing: Address = "0x0000000000000000000000000000000000000001".parse().unwrap();
    assert!(matches!(
        provider.export_account(&missing, &mainnet()).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        provider.export_account(&address, &Chain::new("morden").unwrap()).await,
        Err(Error::NotFound(_))
    ));
}

/// Device that holds every derivation until released
struct GatedDevice {
    inner: MockDevice,
    release: Notify,
}

#[async_trait]
impl HardwareDevice for GatedDevice {
    async fn is_connected(&self) -> bool {
        self.inner.is_connected().await
    }

    async fn derive_address(&self, index: u32) -> Result<Address> {
        self.release.notified().await;
        self.inner.derive_address(index).await
    }

    async fn sign_hash(&self, address: &Address, hash: [u8; 32]) -> Result<RecoverableSignature> {
        self.inner.sign_hash(address, hash).await
    }
}

#[tokio::test]
async fn test_listing_not_blocked_by_pending_derivation() {
    common::init_tracing();
    let device = Arc::new(GatedDevice {
        inner: MockDevice::new(2),
        release: Notify::new(),
    });
    let provider = Arc::new(HardwareProvider::new(device.clone(), ChainRegistry::default()));

    let pending = tokio::spawn({
        let provider = provider.clone();
        async move {
            provider
                .new_account("ignored".into(), "slow", "", &mainnet())
                .await
        }
    });
    tokio::task::yield_now().await;

    let listed = tokio::time::timeout(
        Duration::from_secs(5),
        provider.list_accounts(&mainnet(), true),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(listed.is_empty());

    device.release.notify_one();
    let address = pending.await.unwrap().unwrap();
    let listed = provider.list_accounts(&mainnet(), true).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].address, address);
}
