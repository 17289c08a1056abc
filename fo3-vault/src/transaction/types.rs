//! Common transaction types

use ethers_core::types::{Signature, H256};
use serde::{Deserialize, Serialize};

use crate::account::Address;
use crate::error::{Error, Result};

/// Transaction request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Signing account, looked up in the chain namespace
    pub from: String,
    /// Recipient, `None` for contract creation
    pub to: Option<String>,
    /// Value in wei, decimal or `0x` hex
    pub value: String,
    /// Gas price in wei
    pub gas_price: Option<String>,
    /// Gas limit
    pub gas_limit: Option<String>,
    /// Nonce
    pub nonce: Option<u64>,
    /// Data (for contract calls)
    pub data: Option<Vec<u8>>,
}

impl TransactionRequest {
    /// Create a plain value transfer
    pub fn transfer(from: &Address, to: &Address, value: &str) -> Self {
        Self {
            from: from.to_string(),
            to: Some(to.to_string()),
            value: value.to_string(),
            ..Default::default()
        }
    }

    /// The account that must sign this request
    pub fn sender(&self) -> Result<Address> {
        self.from
            .parse()
            .map_err(|_| Error::InvalidArgument(format!("Invalid from address: {}", self.from)))
    }
}

/// A signed, encoded transaction ready for broadcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// Signing account
    pub from: Address,
    /// EIP-155 chain id the signature commits to
    pub chain_id: u64,
    /// Keccak-256 of `raw`, `0x` prefixed
    pub hash: String,
    /// RLP-encoded signed transaction
    pub raw: Vec<u8>,
    /// Hash that was signed
    pub sighash: H256,
    /// Signature with EIP-155 `v`
    pub signature: Signature,
}

impl SignedTransaction {
    /// Raw transaction as `0x` hex, the form `eth_sendRawTransaction` expects
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }
}
