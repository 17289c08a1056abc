//! EIP-155 transaction encoding and signing

use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{
    Address as EthersAddress, Signature, TransactionRequest as EthersTransactionRequest, U256,
};

use crate::account::Address;
use crate::crypto::keys::{keccak256, sign_hash, RecoverableSignature};
use crate::error::{Error, Result};
use super::types::{SignedTransaction, TransactionRequest};

/// Convert a transaction request to an ethers legacy transaction bound to `chain_id`
pub fn build_transaction(request: &TransactionRequest, chain_id: u64) -> Result<TypedTransaction> {
    let from = request.sender()?;
    let value = parse_quantity("value", &request.value)?;

    let mut tx = EthersTransactionRequest::new()
        .from(to_ethers_address(&from))
        .value(value)
        .chain_id(chain_id);

    if let Some(to) = &request.to {
        let to: Address = to
            .parse()
            .map_err(|_| Error::InvalidArgument(format!("Invalid to address: {}", to)))?;
        tx = tx.to(to_ethers_address(&to));
    }

    // Add gas price if provided
    if let Some(gas_price) = &request.gas_price {
        tx = tx.gas_price(parse_quantity("gas price", gas_price)?);
    }

    // Add gas limit if provided
    if let Some(gas_limit) = &request.gas_limit {
        tx = tx.gas(parse_quantity("gas limit", gas_limit)?);
    }

    if let Some(nonce) = request.nonce {
        tx = tx.nonce(nonce);
    }

    if let Some(data) = &request.data {
        tx = tx.data(data.clone());
    }

    Ok(TypedTransaction::Legacy(tx))
}

/// Sign a request with a raw private key
pub fn sign_with_key(
    request: &TransactionRequest,
    chain_id: u64,
    secret: &[u8],
) -> Result<SignedTransaction> {
    let tx = build_transaction(request, chain_id)?;
    let sighash = tx.sighash();
    let signature = sign_hash(secret, sighash.as_fixed_bytes())?;
    assemble(&tx, request.sender()?, chain_id, signature)
}

/// Attach a signature produced elsewhere (e.g. by a hardware device)
pub fn assemble(
    tx: &TypedTransaction,
    from: Address,
    chain_id: u64,
    signature: RecoverableSignature,
) -> Result<SignedTransaction> {
    let v = chain_id
        .checked_mul(2)
        .and_then(|v| v.checked_add(35 + u64::from(signature.recovery_id)))
        .ok_or_else(|| Error::InvalidArgument(format!("Chain id too large for EIP-155: {}", chain_id)))?;
    let signature = Signature {
        r: U256::from_big_endian(&signature.r),
        s: U256::from_big_endian(&signature.s),
        v,
    };

    let raw = tx.rlp_signed(&signature).to_vec();
    let hash = keccak256(&raw);

    Ok(SignedTransaction {
        from,
        chain_id,
        hash: format!("0x{}", hex::encode(hash)),
        raw,
        sighash: tx.sighash(),
        signature,
    })
}

fn to_ethers_address(address: &Address) -> EthersAddress {
    EthersAddress::from(*address.as_bytes())
}

fn parse_quantity(field: &str, value: &str) -> Result<U256> {
    let parsed = match value.strip_prefix("0x") {
        Some(digits) => U256::from_str_radix(digits, 16).ok(),
        None => U256::from_dec_str(value).ok(),
    };
    parsed.ok_or_else(|| Error::InvalidArgument(format!("Invalid {}: {}", field, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers_core::types::NameOrAddress;

    fn secret() -> [u8; 32] {
        let mut secret = [0u8; 32];
        secret[31] = 1;
        secret
    }

    fn request() -> TransactionRequest {
        TransactionRequest {
            from: "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf".to_string(),
            to: Some("0x742d35Cc6634C0532925a3b844Bc454e4438f44e".to_string()),
            value: "1000000000000000000".to_string(), // 1 ETH
            gas_price: Some("20000000000".to_string()), // 20 Gwei
            gas_limit: Some("0x5208".to_string()),
            nonce: Some(0),
            data: None,
        }
    }

    #[test]
    fn test_build_transaction() {
        let tx = build_transaction(&request(), 61).unwrap();

        let to: Address = "0x742d35cc6634c0532925a3b844bc454e4438f44e".parse().unwrap();
        assert_eq!(tx.to(), Some(&NameOrAddress::Address(to_ethers_address(&to))));
        assert_eq!(tx.value(), Some(&U256::from_dec_str("1000000000000000000").unwrap()));
        assert_eq!(tx.gas(), Some(&U256::from(21000u64)));
        assert_eq!(tx.chain_id().map(|id| id.as_u64()), Some(61));
    }

    #[test]
    fn test_invalid_quantities() {
        let mut bad_value = request();
        bad_value.value = "ten".to_string();
        assert!(matches!(build_transaction(&bad_value, 1), Err(Error::InvalidArgument(_))));

        let mut bad_to = request();
        bad_to.to = Some("0x1234".to_string());
        assert!(matches!(build_transaction(&bad_to, 1), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_signature_recovers_sender() {
        let signed = sign_with_key(&request(), 61, &secret()).unwrap();

        assert_eq!(signed.chain_id, 61);
        assert!(signed.signature.v == 157 || signed.signature.v == 158);
        assert!(signed.raw[0] >= 0xc0);
        assert!(signed.raw_hex().starts_with("0x"));
        assert_eq!(signed.hash.len(), 66);

        let recovered = signed.signature.recover(signed.sighash).unwrap();
        assert_eq!(recovered, to_ethers_address(&signed.from));
    }

    #[test]
    fn test_chain_id_changes_signature() {
        let mainnet = sign_with_key(&request(), 61, &secret()).unwrap();
        let morden = sign_with_key(&request(), 62, &secret()).unwrap();

        assert_ne!(mainnet.sighash, morden.sighash);
        assert_ne!(mainnet.raw, morden.raw);
    }

    #[test]
    fn test_oversized_chain_id_rejected() {
        let result = sign_with_key(&request(), u64::MAX / 2, &secret());
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}
