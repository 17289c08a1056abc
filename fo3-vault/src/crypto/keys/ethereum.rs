//! secp256k1 key material for Ethereum-family chains

use rand::rngs::OsRng;
use secp256k1::ecdsa::RecoverableSignature as Secp256k1RecoverableSignature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use zeroize::Zeroizing;

use crate::account::Address;
use crate::error::{Error, Result};

/// Length of a raw secp256k1 private key
pub const SECRET_KEY_LEN: usize = 32;

/// A signature over a 32-byte hash that carries its public key recovery id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    /// 0 or 1
    pub recovery_id: u8,
}

/// Generate a fresh random private key
pub fn generate_secret_key() -> Zeroizing<Vec<u8>> {
    let secret_key = SecretKey::new(&mut OsRng);
    Zeroizing::new(secret_key.secret_bytes().to_vec())
}

fn parse_secret_key(secret: &[u8]) -> Result<SecretKey> {
    if secret.len() != SECRET_KEY_LEN {
        return Err(Error::InvalidFormat(format!(
            "Invalid private key length: {}",
            secret.len()
        )));
    }
    SecretKey::from_slice(secret)
        .map_err(|e| Error::InvalidFormat(format!("Invalid private key: {}", e)))
}

/// Derive the account address owning a private key
pub fn secret_key_to_address(secret: &[u8]) -> Result<Address> {
    let secp = Secp256k1::signing_only();
    let secret_key = parse_secret_key(secret)?;
    let public_key = PublicKey::from_secret_key(&secp, &secret_key);
    Ok(public_key_to_address(&public_key.serialize_uncompressed()))
}

/// Get the address from an uncompressed (65-byte) public key
pub fn public_key_to_address(public_key: &[u8; 65]) -> Address {
    // Skip the first byte (0x04) and hash the rest
    let key_hash = keccak256(&public_key[1..]);

    let mut address = [0u8; 20];
    address.copy_from_slice(&key_hash[12..]);
    Address::from(address)
}

/// Sign a 32-byte hash with a raw private key
pub fn sign_hash(secret: &[u8], hash: &[u8; 32]) -> Result<RecoverableSignature> {
    let secp = Secp256k1::signing_only();
    let secret_key = parse_secret_key(secret)?;
    let message = Message::from_digest_slice(hash)
        .map_err(|e| Error::Provider(format!("Invalid message hash: {}", e)))?;

    let signature = secp.sign_ecdsa_recoverable(&message, &secret_key);
    Ok(from_secp256k1(&signature))
}

fn from_secp256k1(signature: &Secp256k1RecoverableSignature) -> RecoverableSignature {
    let (recovery_id, compact) = signature.serialize_compact();

    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&compact[..32]);
    s.copy_from_slice(&compact[32..]);

    RecoverableSignature {
        r,
        s,
        recovery_id: recovery_id.to_i32() as u8,
    }
}

/// Calculate the Keccak-256 hash of data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    use sha3::{Digest, Keccak256};
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_key_address() {
        // Private key 0x...01 maps to the well-known generator address
        let mut secret = [0u8; 32];
        secret[31] = 1;

        let address = secret_key_to_address(&secret).unwrap();
        assert_eq!(
            address.to_string(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_generated_keys_are_distinct() {
        let first = generate_secret_key();
        let second = generate_secret_key();

        assert_eq!(first.len(), SECRET_KEY_LEN);
        assert_ne!(*first, *second);
        assert!(secret_key_to_address(&first).is_ok());
    }

    #[test]
    fn test_invalid_secret_key() {
        assert!(matches!(
            secret_key_to_address(&[0u8; 32]),
            Err(Error::InvalidFormat(_))
        ));
        assert!(matches!(
            secret_key_to_address(&[1u8; 16]),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_sign_hash_is_deterministic() {
        let secret = [7u8; 32];
        let hash = keccak256(b"payload");

        let first = sign_hash(&secret, &hash).unwrap();
        let second = sign_hash(&secret, &hash).unwrap();
        assert_eq!(first, second);
        assert!(first.recovery_id <= 1);
    }

    #[test]
    fn test_keccak256_empty() {
        assert_eq!(
            hex::encode(keccak256(&[])),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }
}
