//! Web3 Secret Storage keyfiles (version 3)
//!
//! Keys are written with scrypt and AES-128-CTR. Keyfiles produced with the
//! PBKDF2 key derivation function (HMAC-SHA256) are accepted on import.
//!
//! The MAC is keccak256 over the second half of the derived key followed by the
//! ciphertext, so a wrong passphrase is detected before anything is decrypted.
//!
//! Besides the standard fields a keyfile may carry `name`, `description` and
//! `hidden` metadata. Other implementations ignore them.

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::Hmac;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::account::Address;
use crate::crypto::keys::{keccak256, secret_key_to_address};
use crate::crypto::passphrase::Passphrase;
use crate::error::{Error, Result};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// Keyfile format version written and accepted
pub const KEYFILE_VERSION: u32 = 3;

const CIPHER: &str = "aes-128-ctr";
const PBKDF2_PRF: &str = "hmac-sha256";
const DKLEN: usize = 32;
const SALT_LEN: usize = 32;
const IV_LEN: usize = 16;

/// Scrypt cost parameters used when encrypting new keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScryptConfig {
    /// log2 of the CPU/memory cost `n`
    pub log_n: u8,
    /// Block size
    pub r: u32,
    /// Parallelization
    pub p: u32,
}

impl Default for ScryptConfig {
    fn default() -> Self {
        Self { log_n: 18, r: 8, p: 1 }
    }
}

impl ScryptConfig {
    /// Cheaper parameters for constrained devices (n = 4096, p = 6)
    pub fn light() -> Self {
        Self { log_n: 12, r: 8, p: 6 }
    }

    fn params(&self) -> Result<scrypt::Params> {
        scrypt::Params::new(self.log_n, self.r, self.p, DKLEN)
            .map_err(|e| Error::InvalidArgument(format!("Invalid scrypt parameters: {}", e)))
    }
}

/// An encrypted account in the V3 keyfile format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyFile {
    /// Format version, always 3
    pub version: u32,
    /// Random keyfile identifier
    pub id: Uuid,
    /// Account address as 40 hex characters, without `0x`
    pub address: String,
    /// Encrypted key material
    #[serde(alias = "Crypto")]
    pub crypto: CryptoSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// The `crypto` object of a keyfile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoSection {
    pub cipher: String,
    pub cipherparams: CipherParams,
    pub ciphertext: String,
    pub kdf: KdfKind,
    pub kdfparams: KdfParams,
    pub mac: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherParams {
    pub iv: String,
}

/// Key derivation function named by the keyfile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KdfKind {
    Scrypt,
    Pbkdf2,
}

/// Parameters of the key derivation function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KdfParams {
    Scrypt(ScryptParams),
    Pbkdf2(Pbkdf2Params),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScryptParams {
    pub dklen: usize,
    pub n: u64,
    pub r: u32,
    pub p: u32,
    pub salt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pbkdf2Params {
    pub c: u32,
    pub dklen: usize,
    pub prf: String,
    pub salt: String,
}

impl KeyFile {
    /// Encrypt a raw private key under a passphrase
    pub fn encrypt(secret: &[u8], passphrase: &Passphrase, config: &ScryptConfig) -> Result<Self> {
        let address = secret_key_to_address(secret)?;
        let params = config.params()?;

        let mut salt = [0u8; SALT_LEN];
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut iv);

        let mut derived_key = Zeroizing::new([0u8; DKLEN]);
        scrypt::scrypt(passphrase.as_bytes(), &salt, &params, &mut derived_key[..])
            .map_err(|e| Error::Provider(format!("Key derivation failed: {}", e)))?;

        let mut ciphertext = secret.to_vec();
        apply_cipher(&derived_key[..16], &iv, &mut ciphertext)?;
        let mac = compute_mac(&derived_key[..], &ciphertext);

        Ok(Self {
            version: KEYFILE_VERSION,
            id: Uuid::new_v4(),
            address: address.without_prefix(),
            crypto: CryptoSection {
                cipher: CIPHER.to_string(),
                cipherparams: CipherParams { iv: hex::encode(iv) },
                ciphertext: hex::encode(ciphertext),
                kdf: KdfKind::Scrypt,
                kdfparams: KdfParams::Scrypt(ScryptParams {
                    dklen: DKLEN,
                    n: 1u64 << config.log_n,
                    r: config.r,
                    p: config.p,
                    salt: hex::encode(salt),
                }),
                mac: hex::encode(mac),
            },
            name: None,
            description: None,
            hidden: false,
        })
    }

    /// Parse and validate a keyfile document. The address is normalized to
    /// 40 lowercase hex characters.
    pub fn from_json(data: &str) -> Result<Self> {
        let mut keyfile: KeyFile = serde_json::from_str(data)
            .map_err(|e| Error::InvalidFormat(format!("Unparseable keyfile: {}", e)))?;
        keyfile.validate()?;
        keyfile.address = keyfile.address()?.without_prefix();
        Ok(keyfile)
    }

    /// Serialize the keyfile as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Provider(format!("Keyfile serialization failed: {}", e)))
    }

    /// Attach account metadata
    pub fn with_metadata(mut self, name: &str, description: &str) -> Self {
        self.name = Some(name.to_string());
        self.description = Some(description.to_string());
        self
    }

    /// The account address this keyfile claims
    pub fn address(&self) -> Result<Address> {
        self.address
            .parse()
            .map_err(|_| Error::InvalidFormat(format!("Invalid keyfile address: {}", self.address)))
    }

    /// Check structure without touching the passphrase
    pub fn validate(&self) -> Result<()> {
        if self.version != KEYFILE_VERSION {
            return Err(Error::InvalidFormat(format!(
                "Unsupported keyfile version: {}",
                self.version
            )));
        }
        self.address()?;

        let crypto = &self.crypto;
        if crypto.cipher != CIPHER {
            return Err(Error::InvalidFormat(format!("Unsupported cipher: {}", crypto.cipher)));
        }
        decode_hex("iv", &crypto.cipherparams.iv, Some(IV_LEN))?;
        decode_hex("ciphertext", &crypto.ciphertext, None)?;
        decode_hex("mac", &crypto.mac, Some(32))?;

        match (&crypto.kdf, &crypto.kdfparams) {
            (KdfKind::Scrypt, KdfParams::Scrypt(params)) => {
                check_dklen(params.dklen)?;
                scrypt_log_n(params.n)?;
                decode_hex("salt", &params.salt, None)?;
            }
            (KdfKind::Pbkdf2, KdfParams::Pbkdf2(params)) => {
                check_dklen(params.dklen)?;
                if params.prf != PBKDF2_PRF {
                    return Err(Error::InvalidFormat(format!("Unsupported prf: {}", params.prf)));
                }
                if params.c == 0 {
                    return Err(Error::InvalidFormat("Zero pbkdf2 iteration count".to_string()));
                }
                decode_hex("salt", &params.salt, None)?;
            }
            (kind, _) => {
                return Err(Error::InvalidFormat(format!(
                    "kdfparams do not match kdf {:?}",
                    kind
                )));
            }
        }

        Ok(())
    }

    /// Decrypt the private key with a passphrase
    pub fn decrypt(&self, passphrase: &Passphrase) -> Result<Zeroizing<Vec<u8>>> {
        self.validate()?;

        let derived_key = self.derive_key(passphrase)?;
        let ciphertext = decode_hex("ciphertext", &self.crypto.ciphertext, None)?;
        let expected_mac = decode_hex("mac", &self.crypto.mac, Some(32))?;

        let mac = compute_mac(&derived_key[..], &ciphertext);
        if !constant_time_eq(&mac, &expected_mac) {
            return Err(Error::Authentication("Invalid passphrase".to_string()));
        }

        let iv = decode_hex("iv", &self.crypto.cipherparams.iv, Some(IV_LEN))?;
        let mut secret = Zeroizing::new(ciphertext);
        apply_cipher(&derived_key[..16], &iv, &mut secret)?;

        if secret_key_to_address(&secret)? != self.address()? {
            return Err(Error::InvalidFormat(
                "Decrypted key does not match keyfile address".to_string(),
            ));
        }

        Ok(secret)
    }

    fn derive_key(&self, passphrase: &Passphrase) -> Result<Zeroizing<[u8; DKLEN]>> {
        let mut derived_key = Zeroizing::new([0u8; DKLEN]);

        match &self.crypto.kdfparams {
            KdfParams::Scrypt(params) => {
                let salt = decode_hex("salt", &params.salt, None)?;
                let scrypt_params = scrypt::Params::new(scrypt_log_n(params.n)?, params.r, params.p, DKLEN)
                    .map_err(|e| Error::InvalidFormat(format!("Invalid scrypt parameters: {}", e)))?;
                scrypt::scrypt(passphrase.as_bytes(), &salt, &scrypt_params, &mut derived_key[..])
                    .map_err(|e| Error::Provider(format!("Key derivation failed: {}", e)))?;
            }
            KdfParams::Pbkdf2(params) => {
                let salt = decode_hex("salt", &params.salt, None)?;
                pbkdf2::pbkdf2::<Hmac<Sha256>>(
                    passphrase.as_bytes(),
                    &salt,
                    params.c,
                    &mut derived_key[..],
                );
            }
        }

        Ok(derived_key)
    }
}

fn apply_cipher(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()> {
    let mut cipher = Aes128Ctr::new_from_slices(key, iv)
        .map_err(|e| Error::Provider(format!("Cipher initialization failed: {}", e)))?;
    cipher.apply_keystream(data);
    Ok(())
}

fn compute_mac(derived_key: &[u8], ciphertext: &[u8]) -> [u8; 32] {
    let mut data = Vec::with_capacity(16 + ciphertext.len());
    data.extend_from_slice(&derived_key[16..32]);
    data.extend_from_slice(ciphertext);
    keccak256(&data)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn check_dklen(dklen: usize) -> Result<()> {
    if dklen != DKLEN {
        return Err(Error::InvalidFormat(format!("Unsupported dklen: {}", dklen)));
    }
    Ok(())
}

fn scrypt_log_n(n: u64) -> Result<u8> {
    if n < 2 || !n.is_power_of_two() {
        return Err(Error::InvalidFormat(format!("Invalid scrypt n: {}", n)));
    }
    Ok(n.trailing_zeros() as u8)
}

fn decode_hex(field: &str, value: &str, expected_len: Option<usize>) -> Result<Vec<u8>> {
    let bytes = hex::decode(value)
        .map_err(|e| Error::InvalidFormat(format!("Invalid {} hex: {}", field, e)))?;
    match expected_len {
        Some(len) if bytes.len() != len => Err(Error::InvalidFormat(format!(
            "Invalid {} length: {}",
            field,
            bytes.len()
        ))),
        _ => Ok(bytes),
    }
}
