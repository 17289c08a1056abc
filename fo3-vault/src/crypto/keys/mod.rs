//! Key generation, address derivation and hash signing
//!
//! Only secp256k1 keys are managed today. Every chain the vault knows about
//! uses Ethereum-style 20-byte addresses.

pub mod ethereum;

pub use ethereum::*;
