//! Cryptographic primitives and operations
//!
//! This module provides key generation, the encrypted keyfile format used for
//! storage and export, and the passphrase wrapper that keeps secrets short-lived.

pub mod keys;
pub mod keyfile;
pub mod passphrase;

pub use keys::*;
pub use keyfile::*;
pub use passphrase::*;
