//! Transaction functionality
//!
//! This module provides the transaction request accepted by providers and the
//! EIP-155 encoding used to sign it on Ethereum-family chains.

pub mod types;
mod ethereum;

pub use types::*;
pub use ethereum::*;
