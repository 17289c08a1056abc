//! Account management functionality
//!
//! This module provides the account record shared by every provider and the
//! address type used to identify accounts within a chain namespace.

mod address;

pub use address::*;

use serde::{Deserialize, Serialize};

/// One managed key within a chain namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique within the provider and chain, never reused
    pub address: Address,
    /// Human-readable label, not required to be unique
    pub name: String,
    /// Free-text annotation
    #[serde(default)]
    pub description: String,
    /// Excluded from default listings. A hidden account still signs and exports.
    #[serde(default)]
    pub hidden: bool,
    /// Key material lives on an external signing device
    #[serde(default)]
    pub hardware: bool,
}

impl Account {
    /// Create a visible software-backed account
    pub fn new(address: Address, name: &str, description: &str) -> Self {
        Self {
            address,
            name: name.to_string(),
            description: description.to_string(),
            hidden: false,
            hardware: false,
        }
    }

    /// Whether default listings include this account
    pub fn is_visible(&self, show_hidden: bool) -> bool {
        show_hidden || !self.hidden
    }
}
