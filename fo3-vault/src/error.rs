//! Error types for the vault library

use thiserror::Error;

/// Custom error type for vault operations
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed input, including an empty or unknown chain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No account with the given address in the chain namespace
    #[error("Account not found: {0}")]
    NotFound(String),

    /// Wrong passphrase or failed unlock
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Address already present in the chain namespace
    #[error("Duplicate account: {0}")]
    DuplicateAccount(String),

    /// Import data that cannot be parsed
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Operation meaningless for this account or provider
    #[error("Not supported: {0}")]
    Unsupported(String),

    /// Hardware signer cannot be reached
    #[error("Hardware unavailable: {0}")]
    HardwareUnavailable(String),

    /// Generic backend or storage failure
    #[error("Provider error: {0}")]
    Provider(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Provider(format!("I/O failure: {}", err))
    }
}

/// Result type for vault operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_become_provider_errors() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, Error::Provider(_)));
        assert!(err.to_string().contains("denied"));
    }
}
