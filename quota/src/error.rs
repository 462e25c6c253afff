//! Error types for quota table operations.

use common::StorageError;

/// Error type for quota table operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A row key or qualifier does not match any known layout.
    MalformedKey(String),

    /// A stored settings value is missing its magic prefix or fails to decode.
    CorruptRecord(String),

    /// A caller passed a row or column that the operation requires but that
    /// is absent or invalid.
    IllegalInput(String),

    /// A cluster-level call was made on a connection without that capability.
    UnsupportedConnection(String),

    /// A scan filter pattern could not be compiled.
    InvalidFilter(String),

    /// Configuration could not be parsed.
    Config(String),

    /// Errors from the underlying table.
    Storage(String),

    /// Errors reported by a remote status call.
    Rpc(String),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MalformedKey(msg) => write!(f, "Malformed key: {}", msg),
            Error::CorruptRecord(msg) => write!(f, "Corrupt record: {}", msg),
            Error::IllegalInput(msg) => write!(f, "Illegal input: {}", msg),
            Error::UnsupportedConnection(msg) => write!(f, "Unsupported connection: {}", msg),
            Error::InvalidFilter(msg) => write!(f, "Invalid filter: {}", msg),
            Error::Config(msg) => write!(f, "Config error: {}", msg),
            Error::Storage(msg) => write!(f, "Storage error: {}", msg),
            Error::Rpc(msg) => write!(f, "RPC error: {}", msg),
        }
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Storage(msg) | StorageError::Internal(msg) => Error::Storage(msg),
        }
    }
}

/// Result type alias for quota table operations.
pub type Result<T> = std::result::Result<T, Error>;
