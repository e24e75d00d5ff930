//! Error types for chunksync

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for chunksync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for chunksync
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors (file system operations)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Cache database could not acquire its file lock in time
    #[error("Timed out waiting for cache lock: {path}")]
    LockTimeout { path: PathBuf },

    /// Cache store errors (transactions, table access)
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// Stored manifest or chunk record failed to decode
    #[error("Corrupt cache entry: {message}")]
    CorruptCache { message: String },

    /// Chunk id is not present in the cache
    #[error("Chunk {chunk_id} not found")]
    ChunkNotFound { chunk_id: u64 },

    /// Chunk size must be at least one byte
    #[error("Chunk size {chunksize} too small")]
    BadChunkSize { chunksize: u64 },

    /// Hash algorithm name is not recognized
    #[error("Unsupported hash algorithm: {name}")]
    UnsupportedAlgorithm { name: String },

    /// Remote chunk service errors (HTTP, body decoding)
    #[error("Remote error: {message}")]
    Remote { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid source or target location
    #[error("Invalid location: {location} - {reason}")]
    InvalidLocation { location: String, reason: String },

    /// Post-copy whole-file digest disagrees with the source manifest
    #[error("Checksum verification failed: expected {expected}, got {actual}")]
    VerificationFailed { expected: String, actual: String },

    /// Operation not available on this endpoint kind
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: &'static str },
}

impl Error {
    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a cache error
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a corrupt-cache error
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptCache {
            message: message.into(),
        }
    }

    /// Create a remote error
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Remote {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config {
            message: format!("TOML parse error: {}", err),
        }
    }
}
