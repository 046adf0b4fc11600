//! Error types for mcsnap

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for mcsnap
#[derive(Error, Debug)]
pub enum McSnapError {
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors raised while talking to a memcached server
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Unable to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed by server")]
    ConnectionClosed,

    #[error("No response within {0:?}")]
    Timeout(Duration),

    #[error("Command cancelled")]
    Cancelled,

    #[error("Connection out of sync after an interrupted command")]
    OutOfSync,

    #[error("Response line exceeds {0} bytes")]
    LineTooLong(usize),

    #[error("Response line is not valid UTF-8")]
    InvalidUtf8,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Value not stored: {0}")]
    NotStored(String),
}

impl ClientError {
    /// Returns true if the connection can no longer be used after this error
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ClientError::Protocol(_) | ClientError::Server(_) | ClientError::NotStored(_)
        )
    }
}

/// Response and request grammar errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Key too long (max 250 bytes)")]
    KeyTooLong,

    #[error("Malformed VALUE line: {0}")]
    MalformedValue(String),

    #[error("Value length mismatch: header says {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Data block of {0} bytes not terminated by CRLF")]
    UnterminatedData(usize),

    #[error("Reply is for key {actual}, requested {expected}")]
    KeyMismatch { expected: String, actual: String },

    #[error("Malformed STAT line: {0}")]
    MalformedStat(String),

    #[error("Malformed slab stat: {0}")]
    MalformedSlabStat(String),

    #[error("Malformed cachedump item: {0}")]
    MalformedItem(String),
}

/// Snapshot file errors
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read snapshot {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write snapshot {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid snapshot content: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Snapshot has no version envelope (legacy relative-expiry format?); convert it with `mcsnap migrate`")]
    Unversioned,

    #[error("Unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

pub type Result<T> = std::result::Result<T, McSnapError>;
