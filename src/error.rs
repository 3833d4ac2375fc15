//! Error types and Result aliases for propctl

use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for propctl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for propctl
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // === Shell errors ===
    /// Failed to spawn the superuser process
    #[error("failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A command did not resolve within the caller's wait budget
    #[error("command did not finish within {duration:?}")]
    CommandTimeout { duration: Duration },

    // === Mount table errors ===
    /// Failed to read the mount table source
    #[error("failed to read mount table {path}: {source}")]
    MountTableRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // === Property store errors ===
    /// Failed to load a property file
    #[error("failed to load properties from {path}: {source}")]
    PropertyLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a property file
    #[error("failed to store properties to {path}: {source}")]
    PropertyStore {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // === Configuration errors ===
    /// Failed to read a configuration file
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a configuration file
    #[error("failed to parse config {path}: {reason}")]
    ConfigParse { path: PathBuf, reason: String },

    /// Configuration file format not recognized
    #[error("unsupported config format: {path}")]
    ConfigFormat { path: PathBuf },

    // === Generic I/O ===
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
