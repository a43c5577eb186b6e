//! Error types for proofshot

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using proofshot Error
pub type Result<T> = std::result::Result<T, Error>;

/// Instrumentation engine error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Suite source could not be read or parsed while resolving an ordinal.
    /// Always recovered by the resolver; never reaches a test.
    #[error("Cannot resolve ordinal for '{test}': {reason}")]
    Resolution { test: String, reason: String },

    #[error("Screenshot capture failed for {path}: {reason}")]
    Capture { path: PathBuf, reason: String },

    #[error("Cannot create artifact directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact already exists: {0}")]
    DuplicateArtifact(PathBuf),

    #[error("Browser driver error: {0}")]
    Driver(String),

    #[error("Operation timeout after {millis}ms: {what}")]
    Timeout { what: String, millis: u64 },
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}
