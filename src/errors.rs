//! Typed errors for the alert subsystem.
//!
//! None of these are fatal to the host process: the coordinator logs source
//! and store failures and carries on with the state it already has.

use std::path::PathBuf;
use thiserror::Error;

/// Failures fetching tracked entities from a data source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read entity source at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("entity source at {path} is not a JSON array: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("entity fetch failed: {0}")]
    Fetch(String),
}

/// Failures of the persisted key-value storage.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read key {key}: {source}")]
    Read {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write key {key}: {source}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

/// Errors returned by the public coordinator operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("alert threshold must be a positive number of days, got {0}")]
    InvalidThreshold(i64),

    #[error("coordinator has been torn down")]
    Stopped,
}
