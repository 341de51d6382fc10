//! Output module for persisting scrape results
//!
//! A run's records are written as one JSON document that fully replaces the
//! previous one.

mod snapshot;

pub use snapshot::{to_pretty_json, SnapshotWriter};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while persisting a snapshot
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to replace {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
