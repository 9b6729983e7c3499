//! Typed errors for the store crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or inspecting the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The source file is missing, unreadable or malformed.
    #[error("ingestion failed for {path}: {reason}")]
    Ingest { path: PathBuf, reason: String },

    /// The CSV reader rejected the source file.
    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The database file does not exist yet.
    #[error("database not found at {0} (load a dataset first)")]
    DatabaseNotFound(PathBuf),

    /// The requested table does not exist.
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
