//! askdb store - SQLite-backed tabular storage
//!
//! This crate provides:
//! - CSV ingestion into a single replaceable table
//! - Read-only query execution with a statement guard
//! - Schema description for prompt grounding

pub mod error;
pub mod executor;
pub mod guard;
pub mod loader;
pub mod result;
pub mod schema;

pub use error::StoreError;
pub use executor::QueryExecutor;
pub use loader::{ColumnType, LoadSummary, TableLoader, TabularDataset};
pub use result::{QueryResult, SqlValue};
pub use schema::{ColumnInfo, TableSchema};
