//! Read-only query execution against the SQLite store

use std::path::Path;

use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Either, Executor, Row, Statement, TypeInfo, ValueRef};
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::guard;
use crate::result::{QueryResult, SqlValue};
use crate::schema::{self, TableSchema};

/// Message for SQL holding more than one statement.
pub const MULTIPLE_STATEMENTS: &str = "You can only execute one statement at a time.";

/// Executes model-generated SQL and captures failures as `QueryResult::Failed`.
pub struct QueryExecutor {
    pool: SqlitePool,
    enforce_read_only: bool,
}

impl QueryExecutor {
    /// Open an existing database file with SQLite's read-only flag.
    pub async fn connect(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if !db_path.is_file() {
            return Err(StoreError::DatabaseNotFound(db_path.to_path_buf()));
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        debug!("Opened store read-only at {:?}", db_path);
        Ok(Self::from_pool(pool))
    }

    /// Wrap an already opened pool. The statement guard is enabled.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            enforce_read_only: true,
        }
    }

    /// Toggle the statement guard that runs before execution.
    pub fn enforce_read_only(mut self, enforce: bool) -> Self {
        self.enforce_read_only = enforce;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Describe a table in the store.
    pub async fn describe_table(&self, table_name: &str) -> Result<TableSchema> {
        schema::describe_table(&self.pool, table_name).await
    }

    /// Execute `sql`. Never fails: errors are returned as a failed result.
    pub async fn execute(&self, sql: &str) -> QueryResult {
        let sql = sql.trim();
        if sql.is_empty() {
            warn!("Refusing to execute an empty SQL statement");
            return QueryResult::failed("empty SQL statement");
        }

        if self.enforce_read_only {
            if let Err(refusal) = guard::check_read_only(sql) {
                warn!("{}", refusal);
                return QueryResult::failed(refusal.to_string());
            }
        }

        debug!("Executing SQL: {}", sql);
        let rows = match self.fetch_single_statement(sql).await {
            Ok(Some(rows)) => rows,
            Ok(None) => {
                warn!("Refusing SQL with more than one statement");
                return QueryResult::failed(MULTIPLE_STATEMENTS);
            }
            Err(e) => return failure(e),
        };

        let columns = match rows.first() {
            Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
            None => match self.pool.prepare(sql).await {
                Ok(statement) => statement
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect(),
                Err(e) => return failure(e),
            },
        };

        let result = QueryResult::Rows {
            columns,
            rows: rows.iter().map(decode_row).collect(),
        };
        info!("Query returned {} rows", result.row_count());
        result
    }

    /// Rows of `sql`, or `None` when it turns out to hold several statements.
    async fn fetch_single_statement(&self, sql: &str) -> sqlx::Result<Option<Vec<SqliteRow>>> {
        let mut stream = sqlx::raw_sql(sql).fetch_many(&self.pool);
        let mut rows = Vec::new();
        let mut finished = false;
        while let Some(item) = stream.try_next().await? {
            if finished {
                return Ok(None);
            }
            match item {
                Either::Left(_) => finished = true,
                Either::Right(row) => rows.push(row),
            }
        }
        Ok(Some(rows))
    }
}

fn failure(e: sqlx::Error) -> QueryResult {
    let message = match &e {
        sqlx::Error::Database(db) => db.message().to_string(),
        other => other.to_string(),
    };
    warn!("Query failed: {}", message);
    QueryResult::failed(message)
}

fn decode_row(row: &SqliteRow) -> Vec<SqlValue> {
    (0..row.len()).map(|idx| decode_cell(row, idx)).collect()
}

/// Decode by the value's runtime storage class, not the declared column type.
fn decode_cell(row: &SqliteRow, idx: usize) -> SqlValue {
    let type_name = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return SqlValue::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return SqlValue::Null,
    };

    match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => row
            .try_get_unchecked::<i64, _>(idx)
            .map(SqlValue::Integer)
            .unwrap_or(SqlValue::Null),
        "REAL" | "NUMERIC" => row
            .try_get_unchecked::<f64, _>(idx)
            .map(SqlValue::Real)
            .unwrap_or(SqlValue::Null),
        "BLOB" => row
            .try_get_unchecked::<Vec<u8>, _>(idx)
            .map(|bytes| SqlValue::Text(format!("<{} bytes>", bytes.len())))
            .unwrap_or(SqlValue::Null),
        _ => row
            .try_get_unchecked::<String, _>(idx)
            .map(SqlValue::Text)
            .unwrap_or(SqlValue::Null),
    }
}
