//! Table schema description used to ground prompts

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{Result, StoreError};

/// Column metadata (names and declared types only, never values)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

/// Shape of one table in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
    pub row_count: usize,
}

impl TableSchema {
    /// Render as a `CREATE TABLE`-like listing for inclusion in a prompt.
    pub fn describe(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("  {} {}", quote_identifier(&c.name), c.data_type))
            .collect::<Vec<_>>()
            .join(",\n");
        format!(
            "Table {} ({} rows):\n{}",
            quote_identifier(&self.table_name),
            self.row_count,
            columns
        )
    }
}

/// Quote an SQL identifier, doubling any embedded quote characters.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Read column names, declared types and row count of `table_name`.
pub async fn describe_table(pool: &SqlitePool, table_name: &str) -> Result<TableSchema> {
    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")
            .bind(table_name)
            .fetch_all(pool)
            .await?;

    if rows.is_empty() {
        return Err(StoreError::TableNotFound(table_name.to_string()));
    }

    let columns = rows
        .into_iter()
        .map(|(name, data_type)| ColumnInfo { name, data_type })
        .collect();

    let (row_count,): (i64,) = sqlx::query_as(&format!(
        "SELECT COUNT(*) FROM {}",
        quote_identifier(table_name)
    ))
    .fetch_one(pool)
    .await?;

    Ok(TableSchema {
        table_name: table_name.to_string(),
        columns,
        row_count: row_count.max(0) as usize,
    })
}
