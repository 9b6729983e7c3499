//! CSV ingestion into a single, wholesale-replaced SQLite table

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
};
use sqlx::Sqlite;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::result::SqlValue;
use crate::schema::quote_identifier;

/// Placeholder written into missing cells when no other sentinel is configured.
pub const DEFAULT_MISSING_SENTINEL: &str = "0";

/// Cell contents read as missing, in addition to empty cells.
pub const MISSING_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Whether a raw CSV cell counts as a missing value.
pub fn is_missing(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty() || MISSING_TOKENS.contains(&cell)
}

/// Storage class inferred for a CSV column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }

    /// Narrowest type that holds every cell: integer, then float, then text.
    fn infer<'a>(cells: impl Iterator<Item = &'a str>) -> Self {
        let mut ty = ColumnType::Integer;
        let mut seen = false;
        for cell in cells {
            seen = true;
            ty = ty.widen(cell);
            if ty == ColumnType::Text {
                return ty;
            }
        }
        if seen {
            ty
        } else {
            ColumnType::Text
        }
    }

    /// Type of a column whose missing cells are replaced by `sentinel`.
    ///
    /// Inference runs over the present cells only. A column with gaps can no
    /// longer be integer-typed, so it becomes real unless the sentinel itself
    /// is not numeric.
    fn infer_with_gaps<'a>(
        present: impl Iterator<Item = &'a str>,
        gaps: usize,
        sentinel: &str,
    ) -> Self {
        let mut present = present.peekable();
        if gaps == 0 {
            return Self::infer(present);
        }
        let ty = if present.peek().is_none() {
            ColumnType::Real
        } else {
            match Self::infer(present) {
                ColumnType::Integer => ColumnType::Real,
                other => other,
            }
        };
        ty.widen(sentinel)
    }

    fn widen(self, cell: &str) -> Self {
        let mut ty = self;
        if ty == ColumnType::Integer && cell.parse::<i64>().is_err() {
            ty = ColumnType::Real;
        }
        if ty == ColumnType::Real && !cell.parse::<f64>().is_ok_and(f64::is_finite) {
            ty = ColumnType::Text;
        }
        ty
    }

    fn convert(&self, cell: &str) -> SqlValue {
        match self {
            ColumnType::Integer => cell
                .parse()
                .map(SqlValue::Integer)
                .unwrap_or_else(|_| SqlValue::Text(cell.to_string())),
            ColumnType::Real => cell
                .parse()
                .map(SqlValue::Real)
                .unwrap_or_else(|_| SqlValue::Text(cell.to_string())),
            ColumnType::Text => SqlValue::Text(cell.to_string()),
        }
    }
}

/// A CSV file read into memory with missing cells already replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularDataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// How many missing cells were replaced by the sentinel.
    pub filled_cells: usize,
    /// Per column, the row indices whose cell was filled.
    pub gaps: Vec<Vec<usize>>,
    pub sentinel: String,
}

impl TabularDataset {
    /// Read a header-first CSV file, substituting `sentinel` for missing cells.
    pub fn from_csv(path: impl AsRef<Path>, sentinel: &str) -> Result<Self> {
        let path = path.as_ref();
        let csv_err = |source: csv::Error| StoreError::Csv {
            path: path.to_path_buf(),
            source,
        };

        if !path.is_file() {
            return Err(StoreError::Ingest {
                path: path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }

        let mut rdr = csv::ReaderBuilder::new().from_path(path).map_err(csv_err)?;
        let columns: Vec<String> = rdr
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
            return Err(StoreError::Ingest {
                path: path.to_path_buf(),
                reason: "missing header row".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for column in &columns {
            if column.is_empty() {
                return Err(StoreError::Ingest {
                    path: path.to_path_buf(),
                    reason: "empty column name in header".to_string(),
                });
            }
            if !seen.insert(column.to_lowercase()) {
                return Err(StoreError::Ingest {
                    path: path.to_path_buf(),
                    reason: format!("duplicate column '{}'", column),
                });
            }
        }

        let mut rows = Vec::new();
        let mut gaps = vec![Vec::new(); columns.len()];
        for (row_idx, record) in rdr.records().enumerate() {
            let record = record.map_err(csv_err)?;
            let row: Vec<String> = record
                .iter()
                .enumerate()
                .map(|(col_idx, cell)| {
                    if is_missing(cell) {
                        gaps[col_idx].push(row_idx);
                        sentinel.to_string()
                    } else {
                        cell.to_string()
                    }
                })
                .collect();
            rows.push(row);
        }

        let filled_cells = gaps.iter().map(Vec::len).sum();
        Ok(Self {
            columns,
            rows,
            filled_cells,
            gaps,
            sentinel: sentinel.to_string(),
        })
    }

    pub fn column_types(&self) -> Vec<ColumnType> {
        (0..self.columns.len())
            .map(|idx| {
                let gaps = &self.gaps[idx];
                let present = self
                    .rows
                    .iter()
                    .enumerate()
                    .filter(|(row_idx, _)| gaps.binary_search(row_idx).is_err())
                    .map(|(_, row)| row[idx].as_str());
                ColumnType::infer_with_gaps(present, gaps.len(), &self.sentinel)
            })
            .collect()
    }
}

/// What a load produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSummary {
    pub table_name: String,
    pub source: PathBuf,
    pub columns: Vec<(String, ColumnType)>,
    pub row_count: usize,
    pub filled_cells: usize,
}

/// Writes CSV datasets into the SQLite store, replacing prior tables.
pub struct TableLoader {
    pool: SqlitePool,
    sentinel: String,
}

impl TableLoader {
    /// Open (creating if needed) the database file at `db_path` for writing.
    pub async fn connect(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        debug!("Opened store for writing at {:?}", db_path);
        Ok(Self {
            pool,
            sentinel: DEFAULT_MISSING_SENTINEL.to_string(),
        })
    }

    /// Use a different placeholder for missing cells.
    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Read `csv_path` and replace `table_name` with its contents.
    pub async fn load_csv(
        &self,
        csv_path: impl AsRef<Path>,
        table_name: &str,
    ) -> Result<LoadSummary> {
        let csv_path = csv_path.as_ref();
        info!("Loading {:?} into table '{}'", csv_path, table_name);

        let dataset = TabularDataset::from_csv(csv_path, &self.sentinel)?;
        self.replace_table(&dataset, table_name).await?;

        let types = dataset.column_types();
        let summary = LoadSummary {
            table_name: table_name.to_string(),
            source: csv_path.to_path_buf(),
            columns: dataset.columns.iter().cloned().zip(types).collect(),
            row_count: dataset.rows.len(),
            filled_cells: dataset.filled_cells,
        };

        info!(
            "Loaded {} rows ({} columns, {} missing cells filled) into '{}'",
            summary.row_count,
            summary.columns.len(),
            summary.filled_cells,
            table_name
        );
        Ok(summary)
    }

    /// Drop, recreate and fill `table_name` inside one transaction.
    pub async fn replace_table(&self, dataset: &TabularDataset, table_name: &str) -> Result<()> {
        let table = quote_identifier(table_name);
        let types = dataset.column_types();

        let column_defs = dataset
            .columns
            .iter()
            .zip(&types)
            .map(|(name, ty)| format!("{} {}", quote_identifier(name), ty.as_sql()))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=dataset.columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let insert_sql = format!("INSERT INTO {} VALUES ({})", table, placeholders);

        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("CREATE TABLE {} ({})", table, column_defs))
            .execute(&mut *tx)
            .await?;

        for row in &dataset.rows {
            let mut query = sqlx::query(&insert_sql);
            for (cell, ty) in row.iter().zip(&types) {
                query = bind_value(query, ty.convert(cell));
            }
            query.execute(&mut *tx).await?;
        }

        tx.commit().await?;
        debug!("Replaced table {} with {} rows", table, dataset.rows.len());
        Ok(())
    }
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Integer(v) => query.bind(v),
        SqlValue::Real(v) => query.bind(v),
        SqlValue::Text(v) => query.bind(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn test_infer_column_types() {
        assert_eq!(ColumnType::infer(["1", "2", "-3"].into_iter()), ColumnType::Integer);
        assert_eq!(ColumnType::infer(["1", "2.5"].into_iter()), ColumnType::Real);
        assert_eq!(ColumnType::infer(["1", "Eng"].into_iter()), ColumnType::Text);
        assert_eq!(ColumnType::infer(["inf"].into_iter()), ColumnType::Text);
        assert_eq!(ColumnType::infer(std::iter::empty()), ColumnType::Text);
    }

    #[test]
    fn test_infer_with_gaps() {
        assert_eq!(
            ColumnType::infer_with_gaps(["1", "2"].into_iter(), 1, "0"),
            ColumnType::Real
        );
        assert_eq!(
            ColumnType::infer_with_gaps(["1.5"].into_iter(), 2, "missing"),
            ColumnType::Text
        );
        assert_eq!(
            ColumnType::infer_with_gaps(["Eng"].into_iter(), 1, "0"),
            ColumnType::Text
        );
    }

    #[test]
    fn test_dataset_fills_missing_cells() {
        let f = write_csv("department,salary\nEng,100\n,200\nSales,\n");
        let dataset = TabularDataset::from_csv(f.path(), "0").unwrap();
        assert_eq!(dataset.columns, vec!["department", "salary"]);
        assert_eq!(dataset.rows.len(), 3);
        assert_eq!(dataset.rows[1][0], "0");
        assert_eq!(dataset.rows[2][1], "0");
        assert_eq!(dataset.filled_cells, 2);
        assert_eq!(dataset.gaps, vec![vec![1], vec![2]]);
        // An integer column with gaps is widened to real
        assert_eq!(
            dataset.column_types(),
            vec![ColumnType::Text, ColumnType::Real]
        );
    }

    #[test]
    fn test_missing_tokens_are_filled() {
        let f = write_csv("department,salary,bonus\nEng,100,NA\nEng,,N/A\nSales,150,5\n");
        let dataset = TabularDataset::from_csv(f.path(), "0").unwrap();
        assert_eq!(dataset.filled_cells, 3);
        assert_eq!(dataset.rows[0][2], "0");
        assert_eq!(dataset.rows[1][2], "0");
        assert_eq!(
            dataset.column_types(),
            vec![ColumnType::Text, ColumnType::Real, ColumnType::Real]
        );

        for token in ["NULL", "nan", "None", "#N/A", "<NA>", " null "] {
            assert!(is_missing(token), "{}", token);
        }
        assert!(!is_missing("Nancy"));
        assert!(!is_missing("0"));
    }

    #[test]
    fn test_column_without_gaps_stays_integer() {
        let f = write_csv("a,b\n1,2\n3,\n");
        let dataset = TabularDataset::from_csv(f.path(), "0").unwrap();
        assert_eq!(
            dataset.column_types(),
            vec![ColumnType::Integer, ColumnType::Real]
        );
    }

    #[test]
    fn test_all_missing_column_is_real() {
        let f = write_csv("a,b\nx,\ny,NaN\n");
        let dataset = TabularDataset::from_csv(f.path(), "0").unwrap();
        assert_eq!(dataset.column_types()[1], ColumnType::Real);
    }

    #[test]
    fn test_dataset_custom_sentinel() {
        let f = write_csv("a,b\n1,\n");
        let dataset = TabularDataset::from_csv(f.path(), "n/a").unwrap();
        assert_eq!(dataset.rows[0][1], "n/a");
        assert_eq!(dataset.column_types()[1], ColumnType::Text);
    }

    #[test]
    fn test_dataset_missing_file() {
        let result = TabularDataset::from_csv("/nonexistent/salaries.csv", "0");
        assert!(matches!(result, Err(StoreError::Ingest { .. })));
    }

    #[test]
    fn test_dataset_ragged_row_is_malformed() {
        let f = write_csv("a,b\n1,2\n3\n");
        let result = TabularDataset::from_csv(f.path(), "0");
        assert!(matches!(result, Err(StoreError::Csv { .. })));
    }

    #[test]
    fn test_dataset_duplicate_header() {
        let f = write_csv("a,A\n1,2\n");
        let result = TabularDataset::from_csv(f.path(), "0");
        match result {
            Err(StoreError::Ingest { reason, .. }) => assert!(reason.contains("duplicate")),
            other => panic!("expected ingest error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("db").join("salary.db");
        let _loader = TableLoader::connect(&db_path).await.unwrap();
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_load_summary() {
        let dir = tempfile::tempdir().unwrap();
        let f = write_csv("department,salary,bonus\nEng,100,1.5\nSales,150,\n");
        let loader = TableLoader::connect(dir.path().join("t.db")).await.unwrap();

        let summary = loader.load_csv(f.path(), "t").await.unwrap();
        assert_eq!(summary.table_name, "t");
        assert_eq!(summary.row_count, 2);
        assert_eq!(summary.filled_cells, 1);
        assert_eq!(
            summary.columns,
            vec![
                ("department".to_string(), ColumnType::Text),
                ("salary".to_string(), ColumnType::Integer),
                ("bonus".to_string(), ColumnType::Real),
            ]
        );
    }

    #[tokio::test]
    async fn test_load_stores_missing_tokens_as_real_zero() {
        let dir = tempfile::tempdir().unwrap();
        let f = write_csv("department,salary,bonus\nEng,100,NA\nEng,,N/A\nSales,150,5\n");
        let loader = TableLoader::connect(dir.path().join("t.db")).await.unwrap();

        let summary = loader.load_csv(f.path(), "t").await.unwrap();
        assert_eq!(summary.filled_cells, 3);
        assert_eq!(summary.columns[2], ("bonus".to_string(), ColumnType::Real));

        let bonus: Vec<(f64,)> = sqlx::query_as("SELECT bonus FROM t")
            .fetch_all(loader.pool())
            .await
            .unwrap();
        assert_eq!(bonus, vec![(0.0,), (0.0,), (5.0,)]);
    }

    #[tokio::test]
    async fn test_header_only_csv_creates_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let f = write_csv("department,salary\n");
        let loader = TableLoader::connect(dir.path().join("t.db")).await.unwrap();

        let summary = loader.load_csv(f.path(), "empty").await.unwrap();
        assert_eq!(summary.row_count, 0);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM \"empty\"")
            .fetch_one(loader.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
