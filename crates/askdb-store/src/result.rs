//! Query results and their textual rendering

use std::fmt;

use serde::Serialize;

/// A single cell value as returned by SQLite.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Integer(v) => Some(*v as f64),
            SqlValue::Real(v) => Some(*v),
            _ => None,
        }
    }
}

/// Renders values the way a Python tuple literal would show them, which is
/// the shape the model sees in the synthesis prompt.
impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "None"),
            SqlValue::Integer(v) => write!(f, "{}", v),
            SqlValue::Real(v) => write!(f, "{:?}", v),
            SqlValue::Text(s) => write_quoted(f, s),
        }
    }
}

/// Python `repr` of a string: single quotes unless the text holds a single
/// quote and no double quote.
fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    write!(f, "{}", quote)?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c == quote => write!(f, "\\{}", c)?,
            c if (c as u32) < 0x20 || c as u32 == 0x7f => write!(f, "\\x{:02x}", c as u32)?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "{}", quote)
}

/// Outcome of executing one SQL statement.
///
/// Execution errors are captured as `Failed` instead of being raised, so the
/// answer stage can still explain them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryResult {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<SqlValue>>,
    },
    Failed {
        message: String,
    },
}

impl QueryResult {
    pub fn failed(message: impl Into<String>) -> Self {
        QueryResult::Failed {
            message: message.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, QueryResult::Failed { .. })
    }

    /// Number of result rows (zero for failures).
    pub fn row_count(&self) -> usize {
        match self {
            QueryResult::Rows { rows, .. } => rows.len(),
            QueryResult::Failed { .. } => 0,
        }
    }

    /// Look up a cell by row index and column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&SqlValue> {
        match self {
            QueryResult::Rows { columns, rows } => {
                let idx = columns.iter().position(|c| c == column)?;
                rows.get(row)?.get(idx)
            }
            QueryResult::Failed { .. } => None,
        }
    }

    /// Iterate rows as `(column, value)` pairs in column order.
    pub fn named_rows(&self) -> Vec<Vec<(&str, &SqlValue)>> {
        match self {
            QueryResult::Rows { columns, rows } => rows
                .iter()
                .map(|row| {
                    columns
                        .iter()
                        .map(|c| c.as_str())
                        .zip(row.iter())
                        .collect()
                })
                .collect(),
            QueryResult::Failed { .. } => Vec::new(),
        }
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryResult::Failed { message } => write!(f, "Error: {}", message),
            QueryResult::Rows { rows, .. } => {
                write!(f, "[")?;
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "(")?;
                    for (j, value) in row.iter().enumerate() {
                        if j > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", value)?;
                    }
                    if row.len() == 1 {
                        write!(f, ",")?;
                    }
                    write!(f, ")")?;
                }
                write!(f, "]")
            }
        }
    }
}
