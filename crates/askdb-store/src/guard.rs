//! Read-only statement guard
//!
//! Model-generated SQL is checked before it reaches the database. Anything the
//! parser recognises as a data- or schema-changing statement is refused.
//! Statements the parser cannot handle are let through: the executor's
//! connection is opened read-only, so SQLite itself rejects writes.
//! Only one statement may be submitted at a time.

use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GuardError {
    #[error("refused to run {0} statement: only read-only queries are allowed")]
    Mutating(String),

    #[error("refused to run {0} statements: only one statement can be executed at a time")]
    MultipleStatements(usize),
}

/// Check that `sql` is a single read-only query.
pub fn check_read_only(sql: &str) -> Result<(), GuardError> {
    let statements = match Parser::parse_sql(&SQLiteDialect {}, sql) {
        Ok(statements) => statements,
        Err(e) => {
            debug!("Guard could not parse statement, deferring to database: {}", e);
            return Ok(());
        }
    };

    if statements.len() > 1 {
        return Err(GuardError::MultipleStatements(statements.len()));
    }
    for statement in &statements {
        check_statement(statement)?;
    }
    Ok(())
}

fn check_statement(statement: &Statement) -> Result<(), GuardError> {
    match statement {
        Statement::Query(query) => check_query(query),
        Statement::Explain { statement, .. } => check_statement(statement),
        other => Err(GuardError::Mutating(leading_keyword(&other.to_string()))),
    }
}

fn check_query(query: &Query) -> Result<(), GuardError> {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            check_query(&cte.query)?;
        }
    }
    check_set_expr(&query.body)
}

fn check_set_expr(expr: &SetExpr) -> Result<(), GuardError> {
    match expr {
        SetExpr::Select(_) | SetExpr::Values(_) | SetExpr::Table(_) => Ok(()),
        SetExpr::Query(query) => check_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            check_set_expr(left)?;
            check_set_expr(right)
        }
        other => Err(GuardError::Mutating(leading_keyword(&other.to_string()))),
    }
}

fn leading_keyword(sql: &str) -> String {
    sql.split_whitespace()
        .next()
        .unwrap_or("unknown")
        .to_uppercase()
}
