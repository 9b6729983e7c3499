//! Application configuration from environment variables.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Source CSV with a header row.
    pub csv_path: PathBuf,
    /// Single-file SQLite database the CSV is loaded into.
    pub database_path: PathBuf,
    pub table_name: String,
    /// Written into empty CSV cells during ingestion.
    pub missing_sentinel: String,
    /// Default row limit the model is told to apply.
    pub row_limit: usize,
    /// Refuse non-query statements before they reach the database.
    pub enforce_read_only: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            csv_path: std::env::var("ASKDB_CSV_PATH")
                .unwrap_or_else(|_| "./data/salaries_2023.csv".to_string())
                .into(),
            database_path: std::env::var("ASKDB_DATABASE_PATH")
                .unwrap_or_else(|_| "./db/salary.db".to_string())
                .into(),
            table_name: std::env::var("ASKDB_TABLE")
                .unwrap_or_else(|_| "salaries_2023".to_string()),
            missing_sentinel: std::env::var("ASKDB_MISSING_SENTINEL")
                .unwrap_or_else(|_| askdb_store::loader::DEFAULT_MISSING_SENTINEL.to_string()),
            row_limit: std::env::var("ASKDB_ROW_LIMIT")
                .unwrap_or_else(|_| askdb_ai::prompt::DEFAULT_ROW_LIMIT.to_string())
                .parse()
                .context("Invalid ASKDB_ROW_LIMIT")?,
            enforce_read_only: parse_bool(
                &std::env::var("ASKDB_ENFORCE_READ_ONLY").unwrap_or_else(|_| "true".to_string()),
            )
            .context("Invalid ASKDB_ENFORCE_READ_ONLY")?,
        })
    }

    /// Apply command-line overrides on top of the environment.
    pub fn with_overrides(mut self, csv_path: Option<PathBuf>, table_name: Option<String>) -> Self {
        if let Some(csv_path) = csv_path {
            self.csv_path = csv_path;
        }
        if let Some(table_name) = table_name {
            self.table_name = table_name;
        }
        self
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serialize env-mutating tests to avoid races.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [
            "ASKDB_CSV_PATH",
            "ASKDB_DATABASE_PATH",
            "ASKDB_TABLE",
            "ASKDB_MISSING_SENTINEL",
            "ASKDB_ROW_LIMIT",
            "ASKDB_ENFORCE_READ_ONLY",
        ] {
            unsafe { std::env::remove_var(key) };
        }
    }

    #[test]
    fn from_env_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.csv_path, PathBuf::from("./data/salaries_2023.csv"));
        assert_eq!(config.database_path, PathBuf::from("./db/salary.db"));
        assert_eq!(config.table_name, "salaries_2023");
        assert_eq!(config.missing_sentinel, "0");
        assert_eq!(config.row_limit, 30);
        assert!(config.enforce_read_only);

        clear_env();
    }

    #[test]
    fn from_env_with_all_vars() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        unsafe {
            std::env::set_var("ASKDB_CSV_PATH", "/data/people.csv");
            std::env::set_var("ASKDB_DATABASE_PATH", "/tmp/people.db");
            std::env::set_var("ASKDB_TABLE", "people");
            std::env::set_var("ASKDB_MISSING_SENTINEL", "unknown");
            std::env::set_var("ASKDB_ROW_LIMIT", "10");
            std::env::set_var("ASKDB_ENFORCE_READ_ONLY", "off");
        }

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.csv_path, PathBuf::from("/data/people.csv"));
        assert_eq!(config.database_path, PathBuf::from("/tmp/people.db"));
        assert_eq!(config.table_name, "people");
        assert_eq!(config.missing_sentinel, "unknown");
        assert_eq!(config.row_limit, 10);
        assert!(!config.enforce_read_only);

        clear_env();
    }

    #[test]
    fn from_env_invalid_row_limit() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        unsafe { std::env::set_var("ASKDB_ROW_LIMIT", "lots") };
        assert!(AppConfig::from_env().is_err());

        clear_env();
    }

    #[test]
    fn from_env_invalid_bool() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        unsafe { std::env::set_var("ASKDB_ENFORCE_READ_ONLY", "maybe") };
        let err = AppConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("ASKDB_ENFORCE_READ_ONLY"));

        clear_env();
    }

    #[test]
    fn overrides_replace_env_values() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        let config = AppConfig::from_env()
            .unwrap()
            .with_overrides(Some(PathBuf::from("other.csv")), None);
        assert_eq!(config.csv_path, PathBuf::from("other.csv"));
        assert_eq!(config.table_name, "salaries_2023");

        clear_env();
    }
}
