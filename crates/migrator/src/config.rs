//! Migrator configuration
//!
//! Loaded from environment variables with defaults, then validated before a
//! store connection is opened.

use once_cell::sync::Lazy;
use regex::Regex;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Default location of the application database
pub const DEFAULT_DATABASE_PATH: &str = "db/inquiry.db";

/// Default directory scanned for SQL migration files
pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";

/// Default ledger table name
pub const DEFAULT_MIGRATIONS_TABLE: &str = "migrations";

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier pattern"));

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: '{value}', expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Validation failed for {field}: {reason}")]
    ValidationFailed { field: String, reason: String },
}

/// Configuration for the migration engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigratorConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    /// Directory where migration files are stored
    pub migrations_dir: PathBuf,
    /// Table name for the migration ledger
    pub migrations_table: String,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            migrations_dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
            migrations_table: DEFAULT_MIGRATIONS_TABLE.to_string(),
        }
    }
}

impl MigratorConfig {
    /// Load configuration from `DATABASE_URL`, `MIGRATIONS_DIR` and `MIGRATIONS_TABLE`
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_path = env::var("DATABASE_URL")
            .map(|url| PathBuf::from(strip_sqlite_scheme(&url)))
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATABASE_PATH));
        let migrations_dir = env::var("MIGRATIONS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_MIGRATIONS_DIR));
        let migrations_table =
            env::var("MIGRATIONS_TABLE").unwrap_or_else(|_| DEFAULT_MIGRATIONS_TABLE.to_string());

        let config = Self {
            database_path,
            migrations_dir,
            migrations_table,
        };
        config.validate()?;
        Ok(config)
    }

    /// Override the database location
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = PathBuf::from(strip_sqlite_scheme(
            &path.into().to_string_lossy(),
        ));
        self
    }

    /// Override the migrations directory
    pub fn with_migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    /// Override the ledger table name
    pub fn with_migrations_table(mut self, table: impl Into<String>) -> Self {
        self.migrations_table = table.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed {
                field: "database_path".to_string(),
                reason: "Database path cannot be empty".to_string(),
            });
        }

        if self.migrations_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed {
                field: "migrations_dir".to_string(),
                reason: "Migrations directory cannot be empty".to_string(),
            });
        }

        // The table name is interpolated into ledger SQL
        if !IDENTIFIER.is_match(&self.migrations_table) {
            return Err(ConfigError::InvalidValue {
                field: "migrations_table".to_string(),
                value: self.migrations_table.clone(),
                expected: "a plain SQL identifier".to_string(),
            });
        }

        Ok(())
    }
}

fn strip_sqlite_scheme(url: &str) -> &str {
    url.strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in ["DATABASE_URL", "MIGRATIONS_DIR", "MIGRATIONS_TABLE"] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        assert_eq!(MigratorConfig::from_env().unwrap(), MigratorConfig::default());
    }

    #[test]
    #[serial]
    fn test_from_env_reads_overrides() {
        clear_env();
        env::set_var("DATABASE_URL", "sqlite://data/app.db");
        env::set_var("MIGRATIONS_DIR", "db/migrations");
        env::set_var("MIGRATIONS_TABLE", "schema_history");

        let config = MigratorConfig::from_env().unwrap();
        assert_eq!(config.database_path, PathBuf::from("data/app.db"));
        assert_eq!(config.migrations_dir, PathBuf::from("db/migrations"));
        assert_eq!(config.migrations_table, "schema_history");

        env::set_var("MIGRATIONS_TABLE", "bad-name");
        assert!(MigratorConfig::from_env().is_err());
        clear_env();
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = MigratorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.database_path, PathBuf::from("db/inquiry.db"));
        assert_eq!(config.migrations_table, "migrations");
    }

    #[test]
    fn test_sqlite_scheme_is_stripped() {
        assert_eq!(strip_sqlite_scheme("sqlite://db/test.db"), "db/test.db");
        assert_eq!(strip_sqlite_scheme("sqlite:db/test.db"), "db/test.db");
        assert_eq!(strip_sqlite_scheme("db/test.db"), "db/test.db");

        let config = MigratorConfig::default().with_database_path("sqlite://other.db");
        assert_eq!(config.database_path, PathBuf::from("other.db"));
    }

    #[test]
    fn test_rejects_unsafe_table_name() {
        let config = MigratorConfig::default().with_migrations_table("migrations; DROP TABLE users");
        match config.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, "migrations_table"),
            other => panic!("expected invalid table name, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_empty_paths() {
        let config = MigratorConfig::default().with_migrations_dir("");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed { .. })
        ));
    }
}
