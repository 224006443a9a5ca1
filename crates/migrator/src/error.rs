//! Error types for the migration system
//!
//! Discovery, ledger, and engine failures share one error type. Failures raised
//! by a migration's own `up`/`down` action are not errors at this level: the
//! engine records them in the ledger and reports them in the run summary.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for migration operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Error types for migration operations
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to read migrations from {path}: {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Duplicate migration name '{name}' (versions {first} and {second})")]
    DuplicateName { name: String, first: i64, second: i64 },

    #[error("Duplicate migration version {version} ('{first}' and '{second}')")]
    DuplicateVersion {
        version: i64,
        first: String,
        second: String,
    },

    #[error("Invalid migration name '{0}': expected snake_case letters, digits and underscores")]
    InvalidName(String),

    #[error("Invalid version for migration {migration}: {reason}")]
    InvalidVersion { migration: String, reason: String },

    #[error("Migration {0} does not have an 'up' action")]
    MissingUpAction(String),

    #[error("Migration {0} does not have a 'down' action for rollback")]
    MissingDownAction(String),

    #[error("Migration {0} not found in the ledger")]
    NotFound(String),

    #[error("Migration source for {0} not found")]
    MissingUnit(String),

    #[error("Migration {0} is not active")]
    NotActive(String),

    #[error("Rollback of migration {name} failed: {message}")]
    RollbackFailed { name: String, message: String },

    #[error("Transaction control is owned by the migrator, refusing to run: {0}")]
    TransactionControl(String),

    #[error("Expected a single statement, got {count}: {sql}")]
    MultipleStatements { count: usize, sql: String },

    #[error("Corrupt ledger value: {0}")]
    Ledger(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrationError {
    /// Whether the error originates from the store rather than from migration definitions
    pub fn is_store_error(&self) -> bool {
        matches!(self, MigrationError::Database(_))
    }
}
