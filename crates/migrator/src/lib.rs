//! # inquiry-migrator: versioned schema migrations for SQLite
//!
//! Discovers migration units from `.sql` files and compiled-in registries,
//! applies and rolls them back one transaction per unit, and keeps a ledger
//! table describing what has run.
//!
//! ```no_run
//! use inquiry_migrator::{MigrationRepository, Migrator, MigratorConfig};
//!
//! # async fn run() -> inquiry_migrator::MigrationResult<()> {
//! let config = MigratorConfig::from_env()?;
//! let repository = MigrationRepository::from_dir(&config.migrations_dir);
//! let migrator = Migrator::connect(&config, repository).await?;
//!
//! let summary = migrator.apply_pending().await?;
//! println!("Applied: {}, Failed: {}", summary.applied, summary.failed);
//!
//! migrator.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod migrations;

pub use config::*;
pub use error::*;
pub use migrations::*;
