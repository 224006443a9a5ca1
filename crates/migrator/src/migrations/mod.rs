//! Migration System
//!
//! Discovery, bookkeeping, and execution of schema migrations.

pub mod definitions;
pub mod ledger;
pub mod manager;
pub mod registry;
pub mod repository;
pub mod rollback;
pub mod runner;
pub mod sql;
pub mod status;
pub mod unit;

pub use definitions::*;
pub use ledger::Ledger;
pub use manager::{normalize_migration_name, parse_migration_content, parse_migration_filename, DirectorySource};
pub use registry::MigrationRegistry;
pub use repository::{MigrationRepository, MigrationSource};
pub use runner::Migrator;
pub use status::{AppliedMigration, PendingMigration, StatusReport};
pub use unit::{Migration, Schema, SqlMigration};
