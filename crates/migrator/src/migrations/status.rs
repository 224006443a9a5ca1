//! Status reporting
//!
//! A read-only projection of the ledger and the known units.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::definitions::{LedgerEntry, MigrationState, MigrationStatus, RollbackStatus};
use super::runner::Migrator;
use super::unit::Migration;
use crate::error::MigrationResult;

/// Applied and pending migrations at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub applied: Vec<AppliedMigration>,
    pub pending: Vec<PendingMigration>,
}

/// A migration with a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    pub name: String,
    pub version: i64,
    pub status: MigrationStatus,
    pub applied_at: DateTime<Utc>,
    pub is_active: bool,
    pub rollback_status: Option<RollbackStatus>,
    pub state: MigrationState,
}

/// A known migration that has never run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingMigration {
    pub name: String,
    pub version: i64,
}

impl From<&LedgerEntry> for AppliedMigration {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            name: entry.name.clone(),
            version: entry.version,
            status: entry.status,
            applied_at: entry.applied_at,
            is_active: entry.is_active,
            rollback_status: entry.rollback_status,
            state: entry.state(),
        }
    }
}

impl StatusReport {
    /// Project ledger entries and discovered units into a report.
    ///
    /// Applied keeps ledger order; pending lists units without a ledger row,
    /// in unit order.
    pub fn build(entries: &[LedgerEntry], units: &[Arc<dyn Migration>]) -> Self {
        let recorded: HashSet<&str> = entries.iter().map(|entry| entry.name.as_str()).collect();

        Self {
            applied: entries.iter().map(AppliedMigration::from).collect(),
            pending: units
                .iter()
                .filter(|unit| !recorded.contains(unit.name()))
                .map(|unit| PendingMigration {
                    name: unit.name().to_string(),
                    version: unit.version(),
                })
                .collect(),
        }
    }

    /// Entries whose last rollback failed while still marked active
    pub fn divergent(&self) -> impl Iterator<Item = &AppliedMigration> {
        self.applied
            .iter()
            .filter(|migration| migration.state == MigrationState::Divergent)
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Migration Status:")?;
        writeln!(f, "=================")?;
        writeln!(f)?;

        writeln!(f, "Applied migrations ({}):", self.applied.len())?;
        if self.applied.is_empty() {
            writeln!(f, "  No migrations applied yet")?;
        }
        for migration in &self.applied {
            write!(
                f,
                "  - V{}: {} ({}) [{}]",
                migration.version,
                migration.name,
                migration.status,
                if migration.is_active { "ACTIVE" } else { "INACTIVE" }
            )?;
            if migration.state == MigrationState::Divergent {
                write!(f, " ROLLBACK FAILED")?;
            }
            writeln!(f)?;
        }

        writeln!(f)?;
        writeln!(f, "Pending migrations ({}):", self.pending.len())?;
        if self.pending.is_empty() {
            writeln!(f, "  No pending migrations")?;
        }
        for migration in &self.pending {
            writeln!(f, "  - V{}: {}", migration.version, migration.name)?;
        }

        Ok(())
    }
}

impl Migrator {
    /// Report applied and pending migrations. Only mutation is ledger table creation.
    pub async fn status(&self) -> MigrationResult<StatusReport> {
        let units = self.prepare().await?;
        let entries = self.ledger_entries().await?;
        Ok(StatusReport::build(&entries, &units))
    }
}
