//! Rollback operations
//!
//! Active migrations are undone newest first. A ledger entry whose unit has
//! disappeared is marked rolled back without running anything, so it cannot
//! block older entries.

use std::sync::Arc;

use super::definitions::{LedgerEntry, MigrationDirection, RollbackStatus, RollbackSummary};
use super::runner::{Migrator, StepOutcome};
use super::unit::Migration;
use crate::error::{MigrationError, MigrationResult};

impl Migrator {
    /// Roll back every active migration with a version above `target_version`.
    ///
    /// Stops at the first failed `down`; the failure is recorded in the
    /// ledger and reported in the summary.
    pub async fn rollback_to_version(&self, target_version: i64) -> MigrationResult<RollbackSummary> {
        let units = self.prepare().await?;

        let entries = {
            let mut conn = self.pool().acquire().await?;
            self.ledger()
                .list_active_above_version(&mut *conn, target_version)
                .await?
        };

        let mut summary = RollbackSummary::default();
        if entries.is_empty() {
            tracing::info!(target_version, "No migrations to roll back");
            return Ok(summary);
        }

        tracing::info!(count = entries.len(), target_version, "Rolling back migrations");

        for entry in &entries {
            let Some(unit) = find_unit(&units, &entry.name) else {
                self.skip_missing(entry).await?;
                summary.rolled_back += 1;
                summary.rolled_back_migrations.push(entry.name.clone());
                summary.skipped_migrations.push(entry.name.clone());
                continue;
            };

            match self
                .execute_step(unit.as_ref(), MigrationDirection::Down, Some(entry.id))
                .await?
            {
                StepOutcome::Completed => {
                    summary.rolled_back += 1;
                    summary.rolled_back_migrations.push(entry.name.clone());
                }
                StepOutcome::Failed(_) | StepOutcome::Missing(_) => {
                    summary.failed = 1;
                    summary.failed_migration = Some(entry.name.clone());
                    break;
                }
            }
        }

        Ok(summary)
    }

    /// Roll back one migration by name, regardless of version order
    pub async fn rollback_single(&self, name: &str) -> MigrationResult<()> {
        let units = self.prepare().await?;

        let entry = {
            let mut conn = self.pool().acquire().await?;
            self.ledger().find_by_name(&mut *conn, name).await?
        };
        let entry = entry.ok_or_else(|| MigrationError::NotFound(name.to_string()))?;

        if !entry.is_active {
            return Err(MigrationError::NotActive(name.to_string()));
        }

        let unit = find_unit(&units, name).ok_or_else(|| MigrationError::MissingUnit(name.to_string()))?;
        if !unit.has_down() {
            return Err(MigrationError::MissingDownAction(name.to_string()));
        }

        match self
            .execute_step(unit.as_ref(), MigrationDirection::Down, Some(entry.id))
            .await?
        {
            StepOutcome::Completed => Ok(()),
            StepOutcome::Missing(_) => Err(MigrationError::MissingDownAction(name.to_string())),
            StepOutcome::Failed(message) => Err(MigrationError::RollbackFailed {
                name: name.to_string(),
                message,
            }),
        }
    }

    async fn skip_missing(&self, entry: &LedgerEntry) -> MigrationResult<()> {
        tracing::warn!(
            version = entry.version,
            name = %entry.name,
            "Migration source not found, marking as rolled back without running down"
        );

        let mut conn = self.pool().acquire().await?;
        self.ledger()
            .record_rolled_back(&mut *conn, entry.id, RollbackStatus::Skipped, None)
            .await
    }
}

fn find_unit<'a>(units: &'a [Arc<dyn Migration>], name: &str) -> Option<&'a Arc<dyn Migration>> {
    units.iter().find(|unit| unit.name() == name)
}
