//! Migration Runner - Executes migrations against the database
//!
//! Owns the store connection and every transaction boundary. Each migration
//! runs in its own transaction; the ledger update for a successful step is
//! written inside that same transaction.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashSet;
use std::sync::Arc;

use super::definitions::{ApplySummary, LedgerEntry, MigrationDirection, RollbackStatus};
use super::ledger::Ledger;
use super::repository::MigrationRepository;
use super::unit::{Migration, Schema};
use crate::config::MigratorConfig;
use crate::error::{MigrationError, MigrationResult};

/// Result of running one migration step
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    Completed,
    Failed(String),
    /// The unit has no action for the requested direction
    Missing(String),
}

/// Migration engine driving a single SQLite store
pub struct Migrator {
    pool: SqlitePool,
    repository: MigrationRepository,
    ledger: Ledger,
}

impl Migrator {
    /// Create a migrator over an existing pool.
    ///
    /// The engine assumes it is the only writer; a pool with more than one
    /// connection is not serialised.
    pub fn new(pool: SqlitePool, repository: MigrationRepository, ledger: Ledger) -> Self {
        Self {
            pool,
            repository,
            ledger,
        }
    }

    /// Open (creating if needed) the configured database
    pub async fn connect(config: &MigratorConfig, repository: MigrationRepository) -> MigrationResult<Self> {
        config.validate()?;

        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.database_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        tracing::debug!(database = %config.database_path.display(), "Connected to database");
        Ok(Self::new(pool, repository, Ledger::new(&config.migrations_table)))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn repository(&self) -> &MigrationRepository {
        &self.repository
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Close the store connection
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Ensure the ledger table exists and log the discovered migrations.
    ///
    /// Idempotent; every other operation calls it first.
    pub async fn initialize(&self) -> MigrationResult<()> {
        self.prepare().await.map(|_| ())
    }

    pub(crate) async fn prepare(&self) -> MigrationResult<Vec<Arc<dyn Migration>>> {
        {
            let mut conn = self.pool.acquire().await?;
            self.ledger.ensure_table_exists(&mut *conn).await?;
        }

        let units = self.repository.list_all()?;
        let listing = units
            .iter()
            .map(|unit| format!("{}:{}", unit.version(), unit.name()))
            .collect::<Vec<_>>()
            .join(", ");
        tracing::info!(count = units.len(), migrations = %listing, "Found migrations");

        Ok(units)
    }

    /// All ledger entries, ordered by version
    pub async fn ledger_entries(&self) -> MigrationResult<Vec<LedgerEntry>> {
        let mut conn = self.pool.acquire().await?;
        self.ledger.list_applied(&mut *conn).await
    }

    /// Apply never-recorded migrations, then reapply rolled-back ones.
    ///
    /// Both groups run in ascending version order. The run stops at the first
    /// failure, which is recorded in the ledger rather than returned as an error.
    pub async fn apply_pending(&self) -> MigrationResult<ApplySummary> {
        let units = self.prepare().await?;
        let entries = self.ledger_entries().await?;

        let recorded: HashSet<&str> = entries.iter().map(|entry| entry.name.as_str()).collect();
        let pending: Vec<&Arc<dyn Migration>> = units
            .iter()
            .filter(|unit| !recorded.contains(unit.name()))
            .collect();

        let mut reapplicable: Vec<&Arc<dyn Migration>> = entries
            .iter()
            .filter(|entry| entry.is_reapplicable())
            .filter_map(|entry| units.iter().find(|unit| unit.name() == entry.name))
            .collect();
        reapplicable.sort_by_key(|unit| unit.version());

        let mut summary = ApplySummary::default();
        if pending.is_empty() && reapplicable.is_empty() {
            tracing::info!("No pending migrations to apply");
            return Ok(summary);
        }

        tracing::info!(
            pending = pending.len(),
            reapplicable = reapplicable.len(),
            "Applying migrations"
        );

        for unit in pending.into_iter().chain(reapplicable) {
            match self.execute_step(unit.as_ref(), MigrationDirection::Up, None).await? {
                StepOutcome::Completed => {
                    summary.applied += 1;
                    summary.applied_migrations.push(unit.name().to_string());
                }
                StepOutcome::Failed(_) | StepOutcome::Missing(_) => {
                    summary.failed = 1;
                    summary.failed_migration = Some(unit.name().to_string());
                    break;
                }
            }
        }

        Ok(summary)
    }

    /// Run one migration action in its own transaction and record the outcome.
    ///
    /// `entry_id` identifies the ledger row for `Down` steps. Failures of the
    /// action itself become [`StepOutcome::Failed`], or [`StepOutcome::Missing`]
    /// when the unit has no action for the direction. Only store errors while
    /// opening the transaction or recording a failure propagate.
    pub(crate) async fn execute_step(
        &self,
        unit: &dyn Migration,
        direction: MigrationDirection,
        entry_id: Option<i64>,
    ) -> MigrationResult<StepOutcome> {
        let name = unit.name();
        let version = unit.version();

        let has_action = match direction {
            MigrationDirection::Up => unit.has_up(),
            MigrationDirection::Down => unit.has_down(),
        };
        if !has_action {
            let error = match direction {
                MigrationDirection::Up => MigrationError::MissingUpAction(name.to_string()),
                MigrationDirection::Down => MigrationError::MissingDownAction(name.to_string()),
            };
            let message = error.to_string();
            tracing::error!(version, name = %name, %direction, "{}", message);
            self.record_failure(unit, direction, entry_id, &message).await?;
            return Ok(StepOutcome::Missing(message));
        }

        match direction {
            MigrationDirection::Up => tracing::info!(version, name = %name, "Applying migration"),
            MigrationDirection::Down => tracing::info!(version, name = %name, "Rolling back migration"),
        }

        let mut tx = self.pool.begin().await?;

        let action_result = {
            let mut schema = Schema::new(&mut *tx);
            match direction {
                MigrationDirection::Up => unit.up(&mut schema).await,
                MigrationDirection::Down => unit.down(&mut schema).await,
            }
        };

        let result = match action_result {
            Ok(()) => match (direction, entry_id) {
                (MigrationDirection::Up, _) => self
                    .ledger
                    .record_applied(&mut *tx, name, version)
                    .await
                    .map_err(anyhow::Error::from),
                (MigrationDirection::Down, Some(id)) => self
                    .ledger
                    .record_rolled_back(&mut *tx, id, RollbackStatus::Success, None)
                    .await
                    .map_err(anyhow::Error::from),
                (MigrationDirection::Down, None) => Err(anyhow::anyhow!(
                    "no ledger entry to record rollback of {}",
                    name
                )),
            },
            Err(e) => Err(e),
        };

        let (failure, missing) = match result {
            Ok(()) => match tx.commit().await {
                Ok(()) => {
                    match direction {
                        MigrationDirection::Up => {
                            tracing::info!(version, name = %name, "Successfully applied migration")
                        }
                        MigrationDirection::Down => {
                            tracing::info!(version, name = %name, "Successfully rolled back migration")
                        }
                    }
                    return Ok(StepOutcome::Completed);
                }
                Err(e) => (e.to_string(), false),
            },
            Err(e) => {
                // The failure is recorded even when the rollback itself fails
                if let Err(rollback_error) = tx.rollback().await {
                    tracing::warn!(
                        version,
                        name = %name,
                        error = %rollback_error,
                        "Failed to roll back migration transaction"
                    );
                }
                (format!("{:#}", e), is_missing_action(&e))
            }
        };

        tracing::error!(version, name = %name, %direction, error = %failure, "Migration step failed");
        self.record_failure(unit, direction, entry_id, &failure).await?;
        if missing {
            Ok(StepOutcome::Missing(failure))
        } else {
            Ok(StepOutcome::Failed(failure))
        }
    }

    async fn record_failure(
        &self,
        unit: &dyn Migration,
        direction: MigrationDirection,
        entry_id: Option<i64>,
        message: &str,
    ) -> MigrationResult<()> {
        let mut conn = self.pool.acquire().await?;
        match (direction, entry_id) {
            (MigrationDirection::Up, _) => {
                self.ledger
                    .record_failed(&mut *conn, unit.name(), unit.version(), message)
                    .await
            }
            (MigrationDirection::Down, Some(id)) => {
                self.ledger
                    .record_rolled_back(&mut *conn, id, RollbackStatus::Failed, Some(message))
                    .await
            }
            (MigrationDirection::Down, None) => Ok(()),
        }
    }
}

/// Whether a unit reported that it has no action for the direction it was asked to run
fn is_missing_action(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<MigrationError>(),
        Some(MigrationError::MissingUpAction(_) | MigrationError::MissingDownAction(_))
    )
}
