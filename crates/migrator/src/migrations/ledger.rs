//! Migration Ledger - the persisted record of every migration run
//!
//! One row per migration name. Writes take a connection so they can join
//! the transaction of the migration they describe.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::definitions::{LedgerEntry, MigrationStatus, RollbackStatus};
use crate::config::DEFAULT_MIGRATIONS_TABLE;
use crate::error::{MigrationError, MigrationResult};

const LEDGER_COLUMNS: &str =
    "id, name, version, applied_at, status, error_message, rollback_status, is_active";

/// Reads and writes the migration ledger table
#[derive(Debug, Clone)]
pub struct Ledger {
    table: String,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(DEFAULT_MIGRATIONS_TABLE)
    }
}

impl Ledger {
    /// `table` must be a plain identifier; see [`crate::MigratorConfig::validate`]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the ledger table if absent. Returns whether it was created.
    pub async fn ensure_table_exists(&self, conn: &mut SqliteConnection) -> MigrationResult<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?1",
        )
        .bind(self.table.as_str())
        .fetch_one(&mut *conn)
        .await?;
        let count: i64 = row.try_get("count")?;
        if count > 0 {
            return Ok(false);
        }

        tracing::info!(table = %self.table, "Creating migrations table");
        sqlx::query(&self.create_table_sql())
            .execute(&mut *conn)
            .await?;
        tracing::info!(table = %self.table, "Migrations table created");
        Ok(true)
    }

    /// Insert or update the row for `name` as a successful, active apply
    pub async fn record_applied(
        &self,
        conn: &mut SqliteConnection,
        name: &str,
        version: i64,
    ) -> MigrationResult<()> {
        let sql = format!(
            "INSERT INTO {table} (name, version, applied_at, status, error_message, rollback_status, is_active) \
             VALUES (?1, ?2, ?3, ?4, NULL, NULL, 1) \
             ON CONFLICT(name) DO UPDATE SET \
                version = excluded.version, \
                applied_at = excluded.applied_at, \
                status = excluded.status, \
                error_message = NULL, \
                rollback_status = NULL, \
                is_active = 1",
            table = self.table
        );

        sqlx::query(&sql)
            .bind(name)
            .bind(version)
            .bind(Utc::now().timestamp())
            .bind(MigrationStatus::Success.as_str())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Insert or update the row for `name` as a failed, inactive apply.
    ///
    /// `applied_at` keeps the time of the last successful apply on existing rows.
    pub async fn record_failed(
        &self,
        conn: &mut SqliteConnection,
        name: &str,
        version: i64,
        error_message: &str,
    ) -> MigrationResult<()> {
        let sql = format!(
            "INSERT INTO {table} (name, version, applied_at, status, error_message, rollback_status, is_active) \
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, 0) \
             ON CONFLICT(name) DO UPDATE SET \
                version = excluded.version, \
                status = excluded.status, \
                error_message = excluded.error_message, \
                is_active = 0",
            table = self.table
        );

        sqlx::query(&sql)
            .bind(name)
            .bind(version)
            .bind(Utc::now().timestamp())
            .bind(MigrationStatus::Failed.as_str())
            .bind(error_message)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Record a rollback attempt.
    ///
    /// Success and skip deactivate the entry. A failed rollback only records
    /// the failure: the entry stays active because the schema may still hold
    /// the migration's effects.
    pub async fn record_rolled_back(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
        rollback_status: RollbackStatus,
        error_message: Option<&str>,
    ) -> MigrationResult<()> {
        match rollback_status {
            RollbackStatus::Success | RollbackStatus::Skipped => {
                let sql = format!(
                    "UPDATE {} SET status = ?1, rollback_status = ?2, is_active = 0 WHERE id = ?3",
                    self.table
                );
                sqlx::query(&sql)
                    .bind(MigrationStatus::RolledBack.as_str())
                    .bind(rollback_status.as_str())
                    .bind(id)
                    .execute(&mut *conn)
                    .await?;
            }
            RollbackStatus::Failed => {
                let sql = format!(
                    "UPDATE {} SET rollback_status = ?1, error_message = ?2 WHERE id = ?3",
                    self.table
                );
                sqlx::query(&sql)
                    .bind(rollback_status.as_str())
                    .bind(error_message.map(|message| format!("Rollback failed: {}", message)))
                    .bind(id)
                    .execute(&mut *conn)
                    .await?;
            }
        }
        Ok(())
    }

    /// Every ledger entry, ordered by version ascending
    pub async fn list_applied(&self, conn: &mut SqliteConnection) -> MigrationResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY version ASC, id ASC",
            LEDGER_COLUMNS, self.table
        );
        let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
        rows.iter().map(entry_from_row).collect()
    }

    /// Active entries above `version`, newest first (rollback order)
    pub async fn list_active_above_version(
        &self,
        conn: &mut SqliteConnection,
        version: i64,
    ) -> MigrationResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE is_active = 1 AND version > ?1 ORDER BY version DESC, id DESC",
            LEDGER_COLUMNS, self.table
        );
        let rows = sqlx::query(&sql).bind(version).fetch_all(&mut *conn).await?;
        rows.iter().map(entry_from_row).collect()
    }

    pub async fn find_by_name(
        &self,
        conn: &mut SqliteConnection,
        name: &str,
    ) -> MigrationResult<Option<LedgerEntry>> {
        let sql = format!("SELECT {} FROM {} WHERE name = ?1", LEDGER_COLUMNS, self.table);
        let row = sqlx::query(&sql).bind(name).fetch_optional(&mut *conn).await?;
        row.as_ref().map(entry_from_row).transpose()
    }

    fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                id INTEGER PRIMARY KEY AUTOINCREMENT,\n    \
                name TEXT NOT NULL UNIQUE,\n    \
                version INTEGER NOT NULL,\n    \
                applied_at INTEGER NOT NULL DEFAULT (CAST(strftime('%s', 'now') AS INTEGER)),\n    \
                status TEXT NOT NULL,\n    \
                error_message TEXT,\n    \
                rollback_status TEXT,\n    \
                is_active INTEGER NOT NULL DEFAULT 1\n\
            )",
            self.table
        )
    }
}

fn entry_from_row(row: &SqliteRow) -> MigrationResult<LedgerEntry> {
    let status: String = row.try_get("status")?;
    let rollback_status: Option<String> = row.try_get("rollback_status")?;
    let applied_at: i64 = row.try_get("applied_at")?;
    let is_active: i64 = row.try_get("is_active")?;

    Ok(LedgerEntry {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        version: row.try_get("version")?,
        applied_at: timestamp_to_datetime(applied_at)?,
        status: status.parse::<MigrationStatus>()?,
        error_message: row.try_get("error_message")?,
        rollback_status: rollback_status
            .as_deref()
            .map(str::parse::<RollbackStatus>)
            .transpose()?,
        is_active: is_active != 0,
    })
}

fn timestamp_to_datetime(seconds: i64) -> MigrationResult<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| MigrationError::Ledger(format!("invalid applied_at timestamp {}", seconds)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_table_sql_uses_configured_table() {
        let sql = Ledger::new("schema_history").create_table_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS schema_history"));
        assert!(sql.contains("name TEXT NOT NULL UNIQUE"));
        assert!(sql.contains("is_active INTEGER NOT NULL DEFAULT 1"));
    }

    #[test]
    fn test_timestamp_conversion() {
        let at = timestamp_to_datetime(1_700_000_000).unwrap();
        assert_eq!(at.timestamp(), 1_700_000_000);
    }
}
