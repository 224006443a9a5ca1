//! Migration units and the schema handle they run against
//!
//! A unit is a versioned, named pair of forward/backward actions. Units come
//! from SQL files or are compiled in and registered at startup; both expose
//! the same [`Migration`] trait to the engine.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::path::PathBuf;

use super::sql::{is_transaction_control, split_sql_statements};
use crate::error::{MigrationError, MigrationResult};

/// A versioned, reversible schema change
///
/// Actions run inside a transaction owned by the migrator. Returning an error
/// rolls the transaction back and records the failure in the ledger.
///
/// Implement `down` to make a unit reversible. A unit that leaves the default
/// `down` in place is still offered for rollback; the default fails with
/// [`MigrationError::MissingDownAction`], which the engine records as a
/// missing down action. Override `has_down` to return `false` only to have
/// the engine refuse the rollback without attempting it.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Ordering key; migrations apply in ascending version order
    fn version(&self) -> i64;

    /// Unique name, the ledger's identity key
    fn name(&self) -> &str;

    /// Apply the change
    async fn up(&self, schema: &mut Schema<'_>) -> anyhow::Result<()>;

    /// Reverse the change
    async fn down(&self, schema: &mut Schema<'_>) -> anyhow::Result<()> {
        let _ = schema;
        Err(MigrationError::MissingDownAction(self.name().to_string()).into())
    }

    fn has_up(&self) -> bool {
        true
    }

    /// `false` when the unit is known to have no down action
    fn has_down(&self) -> bool {
        true
    }
}

/// Statement execution handle given to migration actions
///
/// Wraps the connection of the enclosing migration transaction. It cannot
/// commit or roll back: statements that manage transactions are refused.
pub struct Schema<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> Schema<'c> {
    pub(crate) fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Execute a single statement, returning the number of rows affected
    pub async fn execute(&mut self, sql: &str) -> MigrationResult<u64> {
        let statement = single_statement(sql)?;
        let result = sqlx::query(&statement).execute(&mut *self.conn).await?;
        Ok(result.rows_affected())
    }

    /// Execute every statement of a script in order.
    ///
    /// The whole script is checked before anything runs.
    pub async fn execute_batch(&mut self, sql: &str) -> MigrationResult<u64> {
        let statements = split_sql_statements(sql);
        if let Some(statement) = statements.iter().find(|s| is_transaction_control(s)) {
            return Err(MigrationError::TransactionControl(statement.clone()));
        }

        let mut affected = 0;
        for statement in &statements {
            let result = sqlx::query(statement).execute(&mut *self.conn).await?;
            affected += result.rows_affected();
        }
        Ok(affected)
    }

    /// Run a single query and return its rows
    pub async fn fetch_all(&mut self, sql: &str) -> MigrationResult<Vec<SqliteRow>> {
        let statement = single_statement(sql)?;
        Ok(sqlx::query(&statement).fetch_all(&mut *self.conn).await?)
    }

    pub async fn table_exists(&mut self, table: &str) -> MigrationResult<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?1")
            .bind(table)
            .fetch_one(&mut *self.conn)
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count > 0)
    }

    pub async fn column_exists(&mut self, table: &str, column: &str) -> MigrationResult<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM pragma_table_info(?1) WHERE name = ?2")
            .bind(table)
            .bind(column)
            .fetch_one(&mut *self.conn)
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count > 0)
    }
}

/// The one statement in `sql`, refusing transaction control.
///
/// The driver runs every statement of a multi-statement string, so more than
/// one statement is an error.
fn single_statement(sql: &str) -> MigrationResult<String> {
    let mut statements = split_sql_statements(sql);
    if let Some(statement) = statements.iter().find(|s| is_transaction_control(s)) {
        return Err(MigrationError::TransactionControl(statement.clone()));
    }

    match statements.len() {
        1 => Ok(statements.remove(0)),
        count => Err(MigrationError::MultipleStatements {
            count,
            sql: sql.trim().to_string(),
        }),
    }
}

/// A migration loaded from a `.sql` file
#[derive(Debug, Clone)]
pub struct SqlMigration {
    pub version: i64,
    pub name: String,
    /// Statements for the up action; `None` when the file has no up statements
    pub up_sql: Option<String>,
    /// Statements for the down action; `None` when the file has no down section
    pub down_sql: Option<String>,
    pub path: PathBuf,
}

#[async_trait]
impl Migration for SqlMigration {
    fn version(&self) -> i64 {
        self.version
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn up(&self, schema: &mut Schema<'_>) -> anyhow::Result<()> {
        let sql = self
            .up_sql
            .as_deref()
            .ok_or_else(|| MigrationError::MissingUpAction(self.name.clone()))?;
        schema.execute_batch(sql).await?;
        Ok(())
    }

    async fn down(&self, schema: &mut Schema<'_>) -> anyhow::Result<()> {
        let sql = self
            .down_sql
            .as_deref()
            .ok_or_else(|| MigrationError::MissingDownAction(self.name.clone()))?;
        schema.execute_batch(sql).await?;
        Ok(())
    }

    fn has_up(&self) -> bool {
        self.up_sql.is_some()
    }

    fn has_down(&self) -> bool {
        self.down_sql.is_some()
    }
}
