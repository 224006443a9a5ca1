use async_trait::async_trait;
use inquiry_migrator::{Migration, Schema};

/// Creates the `users` table
pub struct InitialUsersTable;

#[async_trait]
impl Migration for InitialUsersTable {
    fn version(&self) -> i64 {
        1
    }

    fn name(&self) -> &str {
        "initial_users_table"
    }

    async fn up(&self, schema: &mut Schema<'_>) -> anyhow::Result<()> {
        if schema.table_exists("users").await? {
            tracing::info!("users table already exists, skipping creation");
            return Ok(());
        }

        schema
            .execute(
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL UNIQUE,
                    email TEXT NOT NULL UNIQUE,
                    password_hash TEXT NOT NULL,
                    created_at INTEGER DEFAULT (CAST(strftime('%s', 'now') AS INTEGER))
                )",
            )
            .await?;
        tracing::info!("users table created");
        Ok(())
    }

    async fn down(&self, schema: &mut Schema<'_>) -> anyhow::Result<()> {
        if schema.table_exists("users").await? {
            schema.execute("DROP TABLE users").await?;
        }
        Ok(())
    }
}
