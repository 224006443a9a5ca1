use async_trait::async_trait;
use inquiry_migrator::{Migration, Schema};

/// Adds `google_id` to `users` for OAuth sign-in
pub struct AddGoogleId;

#[async_trait]
impl Migration for AddGoogleId {
    fn version(&self) -> i64 {
        4
    }

    fn name(&self) -> &str {
        "add_google_id"
    }

    async fn up(&self, schema: &mut Schema<'_>) -> anyhow::Result<()> {
        if schema.column_exists("users", "google_id").await? {
            tracing::info!("google_id column already exists, skipping");
            return Ok(());
        }

        schema.execute("ALTER TABLE users ADD COLUMN google_id TEXT").await?;
        Ok(())
    }

    async fn down(&self, schema: &mut Schema<'_>) -> anyhow::Result<()> {
        if schema.column_exists("users", "google_id").await? {
            schema.execute("ALTER TABLE users DROP COLUMN google_id").await?;
        }
        Ok(())
    }
}
