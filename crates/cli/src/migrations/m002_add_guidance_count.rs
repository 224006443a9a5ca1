use async_trait::async_trait;
use inquiry_migrator::{Migration, Schema};

/// Adds `guidance_count` to `ai_responses`, creating the table when it does not exist yet
pub struct AddGuidanceCount;

#[async_trait]
impl Migration for AddGuidanceCount {
    fn version(&self) -> i64 {
        2
    }

    fn name(&self) -> &str {
        "add_guidance_count"
    }

    async fn up(&self, schema: &mut Schema<'_>) -> anyhow::Result<()> {
        if !schema.table_exists("ai_responses").await? {
            schema
                .execute(
                    "CREATE TABLE ai_responses (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        inquiry_id INTEGER NOT NULL,
                        content TEXT NOT NULL,
                        guidance_count INTEGER DEFAULT 1 NOT NULL,
                        created_at INTEGER DEFAULT (CAST(strftime('%s', 'now') AS INTEGER))
                    )",
                )
                .await?;
            tracing::info!("ai_responses table created with guidance_count column");
            return Ok(());
        }

        if schema.column_exists("ai_responses", "guidance_count").await? {
            tracing::info!("guidance_count column already exists, skipping");
            return Ok(());
        }

        schema
            .execute("ALTER TABLE ai_responses ADD COLUMN guidance_count INTEGER DEFAULT 1 NOT NULL")
            .await?;
        Ok(())
    }

    async fn down(&self, schema: &mut Schema<'_>) -> anyhow::Result<()> {
        if schema.column_exists("ai_responses", "guidance_count").await? {
            schema
                .execute("ALTER TABLE ai_responses DROP COLUMN guidance_count")
                .await?;
        }
        Ok(())
    }
}
