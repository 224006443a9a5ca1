//! Application migrations compiled into the binary
//!
//! SQL migrations in the migrations directory share the version space with
//! these, so their versions must not collide.

mod m001_initial_users_table;
mod m002_add_guidance_count;
mod m004_add_google_id;

use inquiry_migrator::MigrationRegistry;

pub use m001_initial_users_table::InitialUsersTable;
pub use m002_add_guidance_count::AddGuidanceCount;
pub use m004_add_google_id::AddGoogleId;

/// Every built-in migration
pub fn registry() -> MigrationRegistry {
    MigrationRegistry::new()
        .with(InitialUsersTable)
        .with(AddGuidanceCount)
        .with(AddGoogleId)
}

#[cfg(test)]
mod tests {
    use super::*;
    use inquiry_migrator::{Migration, MigrationRepository, Migrator, MigratorConfig};
    use tempfile::TempDir;

    async fn column_names(migrator: &Migrator, table: &str) -> Vec<String> {
        sqlx::query_scalar("SELECT name FROM pragma_table_info(?1)")
            .bind(table)
            .fetch_all(migrator.pool())
            .await
            .unwrap()
    }

    async fn connect(dir: &TempDir) -> Migrator {
        let config = MigratorConfig::default()
            .with_database_path(dir.path().join("inquiry.db"))
            .with_migrations_dir(dir.path().join("migrations"));
        Migrator::connect(&config, MigrationRepository::new().with_registry(registry()))
            .await
            .unwrap()
    }

    #[test]
    fn test_registry_holds_all_builtins() {
        let versions: Vec<i64> = MigrationRepository::new()
            .with_registry(registry())
            .list_all()
            .unwrap()
            .iter()
            .map(|unit| unit.version())
            .collect();
        assert_eq!(versions, vec![1, 2, 4]);
    }

    #[tokio::test]
    async fn test_builtin_migrations_apply_and_roll_back() {
        let dir = TempDir::new().unwrap();
        let migrator = connect(&dir).await;

        let summary = migrator.apply_pending().await.unwrap();
        assert_eq!(
            summary.applied_migrations,
            vec!["initial_users_table", "add_guidance_count", "add_google_id"]
        );
        assert!(column_names(&migrator, "users").await.contains(&"google_id".to_string()));
        assert!(column_names(&migrator, "ai_responses")
            .await
            .contains(&"guidance_count".to_string()));

        let summary = migrator.rollback_to_version(1).await.unwrap();
        assert_eq!(summary.rolled_back_migrations, vec!["add_google_id", "add_guidance_count"]);
        assert_eq!(summary.failed, 0);
        assert!(!column_names(&migrator, "users").await.contains(&"google_id".to_string()));

        let summary = migrator.rollback_to_version(0).await.unwrap();
        assert_eq!(summary.rolled_back, 1);
        assert!(column_names(&migrator, "users").await.is_empty());

        migrator.close().await;
    }

    #[tokio::test]
    async fn test_builtin_migrations_tolerate_existing_schema() {
        let dir = TempDir::new().unwrap();
        let migrator = connect(&dir).await;

        sqlx::query(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, username TEXT, email TEXT, password_hash TEXT, google_id TEXT)",
        )
        .execute(migrator.pool())
        .await
        .unwrap();
        sqlx::query("CREATE TABLE ai_responses (id INTEGER PRIMARY KEY, inquiry_id INTEGER, content TEXT)")
            .execute(migrator.pool())
            .await
            .unwrap();

        let summary = migrator.apply_pending().await.unwrap();
        assert_eq!(summary.applied, 3);
        assert_eq!(summary.failed, 0);
        assert!(column_names(&migrator, "ai_responses")
            .await
            .contains(&"guidance_count".to_string()));

        migrator.close().await;
    }
}
