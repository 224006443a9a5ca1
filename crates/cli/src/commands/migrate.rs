//! Migration subcommands
//!
//! Each command prints its result to stdout and reports whether the run was
//! clean, so the caller can pick the exit status.

use anyhow::Context;
use inquiry_migrator::Migrator;

pub async fn status(migrator: &Migrator, json: bool) -> anyhow::Result<bool> {
    let report = migrator.status().await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize migration status")?
        );
    } else {
        println!();
        println!("{}", report);
    }

    Ok(true)
}

pub async fn up(migrator: &Migrator) -> anyhow::Result<bool> {
    println!("Applying pending migrations...");
    let summary = migrator.apply_pending().await?;

    if summary.is_noop() {
        println!("No migrations to apply");
    } else {
        println!("Applied: {}, Failed: {}", summary.applied, summary.failed);
    }
    if let Some(name) = &summary.failed_migration {
        eprintln!("Migration {} failed; see `status` for details", name);
    }

    Ok(summary.failed == 0)
}

pub async fn rollback(migrator: &Migrator, version: i64) -> anyhow::Result<bool> {
    println!("Rolling back migrations to version {}...", version);
    let summary = migrator.rollback_to_version(version).await?;

    if summary.is_noop() {
        println!("No migrations to roll back");
    } else {
        println!("Rolled back: {}, Failed: {}", summary.rolled_back, summary.failed);
    }
    for name in &summary.skipped_migrations {
        println!("  Skipped {} (migration source not found)", name);
    }
    if let Some(name) = &summary.failed_migration {
        eprintln!("Rollback of {} failed; see `status` for details", name);
    }

    Ok(summary.failed == 0)
}

pub async fn revert(migrator: &Migrator, name: &str) -> anyhow::Result<bool> {
    println!("Rolling back migration {}...", name);
    migrator.rollback_single(name).await?;
    println!("Rolled back: {}", name);
    Ok(true)
}

pub fn create(migrator: &Migrator, name: &str) -> anyhow::Result<bool> {
    let path = migrator.repository().create_migration(name)?;
    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    println!("Created new migration file: {}", filename);
    Ok(true)
}
