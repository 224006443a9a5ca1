//! Migration Manager - File system operations for migrations
//!
//! Handles creating, loading, and parsing `.sql` migration files from the
//! migrations directory.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::repository::MigrationSource;
use super::unit::{Migration, SqlMigration};
use crate::error::{MigrationError, MigrationResult};

/// Names reserved for the engine itself; never treated as migration units
pub const RESERVED_NAMES: &[&str] = &["migrations", "migrator", "index"];

static MIGRATION_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)_([A-Za-z0-9_]+)\.sql$").expect("valid migration file pattern"));

static MIGRATION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:_[a-z0-9]+)*$").expect("valid migration name pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Up,
    Down,
}

/// Loads SQL migrations from a directory
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load all migration files, sorted by version
    pub fn load_migrations(&self) -> MigrationResult<Vec<SqlMigration>> {
        if !self.dir.exists() {
            tracing::warn!(dir = %self.dir.display(), "Migrations directory not found");
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir).map_err(|source| MigrationError::Discovery {
            path: self.dir.clone(),
            source,
        })?;

        let mut migrations = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| MigrationError::Discovery {
                path: self.dir.clone(),
                source,
            })?;

            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let Some(filename) = path.file_name().and_then(|f| f.to_str()) else {
                continue;
            };
            let Some((version, name)) = parse_migration_filename(filename)? else {
                continue;
            };

            if RESERVED_NAMES.contains(&name.as_str()) {
                tracing::debug!(file = %path.display(), "Skipping engine-internal file");
                continue;
            }

            let content = fs::read_to_string(&path).map_err(|source| MigrationError::Discovery {
                path: path.clone(),
                source,
            })?;
            let (up_sql, down_sql) = parse_migration_content(&content);

            migrations.push(SqlMigration {
                version,
                name,
                up_sql,
                down_sql,
                path,
            });
        }

        // Stable sort so ties keep directory order
        migrations.sort_by_key(|m| m.version);
        Ok(migrations)
    }

    /// Create a new migration file from the template, returning its path
    pub fn create_migration(&self, name: &str, version: i64) -> MigrationResult<PathBuf> {
        let name = normalize_migration_name(name)?;

        if let Some(existing) = self
            .load_migrations()?
            .into_iter()
            .find(|existing| existing.name == name)
        {
            return Err(MigrationError::DuplicateName {
                name,
                first: existing.version,
                second: version,
            });
        }

        fs::create_dir_all(&self.dir)?;

        let filename = format!("{:03}_{}.sql", version, name);
        let path = self.dir.join(&filename);
        fs::write(&path, migration_template(&name, version))?;

        tracing::info!(version, name = %name, file = %path.display(), "Created migration");
        Ok(path)
    }
}

impl MigrationSource for DirectorySource {
    fn load(&self) -> MigrationResult<Vec<Arc<dyn Migration>>> {
        Ok(self
            .load_migrations()?
            .into_iter()
            .map(|m| Arc::new(m) as Arc<dyn Migration>)
            .collect())
    }

    fn describe(&self) -> String {
        format!("directory {}", self.dir.display())
    }
}

/// Parse `<version>_<name>.sql` into its version and name.
///
/// Files that do not follow the pattern yield `None`. A file that does but
/// carries a version outside `1..=i64::MAX` is an error naming the file.
pub fn parse_migration_filename(filename: &str) -> MigrationResult<Option<(i64, String)>> {
    let Some(captures) = MIGRATION_FILE.captures(filename) else {
        return Ok(None);
    };

    let invalid = |reason: &str| MigrationError::InvalidVersion {
        migration: filename.to_string(),
        reason: reason.to_string(),
    };
    let version = captures[1]
        .parse::<i64>()
        .map_err(|_| invalid("version does not fit in a 64-bit integer"))?;
    if version < 1 {
        return Err(invalid("version must be a positive integer"));
    }

    Ok(Some((version, captures[2].to_string())))
}

/// Split file content into up and down SQL.
///
/// Without section markers the whole file is the up action. An up section
/// with no statements yields `None`; a down marker always yields `Some`, even
/// when empty, so that no-op rollbacks can be expressed.
pub fn parse_migration_content(content: &str) -> (Option<String>, Option<String>) {
    let mut preamble = Vec::new();
    let mut up_sql = Vec::new();
    let mut down_sql = Vec::new();
    let mut section = Section::Preamble;
    let mut saw_up = false;
    let mut saw_down = false;

    for line in content.lines() {
        let trimmed = line.trim();

        if let Some(comment) = trimmed.strip_prefix("--") {
            match comment.trim().to_lowercase().as_str() {
                "up" | "up migration" | "+up" => {
                    section = Section::Up;
                    saw_up = true;
                }
                "down" | "down migration" | "+down" => {
                    section = Section::Down;
                    saw_down = true;
                }
                _ => {}
            }
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }

        match section {
            Section::Preamble => preamble.push(line),
            Section::Up => up_sql.push(line),
            Section::Down => down_sql.push(line),
        }
    }

    // Statements before the first marker only count when there is no up marker
    if !saw_up {
        up_sql = preamble;
    }

    let up = up_sql.join("\n").trim().to_string();
    let up = if up.is_empty() { None } else { Some(up) };
    let down = saw_down.then(|| down_sql.join("\n").trim().to_string());

    (up, down)
}

/// Lowercase, replace spaces and hyphens, then validate as snake_case
pub fn normalize_migration_name(name: &str) -> MigrationResult<String> {
    let normalized = name.trim().to_lowercase().replace([' ', '-'], "_");

    if !MIGRATION_NAME.is_match(&normalized) || RESERVED_NAMES.contains(&normalized.as_str()) {
        return Err(MigrationError::InvalidName(name.to_string()));
    }

    Ok(normalized)
}

fn migration_template(name: &str, version: i64) -> String {
    format!(
        "-- Migration: {}\n\
         -- Version: {}\n\
         -- Created: {}\n\n\
         -- Up migration\n\
         -- Add your schema changes here\n\n\n\
         -- Down migration\n\
         -- Add rollback statements here\n\n",
        name,
        version,
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_migration_filename() {
        assert_eq!(
            parse_migration_filename("001_initial_users_table.sql").unwrap(),
            Some((1, "initial_users_table".to_string()))
        );
        assert_eq!(
            parse_migration_filename("7003_add_index.sql").unwrap(),
            Some((7003, "add_index".to_string()))
        );
        assert_eq!(parse_migration_filename("add_guidance_count.sql").unwrap(), None);
        assert_eq!(parse_migration_filename("002_add_guidance_count.js").unwrap(), None);
        assert_eq!(parse_migration_filename("002_.sql").unwrap(), None);
        assert_eq!(parse_migration_filename("notes.txt").unwrap(), None);
    }

    #[test]
    fn test_parse_migration_filename_rejects_out_of_range_versions() {
        match parse_migration_filename("000_foo.sql") {
            Err(MigrationError::InvalidVersion { migration, reason }) => {
                assert_eq!(migration, "000_foo.sql");
                assert!(reason.contains("positive"));
            }
            other => panic!("expected invalid version, got {:?}", other),
        }

        match parse_migration_filename("99999999999999999999_big.sql") {
            Err(MigrationError::InvalidVersion { migration, reason }) => {
                assert_eq!(migration, "99999999999999999999_big.sql");
                assert!(reason.contains("64-bit"));
            }
            other => panic!("expected invalid version, got {:?}", other),
        }

        assert_eq!(
            parse_migration_filename("9223372036854775807_max.sql").unwrap(),
            Some((i64::MAX, "max".to_string()))
        );
    }

    #[test]
    fn test_load_fails_on_out_of_range_version() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("001_first.sql"), "CREATE TABLE a (id INTEGER);").unwrap();
        fs::write(dir.path().join("000_foo.sql"), "CREATE TABLE b (id INTEGER);").unwrap();

        let error = DirectorySource::new(dir.path()).load_migrations().unwrap_err();
        assert!(matches!(error, MigrationError::InvalidVersion { .. }));
        assert!(error.to_string().contains("000_foo.sql"));
    }

    #[test]
    fn test_parse_content_with_sections() {
        let content = "-- Migration: test\n-- Up migration\nCREATE TABLE t (id INTEGER);\n\n-- Down migration\nDROP TABLE t;\n";
        let (up, down) = parse_migration_content(content);
        assert_eq!(up.as_deref(), Some("CREATE TABLE t (id INTEGER);"));
        assert_eq!(down.as_deref(), Some("DROP TABLE t;"));
    }

    #[test]
    fn test_parse_content_without_markers_is_up_only() {
        let (up, down) = parse_migration_content("CREATE TABLE t (id INTEGER);\n");
        assert_eq!(up.as_deref(), Some("CREATE TABLE t (id INTEGER);"));
        assert_eq!(down, None);
    }

    #[test]
    fn test_parse_content_empty_sections() {
        let (up, down) = parse_migration_content("-- up\n-- nothing yet\n-- down\n");
        assert_eq!(up, None);
        assert_eq!(down.as_deref(), Some(""));
    }

    #[test]
    fn test_normalize_migration_name() {
        assert_eq!(normalize_migration_name("Add User Roles").unwrap(), "add_user_roles");
        assert_eq!(normalize_migration_name("add-google-id").unwrap(), "add_google_id");
        assert!(normalize_migration_name("").is_err());
        assert!(normalize_migration_name("drop; table").is_err());
        assert!(normalize_migration_name("migrations").is_err());
    }

    #[test]
    fn test_load_skips_non_matching_and_reserved_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("002_second.sql"), "CREATE TABLE b (id INTEGER);").unwrap();
        fs::write(dir.path().join("001_first.sql"), "CREATE TABLE a (id INTEGER);").unwrap();
        fs::write(dir.path().join("004_migrations.sql"), "CREATE TABLE x (id INTEGER);").unwrap();
        fs::write(dir.path().join("README.md"), "docs").unwrap();
        fs::write(dir.path().join("add_guidance_count.sql"), "SELECT 1;").unwrap();
        fs::create_dir(dir.path().join("003_not_a_file.sql")).unwrap();

        let migrations = DirectorySource::new(dir.path()).load_migrations().unwrap();
        let names: Vec<_> = migrations.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(migrations[0].version, 1);
    }

    #[test]
    fn test_missing_directory_yields_no_migrations() {
        let dir = TempDir::new().unwrap();
        let source = DirectorySource::new(dir.path().join("absent"));
        assert!(source.load_migrations().unwrap().is_empty());
    }

    #[test]
    fn test_unreadable_directory_is_discovery_error() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("not_a_dir");
        fs::write(&file, "").unwrap();

        match DirectorySource::new(&file).load_migrations() {
            Err(MigrationError::Discovery { path, .. }) => assert_eq!(path, file),
            other => panic!("expected discovery error, got {:?}", other.map(|m| m.len())),
        }
    }

    #[test]
    fn test_create_migration_writes_template() {
        let dir = TempDir::new().unwrap();
        let source = DirectorySource::new(dir.path().join("migrations"));

        let path = source.create_migration("Add User Roles", 5).unwrap();
        assert_eq!(path.file_name().unwrap(), "005_add_user_roles.sql");

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("-- Migration: add_user_roles"));
        assert!(content.contains("-- Version: 5"));
        assert!(content.contains("-- Up migration"));
        assert!(content.contains("-- Down migration"));

        let loaded = source.load_migrations().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].version, 5);
        assert!(loaded[0].up_sql.is_none());

        assert!(matches!(
            source.create_migration("add_user_roles", 6),
            Err(MigrationError::DuplicateName { .. })
        ));
    }
}
