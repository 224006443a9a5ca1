//! Migration Repository - discovery of migration units
//!
//! Merges every configured source into one version-ordered list and rejects
//! ambiguous definitions before the engine acts on them.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::manager::DirectorySource;
use super::registry::MigrationRegistry;
use super::unit::Migration;
use crate::config::ConfigError;
use crate::error::{MigrationError, MigrationResult};

/// Somewhere migration units can be discovered from
pub trait MigrationSource: Send + Sync {
    /// Load every unit this source provides
    fn load(&self) -> MigrationResult<Vec<Arc<dyn Migration>>>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// All known migration units, across sources
#[derive(Default)]
pub struct MigrationRepository {
    sources: Vec<Box<dyn MigrationSource>>,
    directory: Option<DirectorySource>,
}

impl MigrationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository reading `.sql` files from a directory
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new().with_directory(dir)
    }

    /// Add a directory of `.sql` files; it also becomes the target of [`Self::create_migration`]
    pub fn with_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        let source = DirectorySource::new(dir);
        self.directory = Some(source.clone());
        self.sources.push(Box::new(source));
        self
    }

    /// Add compiled-in migrations
    pub fn with_registry(mut self, registry: MigrationRegistry) -> Self {
        self.sources.push(Box::new(registry));
        self
    }

    pub fn with_source(mut self, source: impl MigrationSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn directory(&self) -> Option<&DirectorySource> {
        self.directory.as_ref()
    }

    /// Every unit from every source, sorted ascending by version.
    ///
    /// Fails when two units share a name or a version.
    pub fn list_all(&self) -> MigrationResult<Vec<Arc<dyn Migration>>> {
        let mut units = Vec::new();
        for source in &self.sources {
            let loaded = source.load()?;
            tracing::debug!(source = %source.describe(), count = loaded.len(), "Loaded migrations");
            units.extend(loaded);
        }

        validate_unique(&units)?;
        units.sort_by_key(|unit| unit.version());
        Ok(units)
    }

    /// Find a unit by name
    pub fn find(&self, name: &str) -> MigrationResult<Option<Arc<dyn Migration>>> {
        Ok(self.list_all()?.into_iter().find(|unit| unit.name() == name))
    }

    /// Version a newly created migration should get
    pub fn next_version(&self) -> MigrationResult<i64> {
        Ok(self
            .list_all()?
            .iter()
            .map(|unit| unit.version())
            .max()
            .map_or(1, |max| max + 1))
    }

    /// Write a new migration template into the repository's directory
    pub fn create_migration(&self, name: &str) -> MigrationResult<PathBuf> {
        let directory = self.directory.as_ref().ok_or_else(|| ConfigError::ValidationFailed {
            field: "migrations_dir".to_string(),
            reason: "No migrations directory configured".to_string(),
        })?;

        let version = self.next_version()?;
        let name = super::manager::normalize_migration_name(name)?;
        if let Some(existing) = self.find(&name)? {
            return Err(MigrationError::DuplicateName {
                name,
                first: existing.version(),
                second: version,
            });
        }

        directory.create_migration(&name, version)
    }
}

fn validate_unique(units: &[Arc<dyn Migration>]) -> MigrationResult<()> {
    let mut by_name: HashMap<&str, i64> = HashMap::new();
    let mut by_version: HashMap<i64, &str> = HashMap::new();

    for unit in units {
        if unit.version() < 1 {
            return Err(MigrationError::InvalidVersion {
                migration: unit.name().to_string(),
                reason: "version must be a positive integer".to_string(),
            });
        }

        if let Some(first) = by_name.insert(unit.name(), unit.version()) {
            return Err(MigrationError::DuplicateName {
                name: unit.name().to_string(),
                first,
                second: unit.version(),
            });
        }

        if let Some(first) = by_version.insert(unit.version(), unit.name()) {
            return Err(MigrationError::DuplicateVersion {
                version: unit.version(),
                first: first.to_string(),
                second: unit.name().to_string(),
            });
        }
    }

    Ok(())
}
