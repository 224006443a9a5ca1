//! Compiled-in migrations
//!
//! Code migrations are registered explicitly at startup instead of being
//! loaded from files at runtime.

use std::sync::Arc;

use super::repository::MigrationSource;
use super::unit::Migration;
use crate::error::MigrationResult;

/// An explicit list of code migrations
#[derive(Clone, Default)]
pub struct MigrationRegistry {
    migrations: Vec<Arc<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, migration: impl Migration + 'static) -> &mut Self {
        self.migrations.push(Arc::new(migration));
        self
    }

    /// Builder-style [`Self::register`]
    pub fn with(mut self, migration: impl Migration + 'static) -> Self {
        self.register(migration);
        self
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

impl MigrationSource for MigrationRegistry {
    fn load(&self) -> MigrationResult<Vec<Arc<dyn Migration>>> {
        Ok(self.migrations.clone())
    }

    fn describe(&self) -> String {
        format!("registry of {} migrations", self.migrations.len())
    }
}
