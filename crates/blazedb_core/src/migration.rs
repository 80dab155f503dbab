//! Schema migration support.
//!
//! Documents are schemaless, but applications still evolve: fields get
//! renamed, formats change, indexes appear. Migrations are forward-only,
//! registered in code, and applied in version order; the schema version
//! lives in the layout's `metaData` under `schemaVersion`. The client
//! wraps a migration run in the safe-write harness, so a failing
//! migration restores the pre-run files.

use crate::collection::Collection;
use crate::error::{CoreError, CoreResult};
use std::collections::BTreeMap;

/// A single forward migration step.
pub trait Migration: Send + Sync {
    /// Unique, sequential version starting at 1.
    fn version(&self) -> u64;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Applies the migration against the open collection.
    ///
    /// # Errors
    ///
    /// Any error aborts the run; the safe-write harness restores the
    /// pre-run files.
    fn up(&self, collection: &mut Collection) -> CoreResult<()>;
}

/// Outcome of a migration run.
#[derive(Debug, Clone, Default)]
pub struct MigrationRunReport {
    /// `(version, name)` of each applied migration, in order.
    pub applied: Vec<(u64, String)>,
    /// Schema version after the run.
    pub final_version: u64,
}

/// Registry and runner for migrations.
#[derive(Default)]
pub struct MigrationRunner {
    migrations: BTreeMap<u64, Box<dyn Migration>>,
}

impl MigrationRunner {
    /// Creates an empty runner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a migration.
    ///
    /// # Errors
    ///
    /// Fails when the version is already registered.
    pub fn register(&mut self, migration: Box<dyn Migration>) -> CoreResult<()> {
        let version = migration.version();
        if self.migrations.contains_key(&version) {
            return Err(CoreError::migration_failed(format!(
                "migration version {version} already registered"
            )));
        }
        self.migrations.insert(version, migration);
        Ok(())
    }

    /// Checks that registered versions are 1..=n with no gaps.
    ///
    /// # Errors
    ///
    /// Fails on the first gap.
    pub fn validate(&self) -> CoreResult<()> {
        for (position, version) in self.migrations.keys().enumerate() {
            let expected = position as u64 + 1;
            if *version != expected {
                return Err(CoreError::migration_failed(format!(
                    "migration version gap: expected {expected}, found {version}"
                )));
            }
        }
        Ok(())
    }

    /// Returns `(version, name)` of migrations beyond `current_version`.
    #[must_use]
    pub fn pending(&self, current_version: u64) -> Vec<(u64, String)> {
        self.migrations
            .range(current_version + 1..)
            .map(|(version, migration)| (*version, migration.name().to_string()))
            .collect()
    }

    /// Applies every pending migration in order, bumping the schema
    /// version after each step and persisting the layout at the end.
    ///
    /// # Errors
    ///
    /// Stops at the first failing migration and re-raises its error; the
    /// caller's safe-write snapshot restores the files.
    pub fn run_pending(&self, collection: &mut Collection) -> CoreResult<MigrationRunReport> {
        self.validate()?;

        let mut report = MigrationRunReport {
            final_version: collection.layout().schema_version(),
            ..Default::default()
        };

        let pending: Vec<u64> = self
            .migrations
            .range(report.final_version + 1..)
            .map(|(version, _)| *version)
            .collect();

        for version in pending {
            let migration = &self.migrations[&version];
            migration.up(collection)?;
            collection.set_schema_version(version)?;
            report.applied.push((version, migration.name().to_string()));
            report.final_version = version;
        }

        Ok(report)
    }
}

impl std::fmt::Debug for MigrationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRunner")
            .field("registered", &self.migrations.len())
            .finish()
    }
}
