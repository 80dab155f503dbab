//! # BlazeDB Core
//!
//! The BlazeDB storage engine: an embedded, single-file, schemaless
//! document store.
//!
//! This crate provides:
//! - a framed fixed-size page store with durable writes
//! - a persistent storage layout (id -> page map, index catalog, metadata)
//! - a write-ahead transaction journal with crash recovery
//! - a document collection with single-field and compound secondary indexes
//! - a file-level safe-write harness around every mutation
//! - the database client and the in-process mount manager
//!
//! The usual entry point is [`Database::open`]:
//!
//! ```ignore
//! use blazedb_core::{Database, Document, Value};
//!
//! let db = Database::open("bugs.bzdb", "hunter2secret", "tracker")?;
//! let mut doc = Document::new();
//! doc.set("title", "Fix crash");
//! let id = db.insert(doc)?;
//! let back = db.fetch(id)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod collection;
mod config;
pub mod crypto;
mod database;
mod error;
pub mod index;
pub mod integrity;
pub mod journal;
pub mod layout;
pub mod migration;
mod mounts;
pub mod page;
mod paths;
mod safe_write;
mod stats;

pub use blazedb_codec::{Document, DocumentId, Value};
pub use collection::Collection;
pub use collection::query::{Predicate, Query, SortOrder};
pub use config::Config;
pub use database::Database;
pub use error::{CoreError, CoreResult};
pub use integrity::{Issue, Severity, ValidationReport};
pub use migration::{Migration, MigrationRunReport, MigrationRunner};
pub use mounts::MountManager;
pub use paths::DatabasePaths;
pub use stats::{OpCounters, OpSnapshot};

/// Crate version string, surfaced by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable that makes `update` fail before mutating anything.
///
/// Set to `1` in tests to exercise the safe-write rollback path.
pub const CRASH_BEFORE_UPDATE_ENV: &str = "BLAZEDB_CRASH_BEFORE_UPDATE";
