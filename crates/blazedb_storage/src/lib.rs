//! # BlazeDB Storage
//!
//! Byte-store backends for BlazeDB.
//!
//! A backend is an opaque, flat byte store. It knows nothing about pages,
//! journal records, or documents; all format interpretation lives in
//! `blazedb_core`. Backends support positional reads, positional writes
//! (with zero-fill past the current end), appends, and truncation, and
//! must be `Send + Sync`.
//!
//! ## Available backends
//!
//! - [`FileBackend`] - persistent storage over an OS file
//! - [`InMemoryBackend`] - volatile storage for tests
//!
//! ## Example
//!
//! ```rust
//! use blazedb_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"framed page bytes").unwrap();
//! let back = backend.read_at(offset, 17).unwrap();
//! assert_eq!(&back, b"framed page bytes");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
