//! Framed fixed-size page storage.
//!
//! The page file is a sequence of fixed-size pages:
//!
//! ```text
//! | "BZDB" (4) | 0x01 (1) | payload (<= page_size - 5) | zero padding |
//! ```
//!
//! A page of all zeros is a valid hole. A page whose first five bytes are
//! neither the magic + version nor all zero is *orphaned*: counted by
//! [`PageStore::stats`], rejected by [`PageStore::read`], tolerated by
//! layout rebuild scans.

mod store;

pub use store::{PageStats, PageStore};

/// Magic bytes identifying a framed page.
pub const PAGE_MAGIC: [u8; 4] = *b"BZDB";

/// Current page format version.
pub const PAGE_VERSION: u8 = 0x01;

/// Bytes of framing before the payload.
pub const PAGE_HEADER_SIZE: usize = 5;

/// Default page size in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 4096;
