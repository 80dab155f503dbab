//! Page store implementation.

use crate::error::{CoreError, CoreResult};
use crate::page::{DEFAULT_PAGE_SIZE, PAGE_HEADER_SIZE, PAGE_MAGIC, PAGE_VERSION};
use blazedb_storage::{FileBackend, StorageBackend};
use parking_lot::Mutex;
use std::path::Path;

/// Aggregate page-file statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageStats {
    /// Number of complete pages in the file.
    pub total_pages: u64,
    /// Pages whose first five bytes are not magic + version.
    pub orphaned_pages: u64,
    /// File size in bytes.
    pub file_bytes: u64,
}

/// Fixed-size-page I/O over a storage backend.
///
/// Writes are serialized by the internal lock and synced before they
/// return; readers either see the pre-write or the post-write page in
/// full, never a torn frame. A trailing file remainder shorter than one
/// page is ignored everywhere.
pub struct PageStore {
    backend: Mutex<Box<dyn StorageBackend>>,
    page_size: usize,
}

impl PageStore {
    /// Creates a page store over an arbitrary backend.
    #[must_use]
    pub fn new(backend: Box<dyn StorageBackend>, page_size: usize) -> Self {
        debug_assert!(page_size > PAGE_HEADER_SIZE);
        Self {
            backend: Mutex::new(backend),
            page_size,
        }
    }

    /// Opens a file-backed page store with the default page size.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or created.
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_page_size(path, DEFAULT_PAGE_SIZE)
    }

    /// Opens a file-backed page store with an explicit page size.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or created.
    pub fn open_with_page_size(path: &Path, page_size: usize) -> CoreResult<Self> {
        let backend = FileBackend::open_with_create_dirs(path)?;
        Ok(Self::new(Box::new(backend), page_size))
    }

    /// Returns the page size in bytes.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the maximum payload one page can carry.
    #[must_use]
    pub fn max_payload(&self) -> usize {
        self.page_size - PAGE_HEADER_SIZE
    }

    /// Writes `payload` as a framed page at `index` and syncs.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::TooLarge`] (without touching the file) if
    /// the payload exceeds [`max_payload`](Self::max_payload), or on I/O
    /// error.
    pub fn write(&self, index: u64, payload: &[u8]) -> CoreResult<()> {
        if payload.len() > self.max_payload() {
            return Err(CoreError::TooLarge {
                size: payload.len(),
                max: self.max_payload(),
            });
        }

        let mut page = Vec::with_capacity(self.page_size);
        page.extend_from_slice(&PAGE_MAGIC);
        page.push(PAGE_VERSION);
        page.extend_from_slice(payload);
        page.resize(self.page_size, 0);

        let mut backend = self.backend.lock();
        backend.write_at(index * self.page_size as u64, &page)?;
        backend.sync()?;
        Ok(())
    }

    /// Reads the payload at `index`.
    ///
    /// Returns `None` for pages past the end of the file, all-zero pages,
    /// and header-only pages. The trailing zero run of the payload is
    /// trimmed.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::InvalidHeader`] when a header is present
    /// but malformed, or on I/O error.
    pub fn read(&self, index: u64) -> CoreResult<Option<Vec<u8>>> {
        let backend = self.backend.lock();
        let size = backend.size()?;
        let offset = index * self.page_size as u64;
        if offset + self.page_size as u64 > size {
            // past EOF, or inside a partial trailing remainder
            return Ok(None);
        }

        let page = backend.read_at(offset, self.page_size)?;
        drop(backend);

        if page.iter().all(|&b| b == 0) {
            return Ok(None);
        }
        if page[0..4] != PAGE_MAGIC || page[4] != PAGE_VERSION {
            return Err(CoreError::InvalidHeader { page_index: index });
        }

        let payload_end = page
            .iter()
            .rposition(|&b| b != 0)
            .map_or(PAGE_HEADER_SIZE, |last| last + 1);
        if payload_end <= PAGE_HEADER_SIZE {
            return Ok(None);
        }
        Ok(Some(page[PAGE_HEADER_SIZE..payload_end].to_vec()))
    }

    /// Writes `payload` at the next file-size-derived slot.
    ///
    /// Returns the page index the payload landed at. A partial trailing
    /// remainder is overwritten, not counted.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`write`](Self::write).
    pub fn append(&self, payload: &[u8]) -> CoreResult<u64> {
        let index = {
            let backend = self.backend.lock();
            backend.size()? / self.page_size as u64
        };
        self.write(index, payload)?;
        Ok(index)
    }

    /// Overwrites the page at `index` with zeros and syncs.
    ///
    /// Deleting a page that was never written is a no-op.
    ///
    /// # Errors
    ///
    /// Fails on I/O error.
    pub fn delete(&self, index: u64) -> CoreResult<()> {
        let mut backend = self.backend.lock();
        let size = backend.size()?;
        let offset = index * self.page_size as u64;
        if offset + self.page_size as u64 > size {
            return Ok(());
        }
        backend.write_at(offset, &vec![0u8; self.page_size])?;
        backend.sync()?;
        Ok(())
    }

    /// Returns the number of complete pages in the file.
    ///
    /// # Errors
    ///
    /// Fails on I/O error.
    pub fn page_count(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()? / self.page_size as u64)
    }

    /// Computes file statistics.
    ///
    /// Orphan detection inspects the first five bytes of every complete
    /// page; zeroed pages count as orphaned until their slot is reused.
    ///
    /// # Errors
    ///
    /// Fails on I/O error.
    pub fn stats(&self) -> CoreResult<PageStats> {
        let backend = self.backend.lock();
        let file_bytes = backend.size()?;
        let total_pages = file_bytes / self.page_size as u64;

        let mut orphaned_pages = 0;
        for index in 0..total_pages {
            let head = backend.read_at(index * self.page_size as u64, PAGE_HEADER_SIZE)?;
            if head[0..4] != PAGE_MAGIC || head[4] != PAGE_VERSION {
                orphaned_pages += 1;
            }
        }

        Ok(PageStats {
            total_pages,
            orphaned_pages,
            file_bytes,
        })
    }

    /// Syncs the backend.
    ///
    /// # Errors
    ///
    /// Fails on I/O error.
    pub fn sync(&self) -> CoreResult<()> {
        self.backend.lock().sync()?;
        Ok(())
    }

    /// Truncates the file to zero pages.
    ///
    /// Used by `destroy`.
    ///
    /// # Errors
    ///
    /// Fails on I/O error.
    pub fn clear(&self) -> CoreResult<()> {
        let mut backend = self.backend.lock();
        backend.truncate(0)?;
        backend.sync()?;
        Ok(())
    }
}

impl std::fmt::Debug for PageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageStore")
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}
