//! Database configuration.

use crate::page::DEFAULT_PAGE_SIZE;

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Page size in bytes. Must match the size the file was created with.
    pub page_size: usize,

    /// Whether to create the database files if they don't exist.
    pub create_if_missing: bool,

    /// Whether to sync the journal after every appended record.
    pub sync_journal: bool,

    /// Whether to encrypt page payloads with the derived key.
    ///
    /// Framing headers stay in plaintext either way, so `stats` and
    /// orphan detection work identically on encrypted stores.
    pub encrypt_payloads: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            create_if_missing: true,
            sync_journal: true,
            encrypt_payloads: false,
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page size.
    #[must_use]
    pub const fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Sets whether missing database files are created.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether the journal syncs after every record.
    #[must_use]
    pub const fn sync_journal(mut self, value: bool) -> Self {
        self.sync_journal = value;
        self
    }

    /// Sets whether page payloads are encrypted.
    #[must_use]
    pub const fn encrypt_payloads(mut self, value: bool) -> Self {
        self.encrypt_payloads = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert!(config.create_if_missing);
        assert!(config.sync_journal);
        assert!(!config.encrypt_payloads);
    }

    #[test]
    fn builder_chains() {
        let config = Config::new()
            .page_size(8192)
            .sync_journal(false)
            .encrypt_payloads(true);

        assert_eq!(config.page_size, 8192);
        assert!(!config.sync_journal);
        assert!(config.encrypt_payloads);
    }
}
