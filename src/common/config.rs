use super::error::{HeapDbError, Result};

/// Default size of a page in bytes (4 KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Smallest page size a heap file will accept
pub const MIN_PAGE_SIZE: usize = 64;

/// Storage settings shared by every file of one database instance.
///
/// The page size is passed explicitly to each component that computes file
/// offsets or slot layouts; nothing reads it from global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageConfig {
    /// Fixed size of every page in bytes
    page_size: usize,
    /// Whether page writes are followed by `sync_data`
    sync_on_write: bool,
}

impl StorageConfig {
    /// Creates a config with the given page size.
    pub fn new(page_size: usize) -> Result<Self> {
        if page_size < MIN_PAGE_SIZE {
            return Err(HeapDbError::InvalidPageSize {
                expected: MIN_PAGE_SIZE,
                actual: page_size,
            });
        }
        Ok(Self {
            page_size,
            sync_on_write: false,
        })
    }

    /// Enables or disables syncing after each page write.
    pub fn with_sync_on_write(mut self, sync_on_write: bool) -> Self {
        self.sync_on_write = sync_on_write;
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn sync_on_write(&self) -> bool {
        self.sync_on_write
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            sync_on_write: false,
        }
    }
}
