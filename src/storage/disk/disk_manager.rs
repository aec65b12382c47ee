use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::common::{HeapDbError, Result, StorageConfig};

/// DiskManager reads and writes fixed-size pages of a single file.
///
/// Page `n` occupies bytes `[n * page_size, (n + 1) * page_size)`. There is no
/// file header and no caching; every call goes to the file.
pub struct DiskManager {
    /// The backing file
    file: Mutex<File>,
    /// Canonical absolute path of the backing file
    path: PathBuf,
    /// Size of every page in bytes
    page_size: usize,
    /// Whether writes are followed by `sync_data`
    sync_on_write: bool,
    /// Number of page reads performed
    num_reads: AtomicU32,
    /// Number of page writes performed
    num_writes: AtomicU32,
}

impl DiskManager {
    /// Opens the file at the given path, creating it if it doesn't exist.
    pub fn open<P: AsRef<Path>>(path: P, config: &StorageConfig) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let path = path.as_ref().canonicalize()?;
        let file_size = file.metadata()?.len();
        if file_size % config.page_size() as u64 != 0 {
            warn!(
                path = %path.display(),
                file_size,
                page_size = config.page_size(),
                "file length is not a multiple of the page size"
            );
        }

        Ok(Self {
            file: Mutex::new(file),
            path,
            page_size: config.page_size(),
            sync_on_write: config.sync_on_write(),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        })
    }

    /// Returns the number of pages, counting a trailing partial page.
    pub fn num_pages(&self) -> Result<usize> {
        let file = self.file.lock();
        Ok(self.pages_for_len(file.metadata()?.len()))
    }

    fn pages_for_len(&self, len: u64) -> usize {
        len.div_ceil(self.page_size as u64) as usize
    }

    fn offset_of(&self, page_number: i32) -> Option<u64> {
        u64::try_from(page_number)
            .ok()
            .map(|n| n * self.page_size as u64)
    }

    /// Reads one page from disk.
    pub fn read_page(&self, page_number: i32) -> Result<Vec<u8>> {
        let mut file = self.file.lock();
        let len = file.metadata()?.len();

        let offset = match self.offset_of(page_number) {
            Some(offset) if offset < len => offset,
            _ => {
                return Err(HeapDbError::PageOutOfRange {
                    page_number,
                    num_pages: self.pages_for_len(len),
                })
            }
        };

        let mut data = vec![0u8; self.page_size];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut data)?;

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        trace!(page_number, offset, "read page");
        Ok(data)
    }

    /// Writes one page to disk.
    ///
    /// Writing at page number `num_pages()` appends a page; anything further
    /// out is rejected so the file never has gaps.
    pub fn write_page(&self, page_number: i32, data: &[u8]) -> Result<()> {
        if data.len() != self.page_size {
            return Err(HeapDbError::InvalidPageSize {
                expected: self.page_size,
                actual: data.len(),
            });
        }

        let mut file = self.file.lock();
        let num_pages = self.pages_for_len(file.metadata()?.len());

        let offset = match self.offset_of(page_number) {
            Some(offset) if page_number as usize <= num_pages => offset,
            _ => {
                return Err(HeapDbError::PageOutOfRange {
                    page_number,
                    num_pages,
                })
            }
        };

        self.write_at(&mut file, page_number, offset, data)
    }

    /// Appends a page only if `page_number` is still the first page past the
    /// end of the file. Returns false, writing nothing, if the file has
    /// already grown past it.
    pub fn append_page(&self, page_number: i32, data: &[u8]) -> Result<bool> {
        if data.len() != self.page_size {
            return Err(HeapDbError::InvalidPageSize {
                expected: self.page_size,
                actual: data.len(),
            });
        }

        let mut file = self.file.lock();
        let num_pages = self.pages_for_len(file.metadata()?.len());

        let offset = match self.offset_of(page_number) {
            Some(offset) if page_number as usize == num_pages => offset,
            Some(_) if (page_number as usize) < num_pages => return Ok(false),
            _ => {
                return Err(HeapDbError::PageOutOfRange {
                    page_number,
                    num_pages,
                })
            }
        };

        self.write_at(&mut file, page_number, offset, data)?;
        Ok(true)
    }

    fn write_at(&self, file: &mut File, page_number: i32, offset: u64, data: &[u8]) -> Result<()> {
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()?;
        if self.sync_on_write {
            file.sync_data()?;
        }

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        trace!(page_number, offset, "wrote page");
        Ok(())
    }

    /// Returns the page size in bytes.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the canonical path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of page reads performed.
    pub fn num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of page writes performed.
    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    /// Flushes file contents and metadata to disk.
    pub fn sync(&self) -> Result<()> {
        let file = self.file.lock();
        file.sync_all()?;
        Ok(())
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        let file = self.file.get_mut();
        let _ = file.sync_all();
    }
}
