use std::collections::VecDeque;
use std::iter::FusedIterator;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use super::disk::DiskManager;
use super::page::HeapPage;
use crate::buffer::{PageCache, PageRef, PageStore};
use crate::common::{
    HeapDbError, HeapPageId, PageId, PageLocator, Result, StorageConfig, TransactionId,
};
use crate::tuple::{Schema, Tuple};

/// HeapFile stores the tuples of one table as an unordered sequence of
/// [`HeapPage`]s in a single file.
///
/// Page `n` lives at byte offset `n * page_size`; the file has no header.
/// The table id is derived from the file's canonical path, so reopening the
/// same file yields the same id.
pub struct HeapFile {
    disk: DiskManager,
    schema: Arc<Schema>,
    table_id: i32,
    page_size: usize,
}

impl HeapFile {
    /// Opens the heap file at `path`, creating an empty one if needed.
    pub fn open<P: AsRef<Path>>(
        path: P,
        schema: Arc<Schema>,
        config: &StorageConfig,
    ) -> Result<Self> {
        let disk = DiskManager::open(path, config)?;
        let table_id = crc32fast::hash(disk.path().to_string_lossy().as_bytes()) as i32;

        debug!(
            path = %disk.path().display(),
            table_id,
            num_pages = disk.num_pages()?,
            "opened heap file"
        );

        Ok(Self {
            disk,
            schema,
            table_id,
            page_size: config.page_size(),
        })
    }

    /// Returns the id of the table stored in this file.
    pub fn table_id(&self) -> i32 {
        self.table_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns the canonical path of the backing file.
    pub fn path(&self) -> &Path {
        self.disk.path()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the number of pages, counting a trailing partial page.
    pub fn num_pages(&self) -> Result<usize> {
        self.disk.num_pages()
    }

    fn check_table(&self, page_id: HeapPageId) -> Result<()> {
        if page_id.table_id() != self.table_id {
            return Err(HeapDbError::Db(format!(
                "page {} does not belong to table {}",
                page_id, self.table_id
            )));
        }
        Ok(())
    }

    /// Reads a page straight from disk.
    pub fn read_page(&self, page_id: HeapPageId) -> Result<HeapPage> {
        self.check_table(page_id)?;
        let data = self.disk.read_page(page_id.page_number())?;
        HeapPage::new(page_id, &data, self.schema.clone())
    }

    /// Writes a page to its slot in the file. A page numbered `num_pages()`
    /// is appended.
    pub fn write_page(&self, page: &HeapPage) -> Result<()> {
        let page_id = page.id();
        self.check_table(page_id)?;
        let data = page.serialize()?;
        self.disk.write_page(page_id.page_number(), &data)
    }

    /// Inserts the tuple into the first page with a free slot, appending a
    /// new page when every page is full. Returns the page that was modified.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        tuple: &mut Tuple,
        cache: &dyn PageCache,
    ) -> Result<Vec<PageRef>> {
        if **tuple.schema() != *self.schema {
            return Err(HeapDbError::Db(format!(
                "tuple schema [{}] does not match table schema [{}]",
                tuple.schema(),
                self.schema
            )));
        }

        // Validate the image before any page is read or allocated
        tuple.to_bytes()?;

        loop {
            let num_pages = self.num_pages()?;
            for page_number in 0..num_pages {
                let page_id = self.page_id(page_number)?;
                let page = cache.get_page(tid, self, page_id)?;

                {
                    let mut guard = page.write();
                    if guard.num_empty_slots() == 0 {
                        continue;
                    }
                    guard.insert_tuple(tuple)?;
                }
                return Ok(vec![page]);
            }

            let page_id = self.page_id(num_pages)?;
            let empty = HeapPage::empty(page_id, self.schema.clone(), self.page_size)?;
            if !self.disk.append_page(page_id.page_number(), &empty.serialize()?)? {
                // Another inserter appended first; rescan
                continue;
            }
            debug!(table_id = self.table_id, page_id = %page_id, "allocated page");

            let page = cache.get_page(tid, self, page_id)?;
            let inserted = page.write().insert_tuple(tuple);
            match inserted {
                Ok(_) => return Ok(vec![page]),
                Err(HeapDbError::PageFull(_)) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn page_id(&self, page_number: usize) -> Result<HeapPageId> {
        let page_number = i32::try_from(page_number).map_err(|_| HeapDbError::PageOutOfRange {
            page_number: i32::MAX,
            num_pages: page_number,
        })?;
        Ok(HeapPageId::new(self.table_id, page_number))
    }

    /// Removes the tuple at its record id. Returns the page that was modified.
    pub fn delete_tuple(
        &self,
        tid: TransactionId,
        tuple: &Tuple,
        cache: &dyn PageCache,
    ) -> Result<Vec<PageRef>> {
        let record_id = tuple
            .record_id()
            .ok_or_else(|| HeapDbError::Db("tuple has no record id".to_string()))?;

        let PageId::Heap(page_id) = record_id.page_id();
        self.check_table(page_id)?;

        let num_pages = self.num_pages()?;
        if page_id.page_number() < 0 || page_id.page_number() as usize >= num_pages {
            return Err(HeapDbError::Db(format!(
                "page {} is beyond the end of the file ({} pages)",
                page_id, num_pages
            )));
        }

        let page = cache.get_page(tid, self, page_id)?;
        page.write().delete_slot(record_id.slot())?;
        Ok(vec![page])
    }

    /// Returns a lazy scan over every stored tuple, page by page and slot by
    /// slot in ascending order.
    pub fn iter<'a>(&'a self, tid: TransactionId, cache: &'a dyn PageCache) -> HeapFileIter<'a> {
        HeapFileIter {
            file: self,
            cache,
            tid,
            next_page: 0,
            buffered: VecDeque::new(),
            done: false,
        }
    }
}

impl PageStore for HeapFile {
    fn table_id(&self) -> i32 {
        self.table_id
    }

    fn read_page(&self, page_id: HeapPageId) -> Result<HeapPage> {
        HeapFile::read_page(self, page_id)
    }

    fn write_page(&self, page: &HeapPage) -> Result<()> {
        HeapFile::write_page(self, page)
    }
}

/// Iterator over the tuples of a [`HeapFile`].
///
/// Each page is fetched through the cache only when the previous one is
/// exhausted; its tuples are copied out under a read lock. After an error the
/// iterator yields nothing until [`HeapFileIter::rewind`] is called.
///
/// Pages loaded by the scan stay in the cache afterwards. With an unbounded
/// [`BufferPool`](crate::buffer::BufferPool), scanning a large file keeps all
/// of it in memory until the pages are discarded.
pub struct HeapFileIter<'a> {
    file: &'a HeapFile,
    cache: &'a dyn PageCache,
    tid: TransactionId,
    next_page: usize,
    buffered: VecDeque<Tuple>,
    done: bool,
}

impl HeapFileIter<'_> {
    /// Restarts the scan from the first page.
    pub fn rewind(&mut self) {
        self.next_page = 0;
        self.buffered.clear();
        self.done = false;
    }

    fn load_next_page(&mut self) -> Result<bool> {
        if self.next_page >= self.file.num_pages()? {
            return Ok(false);
        }

        let page_id = self.file.page_id(self.next_page)?;
        let page = self.cache.get_page(self.tid, self.file, page_id)?;
        self.buffered.extend(page.read().iter().cloned());
        self.next_page += 1;
        Ok(true)
    }
}

impl Iterator for HeapFileIter<'_> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(tuple) = self.buffered.pop_front() {
                return Some(Ok(tuple));
            }
            if self.done {
                return None;
            }

            match self.load_next_page() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl FusedIterator for HeapFileIter<'_> {}
