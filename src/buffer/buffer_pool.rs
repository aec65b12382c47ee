use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::common::{HeapDbError, HeapPageId, PageId, PageLocator, Result, TransactionId};
use crate::storage::page::HeapPage;
use crate::storage::HeapFile;
use crate::tuple::Tuple;

/// A cached page shared between the pool and its callers.
pub type PageRef = Arc<RwLock<HeapPage>>;

/// Persistent home of one table's pages.
pub trait PageStore {
    /// Returns the id of the table whose pages this store holds.
    fn table_id(&self) -> i32;

    /// Reads a page from storage, bypassing any cache.
    fn read_page(&self, page_id: HeapPageId) -> Result<HeapPage>;

    /// Writes a page back to storage.
    fn write_page(&self, page: &HeapPage) -> Result<()>;
}

/// Hands out shared pages, loading them from a [`PageStore`] on a miss.
pub trait PageCache {
    fn get_page(
        &self,
        tid: TransactionId,
        store: &dyn PageStore,
        page_id: HeapPageId,
    ) -> Result<PageRef>;
}

/// BufferPool keeps every page it has loaded in memory until it is
/// discarded. There is no replacement policy and no capacity limit.
///
/// Pages modified through [`BufferPool::insert_tuple`] and
/// [`BufferPool::delete_tuple`] are marked dirty with the transaction that
/// changed them and stay dirty until flushed.
#[derive(Default)]
pub struct BufferPool {
    /// Page table: maps page IDs to cached pages
    page_table: Mutex<HashMap<PageId, PageRef>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a tuple into the file, keeping the modified page dirty in the pool.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        file: &HeapFile,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageRef>> {
        let pages = file.insert_tuple(tid, tuple, self)?;
        self.mark_dirty(tid, &pages);
        Ok(pages)
    }

    /// Deletes a tuple from the file, keeping the modified page dirty in the pool.
    pub fn delete_tuple(
        &self,
        tid: TransactionId,
        file: &HeapFile,
        tuple: &Tuple,
    ) -> Result<Vec<PageRef>> {
        let pages = file.delete_tuple(tid, tuple, self)?;
        self.mark_dirty(tid, &pages);
        Ok(pages)
    }

    fn mark_dirty(&self, tid: TransactionId, pages: &[PageRef]) {
        let mut page_table = self.page_table.lock();
        for page in pages {
            let page_id = {
                let mut guard = page.write();
                guard.mark_dirty(true, tid);
                PageId::Heap(guard.id())
            };
            page_table.insert(page_id, Arc::clone(page));
        }
    }

    /// Writes the page back to the store if it is cached and dirty.
    /// Returns true if a write happened.
    pub fn flush_page(&self, page_id: HeapPageId, store: &dyn PageStore) -> Result<bool> {
        if page_id.table_id() != store.table_id() {
            return Err(HeapDbError::Db(format!(
                "page {} does not belong to table {}",
                page_id,
                store.table_id()
            )));
        }

        let page = match self.page_table.lock().get(&PageId::Heap(page_id)) {
            Some(page) => Arc::clone(page),
            None => return Ok(false),
        };

        let mut guard = page.write();
        let Some(tid) = guard.dirtied_by() else {
            return Ok(false);
        };

        store.write_page(&guard)?;
        guard.mark_dirty(false, tid);
        debug!(page_id = %page_id, "flushed page");
        Ok(true)
    }

    /// Flushes every dirty cached page of the store's table, in page order.
    /// Returns the number of pages written.
    pub fn flush_pages(&self, store: &dyn PageStore) -> Result<usize> {
        let table_id = store.table_id();
        let mut page_ids: Vec<HeapPageId> = self
            .page_table
            .lock()
            .keys()
            .filter_map(PageId::as_heap)
            .filter(|pid| pid.table_id() == table_id)
            .collect();
        page_ids.sort();

        let mut flushed = 0;
        for page_id in page_ids {
            if self.flush_page(page_id, store)? {
                flushed += 1;
            }
        }
        Ok(flushed)
    }

    /// Drops the page from the pool without writing it.
    /// Returns true if the page was cached.
    pub fn discard_page(&self, page_id: HeapPageId) -> bool {
        self.page_table
            .lock()
            .remove(&PageId::Heap(page_id))
            .is_some()
    }

    /// Returns whether the page is currently cached.
    pub fn is_cached(&self, page_id: HeapPageId) -> bool {
        self.page_table.lock().contains_key(&PageId::Heap(page_id))
    }

    /// Returns the number of cached pages.
    pub fn cached_page_count(&self) -> usize {
        self.page_table.lock().len()
    }
}

impl PageCache for BufferPool {
    fn get_page(
        &self,
        _tid: TransactionId,
        store: &dyn PageStore,
        page_id: HeapPageId,
    ) -> Result<PageRef> {
        let mut page_table = self.page_table.lock();
        if let Some(page) = page_table.get(&PageId::Heap(page_id)) {
            return Ok(Arc::clone(page));
        }

        trace!(page_id = %page_id, "buffer pool miss");
        let page = Arc::new(RwLock::new(store.read_page(page_id)?));
        page_table.insert(PageId::Heap(page_id), Arc::clone(&page));
        Ok(page)
    }
}
