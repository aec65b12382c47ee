use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use super::error::{HeapDbError, Result};

/// Addressing capability shared by every page organization.
pub trait PageLocator {
    /// Returns the table this page belongs to.
    fn table_id(&self) -> i32;

    /// Returns the page number within the table.
    fn page_number(&self) -> i32;

    /// Returns the locator as a fixed-length integer sequence for logging and
    /// persistence.
    fn serialize(&self) -> Vec<i32>;
}

/// Identifies a page of a heap file by (table id, page number).
///
/// Both components may be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HeapPageId {
    table_id: i32,
    page_number: i32,
}

impl HeapPageId {
    pub fn new(table_id: i32, page_number: i32) -> Self {
        Self {
            table_id,
            page_number,
        }
    }

    /// Packs both fields into one 64-bit word, table id in the high half.
    /// The mapping is injective, so distinct ids never share a key.
    pub fn packed(&self) -> u64 {
        ((self.table_id as u32 as u64) << 32) | (self.page_number as u32 as u64)
    }
}

impl Hash for HeapPageId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.packed());
    }
}

impl PageLocator for HeapPageId {
    fn table_id(&self) -> i32 {
        self.table_id
    }

    fn page_number(&self) -> i32 {
        self.page_number
    }

    fn serialize(&self) -> Vec<i32> {
        vec![self.table_id, self.page_number]
    }
}

impl fmt::Display for HeapPageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HeapPageId({}, {})", self.table_id, self.page_number)
    }
}

/// Page organization tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    Heap,
}

/// Page identifier, tagged by page organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PageId {
    Heap(HeapPageId),
}

impl PageId {
    pub fn kind(&self) -> PageKind {
        match self {
            PageId::Heap(_) => PageKind::Heap,
        }
    }

    /// Rebuilds a page id from the output of [`PageLocator::serialize`].
    pub fn deserialize(kind: PageKind, data: &[i32]) -> Result<Self> {
        match (kind, data) {
            (PageKind::Heap, &[table_id, page_number]) => {
                Ok(PageId::Heap(HeapPageId::new(table_id, page_number)))
            }
            (PageKind::Heap, _) => Err(HeapDbError::InvalidPageId(format!(
                "heap page id needs 2 integers, got {}",
                data.len()
            ))),
        }
    }

    /// Returns the heap variant, if this is a heap page.
    pub fn as_heap(&self) -> Option<HeapPageId> {
        match self {
            PageId::Heap(id) => Some(*id),
        }
    }
}

impl PageLocator for PageId {
    fn table_id(&self) -> i32 {
        match self {
            PageId::Heap(id) => id.table_id(),
        }
    }

    fn page_number(&self) -> i32 {
        match self {
            PageId::Heap(id) => id.page_number(),
        }
    }

    fn serialize(&self) -> Vec<i32> {
        match self {
            PageId::Heap(id) => id.serialize(),
        }
    }
}

impl From<HeapPageId> for PageId {
    fn from(id: HeapPageId) -> Self {
        PageId::Heap(id)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageId::Heap(id) => fmt::Display::fmt(id, f),
        }
    }
}

/// Record identifier - a page locator plus a slot index within that page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    page_id: PageId,
    slot: usize,
}

impl RecordId {
    pub fn new(page_id: impl Into<PageId>, slot: usize) -> Self {
        Self {
            page_id: page_id.into(),
            slot,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({}, slot {})", self.page_id, self.slot)
    }
}

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque transaction handle, forwarded to the page cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Allocates a fresh, process-unique transaction id.
    pub fn new() -> Self {
        Self(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self.0)
    }
}
