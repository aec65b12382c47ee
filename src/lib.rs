//! heapdb - the heap-file storage layer of a disk-oriented RDBMS
//!
//! This crate describes how rows are laid out, addressed, packed into
//! fixed-size pages, and read back from a backing file.
//!
//! # Architecture
//!
//! The system is organized into several layers:
//!
//! - **Tuples** (`tuple`): Row description and values
//!   - `Schema`: Ordered, typed column layout shared by a table's rows
//!   - `Tuple`: One row bound to a schema, with type-checked fields
//!   - `Value`: Tagged field value, one variant per `DataType`
//!
//! - **Storage Layer** (`storage`): Handles disk I/O and page organization
//!   - `DiskManager`: Reads and writes fixed-size pages of one file
//!   - `HeapPage`: Bitmap-slotted page of fixed-width tuples
//!   - `HeapFile`: Unordered table stored as a flat sequence of heap pages
//!
//! - **Buffer Pool** (`buffer`): Memory management for heap pages
//!   - `PageStore`/`PageCache`: Seams between heap files and the page cache
//!   - `BufferPool`: Unbounded cache that tracks dirty pages until flushed
//!
//! # Example
//!
//! ```rust,no_run
//! use heapdb::buffer::BufferPool;
//! use heapdb::common::{StorageConfig, TransactionId};
//! use heapdb::storage::HeapFile;
//! use heapdb::tuple::{DataType, Schema, Tuple};
//!
//! # fn main() -> heapdb::Result<()> {
//! let schema = Schema::builder()
//!     .column("id", DataType::Integer)
//!     .column("name", DataType::Char(16))
//!     .build_arc()?;
//!
//! let file = HeapFile::open("users.dat", schema.clone(), &StorageConfig::default())?;
//! let pool = BufferPool::new();
//! let tid = TransactionId::new();
//!
//! let mut tuple = Tuple::new(schema);
//! tuple.set_field(0, 1i32)?;
//! tuple.set_field(1, "Alice")?;
//! pool.insert_tuple(tid, &file, &mut tuple)?;
//! pool.flush_pages(&file)?;
//!
//! for tuple in file.iter(tid, &pool) {
//!     print!("{}", tuple?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod common;
pub mod storage;
pub mod tuple;

// Re-export commonly used types at the crate root
pub use common::{HeapDbError, HeapPageId, PageId, RecordId, Result, TransactionId};
