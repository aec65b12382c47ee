//! Integration tests for heap files

use std::fs::OpenOptions;
use std::sync::Arc;
use std::thread;

use heapdb::buffer::{BufferPool, PageCache};
use heapdb::common::{HeapPageId, PageId, StorageConfig, TransactionId};
use heapdb::storage::page::HeapPage;
use heapdb::storage::HeapFile;
use heapdb::tuple::{DataType, Schema, Tuple, Value};
use heapdb::HeapDbError;
use rand::seq::SliceRandom;
use rand::thread_rng;
use tempfile::{tempdir, NamedTempFile};

const PAGE_SIZE: usize = 128;

fn schema() -> Arc<Schema> {
    Schema::builder()
        .column("id", DataType::Integer)
        .column("score", DataType::BigInt)
        .build_arc()
        .unwrap()
}

fn config() -> StorageConfig {
    StorageConfig::new(PAGE_SIZE).unwrap()
}

fn open(temp_file: &NamedTempFile) -> HeapFile {
    HeapFile::open(temp_file.path(), schema(), &config()).unwrap()
}

fn row(file: &HeapFile, id: i32) -> Tuple {
    Tuple::with_values(
        file.schema().clone(),
        vec![Value::Integer(id), Value::BigInt(id as i64 * 1000)],
    )
    .unwrap()
}

fn slots_per_page(file: &HeapFile) -> usize {
    HeapPage::empty(HeapPageId::new(file.table_id(), 0), file.schema().clone(), PAGE_SIZE)
        .unwrap()
        .num_slots()
}

fn scan_ids(file: &HeapFile, pool: &BufferPool) -> Vec<i32> {
    file.iter(TransactionId::new(), pool)
        .map(|t| match t.unwrap().field(0).unwrap() {
            Some(Value::Integer(id)) => *id,
            other => panic!("unexpected id field {:?}", other),
        })
        .collect()
}

#[test]
fn test_first_insert_uses_page_zero_slot_zero() {
    let temp_file = NamedTempFile::new().unwrap();
    let file = open(&temp_file);
    let pool = BufferPool::new();

    assert_eq!(file.num_pages().unwrap(), 0);
    let mut t = row(&file, 1);
    pool.insert_tuple(TransactionId::new(), &file, &mut t).unwrap();

    assert_eq!(file.num_pages().unwrap(), 1);
    let rid = t.record_id().unwrap();
    assert_eq!(rid.page_id(), PageId::Heap(HeapPageId::new(file.table_id(), 0)));
    assert_eq!(rid.slot(), 0);
}

#[test]
fn test_overflow_allocates_next_page() {
    let temp_file = NamedTempFile::new().unwrap();
    let file = open(&temp_file);
    let pool = BufferPool::new();
    let tid = TransactionId::new();
    let capacity = slots_per_page(&file);

    for id in 0..capacity as i32 {
        pool.insert_tuple(tid, &file, &mut row(&file, id)).unwrap();
    }
    assert_eq!(file.num_pages().unwrap(), 1);

    let page0 = pool
        .get_page(tid, &file, HeapPageId::new(file.table_id(), 0))
        .unwrap();
    let before = page0.read().serialize().unwrap();

    let mut overflow = row(&file, capacity as i32);
    let pages = pool.insert_tuple(tid, &file, &mut overflow).unwrap();

    assert_eq!(file.num_pages().unwrap(), 2);
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].read().id(), HeapPageId::new(file.table_id(), 1));
    let rid = overflow.record_id().unwrap();
    assert_eq!(rid.page_id(), PageId::Heap(HeapPageId::new(file.table_id(), 1)));
    assert_eq!(rid.slot(), 0);
    assert_eq!(page0.read().serialize().unwrap(), before);
}

#[test]
fn test_insert_reuses_freed_slot() {
    let temp_file = NamedTempFile::new().unwrap();
    let file = open(&temp_file);
    let pool = BufferPool::new();
    let tid = TransactionId::new();
    let capacity = slots_per_page(&file);

    let mut rows: Vec<Tuple> = (0..capacity as i32 + 3).map(|id| row(&file, id)).collect();
    for t in rows.iter_mut() {
        pool.insert_tuple(tid, &file, t).unwrap();
    }

    pool.delete_tuple(tid, &file, &rows[2]).unwrap();
    let mut t = row(&file, 999);
    pool.insert_tuple(tid, &file, &mut t).unwrap();
    assert_eq!(t.record_id(), rows[2].record_id());
    assert_eq!(file.num_pages().unwrap(), 2);
}

#[test]
fn test_delete_then_rescan() {
    let temp_file = NamedTempFile::new().unwrap();
    let file = open(&temp_file);
    let pool = BufferPool::new();
    let tid = TransactionId::new();

    let mut rows: Vec<Tuple> = (0..40).map(|id| row(&file, id)).collect();
    for t in rows.iter_mut() {
        pool.insert_tuple(tid, &file, t).unwrap();
    }
    assert!(file.num_pages().unwrap() > 1);
    assert_eq!(scan_ids(&file, &pool), (0..40).collect::<Vec<_>>());

    pool.delete_tuple(tid, &file, &rows[17]).unwrap();
    let expected: Vec<i32> = (0..40).filter(|&id| id != 17).collect();
    assert_eq!(scan_ids(&file, &pool), expected);
}

#[test]
fn test_delete_in_random_order() {
    let temp_file = NamedTempFile::new().unwrap();
    let file = open(&temp_file);
    let pool = BufferPool::new();
    let tid = TransactionId::new();

    let mut rows: Vec<Tuple> = (0..50).map(|id| row(&file, id)).collect();
    for t in rows.iter_mut() {
        pool.insert_tuple(tid, &file, t).unwrap();
    }

    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.shuffle(&mut thread_rng());

    let mut remaining: Vec<i32> = (0..50).collect();
    for i in order {
        pool.delete_tuple(tid, &file, &rows[i]).unwrap();
        remaining.retain(|&id| id != i as i32);
        assert_eq!(scan_ids(&file, &pool), remaining);
    }
    assert_eq!(file.iter(tid, &pool).count(), 0);
}

#[test]
fn test_delete_twice_fails() {
    let temp_file = NamedTempFile::new().unwrap();
    let file = open(&temp_file);
    let pool = BufferPool::new();
    let tid = TransactionId::new();

    let mut t = row(&file, 1);
    pool.insert_tuple(tid, &file, &mut t).unwrap();
    pool.delete_tuple(tid, &file, &t).unwrap();
    assert!(matches!(
        pool.delete_tuple(tid, &file, &t),
        Err(HeapDbError::Db(_))
    ));
}

#[test]
fn test_delete_from_other_table_fails() {
    let dir = tempdir().unwrap();
    let a = HeapFile::open(dir.path().join("a.dat"), schema(), &config()).unwrap();
    let b = HeapFile::open(dir.path().join("b.dat"), schema(), &config()).unwrap();
    assert_ne!(a.table_id(), b.table_id());

    let pool = BufferPool::new();
    let tid = TransactionId::new();
    let mut t = row(&a, 1);
    pool.insert_tuple(tid, &a, &mut t).unwrap();

    assert!(matches!(
        pool.delete_tuple(tid, &b, &t),
        Err(HeapDbError::Db(_))
    ));
}

#[test]
fn test_read_page_out_of_range() {
    let temp_file = NamedTempFile::new().unwrap();
    let file = open(&temp_file);
    let pool = BufferPool::new();
    pool.insert_tuple(TransactionId::new(), &file, &mut row(&file, 1))
        .unwrap();

    for page_number in [1, 2, 100, -1] {
        assert!(matches!(
            file.read_page(HeapPageId::new(file.table_id(), page_number)),
            Err(HeapDbError::PageOutOfRange { .. })
        ));
    }
}

#[test]
fn test_write_then_read_page_is_identical() {
    let temp_file = NamedTempFile::new().unwrap();
    let file = open(&temp_file);
    let pid = HeapPageId::new(file.table_id(), 0);

    let mut page = HeapPage::empty(pid, file.schema().clone(), PAGE_SIZE).unwrap();
    for id in [4, 8, 15, 16, 23, 42] {
        page.insert_tuple(&mut row(&file, id)).unwrap();
    }
    page.delete_slot(1).unwrap();

    file.write_page(&page).unwrap();
    let read = file.read_page(pid).unwrap();
    assert_eq!(read.serialize().unwrap(), page.serialize().unwrap());
}

#[test]
fn test_write_page_rejects_gap() {
    let temp_file = NamedTempFile::new().unwrap();
    let file = open(&temp_file);
    let page = HeapPage::empty(
        HeapPageId::new(file.table_id(), 3),
        file.schema().clone(),
        PAGE_SIZE,
    )
    .unwrap();

    assert!(matches!(
        file.write_page(&page),
        Err(HeapDbError::PageOutOfRange { .. })
    ));
}

#[test]
fn test_table_id_stable_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("table.dat");

    let first = HeapFile::open(&path, schema(), &config()).unwrap().table_id();
    let second = HeapFile::open(&path, schema(), &config()).unwrap().table_id();
    assert_eq!(first, second);
}

#[test]
fn test_flush_persists_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("table.dat");

    {
        let file = HeapFile::open(&path, schema(), &config()).unwrap();
        let pool = BufferPool::new();
        let tid = TransactionId::new();
        for id in 0..25 {
            pool.insert_tuple(tid, &file, &mut row(&file, id)).unwrap();
        }
        pool.flush_pages(&file).unwrap();
    }

    let file = HeapFile::open(&path, schema(), &config()).unwrap();
    assert_eq!(scan_ids(&file, &BufferPool::new()), (0..25).collect::<Vec<_>>());
}

#[test]
fn test_unflushed_inserts_are_not_on_disk() {
    let temp_file = NamedTempFile::new().unwrap();
    let file = open(&temp_file);
    let pool = BufferPool::new();

    pool.insert_tuple(TransactionId::new(), &file, &mut row(&file, 1))
        .unwrap();

    assert_eq!(scan_ids(&file, &pool), vec![1]);
    assert!(scan_ids(&file, &BufferPool::new()).is_empty());
}

#[test]
fn test_scan_surfaces_truncated_page() {
    let temp_file = NamedTempFile::new().unwrap();
    let file = open(&temp_file);
    let pool = BufferPool::new();
    let tid = TransactionId::new();
    let capacity = slots_per_page(&file);

    for id in 0..capacity as i32 + 1 {
        pool.insert_tuple(tid, &file, &mut row(&file, id)).unwrap();
    }
    pool.flush_pages(&file).unwrap();

    OpenOptions::new()
        .write(true)
        .open(temp_file.path())
        .unwrap()
        .set_len((PAGE_SIZE + PAGE_SIZE / 2) as u64)
        .unwrap();

    let results: Vec<_> = file.iter(tid, &BufferPool::new()).collect();
    assert_eq!(results.len(), capacity + 1);
    assert!(results[..capacity].iter().all(Result::is_ok));
    assert!(matches!(results[capacity], Err(HeapDbError::Io(_))));
}

#[test]
fn test_concurrent_scans() {
    let temp_file = NamedTempFile::new().unwrap();
    let file = open(&temp_file);
    let pool = BufferPool::new();
    let tid = TransactionId::new();

    for id in 0..60 {
        pool.insert_tuple(tid, &file, &mut row(&file, id)).unwrap();
    }

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                assert_eq!(scan_ids(&file, &pool), (0..60).collect::<Vec<_>>());
            });
        }
    });
}

#[test]
fn test_failed_insert_leaves_file_unchanged() {
    let temp_file = NamedTempFile::new().unwrap();
    let file = open(&temp_file);
    let pool = BufferPool::new();
    let tid = TransactionId::new();

    let mut partial = Tuple::new(file.schema().clone());
    partial.set_field(0, 1i32).unwrap();

    // Empty file: no page may be allocated for a tuple that cannot be stored
    assert!(matches!(
        pool.insert_tuple(tid, &file, &mut partial),
        Err(HeapDbError::Db(_))
    ));
    assert_eq!(file.num_pages().unwrap(), 0);
    assert!(partial.record_id().is_none());

    // Full last page: still no new page
    for id in 0..slots_per_page(&file) as i32 {
        pool.insert_tuple(tid, &file, &mut row(&file, id)).unwrap();
    }
    assert!(pool.insert_tuple(tid, &file, &mut partial).is_err());
    assert_eq!(file.num_pages().unwrap(), 1);
    assert_eq!(scan_ids(&file, &pool).len(), slots_per_page(&file));
}

#[test]
fn test_concurrent_inserts() {
    let temp_file = NamedTempFile::new().unwrap();
    let file = open(&temp_file);
    let pool = BufferPool::new();
    let threads = 8;
    let per_thread = 100;

    thread::scope(|s| {
        for t in 0..threads {
            let file = &file;
            let pool = &pool;
            s.spawn(move || {
                let tid = TransactionId::new();
                for i in 0..per_thread {
                    let id = t * per_thread + i;
                    pool.insert_tuple(tid, file, &mut row(file, id)).unwrap();
                }
            });
        }
    });

    let mut ids = scan_ids(&file, &pool);
    ids.sort_unstable();
    assert_eq!(ids, (0..threads * per_thread).collect::<Vec<_>>());

    // Every page but the last is full, so no appended page was lost or doubled
    let capacity = slots_per_page(&file);
    let expected_pages = (threads * per_thread) as usize / capacity
        + usize::from((threads * per_thread) as usize % capacity != 0);
    assert_eq!(file.num_pages().unwrap(), expected_pages);

    pool.flush_pages(&file).unwrap();
    let mut on_disk = scan_ids(&file, &BufferPool::new());
    on_disk.sort_unstable();
    assert_eq!(on_disk.len(), (threads * per_thread) as usize);
}
