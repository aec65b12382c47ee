use heapdb::buffer::BufferPool;
use heapdb::common::{StorageConfig, TransactionId};
use heapdb::storage::HeapFile;
use heapdb::tuple::{DataType, Schema, Tuple, Value};
use tracing_subscriber::EnvFilter;

fn main() -> heapdb::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("heapdb - heap-file storage in Rust");
    println!("==================================\n");

    // Create a temporary table file for demonstration
    let db_path = "demo.dat";

    let schema = Schema::builder()
        .column("id", DataType::Integer)
        .column("name", DataType::Char(24))
        .column("active", DataType::Boolean)
        .build_arc()?;
    println!("Schema: {} ({} bytes per row)", schema, schema.byte_size());

    // Small pages so the demo spills onto more than one
    let config = StorageConfig::new(256)?;
    let file = HeapFile::open(db_path, schema.clone(), &config)?;
    println!("Opened heap file {} (table id {})\n", file.path().display(), file.table_id());

    let pool = BufferPool::new();
    let tid = TransactionId::new();

    let names = [
        "Hello, World!",
        "This is heapdb",
        "A heap file in Rust",
        "Fixed-width rows",
        "Bitmap-slotted pages",
        "Flushed by the pool",
        "Read back by a scan",
        "Deleted by record id",
        "Still here",
    ];

    let mut inserted = Vec::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        let mut tuple = Tuple::with_values(
            schema.clone(),
            vec![
                Value::Integer(i as i32),
                Value::from(*name),
                Value::Boolean(i % 2 == 0),
            ],
        )?;
        pool.insert_tuple(tid, &file, &mut tuple)?;
        if let Some(rid) = tuple.record_id() {
            println!("Inserted tuple at {}", rid);
        }
        inserted.push(tuple);
    }

    pool.delete_tuple(tid, &file, &inserted[3])?;
    println!("\nDeleted tuple {}", inserted[3].field(0)?.map_or("?".into(), |v| v.to_string()));

    let flushed = pool.flush_pages(&file)?;
    println!("Flushed {} page(s), file now has {} page(s)", flushed, file.num_pages()?);

    // Scan through a fresh pool so every page comes from disk
    let fresh = BufferPool::new();
    println!("\nScanning {}:", file.path().display());
    for tuple in file.iter(tid, &fresh) {
        print!("  {}", tuple?);
    }

    // Clean up
    drop(file);
    std::fs::remove_file(db_path).ok();
    println!("\nDemo completed successfully!");
    Ok(())
}
