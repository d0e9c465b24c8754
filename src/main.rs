use std::sync::Arc;

use arbor::buffer::BufferPoolManager;
use arbor::common::{PageId, RecordId, SlotId};
use arbor::index::{BPlusTree, IndexKey, Int64Comparator};
use arbor::storage::disk::DiskManager;

fn main() {
    println!("Arbor - a disk-oriented B+tree index engine");
    println!("===========================================\n");

    let db_path = "demo.db";

    let disk_manager = Arc::new(DiskManager::new(db_path).expect("Failed to create disk manager"));
    println!("Created disk manager for: {}", db_path);

    let bpm = Arc::new(BufferPoolManager::new(16, 2, disk_manager));
    println!("Created buffer pool manager with 16 frames\n");

    // Small fanout so a handful of keys already builds a multi-level tree
    let mut tree = BPlusTree::new("demo_index", bpm, Int64Comparator, 4, 4);

    for value in [5i64, 4, 3, 2, 1, 10, 9, 8, 7, 6] {
        let key = IndexKey::from_i64(value);
        let record = RecordId::new(PageId::new(value as u32), SlotId::new(0));
        tree.insert(&key, record).expect("insert failed");
        println!("Inserted key {}", value);
    }

    println!("\nRoot page: {}", tree.root_page_id());

    let probe = IndexKey::from_i64(7);
    match tree.get_value(&probe).expect("lookup failed") {
        Some(record) => println!("Lookup 7 -> {:?}", record),
        None => println!("Lookup 7 -> not found"),
    }

    print!("\nIn-order scan:");
    let mut iter = tree.iter().expect("iterator failed");
    while let Some((key, _record)) = iter.next_entry().expect("scan failed") {
        print!(" {}", key.to_i64());
    }
    println!();

    for value in [2i64, 4, 6, 8, 10] {
        tree.remove(&IndexKey::from_i64(value)).expect("remove failed");
    }

    print!("\nAfter removing the even keys:");
    let mut iter = tree.iter().expect("iterator failed");
    while let Some((key, _record)) = iter.next_entry().expect("scan failed") {
        print!(" {}", key.to_i64());
    }
    println!();

    tree.check_integrity().expect("tree invariants violated");
    println!("\nIntegrity check passed");

    std::fs::remove_file(db_path).ok();
    println!("Demo completed successfully!");
}
