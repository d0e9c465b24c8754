//! Arbor - a disk-oriented B+tree index engine in Rust
//!
//! The crate implements the storage core of an index: pages live in a
//! single database file, a buffer pool caches them in memory under an
//! LRU-K replacement policy, and a B+tree organizes fixed-size keys over
//! those pages.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): disk I/O and the well-known pages
//!   - `DiskManager`: page-granular reads/writes and allocation
//!   - `DiskScheduler`: background worker thread for disk requests
//!   - `HeaderPage`: the page-0 registry of index name -> root page id
//!
//! - **Buffer Pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: fetches pages into frames and caches them
//!   - `LruKReplacer`: LRU-K page replacement policy
//!   - `FrameHeader`: per-frame pin count, dirty bit, and data
//!   - `ReadPageGuard`/`WritePageGuard`: RAII pinning with dirty tracking
//!
//! - **Index** (`index`): the B+tree itself
//!   - `BPlusTree`: lookup, insert with splits, delete with
//!     coalesce/redistribute, root maintenance
//!   - `LeafPage`/`InternalPage`: slotted in-page layouts
//!   - `BTreeIterator`: in-order scan over the leaf chain
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use arbor::buffer::BufferPoolManager;
//! use arbor::index::{BPlusTree, IndexKey, Int64Comparator};
//! use arbor::storage::disk::DiskManager;
//! use arbor::common::{PageId, RecordId, SlotId};
//!
//! let disk_manager = Arc::new(DiskManager::new("test.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(64, 2, disk_manager));
//!
//! let mut tree = BPlusTree::new("orders_pk", bpm, Int64Comparator, 64, 64);
//! let key = IndexKey::from_i64(42);
//! tree.insert(&key, RecordId::new(PageId::new(3), SlotId::new(0))).unwrap();
//! assert!(tree.get_value(&key).unwrap().is_some());
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{ArborError, PageId, RecordId, Result, SlotId};
