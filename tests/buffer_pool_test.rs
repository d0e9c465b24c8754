//! Integration tests for the buffer pool manager and its page guards

use std::sync::Arc;

use arbor::buffer::BufferPoolManager;
use arbor::common::{ArborError, PageId, PAGE_SIZE};
use arbor::storage::disk::DiskManager;

use tempfile::NamedTempFile;

fn create_bpm(pool_size: usize) -> (Arc<BufferPoolManager>, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let disk_manager = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    let bpm = Arc::new(BufferPoolManager::new(pool_size, 2, disk_manager));
    (bpm, temp_file)
}

#[test]
fn test_new_pages_consume_free_frames() {
    let (bpm, _temp) = create_bpm(5);

    assert_eq!(bpm.free_frame_count(), 5);
    for _ in 0..5 {
        bpm.new_page().unwrap();
    }
    assert_eq!(bpm.free_frame_count(), 0);
}

#[test]
fn test_write_then_read_back() {
    let (bpm, _temp) = create_bpm(10);
    let page_id = bpm.new_page().unwrap();

    {
        let mut guard = bpm.fetch_page_write(page_id).unwrap();
        let data = guard.data_mut();
        data[0] = 11;
        data[PAGE_SIZE - 1] = 22;
    }

    let guard = bpm.fetch_page_read(page_id).unwrap();
    assert_eq!(guard.data()[0], 11);
    assert_eq!(guard.data()[PAGE_SIZE - 1], 22);
}

#[test]
fn test_guard_lifecycle_controls_pins() {
    let (bpm, _temp) = create_bpm(10);
    let page_id = bpm.new_page().unwrap();

    assert_eq!(bpm.get_pin_count(page_id), Some(0));

    let read_a = bpm.fetch_page_read(page_id).unwrap();
    let read_b = bpm.fetch_page_read(page_id).unwrap();
    assert_eq!(bpm.get_pin_count(page_id), Some(2));

    drop(read_a);
    drop(read_b);
    assert_eq!(bpm.get_pin_count(page_id), Some(0));
}

#[test]
fn test_eviction_round_trips_through_disk() {
    let (bpm, _temp) = create_bpm(3);

    let page_ids: Vec<PageId> = (0..3).map(|_| bpm.new_page().unwrap()).collect();
    for (i, &page_id) in page_ids.iter().enumerate() {
        let mut guard = bpm.fetch_page_write(page_id).unwrap();
        guard.data_mut()[0] = i as u8 + 1;
    }

    // Exhaust the pool twice over; older pages must be written back and
    // reloaded on demand.
    let more_ids: Vec<PageId> = (0..3).map(|_| bpm.new_page().unwrap()).collect();
    for &page_id in &more_ids {
        let mut guard = bpm.fetch_page_write(page_id).unwrap();
        guard.data_mut()[0] = 0xAB;
    }

    for (i, &page_id) in page_ids.iter().enumerate() {
        let guard = bpm.fetch_page_read(page_id).unwrap();
        assert_eq!(guard.data()[0], i as u8 + 1, "page {} corrupted", page_id);
    }
}

#[test]
fn test_pinned_pages_block_eviction() {
    let (bpm, _temp) = create_bpm(2);

    let page_id1 = bpm.new_page().unwrap();
    let page_id2 = bpm.new_page().unwrap();

    let _guard1 = bpm.fetch_page_read(page_id1).unwrap();
    let _guard2 = bpm.fetch_page_read(page_id2).unwrap();

    assert!(matches!(bpm.new_page(), Err(ArborError::BufferPoolFull)));
}

#[test]
fn test_delete_page_requires_unpinned() {
    let (bpm, _temp) = create_bpm(10);
    let page_id = bpm.new_page().unwrap();

    {
        let _guard = bpm.fetch_page_write(page_id).unwrap();
        assert!(matches!(
            bpm.delete_page(page_id),
            Err(ArborError::PageStillPinned(_))
        ));
    }

    assert!(bpm.delete_page(page_id).unwrap());
    assert!(!bpm.delete_page(page_id).unwrap());
    assert_eq!(bpm.get_pin_count(page_id), None);
}

#[test]
fn test_flush_all_persists_dirty_pages() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let page_ids: Vec<PageId> = {
        let disk_manager = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(8, 2, disk_manager);

        let ids: Vec<PageId> = (0..4).map(|_| bpm.new_page().unwrap()).collect();
        for &page_id in &ids {
            let mut guard = bpm.fetch_page_write(page_id).unwrap();
            guard.data_mut()[7] = page_id.as_u32() as u8;
        }
        bpm.flush_all_pages().unwrap();
        ids
    };

    let disk_manager = Arc::new(DiskManager::new(&path).unwrap());
    let bpm = BufferPoolManager::new(8, 2, disk_manager);
    for &page_id in &page_ids {
        let guard = bpm.fetch_page_read(page_id).unwrap();
        assert_eq!(guard.data()[7], page_id.as_u32() as u8);
    }
}
