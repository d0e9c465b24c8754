//! Integration tests for the disk manager

use arbor::common::{PageId, PAGE_SIZE};
use arbor::storage::disk::DiskManager;

use tempfile::NamedTempFile;

#[test]
fn test_fresh_file_has_header_page() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = DiskManager::new(temp_file.path()).unwrap();

    assert_eq!(dm.get_num_pages(), 1);

    // The first allocation lands after the reserved header page.
    let page_id = dm.allocate_page().unwrap();
    assert_eq!(page_id, PageId::new(1));
}

#[test]
fn test_read_write_round_trip() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = DiskManager::new(temp_file.path()).unwrap();

    let page_id = dm.allocate_page().unwrap();

    let mut data = [0u8; PAGE_SIZE];
    data[0] = 1;
    data[2048] = 2;
    data[PAGE_SIZE - 1] = 3;
    dm.write_page(page_id, &data).unwrap();

    let mut out = [0u8; PAGE_SIZE];
    dm.read_page(page_id, &mut out).unwrap();
    assert_eq!(out[0], 1);
    assert_eq!(out[2048], 2);
    assert_eq!(out[PAGE_SIZE - 1], 3);
}

#[test]
fn test_read_past_end_is_zeroed() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = DiskManager::new(temp_file.path()).unwrap();

    let mut out = [0xFFu8; PAGE_SIZE];
    dm.read_page(PageId::new(10), &mut out).unwrap();
    assert!(out.iter().all(|&b| b == 0));
}

#[test]
fn test_deallocated_page_is_reused() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = DiskManager::new(temp_file.path()).unwrap();

    let a = dm.allocate_page().unwrap();
    let b = dm.allocate_page().unwrap();
    assert_ne!(a, b);

    dm.deallocate_page(a).unwrap();
    assert_eq!(dm.allocate_page().unwrap(), a);
}

#[test]
fn test_allocation_zeroes_recycled_pages() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = DiskManager::new(temp_file.path()).unwrap();

    let page_id = dm.allocate_page().unwrap();
    dm.write_page(page_id, &[0xEEu8; PAGE_SIZE]).unwrap();
    dm.deallocate_page(page_id).unwrap();

    let recycled = dm.allocate_page().unwrap();
    assert_eq!(recycled, page_id);

    let mut out = [0u8; PAGE_SIZE];
    dm.read_page(recycled, &mut out).unwrap();
    assert!(out.iter().all(|&b| b == 0));
}

#[test]
fn test_reopen_preserves_pages() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let page_id = {
        let dm = DiskManager::new(&path).unwrap();
        let page_id = dm.allocate_page().unwrap();
        let mut data = [0u8; PAGE_SIZE];
        data[9] = 99;
        dm.write_page(page_id, &data).unwrap();
        dm.sync().unwrap();
        page_id
    };

    let dm = DiskManager::new(&path).unwrap();
    assert_eq!(dm.get_num_pages(), 2);

    let mut out = [0u8; PAGE_SIZE];
    dm.read_page(page_id, &mut out).unwrap();
    assert_eq!(out[9], 99);
}

#[test]
fn test_io_counters() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = DiskManager::new(temp_file.path()).unwrap();

    let writes_before = dm.get_num_writes();
    let page_id = dm.allocate_page().unwrap();
    assert!(dm.get_num_writes() > writes_before);

    let reads_before = dm.get_num_reads();
    let mut out = [0u8; PAGE_SIZE];
    dm.read_page(page_id, &mut out).unwrap();
    assert_eq!(dm.get_num_reads(), reads_before + 1);
}

#[test]
fn test_corrupt_header_is_rejected() {
    let temp_file = NamedTempFile::new().unwrap();
    std::fs::write(temp_file.path(), vec![0x5Au8; PAGE_SIZE]).unwrap();

    assert!(DiskManager::new(temp_file.path()).is_err());
}
