use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{ArborError, FrameId, PageId, Result, INVALID_PAGE_ID, PAGE_SIZE};
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{FrameHeader, LruKReplacer, ReadPageGuard, WritePageGuard};

/// Shared state the pool and its page guards operate on.
pub(crate) struct BufferPoolState {
    pub(crate) frames: Vec<Arc<FrameHeader>>,
    /// Maps resident page ids to their frame
    pub(crate) page_table: Mutex<HashMap<PageId, FrameId>>,
    /// Frames not currently holding any page
    pub(crate) free_list: Mutex<VecDeque<FrameId>>,
    pub(crate) replacer: LruKReplacer,
}

impl BufferPoolState {
    /// Releases one pin on `page_id`, marking the frame dirty if requested.
    /// When the last pin goes away the frame becomes evictable.
    pub(crate) fn unpin(&self, page_id: PageId, is_dirty: bool) {
        let page_table = self.page_table.lock();
        if let Some(&frame_id) = page_table.get(&page_id) {
            let frame = &self.frames[frame_id.as_usize()];
            if is_dirty {
                frame.set_dirty(true);
            }
            if frame.unpin() == Some(0) {
                self.replacer.set_evictable(frame_id, true);
            }
        }
    }
}

/// BufferPoolManager caches disk pages in a fixed set of in-memory frames.
///
/// Fetching a page pins its frame and hands back an RAII guard; dropping
/// the guard unpins it. When no free frame is available the LRU-K
/// replacer picks a victim, which is written back first if dirty.
pub struct BufferPoolManager {
    pool_size: usize,
    state: Arc<BufferPoolState>,
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, k: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(FrameHeader::new(frame_id)));
            free_list.push_back(frame_id);
        }

        let state = Arc::new(BufferPoolState {
            frames,
            page_table: Mutex::new(HashMap::new()),
            free_list: Mutex::new(free_list),
            replacer: LruKReplacer::new(k, pool_size),
        });

        Self {
            pool_size,
            state,
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Allocates a fresh page on disk and installs it in a frame.
    /// The page starts unpinned; fetch a guard to work with it.
    pub fn new_page(&self) -> Result<PageId> {
        let frame_id = self.acquire_frame()?;
        let frame = &self.state.frames[frame_id.as_usize()];

        let page_id = self.disk_scheduler.disk_manager().allocate_page()?;

        frame.reset();
        frame.set_page_id(page_id);

        self.state.page_table.lock().insert(page_id, frame_id);
        self.state.replacer.record_access(frame_id);
        self.state.replacer.set_evictable(frame_id, true);

        Ok(page_id)
    }

    /// Removes a page from the pool and frees it on disk.
    /// Fails if the page is still pinned; returns false if it is not resident.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut page_table = self.state.page_table.lock();

        let Some(frame_id) = page_table.remove(&page_id) else {
            return Ok(false);
        };

        let frame = &self.state.frames[frame_id.as_usize()];
        if frame.pin_count() > 0 {
            page_table.insert(page_id, frame_id);
            return Err(ArborError::PageStillPinned(page_id));
        }

        frame.reset();
        self.state.replacer.remove(frame_id);
        self.state.free_list.lock().push_back(frame_id);

        self.disk_scheduler
            .disk_manager()
            .deallocate_page(page_id)?;

        Ok(true)
    }

    /// Fetches a page for read access, pinning it for the guard's lifetime.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<ReadPageGuard> {
        let frame = self.fetch_page(page_id)?;
        // Safety: the guard holds an Arc to the frame, which therefore
        // outlives the borrowed lock guard inside it.
        Ok(unsafe { ReadPageGuard::new(page_id, frame, Arc::clone(&self.state)) })
    }

    /// Fetches a page for write access, pinning it for the guard's lifetime.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<WritePageGuard> {
        let frame = self.fetch_page(page_id)?;
        // Safety: as in fetch_page_read.
        Ok(unsafe { WritePageGuard::new(page_id, frame, Arc::clone(&self.state)) })
    }

    /// Writes a page's current contents to disk and clears its dirty bit.
    /// Returns false if the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Err(ArborError::InvalidPageId(page_id));
        }

        let page_table = self.state.page_table.lock();
        let Some(&frame_id) = page_table.get(&page_id) else {
            return Ok(false);
        };

        let frame = &self.state.frames[frame_id.as_usize()];
        let mut data = [0u8; PAGE_SIZE];
        frame.save_to(&mut data);

        self.disk_scheduler.schedule_write_sync(page_id, &data)?;
        frame.set_dirty(false);

        Ok(true)
    }

    /// Writes every dirty resident page to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let page_table = self.state.page_table.lock();

        for (&page_id, &frame_id) in page_table.iter() {
            let frame = &self.state.frames[frame_id.as_usize()];
            if frame.is_dirty() {
                let mut data = [0u8; PAGE_SIZE];
                frame.save_to(&mut data);
                self.disk_scheduler.schedule_write_sync(page_id, &data)?;
                frame.set_dirty(false);
            }
        }

        Ok(())
    }

    /// Returns the pin count of a resident page.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let page_table = self.state.page_table.lock();
        page_table
            .get(&page_id)
            .map(|&frame_id| self.state.frames[frame_id.as_usize()].pin_count())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.free_list.lock().len()
    }

    /// Pins the page into a frame, loading it from disk if necessary,
    /// and returns the frame.
    fn fetch_page(&self, page_id: PageId) -> Result<Arc<FrameHeader>> {
        if page_id == INVALID_PAGE_ID {
            return Err(ArborError::InvalidPageId(page_id));
        }

        // Fast path: already resident.
        {
            let page_table = self.state.page_table.lock();
            if let Some(&frame_id) = page_table.get(&page_id) {
                let frame = &self.state.frames[frame_id.as_usize()];
                frame.pin();
                self.state.replacer.record_access(frame_id);
                self.state.replacer.set_evictable(frame_id, false);
                return Ok(Arc::clone(frame));
            }
        }

        let frame_id = self.acquire_frame()?;
        let frame = &self.state.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        self.disk_scheduler.schedule_read_sync(page_id, &mut data)?;

        frame.set_page_id(page_id);
        frame.load(&data);
        frame.set_dirty(false);
        frame.pin();

        self.state.page_table.lock().insert(page_id, frame_id);
        self.state.replacer.record_access(frame_id);
        self.state.replacer.set_evictable(frame_id, false);

        Ok(Arc::clone(frame))
    }

    /// Claims an empty frame, evicting a resident page if the free list
    /// is exhausted.
    fn acquire_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.state.free_list.lock().pop_front() {
            return Ok(frame_id);
        }

        let Some(frame_id) = self.state.replacer.evict() else {
            return Err(ArborError::BufferPoolFull);
        };

        let frame = &self.state.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            let mut data = [0u8; PAGE_SIZE];
            frame.save_to(&mut data);
            self.disk_scheduler
                .schedule_write_sync(old_page_id, &data)?;
        }

        self.state.page_table.lock().remove(&old_page_id);
        frame.reset();

        Ok(frame_id)
    }
}
