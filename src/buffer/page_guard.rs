use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::buffer_pool_manager::BufferPoolState;
use super::FrameHeader;

type PageData = Box<[u8; PAGE_SIZE]>;

/// RAII guard for read-only access to a pinned page.
///
/// Holds the frame's read lock for its whole lifetime and releases the
/// pin (clean) when dropped.
pub struct ReadPageGuard {
    page_id: PageId,
    /// Keeps the frame alive for as long as the borrowed lock guard below
    _frame: Arc<FrameHeader>,
    state: Arc<BufferPoolState>,
    data: Option<RwLockReadGuard<'static, PageData>>,
}

impl ReadPageGuard {
    /// # Safety
    /// The lock guard borrows from `frame`; storing both together is sound
    /// because the `Arc` keeps the frame alive until the lock guard has
    /// been dropped.
    pub(crate) unsafe fn new(
        page_id: PageId,
        frame: Arc<FrameHeader>,
        state: Arc<BufferPoolState>,
    ) -> Self {
        let data = frame.data.read();
        let data: RwLockReadGuard<'static, PageData> = std::mem::transmute(data);

        Self {
            page_id,
            _frame: frame,
            state,
            data: Some(data),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data.as_ref().unwrap()[..]
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        // Release the lock before unpinning.
        self.data.take();
        self.state.unpin(self.page_id, false);
    }
}

/// RAII guard for exclusive access to a pinned page.
///
/// The frame is marked dirty the first time the data is mutably borrowed;
/// dropping the guard unpins the page with that dirty flag, so a write
/// guard that only read releases the page clean.
pub struct WritePageGuard {
    page_id: PageId,
    _frame: Arc<FrameHeader>,
    state: Arc<BufferPoolState>,
    data: Option<RwLockWriteGuard<'static, PageData>>,
    is_dirty: bool,
}

impl WritePageGuard {
    /// # Safety
    /// Same argument as [`ReadPageGuard::new`].
    pub(crate) unsafe fn new(
        page_id: PageId,
        frame: Arc<FrameHeader>,
        state: Arc<BufferPoolState>,
    ) -> Self {
        let data = frame.data.write();
        let data: RwLockWriteGuard<'static, PageData> = std::mem::transmute(data);

        Self {
            page_id,
            _frame: frame,
            state,
            data: Some(data),
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data.as_ref().unwrap()[..]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.is_dirty = true;
        &mut self.data.as_mut().unwrap()[..]
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        self.data.take();
        self.state.unpin(self.page_id, self.is_dirty);
    }
}
