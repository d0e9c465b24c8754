use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, RecordId, Result};

use super::index_key::IndexKey;
use super::leaf_page::LeafPageRef;

/// Forward iterator over a tree's leaf chain.
///
/// Between calls the iterator remembers only a page id and a slot index;
/// each `next_entry` call pins the current leaf just long enough to read
/// one slot (or hop to the right sibling), so at most one frame is pinned
/// at any moment and an exhausted iterator pins nothing.
pub struct BTreeIterator {
    bpm: Arc<BufferPoolManager>,
    current_page_id: Option<PageId>,
    index: usize,
}

impl BTreeIterator {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, page_id: PageId, index: usize) -> Self {
        Self {
            bpm,
            current_page_id: Some(page_id),
            index,
        }
    }

    pub(crate) fn exhausted(bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            bpm,
            current_page_id: None,
            index: 0,
        }
    }

    /// True once the iterator has moved past the last slot of the
    /// rightmost leaf (or was created on an empty tree).
    pub fn is_exhausted(&self) -> bool {
        self.current_page_id.is_none()
    }

    pub fn next_entry(&mut self) -> Result<Option<(IndexKey, RecordId)>> {
        while let Some(page_id) = self.current_page_id {
            let next_page = {
                let guard = self.bpm.fetch_page_read(page_id)?;
                let leaf = LeafPageRef::new(guard.data());

                if self.index < leaf.size() {
                    let entry = (leaf.key_at(self.index), leaf.record_at(self.index));
                    self.index += 1;
                    return Ok(Some(entry));
                }

                leaf.next_page_id()
            };

            self.current_page_id = next_page.is_valid().then_some(next_page);
            self.index = 0;
        }

        Ok(None)
    }
}

impl Iterator for BTreeIterator {
    type Item = Result<(IndexKey, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
