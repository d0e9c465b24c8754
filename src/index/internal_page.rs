use std::cmp::Ordering;

use crate::common::{PageId, PAGE_SIZE};

use super::index_key::{IndexKey, KEY_SIZE};
use super::key_comparator::KeyComparator;
use super::tree_page::{self, PageKind, COMMON_HEADER_SIZE};

pub(crate) const INTERNAL_HEADER_SIZE: usize = COMMON_HEADER_SIZE;

const CHILD_SIZE: usize = 4;
pub(crate) const INTERNAL_SLOT_SIZE: usize = KEY_SIZE + CHILD_SIZE;

/// Largest number of key/child slots an internal page can hold
pub const INTERNAL_PAGE_CAPACITY: usize = (PAGE_SIZE - INTERNAL_HEADER_SIZE) / INTERNAL_SLOT_SIZE;

fn slot_offset(index: usize) -> usize {
    INTERNAL_HEADER_SIZE + index * INTERNAL_SLOT_SIZE
}

fn key_at(data: &[u8], index: usize) -> IndexKey {
    let offset = slot_offset(index);
    IndexKey::from_bytes(&data[offset..offset + KEY_SIZE])
}

fn child_at(data: &[u8], index: usize) -> PageId {
    let offset = slot_offset(index) + KEY_SIZE;
    PageId::new(u32::from_le_bytes(
        data[offset..offset + CHILD_SIZE].try_into().unwrap(),
    ))
}

/// Child to follow for `key`: the largest slot in [1, size) whose key is
/// <= `key`, falling back to slot 0.
fn lookup<C: KeyComparator>(data: &[u8], key: &IndexKey, comparator: &C) -> PageId {
    let mut l = 1;
    let mut r = tree_page::size(data);
    while l < r {
        let mid = (l + r) / 2;
        if comparator.compare(key_at(data, mid).as_bytes(), key.as_bytes()) != Ordering::Greater {
            l = mid + 1;
        } else {
            r = mid;
        }
    }
    child_at(data, l - 1)
}

/// Smallest slot in [1, size) whose key is >= `key`; `size` if none is.
fn key_index<C: KeyComparator>(data: &[u8], key: &IndexKey, comparator: &C) -> usize {
    let mut l = 1;
    let mut r = tree_page::size(data);
    while l < r {
        let mid = (l + r) / 2;
        if comparator.compare(key_at(data, mid).as_bytes(), key.as_bytes()) == Ordering::Less {
            l = mid + 1;
        } else {
            r = mid;
        }
    }
    r
}

/// Mutable view of an internal page.
///
/// Slot 0 holds only a child pointer; its key bytes are never read. For
/// every later slot `i`, the key is the smallest key reachable through
/// that slot's child, so a page of size `n` has `n` children separated by
/// `n - 1` meaningful keys.
pub struct InternalPage<'a> {
    data: &'a mut [u8],
}

impl<'a> InternalPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data }
    }

    pub fn init(&mut self, page_id: PageId, parent_id: PageId, max_size: usize) {
        assert!(max_size <= INTERNAL_PAGE_CAPACITY);
        self.data.fill(0);
        tree_page::set_page_kind(self.data, PageKind::Internal);
        tree_page::set_size(self.data, 0);
        tree_page::set_max_size(self.data, max_size);
        tree_page::set_page_id(self.data, page_id);
        tree_page::set_parent_page_id(self.data, parent_id);
    }

    pub fn page_id(&self) -> PageId {
        tree_page::page_id(self.data)
    }

    pub fn parent_page_id(&self) -> PageId {
        tree_page::parent_page_id(self.data)
    }

    pub fn set_parent_page_id(&mut self, parent: PageId) {
        tree_page::set_parent_page_id(self.data, parent);
    }

    pub fn size(&self) -> usize {
        tree_page::size(self.data)
    }

    pub fn set_size(&mut self, size: usize) {
        tree_page::set_size(self.data, size);
    }

    pub fn max_size(&self) -> usize {
        tree_page::max_size(self.data)
    }

    pub fn min_size(&self) -> usize {
        tree_page::min_size(self.data)
    }

    pub fn key_at(&self, index: usize) -> IndexKey {
        debug_assert!(index < self.size());
        key_at(self.data, index)
    }

    pub fn child_at(&self, index: usize) -> PageId {
        debug_assert!(index < self.size());
        child_at(self.data, index)
    }

    pub fn set_key_at(&mut self, index: usize, key: &IndexKey) {
        let offset = slot_offset(index);
        self.data[offset..offset + KEY_SIZE].copy_from_slice(key.as_bytes());
    }

    pub fn set_child_at(&mut self, index: usize, child: PageId) {
        let offset = slot_offset(index) + KEY_SIZE;
        self.data[offset..offset + CHILD_SIZE].copy_from_slice(&child.as_u32().to_le_bytes());
    }

    pub fn lookup<C: KeyComparator>(&self, key: &IndexKey, comparator: &C) -> PageId {
        lookup(self.data, key, comparator)
    }

    pub fn key_index<C: KeyComparator>(&self, key: &IndexKey, comparator: &C) -> usize {
        key_index(self.data, key, comparator)
    }

    /// Inserts `(key, child)` in key order. The caller guarantees the page
    /// is not full; slot 0 is never displaced.
    pub fn insert<C: KeyComparator>(&mut self, key: &IndexKey, child: PageId, comparator: &C) {
        let size = self.size();
        debug_assert!(size < self.max_size());
        let index = self.key_index(key, comparator);
        self.data
            .copy_within(slot_offset(index)..slot_offset(size), slot_offset(index + 1));
        self.set_key_at(index, key);
        self.set_child_at(index, child);
        self.set_size(size + 1);
    }

    /// Removes the slot holding exactly `key` from [1, size).
    pub fn delete<C: KeyComparator>(&mut self, key: &IndexKey, comparator: &C) -> bool {
        let size = self.size();
        let index = self.key_index(key, comparator);
        if index >= size
            || comparator.compare(self.key_at(index).as_bytes(), key.as_bytes()) != Ordering::Equal
        {
            return false;
        }
        self.data
            .copy_within(slot_offset(index + 1)..slot_offset(size), slot_offset(index));
        self.set_size(size - 1);
        true
    }

    /// Drops slot 0; the old slot 1 becomes the new child-only slot.
    pub fn delete_first(&mut self) {
        let size = self.size();
        self.data
            .copy_within(slot_offset(1)..slot_offset(size), slot_offset(0));
        self.set_size(size - 1);
    }

    /// Shifts every slot right and installs `child` as the new slot-0
    /// child, with `key` as the separator above the displaced slot.
    pub fn insert_first(&mut self, key: &IndexKey, child: PageId) {
        let size = self.size();
        self.data
            .copy_within(slot_offset(0)..slot_offset(size), slot_offset(1));
        self.set_child_at(0, child);
        self.set_key_at(1, key);
        self.set_size(size + 1);
    }

    /// Splits a full page while logically inserting `(key, new_child)`:
    /// the ordered union of the current slots and the new entry is divided
    /// at its midpoint, the lower half staying here and the upper half
    /// moving into `sibling` (freshly initialized, slot 0 first).
    ///
    /// Returns the children that now live in `sibling`; the caller
    /// rewrites their parent pointers and promotes `sibling`'s slot-0 key.
    pub fn split_into<C: KeyComparator>(
        &mut self,
        key: &IndexKey,
        new_child: PageId,
        sibling: &mut InternalPage<'_>,
        comparator: &C,
    ) -> Vec<PageId> {
        let size = self.size();
        debug_assert_eq!(size, self.max_size());

        let mut scratch: Vec<(IndexKey, PageId)> = Vec::with_capacity(size + 1);
        scratch.push((key_at(self.data, 0), self.child_at(0)));
        let mut placed = false;
        for i in 1..size {
            let k = self.key_at(i);
            if !placed
                && comparator.compare(key.as_bytes(), k.as_bytes()) == Ordering::Less
            {
                scratch.push((*key, new_child));
                placed = true;
            }
            scratch.push((k, self.child_at(i)));
        }
        if !placed {
            scratch.push((*key, new_child));
        }

        let mid = (size + 1) / 2;
        for (i, (k, c)) in scratch[..mid].iter().enumerate() {
            self.set_key_at(i, k);
            self.set_child_at(i, *c);
        }
        self.set_size(mid);

        let mut moved = Vec::with_capacity(scratch.len() - mid);
        for (j, (k, c)) in scratch[mid..].iter().enumerate() {
            sibling.set_key_at(j, k);
            sibling.set_child_at(j, *c);
            moved.push(*c);
        }
        sibling.set_size(scratch.len() - mid);

        moved
    }

    /// Absorbs `right` (this page's right sibling): the separator from the
    /// parent comes down as the key above `right`'s slot-0 child, followed
    /// by `right`'s remaining slots. Leaves `right` empty and returns the
    /// adopted children for re-parenting.
    pub fn merge_from(&mut self, separator: &IndexKey, right: &mut InternalPage<'_>) -> Vec<PageId> {
        let size = self.size();
        let right_size = right.size();
        assert!(size + right_size <= self.max_size());

        let mut adopted = Vec::with_capacity(right_size);

        self.set_key_at(size, separator);
        self.set_child_at(size, right.child_at(0));
        adopted.push(right.child_at(0));

        for j in 1..right_size {
            self.set_key_at(size + j, &right.key_at(j));
            self.set_child_at(size + j, right.child_at(j));
            adopted.push(right.child_at(j));
        }

        self.set_size(size + right_size);
        right.set_size(0);

        adopted
    }

    /// Finds the rebalancing partner for `child_id`: the left sibling when
    /// one exists, otherwise the right one. Returns the sibling's page id,
    /// the parent separator between the two, and whether the sibling
    /// precedes the child.
    pub fn sibling_of(&self, child_id: PageId) -> (PageId, IndexKey, bool) {
        let size = self.size();
        let index = (0..size)
            .find(|&i| self.child_at(i) == child_id)
            .expect("child not present in parent");
        if index >= 1 {
            (self.child_at(index - 1), self.key_at(index), true)
        } else {
            (self.child_at(1), self.key_at(1), false)
        }
    }
}

/// Read-only view of an internal page
pub struct InternalPageRef<'a> {
    data: &'a [u8],
}

impl<'a> InternalPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn page_id(&self) -> PageId {
        tree_page::page_id(self.data)
    }

    pub fn parent_page_id(&self) -> PageId {
        tree_page::parent_page_id(self.data)
    }

    pub fn size(&self) -> usize {
        tree_page::size(self.data)
    }

    pub fn max_size(&self) -> usize {
        tree_page::max_size(self.data)
    }

    pub fn key_at(&self, index: usize) -> IndexKey {
        debug_assert!(index < self.size());
        key_at(self.data, index)
    }

    pub fn child_at(&self, index: usize) -> PageId {
        debug_assert!(index < self.size());
        child_at(self.data, index)
    }

    pub fn lookup<C: KeyComparator>(&self, key: &IndexKey, comparator: &C) -> PageId {
        lookup(self.data, key, comparator)
    }

    pub fn key_index<C: KeyComparator>(&self, key: &IndexKey, comparator: &C) -> usize {
        key_index(self.data, key, comparator)
    }

    /// True iff `key` appears as a separator in [1, size).
    pub fn contains<C: KeyComparator>(&self, key: &IndexKey, comparator: &C) -> bool {
        let index = self.key_index(key, comparator);
        index < self.size()
            && comparator.compare(self.key_at(index).as_bytes(), key.as_bytes()) == Ordering::Equal
    }

    /// See [`InternalPage::sibling_of`].
    pub fn sibling_of(&self, child_id: PageId) -> (PageId, IndexKey, bool) {
        let size = self.size();
        let index = (0..size)
            .find(|&i| self.child_at(i) == child_id)
            .expect("child not present in parent");
        if index >= 1 {
            (self.child_at(index - 1), self.key_at(index), true)
        } else {
            (self.child_at(1), self.key_at(1), false)
        }
    }
}
