use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{
    ArborError, PageId, RecordId, Result, SlotId, HEADER_PAGE_ID, INVALID_PAGE_ID,
};
use crate::storage::page::{HeaderPage, HeaderPageRef};

use super::btree_iterator::BTreeIterator;
use super::index_key::IndexKey;
use super::internal_page::{InternalPage, InternalPageRef, INTERNAL_PAGE_CAPACITY};
use super::key_comparator::KeyComparator;
use super::leaf_page::{LeafPage, LeafPageRef, LEAF_PAGE_CAPACITY};
use super::tree_page::{self, PageKind, TreePage, TreePageRef};

/// A disk-resident B+tree index over fixed-size keys.
///
/// Pages are reached through the buffer pool and edited in place; leaves
/// hold `(key, record id)` slots and are chained left to right, internal
/// pages hold separator keys between child pointers. Inserts split full
/// pages bottom-up, deletes re-merge or redistribute underflowing pages,
/// and the root page id is mirrored into the header page whenever it
/// changes.
///
/// The tree itself performs no latching: mutating operations take
/// `&mut self` and concurrent use requires external synchronization.
pub struct BPlusTree<C: KeyComparator> {
    index_name: String,
    root_page_id: PageId,
    bpm: Arc<BufferPoolManager>,
    comparator: C,
    leaf_max_size: usize,
    internal_max_size: usize,
}

impl<C: KeyComparator> BPlusTree<C> {
    /// Creates an empty tree. No pages are allocated until the first
    /// insert promotes a root.
    pub fn new(
        index_name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        comparator: C,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Self {
        // Leaves need one transient slot of headroom past max_size for the
        // insert that triggers a split.
        assert!((3..LEAF_PAGE_CAPACITY).contains(&leaf_max_size));
        assert!((3..=INTERNAL_PAGE_CAPACITY).contains(&internal_max_size));
        Self {
            index_name: index_name.into(),
            root_page_id: INVALID_PAGE_ID,
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
        }
    }

    /// Opens a tree previously registered in the header page.
    pub fn open(
        index_name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        comparator: C,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self> {
        let index_name = index_name.into();
        let root_page_id = {
            let guard = bpm.fetch_page_read(HEADER_PAGE_ID)?;
            let header = HeaderPageRef::new(guard.data());
            header
                .get_root_id(&index_name)
                .ok_or_else(|| ArborError::IndexNotFound(index_name.clone()))?
        };
        let mut tree = Self::new(index_name, bpm, comparator, leaf_max_size, internal_max_size);
        tree.root_page_id = root_page_id;
        Ok(tree)
    }

    pub fn is_empty(&self) -> bool {
        self.root_page_id == INVALID_PAGE_ID
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    pub fn name(&self) -> &str {
        &self.index_name
    }

    /// Point lookup: the record stored under `key`, if any.
    pub fn get_value(&self, key: &IndexKey) -> Result<Option<RecordId>> {
        let Some(leaf_id) = self.find_leaf(key)? else {
            return Ok(None);
        };

        let guard = self.bpm.fetch_page_read(leaf_id)?;
        let leaf = LeafPageRef::new(guard.data());
        let index = leaf.key_index(key, &self.comparator);
        if index < leaf.size() && self.keys_equal(&leaf.key_at(index), key) {
            Ok(Some(leaf.record_at(index)))
        } else {
            Ok(None)
        }
    }

    /// Inserts `(key, record)`. Returns false (and changes nothing) if the
    /// key is already present.
    pub fn insert(&mut self, key: &IndexKey, record: RecordId) -> Result<bool> {
        let leaf_id = match self.find_leaf(key)? {
            Some(id) => id,
            None => {
                self.start_new_tree()?;
                self.find_leaf(key)?.expect("fresh root must be reachable")
            }
        };

        // Duplicate probe through a read guard keeps the no-op path clean.
        {
            let guard = self.bpm.fetch_page_read(leaf_id)?;
            let leaf = LeafPageRef::new(guard.data());
            if leaf.contains(key, &self.comparator) {
                return Ok(false);
            }
        }

        let needs_split = {
            let mut guard = self.bpm.fetch_page_write(leaf_id)?;
            let mut leaf = LeafPage::new(guard.data_mut());
            let index = leaf.key_index(key, &self.comparator);
            let inserted = leaf.insert_at(index, key, record, &self.comparator);
            debug_assert!(inserted);
            // A coalesced leaf can already sit at max_size, so the insert
            // may land one past it; both cases split.
            leaf.size() >= leaf.max_size()
        };

        if needs_split {
            self.split_leaf(leaf_id)?;
        }

        Ok(true)
    }

    /// Deletes `key`; a missing key is a silent no-op.
    pub fn remove(&mut self, key: &IndexKey) -> Result<()> {
        let Some(leaf_id) = self.find_leaf(key)? else {
            return Ok(());
        };
        self.delete_entry(leaf_id, *key)
    }

    /// Iterator over the whole tree in key order.
    pub fn iter(&self) -> Result<BTreeIterator> {
        if self.is_empty() {
            return Ok(BTreeIterator::exhausted(Arc::clone(&self.bpm)));
        }

        let mut page_id = self.root_page_id;
        loop {
            let next = {
                let guard = self.bpm.fetch_page_read(page_id)?;
                let data = guard.data();
                if tree_page::page_kind(data) == PageKind::Leaf {
                    return Ok(BTreeIterator::new(Arc::clone(&self.bpm), page_id, 0));
                }
                InternalPageRef::new(data).child_at(0)
            };
            page_id = next;
        }
    }

    /// Iterator positioned on `key` exactly; exhausted if the key is absent.
    pub fn iter_from(&self, key: &IndexKey) -> Result<BTreeIterator> {
        let Some(leaf_id) = self.find_leaf(key)? else {
            return Ok(BTreeIterator::exhausted(Arc::clone(&self.bpm)));
        };

        let guard = self.bpm.fetch_page_read(leaf_id)?;
        let leaf = LeafPageRef::new(guard.data());
        for index in 0..leaf.size() {
            if self.keys_equal(&leaf.key_at(index), key) {
                return Ok(BTreeIterator::new(Arc::clone(&self.bpm), leaf_id, index));
            }
        }
        Ok(BTreeIterator::exhausted(Arc::clone(&self.bpm)))
    }

    /// Test harness: inserts whitespace-separated 64-bit integer keys from
    /// a file, deriving each record id from the key.
    pub fn insert_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let contents = std::fs::read_to_string(path)?;
        for token in contents.split_whitespace() {
            if let Ok(value) = token.parse::<i64>() {
                let key = IndexKey::from_i64(value);
                let record = RecordId::new(PageId::new(value as u32), SlotId::new(0));
                self.insert(&key, record)?;
            }
        }
        Ok(())
    }

    /// Test harness: removes whitespace-separated 64-bit integer keys.
    pub fn remove_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let contents = std::fs::read_to_string(path)?;
        for token in contents.split_whitespace() {
            if let Ok(value) = token.parse::<i64>() {
                self.remove(&IndexKey::from_i64(value))?;
            }
        }
        Ok(())
    }

    fn keys_equal(&self, a: &IndexKey, b: &IndexKey) -> bool {
        self.comparator.compare(a.as_bytes(), b.as_bytes()) == Ordering::Equal
    }

    /// Descends from the root to the leaf responsible for `key`.
    /// `None` on an empty tree.
    fn find_leaf(&self, key: &IndexKey) -> Result<Option<PageId>> {
        if self.is_empty() {
            return Ok(None);
        }

        let mut page_id = self.root_page_id;
        loop {
            let next = {
                let guard = self.bpm.fetch_page_read(page_id)?;
                let data = guard.data();
                if tree_page::page_kind(data) == PageKind::Leaf {
                    return Ok(Some(page_id));
                }
                InternalPageRef::new(data).lookup(key, &self.comparator)
            };
            page_id = next;
        }
    }

    /// Allocates the first leaf and makes it the root.
    fn start_new_tree(&mut self) -> Result<()> {
        let page_id = self.bpm.new_page()?;
        {
            let mut guard = self.bpm.fetch_page_write(page_id)?;
            let mut leaf = LeafPage::new(guard.data_mut());
            leaf.init(page_id, INVALID_PAGE_ID, self.leaf_max_size);
        }
        self.root_page_id = page_id;
        self.update_root_page_id(true)
    }

    /// Splits a full leaf and pushes the sibling's first key up.
    fn split_leaf(&mut self, leaf_id: PageId) -> Result<()> {
        let bother_id = self.bpm.new_page()?;

        let separator = {
            let mut leaf_guard = self.bpm.fetch_page_write(leaf_id)?;
            let mut bother_guard = self.bpm.fetch_page_write(bother_id)?;
            let mut leaf = LeafPage::new(leaf_guard.data_mut());
            let mut bother = LeafPage::new(bother_guard.data_mut());
            bother.init(bother_id, INVALID_PAGE_ID, self.leaf_max_size);
            leaf.split_into(&mut bother);
            bother.key_at(0)
        };

        self.insert_in_parent(leaf_id, separator, bother_id)
    }

    /// Links `right_id` (with separator `key`) next to `left_id` in the
    /// tree above them, growing a new root or splitting the parent as
    /// needed.
    fn insert_in_parent(&mut self, left_id: PageId, key: IndexKey, right_id: PageId) -> Result<()> {
        if left_id == self.root_page_id {
            let new_root_id = self.bpm.new_page()?;
            {
                let mut guard = self.bpm.fetch_page_write(new_root_id)?;
                let mut root = InternalPage::new(guard.data_mut());
                root.init(new_root_id, INVALID_PAGE_ID, self.internal_max_size);
                root.set_child_at(0, left_id);
                root.set_key_at(1, &key);
                root.set_child_at(1, right_id);
                root.set_size(2);
            }
            self.set_parent(left_id, new_root_id)?;
            self.set_parent(right_id, new_root_id)?;
            self.root_page_id = new_root_id;
            return self.update_root_page_id(false);
        }

        let parent_id = {
            let guard = self.bpm.fetch_page_read(left_id)?;
            TreePageRef::new(guard.data()).parent_page_id()
        };

        let has_room = {
            let guard = self.bpm.fetch_page_read(parent_id)?;
            let parent = InternalPageRef::new(guard.data());
            parent.size() < parent.max_size()
        };

        if has_room {
            {
                let mut guard = self.bpm.fetch_page_write(parent_id)?;
                let mut parent = InternalPage::new(guard.data_mut());
                parent.insert(&key, right_id, &self.comparator);
            }
            return self.set_parent(right_id, parent_id);
        }

        // Parent is full: split it around the pending entry and recurse.
        let sibling_id = self.bpm.new_page()?;
        let (moved, separator) = {
            let mut parent_guard = self.bpm.fetch_page_write(parent_id)?;
            let mut sibling_guard = self.bpm.fetch_page_write(sibling_id)?;
            let mut parent = InternalPage::new(parent_guard.data_mut());
            let mut sibling = InternalPage::new(sibling_guard.data_mut());
            sibling.init(sibling_id, INVALID_PAGE_ID, self.internal_max_size);
            let moved = parent.split_into(&key, right_id, &mut sibling, &self.comparator);
            (moved, sibling.key_at(0))
        };

        if !moved.contains(&right_id) {
            self.set_parent(right_id, parent_id)?;
        }
        for child in moved {
            self.set_parent(child, sibling_id)?;
        }

        self.insert_in_parent(parent_id, separator, sibling_id)
    }

    /// Deletes `key` from `page_id` and rebalances upward as needed.
    fn delete_entry(&mut self, page_id: PageId, key: IndexKey) -> Result<()> {
        // Presence probe first so a miss leaves the page clean.
        let present = {
            let guard = self.bpm.fetch_page_read(page_id)?;
            let data = guard.data();
            match tree_page::page_kind(data) {
                PageKind::Leaf => LeafPageRef::new(data).contains(&key, &self.comparator),
                PageKind::Internal => InternalPageRef::new(data).contains(&key, &self.comparator),
            }
        };
        if !present {
            return Ok(());
        }

        let (is_leaf, size, min_size, max_size, parent_id) = {
            let mut guard = self.bpm.fetch_page_write(page_id)?;
            {
                let data = guard.data_mut();
                let deleted = match tree_page::page_kind(data) {
                    PageKind::Leaf => LeafPage::new(data).delete(&key, &self.comparator),
                    PageKind::Internal => InternalPage::new(data).delete(&key, &self.comparator),
                };
                debug_assert!(deleted);
            }
            let view = TreePageRef::new(guard.data());
            (
                view.is_leaf(),
                view.size(),
                view.min_size(),
                view.max_size(),
                view.parent_page_id(),
            )
        };

        if page_id == self.root_page_id {
            return self.adjust_root(page_id);
        }

        if size >= min_size {
            return Ok(());
        }

        // Underflow: pick a sibling and either coalesce or redistribute.
        let (sibling_id, separator, is_predecessor) = {
            let guard = self.bpm.fetch_page_read(parent_id)?;
            InternalPageRef::new(guard.data()).sibling_of(page_id)
        };
        let sibling_size = {
            let guard = self.bpm.fetch_page_read(sibling_id)?;
            TreePageRef::new(guard.data()).size()
        };

        if size + sibling_size <= max_size {
            self.coalesce(
                page_id,
                sibling_id,
                parent_id,
                separator,
                is_predecessor,
                is_leaf,
            )
        } else {
            self.redistribute(
                page_id,
                sibling_id,
                parent_id,
                separator,
                is_predecessor,
                is_leaf,
            )
        }
    }

    /// Merges the underflowing page with its sibling; the left page always
    /// absorbs the right one, whose separator is then deleted from the
    /// parent.
    fn coalesce(
        &mut self,
        page_id: PageId,
        sibling_id: PageId,
        parent_id: PageId,
        separator: IndexKey,
        is_predecessor: bool,
        is_leaf: bool,
    ) -> Result<()> {
        let (left_id, right_id) = if is_predecessor {
            (sibling_id, page_id)
        } else {
            (page_id, sibling_id)
        };

        let adopted = {
            let mut left_guard = self.bpm.fetch_page_write(left_id)?;
            let mut right_guard = self.bpm.fetch_page_write(right_id)?;
            if is_leaf {
                let mut left = LeafPage::new(left_guard.data_mut());
                let mut right = LeafPage::new(right_guard.data_mut());
                left.merge_from(&mut right);
                Vec::new()
            } else {
                let mut left = InternalPage::new(left_guard.data_mut());
                let mut right = InternalPage::new(right_guard.data_mut());
                left.merge_from(&separator, &mut right)
            }
        };

        for child in adopted {
            self.set_parent(child, left_id)?;
        }

        self.bpm.delete_page(right_id)?;
        self.delete_entry(parent_id, separator)
    }

    /// Moves one entry across the page/sibling boundary and rewrites the
    /// parent separator between them.
    fn redistribute(
        &mut self,
        page_id: PageId,
        sibling_id: PageId,
        parent_id: PageId,
        separator: IndexKey,
        is_predecessor: bool,
        is_leaf: bool,
    ) -> Result<()> {
        let mut reparented_child = None;

        let new_separator = {
            let mut page_guard = self.bpm.fetch_page_write(page_id)?;
            let mut sibling_guard = self.bpm.fetch_page_write(sibling_id)?;

            if is_leaf {
                let mut page = LeafPage::new(page_guard.data_mut());
                let mut sibling = LeafPage::new(sibling_guard.data_mut());
                if is_predecessor {
                    // Steal the predecessor's last record; it becomes the
                    // new separator.
                    let last = sibling.size() - 1;
                    let key = sibling.key_at(last);
                    let record = sibling.record_at(last);
                    sibling.delete(&key, &self.comparator);
                    page.insert_first(&key, record);
                    key
                } else {
                    // Steal the successor's first record; its new first key
                    // becomes the separator.
                    let key = sibling.key_at(0);
                    let record = sibling.record_at(0);
                    sibling.delete(&key, &self.comparator);
                    page.insert_last(&key, record);
                    sibling.key_at(0)
                }
            } else {
                let mut page = InternalPage::new(page_guard.data_mut());
                let mut sibling = InternalPage::new(sibling_guard.data_mut());
                if is_predecessor {
                    // The predecessor's last child slides under the old
                    // separator; its key moves up to the parent.
                    let last = sibling.size() - 1;
                    let key = sibling.key_at(last);
                    let child = sibling.child_at(last);
                    sibling.delete(&key, &self.comparator);
                    page.insert_first(&separator, child);
                    reparented_child = Some(child);
                    key
                } else {
                    // The successor's slot-0 child comes over under the old
                    // separator; its displaced slot-1 key moves up.
                    let child = sibling.child_at(0);
                    let key = sibling.key_at(1);
                    sibling.delete_first();
                    page.insert(&separator, child, &self.comparator);
                    reparented_child = Some(child);
                    key
                }
            }
        };

        if let Some(child) = reparented_child {
            self.set_parent(child, page_id)?;
        }

        let mut guard = self.bpm.fetch_page_write(parent_id)?;
        let mut parent = InternalPage::new(guard.data_mut());
        let index = parent.key_index(&separator, &self.comparator);
        debug_assert!(self.keys_equal(&parent.key_at(index), &separator));
        parent.set_key_at(index, &new_separator);

        Ok(())
    }

    /// Shrinks the root after a delete: an empty leaf root empties the
    /// tree, an internal root with a single child hands the root role to
    /// that child.
    fn adjust_root(&mut self, root_id: PageId) -> Result<()> {
        let (is_leaf, size, first_child) = {
            let guard = self.bpm.fetch_page_read(root_id)?;
            let data = guard.data();
            match tree_page::page_kind(data) {
                PageKind::Leaf => (true, LeafPageRef::new(data).size(), INVALID_PAGE_ID),
                PageKind::Internal => {
                    let internal = InternalPageRef::new(data);
                    (false, internal.size(), internal.child_at(0))
                }
            }
        };

        if is_leaf && size == 0 {
            self.root_page_id = INVALID_PAGE_ID;
            self.update_root_page_id(false)?;
            self.bpm.delete_page(root_id)?;
        } else if !is_leaf && size == 1 {
            self.set_parent(first_child, INVALID_PAGE_ID)?;
            self.root_page_id = first_child;
            self.update_root_page_id(false)?;
            self.bpm.delete_page(root_id)?;
        }

        Ok(())
    }

    /// Rewrites a page's parent pointer.
    fn set_parent(&mut self, page_id: PageId, parent_id: PageId) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(page_id)?;
        TreePage::new(guard.data_mut()).set_parent_page_id(parent_id);
        Ok(())
    }

    /// Mirrors the current root page id into the header page.
    /// `insert` registers the index on its first root promotion.
    fn update_root_page_id(&mut self, insert: bool) -> Result<()> {
        let mut guard = self.bpm.fetch_page_write(HEADER_PAGE_ID)?;
        let mut header = HeaderPage::new(guard.data_mut());
        if insert {
            // A tree that was emptied and regrown is already registered.
            if !header.insert_record(&self.index_name, self.root_page_id) {
                header.update_record(&self.index_name, self.root_page_id);
            }
        } else {
            let updated = header.update_record(&self.index_name, self.root_page_id);
            debug_assert!(updated, "root update for unregistered index");
        }
        Ok(())
    }

    /// Walks the whole tree and checks its structural invariants: sorted
    /// keys, size bounds, separator ranges, parent pointers, and the leaf
    /// chain. Used by tests after mutation sequences.
    pub fn check_integrity(&self) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        let mut leaf_keys = Vec::new();
        self.check_subtree(self.root_page_id, INVALID_PAGE_ID, None, None, &mut leaf_keys)?;

        let mut chain_keys = Vec::new();
        let mut iter = self.iter()?;
        while let Some((key, _)) = iter.next_entry()? {
            chain_keys.push(key);
        }
        if chain_keys != leaf_keys {
            return Err(ArborError::IndexCorrupted(
                "leaf chain disagrees with tree order".into(),
            ));
        }

        Ok(())
    }

    fn check_subtree(
        &self,
        page_id: PageId,
        expected_parent: PageId,
        lower: Option<IndexKey>,
        upper: Option<IndexKey>,
        leaf_keys: &mut Vec<IndexKey>,
    ) -> Result<()> {
        let corrupted = |what: &str| {
            Err(ArborError::IndexCorrupted(format!(
                "{} (page {})",
                what, page_id
            )))
        };

        let mut children = Vec::new();
        {
            let guard = self.bpm.fetch_page_read(page_id)?;
            let data = guard.data();
            let view = TreePageRef::new(data);

            if view.parent_page_id() != expected_parent {
                return corrupted("parent pointer mismatch");
            }
            let is_root = page_id == self.root_page_id;
            if !is_root && (view.size() < view.min_size() || view.size() > view.max_size()) {
                return corrupted("size out of bounds");
            }

            let in_bounds = |key: &IndexKey| {
                let above = lower.as_ref().map_or(true, |l| {
                    self.comparator.compare(key.as_bytes(), l.as_bytes()) != Ordering::Less
                });
                let below = upper.as_ref().map_or(true, |u| {
                    self.comparator.compare(key.as_bytes(), u.as_bytes()) == Ordering::Less
                });
                above && below
            };

            match view.kind() {
                PageKind::Leaf => {
                    let leaf = LeafPageRef::new(data);
                    for i in 0..leaf.size() {
                        let key = leaf.key_at(i);
                        if i > 0
                            && self
                                .comparator
                                .compare(leaf.key_at(i - 1).as_bytes(), key.as_bytes())
                                != Ordering::Less
                        {
                            return corrupted("leaf keys not strictly sorted");
                        }
                        if !in_bounds(&key) {
                            return corrupted("leaf key outside separator range");
                        }
                        leaf_keys.push(key);
                    }
                }
                PageKind::Internal => {
                    let internal = InternalPageRef::new(data);
                    if is_root && internal.size() < 2 {
                        return corrupted("internal root smaller than two children");
                    }
                    for i in 1..internal.size() {
                        let key = internal.key_at(i);
                        if i > 1
                            && self
                                .comparator
                                .compare(internal.key_at(i - 1).as_bytes(), key.as_bytes())
                                != Ordering::Less
                        {
                            return corrupted("separators not strictly sorted");
                        }
                        if !in_bounds(&key) {
                            return corrupted("separator outside parent range");
                        }
                    }
                    for i in 0..internal.size() {
                        let child_lower = if i == 0 {
                            lower
                        } else {
                            Some(internal.key_at(i))
                        };
                        let child_upper = if i + 1 < internal.size() {
                            Some(internal.key_at(i + 1))
                        } else {
                            upper
                        };
                        children.push((internal.child_at(i), child_lower, child_upper));
                    }
                }
            }
        }

        for (child, child_lower, child_upper) in children {
            self.check_subtree(child, page_id, child_lower, child_upper, leaf_keys)?;
        }

        Ok(())
    }
}
