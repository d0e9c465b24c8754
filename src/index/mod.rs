pub mod btree_index;
pub mod btree_iterator;
pub mod index_key;
pub mod internal_page;
pub mod key_comparator;
pub mod leaf_page;
pub mod tree_page;

pub use btree_index::BPlusTree;
pub use btree_iterator::BTreeIterator;
pub use index_key::{IndexKey, KEY_SIZE};
pub use internal_page::{InternalPage, InternalPageRef, INTERNAL_PAGE_CAPACITY};
pub use key_comparator::{BytewiseComparator, Int64Comparator, KeyComparator};
pub use leaf_page::{LeafPage, LeafPageRef, LEAF_PAGE_CAPACITY};
pub use tree_page::{PageKind, TreePage, TreePageRef};
