use std::fmt;

/// Fixed width of an index key in bytes
pub const KEY_SIZE: usize = 8;

/// A fixed-size index key.
///
/// Keys are opaque byte strings to the tree; ordering comes entirely from
/// the comparator the tree was built with. The integer helpers cover the
/// common case of little-endian `i64` keys.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexKey([u8; KEY_SIZE]);

impl IndexKey {
    pub const fn zero() -> Self {
        Self([0u8; KEY_SIZE])
    }

    pub fn from_i64(value: i64) -> Self {
        Self(value.to_le_bytes())
    }

    pub fn to_i64(&self) -> i64 {
        i64::from_le_bytes(self.0)
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&bytes[..KEY_SIZE]);
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IndexKey({})", self.to_i64())
    }
}
