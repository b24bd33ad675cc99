//! String interning pool
//!
//! Deduplicated storage for element names, attribute names and attribute
//! values. Interned strings live in one contiguous buffer and are
//! addressed by compact u32 ids; id 0 is the empty string.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// String interning pool
#[derive(Debug, Default)]
pub struct StringPool {
    /// (offset, len) into `data` for each id
    entries: Vec<(u32, u32)>,
    /// Backing buffer
    data: Vec<u8>,
    /// Content hash -> candidate ids (handles rare collisions)
    hash_index: HashMap<u64, Vec<u32>>,
}

impl StringPool {
    /// Create a new empty pool; id 0 is reserved for the empty string
    pub fn new() -> Self {
        StringPool {
            entries: vec![(0, 0)],
            data: Vec::with_capacity(4096),
            hash_index: HashMap::new(),
        }
    }

    #[inline]
    fn hash_of(s: &[u8]) -> u64 {
        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        hasher.finish()
    }

    /// Intern a string, returning its id; duplicates share one id
    pub fn intern(&mut self, s: &[u8]) -> u32 {
        if s.is_empty() {
            return 0;
        }

        let hash = Self::hash_of(s);
        if let Some(ids) = self.hash_index.get(&hash) {
            for &id in ids {
                if self.get(id) == s {
                    return id;
                }
            }
        }

        let offset = self.data.len() as u32;
        self.data.extend_from_slice(s);
        let id = self.entries.len() as u32;
        self.entries.push((offset, s.len() as u32));
        self.hash_index.entry(hash).or_default().push(id);
        id
    }

    /// Get a string by id
    pub fn get(&self, id: u32) -> &[u8] {
        let (offset, len) = self.entries[id as usize];
        &self.data[offset as usize..(offset + len) as usize]
    }

    /// Get a string by id as UTF-8, lossless only
    pub fn get_str(&self, id: u32) -> Option<&str> {
        std::str::from_utf8(self.get(id)).ok()
    }

    /// Number of unique strings stored (including the reserved empty one)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_and_get() {
        let mut pool = StringPool::new();
        let id = pool.intern(b"hello");
        assert!(id > 0);
        assert_eq!(pool.get(id), b"hello");
        assert_eq!(pool.get_str(id), Some("hello"));
    }

    #[test]
    fn test_duplicates_share_id() {
        let mut pool = StringPool::new();
        let id1 = pool.intern(b"hello");
        let id2 = pool.intern(b"hello");
        let id3 = pool.intern(b"world");
        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn test_empty_string_is_zero() {
        let mut pool = StringPool::new();
        assert_eq!(pool.intern(b""), 0);
        assert_eq!(pool.get(0), b"");
    }
}
