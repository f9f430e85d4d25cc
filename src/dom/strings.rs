//! Document Dictionary
//!
//! Per-document string interning for names and content. Nodes refer to
//! dictionary strings through `NameRef::Interned`; those strings belong to
//! the dictionary and live as long as the document does. Strings a node
//! owns itself are `NameRef::Owned`.
//!
//! Uses hash-based lookup to avoid storing duplicate string data.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Handle to a node string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameRef {
    /// Id in the owning document's dictionary
    Interned(u32),
    /// Privately owned by the node
    Owned(String),
}

impl NameRef {
    #[inline]
    pub fn is_interned(&self) -> bool {
        matches!(self, NameRef::Interned(_))
    }

    /// Resolve against the dictionary of the node's document
    #[inline]
    pub fn resolve<'a>(&'a self, dict: Option<&'a StringPool>) -> Option<&'a str> {
        match self {
            NameRef::Owned(s) => Some(s),
            NameRef::Interned(id) => dict?.get_str(*id),
        }
    }
}

/// String interning pool
///
/// Memory layout:
/// - `entries`: (offset, len) into `data` for each interned string ID
/// - `data`: concatenated string bytes
/// - `hash_index`: hash -> list of IDs (handles rare collisions)
#[derive(Debug, Default, Clone)]
pub struct StringPool {
    /// Entries indexed by string ID
    entries: Vec<(u32, u32)>,
    data: String,
    /// Hash of string content -> list of IDs with that hash
    hash_index: HashMap<u64, Vec<u32>>,
}

impl StringPool {
    /// Create a new empty string pool
    pub fn new() -> Self {
        let mut pool = StringPool {
            entries: Vec::with_capacity(256),
            data: String::with_capacity(4096),
            hash_index: HashMap::new(),
        };
        // Entry 0 is reserved for the empty string
        pool.entries.push((0, 0));
        pool
    }

    #[inline]
    fn compute_hash(s: &str) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        hasher.finish()
    }

    /// Intern a string, returning its id. Equal strings share one id.
    pub fn intern(&mut self, s: &str) -> u32 {
        if s.is_empty() {
            return 0;
        }
        let hash = Self::compute_hash(s);
        if let Some(id) = self.find(hash, s) {
            return id;
        }

        let offset = self.data.len() as u32;
        self.data.push_str(s);
        let id = self.entries.len() as u32;
        self.entries.push((offset, s.len() as u32));
        self.hash_index.entry(hash).or_default().push(id);
        id
    }

    /// Id of `s` if it is already interned
    pub fn lookup(&self, s: &str) -> Option<u32> {
        if s.is_empty() {
            return Some(0);
        }
        self.find(Self::compute_hash(s), s)
    }

    fn find(&self, hash: u64, s: &str) -> Option<u32> {
        self.hash_index
            .get(&hash)?
            .iter()
            .copied()
            .find(|&id| self.get_str(id) == Some(s))
    }

    /// Get a string by ID
    pub fn get_str(&self, id: u32) -> Option<&str> {
        let &(offset, len) = self.entries.get(id as usize)?;
        let start = offset as usize;
        self.data.get(start..start + len as usize)
    }

    /// True when `s` is stored in this pool
    #[inline]
    pub fn owns(&self, s: &str) -> bool {
        self.lookup(s).is_some()
    }

    /// Get the number of unique strings stored
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the pool is empty
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1 // Entry 0 is reserved
    }

    /// Get total bytes used for string storage
    pub fn bytes_used(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern() {
        let mut pool = StringPool::new();
        let id = pool.intern("hello");
        assert!(id > 0);
        assert_eq!(pool.get_str(id), Some("hello"));
    }

    #[test]
    fn test_intern_duplicate() {
        let mut pool = StringPool::new();
        let id1 = pool.intern("hello");
        let id2 = pool.intern("hello");
        assert_eq!(id1, id2);
        assert_eq!(pool.bytes_used(), 5);
    }

    #[test]
    fn test_intern_different() {
        let mut pool = StringPool::new();
        let id1 = pool.intern("hello");
        let id2 = pool.intern("world");
        assert_ne!(id1, id2);
        assert_eq!(pool.lookup("world"), Some(id2));
        assert_eq!(pool.lookup("absent"), None);
    }

    #[test]
    fn test_empty_string() {
        let mut pool = StringPool::new();
        assert!(pool.is_empty());
        assert_eq!(pool.intern(""), 0);
        assert_eq!(pool.get_str(0), Some(""));
    }

    #[test]
    fn test_name_ref_resolve() {
        let mut pool = StringPool::new();
        let id = pool.intern("item");
        let interned = NameRef::Interned(id);
        let owned = NameRef::Owned("item".into());
        assert!(interned.is_interned());
        assert_eq!(interned.resolve(Some(&pool)), Some("item"));
        assert_eq!(interned.resolve(None), None);
        assert_eq!(owned.resolve(None), Some("item"));
        assert!(pool.owns("item"));
    }
}
