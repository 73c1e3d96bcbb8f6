use crate::counter::Revision;
use crate::key_lock::{KeyLockGuard, KeyLocks};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Duration;

/// Local-only map from cache key to its current revision.
///
/// Each node keeps its own revision store; it is never replicated. Rows are
/// created the first time a key is invalidated or cached and afterwards only
/// move forward through [`bump`](Self::bump) and
/// [`compare_and_set`](Self::compare_and_set). [`put`](Self::put) is a plain
/// overwrite.
///
/// The store also owns the per-key advisory locks used to serialize writers
/// that try to cache the same key.
///
/// # Examples
///
/// ```
/// use revcache_core::RevisionStore;
///
/// let revisions = RevisionStore::new();
/// assert_eq!(revisions.get("realm-1"), None);
///
/// revisions.put("realm-1", 7);
/// assert_eq!(revisions.get("realm-1"), Some(7));
///
/// // bumping never moves backwards, even with a smaller candidate
/// assert_eq!(revisions.bump("realm-1", 3), 8);
/// ```
#[derive(Debug, Default)]
pub struct RevisionStore {
    revisions: DashMap<String, Revision>,
    locks: KeyLocks,
}

impl RevisionStore {
    pub fn new() -> Self {
        Self {
            revisions: DashMap::new(),
            locks: KeyLocks::new(),
        }
    }

    /// Local lookup of the revision of `key`.
    pub fn get(&self, key: &str) -> Option<Revision> {
        self.revisions.get(key).map(|rev| *rev)
    }

    /// Overwrites the revision of `key` (last writer wins).
    pub fn put(&self, key: &str, revision: Revision) {
        self.revisions.insert(key.to_string(), revision);
    }

    /// Returns the revision of `key`, creating the row with `initial` if missing.
    pub fn get_or_init(&self, key: &str, initial: Revision) -> Revision {
        *self.revisions.entry(key.to_string()).or_insert(initial)
    }

    /// Advances the revision of `key` to `max(candidate, previous + 1)`.
    ///
    /// The row strictly increases on every call. Returns the stored value.
    pub fn bump(&self, key: &str, candidate: Revision) -> Revision {
        match self.revisions.entry(key.to_string()) {
            Entry::Occupied(mut row) => {
                let next = candidate.max(row.get().saturating_add(1));
                row.insert(next);
                next
            }
            Entry::Vacant(row) => {
                row.insert(candidate);
                candidate
            }
        }
    }

    /// Replaces the revision of `key` with `new` only if it is still `expected`.
    pub fn compare_and_set(&self, key: &str, expected: Revision, new: Revision) -> bool {
        match self.revisions.get_mut(key) {
            Some(mut row) if *row == expected => {
                *row = new;
                true
            }
            _ => false,
        }
    }

    /// Tries to take the advisory lock of `key` within `timeout`.
    pub fn try_lock(&self, key: &str, timeout: Duration) -> Option<KeyLockGuard<'_>> {
        self.locks.try_lock_for(key, timeout)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.revisions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    /// Drops every revision row.
    pub fn clear(&self) {
        self.revisions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_get_or_init_keeps_existing() {
        let revisions = RevisionStore::new();
        assert_eq!(revisions.get_or_init("k", 4), 4);
        assert_eq!(revisions.get_or_init("k", 9), 4);
        assert_eq!(revisions.get("k"), Some(4));
    }

    #[test]
    fn test_bump_creates_missing_row() {
        let revisions = RevisionStore::new();
        assert_eq!(revisions.bump("k", 12), 12);
        assert_eq!(revisions.get("k"), Some(12));
    }

    #[test]
    fn test_bump_strictly_increases() {
        let revisions = RevisionStore::new();
        revisions.put("k", 10);

        assert_eq!(revisions.bump("k", 2), 11);
        assert_eq!(revisions.bump("k", 30), 30);
        assert_eq!(revisions.bump("k", 30), 31);
    }

    #[test]
    fn test_compare_and_set() {
        let revisions = RevisionStore::new();
        assert!(!revisions.compare_and_set("k", 0, 1));

        revisions.put("k", 3);
        assert!(!revisions.compare_and_set("k", 2, 8));
        assert_eq!(revisions.get("k"), Some(3));

        assert!(revisions.compare_and_set("k", 3, 8));
        assert_eq!(revisions.get("k"), Some(8));
    }

    #[test]
    fn test_put_is_last_writer_wins() {
        let revisions = RevisionStore::new();
        revisions.put("k", 9);
        revisions.put("k", 5);
        assert_eq!(revisions.get("k"), Some(5));
    }

    #[test]
    fn test_clear() {
        let revisions = RevisionStore::new();
        revisions.put("a", 1);
        revisions.put("b", 2);
        assert_eq!(revisions.len(), 2);

        revisions.clear();
        assert!(revisions.is_empty());
        assert!(!revisions.contains("a"));
    }

    #[test]
    fn test_concurrent_bumps_are_monotonic() {
        let revisions = Arc::new(RevisionStore::new());
        let mut handles = vec![];

        for _ in 0..4 {
            let revisions = Arc::clone(&revisions);
            handles.push(thread::spawn(move || {
                let mut last = i64::MIN;
                for _ in 0..250 {
                    let stored = revisions.bump("hot", fastrand::i64(0..2000));
                    assert!(stored > last);
                    last = stored;
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        // 1000 bumps, each at least one above the previous value
        assert!(revisions.get("hot").unwrap() >= 999);
    }
}
