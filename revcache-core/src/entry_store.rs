use crate::cache_entry::CacheEntry;
use crate::error::Result;
use crate::revisioned::Revisioned;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Capability of an invalidation cache holding revisioned entries.
///
/// Implementations may be purely local or replicated across the cluster, as
/// long as writes use remove-on-write semantics: a change anywhere removes the
/// entry instead of shipping the new value. Every method may fail with
/// [`CacheError::StoreUnavailable`](crate::CacheError::StoreUnavailable) when
/// the backing store cannot be reached.
pub trait EntryStore: Send + Sync {
    /// Returns the live entry stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Arc<dyn Revisioned>>>;

    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// This is a write "for external read": it does not take part in any
    /// lock ownership, so concurrent invalidations can still remove it.
    fn put_for_external_read(
        &self,
        key: &str,
        value: Arc<dyn Revisioned>,
        lifespan: Option<Duration>,
    ) -> Result<()>;

    /// Removes and returns the entry stored under `key`.
    fn remove(&self, key: &str) -> Result<Option<Arc<dyn Revisioned>>>;

    /// Snapshot of all keys currently stored.
    fn keys(&self) -> Result<Vec<String>>;

    /// Removes every entry.
    fn clear(&self) -> Result<()>;
}

/// Node-local [`EntryStore`] backed by a [`DashMap`].
///
/// Expired entries are dropped lazily on access.
///
/// # Examples
///
/// ```
/// use revcache_core::{EntryStore, LocalEntryStore, Versioned};
/// use std::sync::Arc;
///
/// let store = LocalEntryStore::new();
/// store.put_for_external_read("u1", Arc::new(Versioned::new("u1", 1, "alice")), None).unwrap();
///
/// assert!(store.get("u1").unwrap().is_some());
/// assert_eq!(store.keys().unwrap(), vec!["u1".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct LocalEntryStore {
    entries: DashMap<String, CacheEntry>,
}

impl LocalEntryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl EntryStore for LocalEntryStore {
    fn get(&self, key: &str) -> Result<Option<Arc<dyn Revisioned>>> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return Ok(Some(Arc::clone(&entry.value)));
            }
        } else {
            return Ok(None);
        }

        // Remove the expired entry unless it was replaced in the meantime
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        Ok(None)
    }

    fn put_for_external_read(
        &self,
        key: &str,
        value: Arc<dyn Revisioned>,
        lifespan: Option<Duration>,
    ) -> Result<()> {
        self.entries
            .insert(key.to_string(), CacheEntry::new(value, lifespan));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<Option<Arc<dyn Revisioned>>> {
        Ok(self
            .entries
            .remove(key)
            .filter(|(_, entry)| !entry.is_expired())
            .map(|(_, entry)| entry.value))
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.iter().map(|entry| entry.key().clone()).collect())
    }

    fn clear(&self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}
