use crate::revisioned::Revisioned;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Internal wrapper that tracks when a value was inserted into the entry store.
/// Used for lifespan expiration support.
///
/// # Fields
///
/// * `value` - The cached revisioned object
/// * `inserted_at` - The `Instant` when this entry was created
/// * `lifespan` - How long the entry stays valid, `None` for no expiration
///
/// # Examples
///
/// ```
/// use revcache_core::{CacheEntry, Versioned};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let entry = CacheEntry::new(Arc::new(Versioned::new("u1", 1, ())), None);
/// assert!(!entry.is_expired());
///
/// let entry = CacheEntry::new(Arc::new(Versioned::new("u1", 1, ())), Some(Duration::ZERO));
/// assert!(entry.is_expired());
/// ```
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub value: Arc<dyn Revisioned>,
    pub inserted_at: Instant,
    pub lifespan: Option<Duration>,
}

impl CacheEntry {
    /// Creates a new cache entry with the current timestamp.
    pub fn new(value: Arc<dyn Revisioned>, lifespan: Option<Duration>) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            lifespan,
        }
    }

    /// Returns true if the entry outlived its lifespan.
    pub fn is_expired(&self) -> bool {
        match self.lifespan {
            Some(lifespan) => self.inserted_at.elapsed() >= lifespan,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Versioned;
    use std::thread;

    fn entry(lifespan: Option<Duration>) -> CacheEntry {
        CacheEntry::new(Arc::new(Versioned::new("k", 1, "v")), lifespan)
    }

    #[test]
    fn test_new_entry_not_expired() {
        let entry = entry(Some(Duration::from_secs(10)));
        assert_eq!(entry.value.id(), "k");
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_expiration() {
        let entry = entry(Some(Duration::from_millis(50)));
        thread::sleep(Duration::from_millis(80));
        assert!(entry.is_expired());
    }

    #[test]
    fn test_no_lifespan_never_expires() {
        let entry = entry(None);
        thread::sleep(Duration::from_millis(20));
        assert!(!entry.is_expired());
    }
}
