//! # Invalidation Batches
//!
//! Collects the invalidations produced during one unit of work (a request or
//! a transaction) so they can be applied and published together at commit.
//!
//! A batch holds three things:
//! - **Model invalidations**: exact cache keys to drop
//! - **Prefix invalidations**: key prefixes for bulk removal (e.g. everything under a realm)
//! - **Invalidation events**: higher level events to forward to the rest of the cluster
//!
//! Batches are never shared between concurrent units of work.
//!
//! # Examples
//!
//! ```rust
//! use revcache_core::InvalidationManager;
//!
//! let mut batch: InvalidationManager<String> = InvalidationManager::new();
//! batch.add_model_invalidation("realm-1.client.c1");
//! batch.add_prefix_invalidation("realm-2.");
//! batch.add_invalidation_event("client updated".to_string());
//!
//! assert!(batch.is_model_invalidated("realm-1.client.c1"));
//! assert!(batch.is_prefix_invalidated("realm-2."));
//! assert_eq!(batch.invalidation_events().len(), 1);
//! ```

use std::collections::HashSet;

/// Deduplicated set of invalidations collected during one unit of work.
#[derive(Debug, Clone)]
pub struct InvalidationManager<E> {
    model_invalidations: HashSet<String>,
    prefix_invalidations: HashSet<String>,
    invalidation_events: Vec<E>,
}

impl<E> InvalidationManager<E> {
    /// Create a new empty batch
    pub fn new() -> Self {
        Self {
            model_invalidations: HashSet::new(),
            prefix_invalidations: HashSet::new(),
            invalidation_events: Vec::new(),
        }
    }

    /// Schedule invalidation of an exact key.
    ///
    /// Returns `false` if the key was already scheduled.
    pub fn add_model_invalidation(&mut self, key: impl Into<String>) -> bool {
        self.model_invalidations.insert(key.into())
    }

    /// Schedule invalidation of every key starting with `prefix`.
    ///
    /// Returns `false` if the prefix was already scheduled.
    pub fn add_prefix_invalidation(&mut self, prefix: impl Into<String>) -> bool {
        self.prefix_invalidations.insert(prefix.into())
    }

    /// Record an event to publish to the cluster at commit
    pub fn add_invalidation_event(&mut self, event: E) {
        self.invalidation_events.push(event);
    }

    /// Check whether `key` is scheduled for invalidation
    pub fn is_model_invalidated(&self, key: &str) -> bool {
        self.model_invalidations.contains(key)
    }

    /// Check whether `prefix` is scheduled for invalidation
    pub fn is_prefix_invalidated(&self, prefix: &str) -> bool {
        self.prefix_invalidations.contains(prefix)
    }

    pub fn model_invalidations(&self) -> &HashSet<String> {
        &self.model_invalidations
    }

    pub fn prefix_invalidations(&self) -> &HashSet<String> {
        &self.prefix_invalidations
    }

    pub fn invalidation_events(&self) -> &[E] {
        &self.invalidation_events
    }

    /// True if nothing was scheduled
    pub fn is_empty(&self) -> bool {
        self.model_invalidations.is_empty()
            && self.prefix_invalidations.is_empty()
            && self.invalidation_events.is_empty()
    }
}

impl<E> Default for InvalidationManager<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Extend<String> for InvalidationManager<E> {
    fn extend<I: IntoIterator<Item = String>>(&mut self, keys: I) {
        self.model_invalidations.extend(keys);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_invalidations_deduplicate() {
        let mut batch: InvalidationManager<()> = InvalidationManager::new();
        assert!(batch.add_model_invalidation("u1"));
        assert!(!batch.add_model_invalidation("u1"));
        assert!(batch.add_model_invalidation("u2"));

        assert_eq!(batch.model_invalidations().len(), 2);
        assert!(batch.is_model_invalidated("u1"));
        assert!(!batch.is_model_invalidated("u3"));
    }

    #[test]
    fn test_prefix_invalidations_deduplicate() {
        let mut batch: InvalidationManager<()> = InvalidationManager::new();
        assert!(batch.add_prefix_invalidation("realm-1."));
        assert!(!batch.add_prefix_invalidation("realm-1."));

        assert_eq!(batch.prefix_invalidations().len(), 1);
        assert!(batch.is_prefix_invalidated("realm-1."));
        // prefixes are matched exactly, not by containment
        assert!(!batch.is_prefix_invalidated("realm-1"));
    }

    #[test]
    fn test_events_keep_order() {
        let mut batch = InvalidationManager::new();
        batch.add_invalidation_event("first");
        batch.add_invalidation_event("second");

        assert_eq!(batch.invalidation_events(), &["first", "second"]);
    }

    #[test]
    fn test_is_empty() {
        let mut batch: InvalidationManager<u8> = InvalidationManager::default();
        assert!(batch.is_empty());

        batch.add_invalidation_event(1);
        assert!(!batch.is_empty());
    }

    #[test]
    fn test_extend_adds_model_invalidations() {
        let mut batch: InvalidationManager<()> = InvalidationManager::new();
        batch.extend(vec!["a".to_string(), "b".to_string(), "a".to_string()]);
        assert_eq!(batch.model_invalidations().len(), 2);
    }
}
