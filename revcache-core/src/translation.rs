use crate::error::Result;
use crate::invalidation::InvalidationManager;
use std::collections::HashSet;

/// Maps one propagated invalidation event to the local cache keys it implies.
///
/// Translators must be deterministic and free of side effects besides filling
/// `invalidations` (exact keys) and `batch` (prefixes, when a coarse-grained
/// invalidation is cheaper than enumerating keys). They are called once per
/// inbound event, possibly from many threads at the same time.
///
/// A failing translator only costs the invalidations of that one event: the
/// cache manager logs the error and drops the event.
///
/// Any closure with the matching signature is a translator:
///
/// ```
/// use revcache_core::{EventTranslator, InvalidationManager, Result};
/// use std::collections::HashSet;
///
/// let translator = |event: &String,
///                   keys: &mut HashSet<String>,
///                   _: &mut InvalidationManager<String>|
///  -> Result<()> {
///     keys.insert(event.clone());
///     Ok(())
/// };
///
/// let mut keys = HashSet::new();
/// let mut batch = InvalidationManager::new();
/// translator.add_invalidations(&"u1".to_string(), &mut keys, &mut batch).unwrap();
/// assert!(keys.contains("u1"));
/// ```
pub trait EventTranslator<E>: Send + Sync {
    fn add_invalidations(
        &self,
        event: &E,
        invalidations: &mut HashSet<String>,
        batch: &mut InvalidationManager<E>,
    ) -> Result<()>;
}

impl<E, F> EventTranslator<E> for F
where
    F: Fn(&E, &mut HashSet<String>, &mut InvalidationManager<E>) -> Result<()> + Send + Sync,
{
    fn add_invalidations(
        &self,
        event: &E,
        invalidations: &mut HashSet<String>,
        batch: &mut InvalidationManager<E>,
    ) -> Result<()> {
        self(event, invalidations, batch)
    }
}

/// Translator for events that already are cache keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyEventTranslator;

impl EventTranslator<String> for KeyEventTranslator {
    fn add_invalidations(
        &self,
        event: &String,
        invalidations: &mut HashSet<String>,
        _batch: &mut InvalidationManager<String>,
    ) -> Result<()> {
        invalidations.insert(event.clone());
        Ok(())
    }
}
