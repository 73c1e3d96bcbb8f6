//! # Cache Manager
//!
//! Invalidation cache with node-local revision tracking.
//!
//! Two stores work together:
//! - the **entry store**, an invalidation cache holding revisioned snapshots
//!   (possibly replicated, always remove-on-write);
//! - the **revision store**, a local-only map holding the current revision of
//!   every key this node has cached or invalidated.
//!
//! A replicated remove is only observed by nodes that hold the entry. A node
//! that is in the middle of loading a key it does not hold yet would miss it:
//!
//! 1. Node 1 captures the counter and starts reading a user from the database
//! 2. Node 2 updates the user and removes it from the entry store
//! 3. Node 1 has no entry, so nothing tells it about the removal
//! 4. Node 1 caches what it read, which is already stale
//!
//! To close that gap every write publishes an invalidation event. Each node
//! that receives it bumps the revision of the affected keys whether or not it
//! holds an entry, and [`CacheManager::add_revisioned`] refuses to cache a
//! value whose key moved past the revision captured when the read started.

use crate::config::CacheConfig;
use crate::counter::{Revision, UpdateCounter};
use crate::entry_store::{EntryStore, LocalEntryStore};
use crate::error::{CacheError, Result};
use crate::invalidation::InvalidationManager;
use crate::propagation::{DcNotify, InvalidationPropagator};
use crate::revision_store::RevisionStore;
use crate::revisioned::{downcast, Revisioned};
use crate::stats::CacheStats;
use crate::translation::EventTranslator;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// Result of an attempt to cache a freshly loaded object.
///
/// Only `Cached` stores anything. Every other outcome means the caller keeps
/// using the object it loaded without caching it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The object was stored in the entry store
    Cached,
    /// The per-key revision lock could not be taken in time
    LockTimeout,
    /// The key was invalidated after the caller's read began
    ConcurrentUpdate,
    /// The revision store already knows a newer revision than the object's
    Stale,
    /// The revision row changed or vanished while the object was being cached
    Superseded,
}

impl AddOutcome {
    pub fn is_cached(self) -> bool {
        self == AddOutcome::Cached
    }
}

/// Orchestrates reads, optimistic writes and invalidations over a revision
/// store and an entry store.
///
/// `E` is the type of the invalidation events exchanged with the cluster.
pub struct CacheManager<E> {
    config: CacheConfig,
    counter: UpdateCounter,
    revisions: RevisionStore,
    cache: Arc<dyn EntryStore>,
    translator: Box<dyn EventTranslator<E>>,
    propagator: Box<dyn InvalidationPropagator<E>>,
    #[cfg(feature = "stats")]
    stats: CacheStats,
}

impl<E> CacheManager<E>
where
    E: Debug + Send + Sync + 'static,
{
    /// Creates a cache manager over the given entry store.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Configuration`] if `config` is invalid.
    pub fn new<T, P>(
        config: CacheConfig,
        cache: Arc<dyn EntryStore>,
        translator: T,
        propagator: P,
    ) -> Result<Self>
    where
        T: EventTranslator<E> + 'static,
        P: InvalidationPropagator<E> + 'static,
    {
        config.validate()?;
        Ok(Self {
            config,
            counter: UpdateCounter::new(),
            revisions: RevisionStore::new(),
            cache,
            translator: Box::new(translator),
            propagator: Box::new(propagator),
            #[cfg(feature = "stats")]
            stats: CacheStats::new(),
        })
    }

    /// Creates a cache manager backed by a fresh [`LocalEntryStore`].
    pub fn local<T, P>(config: CacheConfig, translator: T, propagator: P) -> Result<Self>
    where
        T: EventTranslator<E> + 'static,
        P: InvalidationPropagator<E> + 'static,
    {
        Self::new(config, Arc::new(LocalEntryStore::new()), translator, propagator)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn entry_store(&self) -> &Arc<dyn EntryStore> {
        &self.cache
    }

    pub fn revisions(&self) -> &RevisionStore {
        &self.revisions
    }

    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Current value of the node's counter.
    ///
    /// Capture it before reading from the source of truth and pass it as the
    /// startup revision to [`add_revisioned`](Self::add_revisioned).
    pub fn current_counter(&self) -> Revision {
        self.counter.current()
    }

    /// Revision of `id`, or the current counter if the key has no revision yet.
    pub fn current_revision(&self, id: &str) -> Revision {
        self.revisions
            .get(id)
            .unwrap_or_else(|| self.counter.current())
    }

    /// Returns the cached object for `id` if it is present, fresh and of type `T`.
    ///
    /// A type mismatch yields `None`, like a miss.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidKey`] for an empty key, or the entry store's error.
    pub fn get<T: Revisioned + 'static>(&self, id: &str) -> Result<Option<Arc<T>>> {
        let found = self.lookup(id)?.and_then(downcast::<T>);
        match found {
            Some(_) => self.record(|stats| stats.record_hit()),
            None => self.record(|stats| stats.record_miss()),
        }
        Ok(found)
    }

    /// Returns the cached object for `id` if it is present and fresh.
    ///
    /// A stale entry (its revision is behind the revision store) is removed.
    pub fn get_revisioned(&self, id: &str) -> Result<Option<Arc<dyn Revisioned>>> {
        let found = self.lookup(id)?;
        if found.is_some() {
            self.record(|stats| stats.record_hit());
        }
        Ok(found)
    }

    // Records misses on the way out; hits are left to the caller.
    fn lookup(&self, id: &str) -> Result<Option<Arc<dyn Revisioned>>> {
        check_key(id)?;

        let Some(object) = self.cache.get(id)? else {
            self.record(|stats| stats.record_miss());
            return Ok(None);
        };

        let Some(rev) = self.revisions.get(id) else {
            // No bookkeeping for this key on this node: staleness cannot be proven
            trace!(cache = %self.config.name, key = %id, "get() missing revision");
            return Ok(Some(object));
        };

        let object_rev = object.revision().unwrap_or(-1);
        if rev > object_rev {
            trace!(
                cache = %self.config.name,
                key = %id,
                revision = rev,
                object_revision = object_rev,
                "get() evicting stale entry"
            );
            self.cache.remove(id)?;
            self.record(|stats| {
                stats.record_stale_eviction();
                stats.record_miss();
            });
            return Ok(None);
        }

        Ok(Some(object))
    }

    /// Tries to cache `object`, loaded by a read that started at `startup_revision`.
    ///
    /// Uses the configured default lifespan. See
    /// [`add_revisioned_with_lifespan`](Self::add_revisioned_with_lifespan).
    pub fn add_revisioned(
        &self,
        object: Arc<dyn Revisioned>,
        startup_revision: Revision,
    ) -> Result<AddOutcome> {
        self.add(object, startup_revision, self.config.default_lifespan)
    }

    /// Tries to cache `object` for at most `lifespan`.
    ///
    /// The write happens under the key's revision lock and is decided by
    /// comparing the stored revision `rev` with `startup_revision` and the
    /// object's revision `obj`:
    ///
    /// | Condition | Result |
    /// |---|---|
    /// | `rev > startup_revision` | [`AddOutcome::ConcurrentUpdate`] |
    /// | `rev == obj` | [`AddOutcome::Cached`] |
    /// | `rev > obj` | [`AddOutcome::Stale`] |
    /// | `rev < obj` | revision advanced to `obj`, [`AddOutcome::Cached`] |
    ///
    /// Failing to take the lock within the configured timeout skips caching
    /// and returns [`AddOutcome::LockTimeout`]; it never blocks longer.
    pub fn add_revisioned_with_lifespan(
        &self,
        object: Arc<dyn Revisioned>,
        startup_revision: Revision,
        lifespan: Duration,
    ) -> Result<AddOutcome> {
        self.add(object, startup_revision, Some(lifespan))
    }

    fn add(
        &self,
        object: Arc<dyn Revisioned>,
        startup_revision: Revision,
        lifespan: Option<Duration>,
    ) -> Result<AddOutcome> {
        let id = object.id().to_string();
        check_key(&id)?;

        self.revisions.get_or_init(&id, self.counter.current());

        let Some(_lock) = self.revisions.try_lock(&id, self.config.lock_timeout) else {
            trace!(cache = %self.config.name, key = %id, "Could not obtain version lock");
            self.record(|stats| stats.record_lock_timeout());
            return Ok(AddOutcome::LockTimeout);
        };

        let outcome = self.cache_if_current(&id, object, startup_revision, lifespan)?;
        self.record(|stats| {
            if outcome.is_cached() {
                stats.record_cached_write();
            } else {
                stats.record_skipped_write();
            }
        });
        Ok(outcome)
    }

    // Must be called with the revision lock of `id` held
    fn cache_if_current(
        &self,
        id: &str,
        object: Arc<dyn Revisioned>,
        startup_revision: Revision,
        lifespan: Option<Duration>,
    ) -> Result<AddOutcome> {
        let Some(rev) = self.revisions.get(id) else {
            return Ok(AddOutcome::Superseded);
        };

        if rev > startup_revision {
            trace!(
                cache = %self.config.name,
                key = %id,
                revision = rev,
                startup_revision,
                "Skipped cache, key updated after the read started"
            );
            return Ok(AddOutcome::ConcurrentUpdate);
        }

        let object_rev = object.revision().unwrap_or(-1);
        if rev == object_rev {
            self.cache.put_for_external_read(id, object, lifespan)?;
            return Ok(AddOutcome::Cached);
        }

        if rev > object_rev {
            trace!(
                cache = %self.config.name,
                key = %id,
                revision = rev,
                object_revision = object_rev,
                "Skipped cache, object revision is behind"
            );
            return Ok(AddOutcome::Stale);
        }

        // Invalidations do not take the lock, so only advance if nobody bumped meanwhile
        if !self.revisions.compare_and_set(id, rev, object_rev) {
            trace!(cache = %self.config.name, key = %id, "Skipped cache, revision moved");
            return Ok(AddOutcome::Superseded);
        }
        self.cache.put_for_external_read(id, object, lifespan)?;
        Ok(AddOutcome::Cached)
    }

    /// Removes `id` from the entry store and bumps its revision.
    ///
    /// Returns the removed object, if any.
    pub fn invalidate_object(&self, id: &str) -> Result<Option<Arc<dyn Revisioned>>> {
        check_key(id)?;

        let removed = self.cache.remove(id)?;
        trace!(cache = %self.config.name, key = %id, removed = ?removed, "Removed key from cache");

        self.bump_revision(id);
        Ok(removed)
    }

    /// Invalidates every cached key starting with `prefix`.
    ///
    /// Scans all keys of the entry store, so it is meant for coarse-grained
    /// changes such as dropping everything that belongs to a realm. A key
    /// whose removal fails keeps its revision; the other keys are still
    /// invalidated and the first failure is returned.
    pub fn invalidate_prefix(&self, prefix: &str) -> Result<Vec<Arc<dyn Revisioned>>> {
        let keys: Vec<String> = self
            .cache
            .keys()?
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect();

        let mut removed_objects = Vec::with_capacity(keys.len());
        let mut first_error = None;
        for key in keys {
            match self.cache.remove(&key) {
                Ok(removed) => {
                    trace!(cache = %self.config.name, key = %key, removed = ?removed, "Removed key from cache");
                    self.bump_revision(&key);
                    removed_objects.extend(removed);
                }
                Err(e) => {
                    warn!(cache = %self.config.name, key = %key, error = %e, "Failed to remove key from cache");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(removed_objects),
        }
    }

    fn bump_revision(&self, id: &str) {
        let next = self.counter.next();
        self.revisions.bump(id, next);
        self.record(|stats| stats.record_invalidation());
    }

    /// Applies every key and prefix invalidation collected in `batch`.
    ///
    /// A failing key or prefix does not stop the rest of the batch; the first
    /// failure is returned once everything else has been applied.
    pub fn run_invalidations(&self, batch: &InvalidationManager<E>) -> Result<()> {
        let mut first_error = None;
        for key in batch.model_invalidations() {
            if let Err(e) = self.invalidate_object(key) {
                warn!(cache = %self.config.name, key = %key, error = %e, "Failed to invalidate key");
                first_error.get_or_insert(e);
            }
        }
        for prefix in batch.prefix_invalidations() {
            if let Err(e) = self.invalidate_prefix(prefix) {
                warn!(cache = %self.config.name, prefix = %prefix, error = %e, "Failed to invalidate prefix");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn is_model_invalidated(&self, id: &str, batch: Option<&InvalidationManager<E>>) -> bool {
        batch.map_or(false, |batch| batch.is_model_invalidated(id))
    }

    pub fn is_prefix_invalidated(
        &self,
        prefix: &str,
        batch: Option<&InvalidationManager<E>>,
    ) -> bool {
        batch.map_or(false, |batch| batch.is_prefix_invalidated(prefix))
    }

    /// Adds to `invalidations` every cached key whose entry matches `predicate`.
    pub fn add_invalidations<F>(&self, predicate: F, invalidations: &mut HashSet<String>) -> Result<()>
    where
        F: Fn(&str, &dyn Revisioned) -> bool,
    {
        for key in self.cache.keys()? {
            if let Some(object) = self.cache.get(&key)? {
                if predicate(&key, object.as_ref()) {
                    invalidations.insert(key);
                }
            }
        }
        Ok(())
    }

    /// Publishes `events`, followed by the events collected in `batch`, to all
    /// nodes in all data centers.
    ///
    /// Publishing is best effort: failures are logged and skipped. Returns the
    /// number of events that were handed to the propagator.
    pub fn send_invalidation_events(
        &self,
        events: &[E],
        event_key: &str,
        batch: Option<&InvalidationManager<E>>,
    ) -> usize {
        let batched = batch.map_or(&[][..], |batch| batch.invalidation_events());

        let mut sent = 0;
        for event in events.iter().chain(batched) {
            match self
                .propagator
                .notify(event_key, event, true, DcNotify::AllDcs)
            {
                Ok(()) => {
                    debug!(cache = %self.config.name, channel = %event_key, ?event, "Published invalidation event");
                    self.record(|stats| stats.record_event_sent());
                    sent += 1;
                }
                Err(e) => {
                    warn!(
                        cache = %self.config.name,
                        channel = %event_key,
                        error = %e,
                        ?event,
                        "Failed to publish invalidation event"
                    );
                    self.record(|stats| stats.record_event_failed());
                }
            }
        }
        sent
    }

    /// Handles an invalidation event received from the cluster.
    ///
    /// The event is translated into keys and applied exactly like a local
    /// batch. Translation and store failures are logged and the event dropped:
    /// a missed invalidation costs bounded staleness, not a crashed node.
    pub fn invalidation_event_received(&self, event: &E) {
        self.record(|stats| stats.record_event_received());

        let mut batch = InvalidationManager::new();
        let mut invalidations = HashSet::new();
        if let Err(e) = self
            .translator
            .add_invalidations(event, &mut invalidations, &mut batch)
        {
            error!(cache = %self.config.name, error = %e, ?event, "Dropping untranslatable invalidation event");
            return;
        }
        batch.extend(invalidations);

        debug!(
            cache = %self.config.name,
            node = self.config.node.as_deref().unwrap_or("local"),
            "Invalidating {} cache items after received event {:?}",
            batch.model_invalidations().len(),
            event
        );

        if let Err(e) = self.run_invalidations(&batch) {
            error!(cache = %self.config.name, error = %e, ?event, "Failed to apply received invalidation event");
        }
    }

    /// Empties both the entry store and the revision store.
    pub fn clear(&self) -> Result<()> {
        self.cache.clear()?;
        self.revisions.clear();
        Ok(())
    }

    #[cfg(feature = "stats")]
    #[inline]
    fn record(&self, f: impl FnOnce(&CacheStats)) {
        f(&self.stats);
    }

    #[cfg(not(feature = "stats"))]
    #[inline]
    fn record(&self, _f: impl FnOnce(&CacheStats)) {}
}

fn check_key(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(CacheError::InvalidKey);
    }
    Ok(())
}
