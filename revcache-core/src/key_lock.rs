use dashmap::DashMap;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use std::sync::Arc;
use std::time::Duration;

/// Keyed advisory lock manager.
///
/// Holds one mutex per key that is currently locked or awaited. Lock entries
/// are created on demand and dropped again once the last holder releases, so
/// the map only grows with the number of keys under contention.
///
/// # Examples
///
/// ```
/// use revcache_core::KeyLocks;
/// use std::time::Duration;
///
/// let locks = KeyLocks::new();
/// let guard = locks.try_lock_for("user-1", Duration::from_millis(10));
/// assert!(guard.is_some());
///
/// // Other keys are independent
/// assert!(locks.try_lock_for("user-2", Duration::ZERO).is_some());
/// ```
#[derive(Debug, Default)]
pub struct KeyLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Tries to lock `key`, waiting at most `timeout`.
    ///
    /// Returns `None` when the lock could not be obtained in time. The lock is
    /// released when the returned guard is dropped.
    pub fn try_lock_for(&self, key: &str, timeout: Duration) -> Option<KeyLockGuard<'_>> {
        // The shard lock is released at the end of this statement, before we block
        let lock = Arc::clone(self.locks.entry(key.to_string()).or_default().value());

        match lock.try_lock_arc_for(timeout) {
            Some(guard) => Some(KeyLockGuard {
                locks: &self.locks,
                key: key.to_string(),
                guard: Some(guard),
            }),
            None => {
                drop(lock);
                self.release_if_unused(key);
                None
            }
        }
    }

    /// Returns true if some thread currently holds the lock for `key`.
    pub fn is_locked(&self, key: &str) -> bool {
        self.locks
            .get(key)
            .map(|lock| lock.is_locked())
            .unwrap_or(false)
    }

    /// Number of keys with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    fn release_if_unused(&self, key: &str) {
        // Only the map itself still references the mutex: nobody holds or awaits it
        self.locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Scoped ownership of a per-key lock. Unlocks on drop.
pub struct KeyLockGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    key: String,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl KeyLockGuard<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyLockGuard<'_> {
    fn drop(&mut self) {
        // unlock first, then forget the mutex if nobody else is waiting on it
        self.guard.take();
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl std::fmt::Debug for KeyLockGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLockGuard").field("key", &self.key).finish()
    }
}
