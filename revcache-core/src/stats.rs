use std::sync::atomic::{AtomicU64, Ordering};

/// Cache statistics for monitoring hit rates, staleness and invalidation traffic.
///
/// This structure tracks cache activity using atomic operations for
/// thread-safe statistics collection with minimal overhead.
///
/// # Thread Safety
///
/// All operations are thread-safe using atomic operations with `Relaxed` ordering,
/// which provides the best performance while still maintaining consistency.
///
/// # Examples
///
/// ```
/// use revcache_core::CacheStats;
///
/// let stats = CacheStats::new();
///
/// // Simulate cache operations
/// stats.record_hit();
/// stats.record_hit();
/// stats.record_miss();
///
/// assert_eq!(stats.hits(), 2);
/// assert_eq!(stats.misses(), 1);
/// assert_eq!(stats.total_accesses(), 3);
/// assert!((stats.hit_rate() - 0.6666).abs() < 0.001);
/// ```
#[derive(Debug)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_evictions: AtomicU64,
    cached_writes: AtomicU64,
    skipped_writes: AtomicU64,
    lock_timeouts: AtomicU64,
    invalidations: AtomicU64,
    events_sent: AtomicU64,
    events_failed: AtomicU64,
    events_received: AtomicU64,
}

macro_rules! counter {
    ($record:ident, $get:ident, $field:ident, $doc:literal) => {
        #[doc = concat!("Increments the ", $doc, " counter.")]
        #[inline]
        pub fn $record(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }

        #[doc = concat!("Returns the number of ", $doc, ".")]
        #[inline]
        pub fn $get(&self) -> u64 {
            self.$field.load(Ordering::Relaxed)
        }
    };
}

impl CacheStats {
    /// Creates a new `CacheStats` instance with zero counters.
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stale_evictions: AtomicU64::new(0),
            cached_writes: AtomicU64::new(0),
            skipped_writes: AtomicU64::new(0),
            lock_timeouts: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
            events_sent: AtomicU64::new(0),
            events_failed: AtomicU64::new(0),
            events_received: AtomicU64::new(0),
        }
    }

    counter!(record_hit, hits, hits, "cache hits");
    counter!(record_miss, misses, misses, "cache misses");
    counter!(
        record_stale_eviction,
        stale_evictions,
        stale_evictions,
        "stale evictions"
    );
    counter!(record_cached_write, cached_writes, cached_writes, "cached writes");
    counter!(
        record_skipped_write,
        skipped_writes,
        skipped_writes,
        "skipped writes"
    );
    counter!(
        record_lock_timeout,
        lock_timeouts,
        lock_timeouts,
        "lock timeouts"
    );
    counter!(
        record_invalidation,
        invalidations,
        invalidations,
        "invalidated keys"
    );
    counter!(record_event_sent, events_sent, events_sent, "published events");
    counter!(
        record_event_failed,
        events_failed,
        events_failed,
        "failed publishes"
    );
    counter!(
        record_event_received,
        events_received,
        events_received,
        "received events"
    );

    /// Returns the total number of cache lookups (hits + misses).
    #[inline]
    pub fn total_accesses(&self) -> u64 {
        self.hits() + self.misses()
    }

    /// Calculates and returns the cache hit rate as a fraction (0.0 to 1.0).
    ///
    /// Returns 0.0 if there have been no accesses.
    #[inline]
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_accesses();
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }

    /// Calculates and returns the cache miss rate as a fraction (0.0 to 1.0).
    #[inline]
    pub fn miss_rate(&self) -> f64 {
        1.0 - self.hit_rate()
    }

    /// Resets all statistics counters to zero.
    pub fn reset(&self) {
        for counter in self.counters() {
            counter.store(0, Ordering::Relaxed);
        }
    }

    fn counters(&self) -> [&AtomicU64; 10] {
        [
            &self.hits,
            &self.misses,
            &self.stale_evictions,
            &self.cached_writes,
            &self.skipped_writes,
            &self.lock_timeouts,
            &self.invalidations,
            &self.events_sent,
            &self.events_failed,
            &self.events_received,
        ]
    }
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for CacheStats {
    fn clone(&self) -> Self {
        let copy = Self::new();
        for (from, to) in self.counters().iter().zip(copy.counters()) {
            to.store(from.load(Ordering::Relaxed), Ordering::Relaxed);
        }
        copy
    }
}
