use std::sync::atomic::{AtomicI64, Ordering};

/// A logical version number.
pub type Revision = i64;

/// Value of a freshly started counter.
pub const BASELINE_REVISION: Revision = 1;

/// Process-local, strictly increasing version source.
///
/// Every bump of a key's revision consumes exactly one value. The counter is
/// not persisted: a restarted node starts again from its baseline, which is
/// fine because values are only ever compared within one process lifetime.
///
/// # Examples
///
/// ```
/// use revcache_core::UpdateCounter;
///
/// let counter = UpdateCounter::new();
/// assert_eq!(counter.current(), 1);
/// assert_eq!(counter.next(), 2);
/// assert_eq!(counter.next(), 3);
/// assert_eq!(counter.current(), 3);
/// ```
#[derive(Debug)]
pub struct UpdateCounter {
    value: AtomicI64,
}

impl UpdateCounter {
    /// Creates a counter starting at [`BASELINE_REVISION`].
    pub fn new() -> Self {
        Self::with_baseline(BASELINE_REVISION)
    }

    /// Creates a counter whose first issued value is `baseline + 1`.
    pub fn with_baseline(baseline: Revision) -> Self {
        Self {
            value: AtomicI64::new(baseline),
        }
    }

    /// Atomically increments the counter and returns the new value.
    #[inline]
    pub fn next(&self) -> Revision {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns the last issued value without incrementing.
    #[inline]
    pub fn current(&self) -> Revision {
        self.value.load(Ordering::SeqCst)
    }
}

impl Default for UpdateCounter {
    fn default() -> Self {
        Self::new()
    }
}
