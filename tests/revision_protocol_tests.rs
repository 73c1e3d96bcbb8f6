//! Integration tests for the optimistic revision protocol

use revcache::{
    AddOutcome, CacheConfig, CacheManager, KeyEventTranslator, NoopPropagator, Revision,
    Revisioned, Versioned,
};
use serial_test::serial;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

fn manager() -> CacheManager<String> {
    CacheManager::local(CacheConfig::new("users"), KeyEventTranslator, NoopPropagator).unwrap()
}

fn user(id: &str, revision: Revision) -> Arc<dyn Revisioned> {
    Arc::new(Versioned::new(id, revision, format!("user {id}")))
}

#[test]
fn test_cache_then_invalidate() {
    let cache = manager();

    let outcome = cache.add_revisioned(user("u1", 5), 5).unwrap();
    assert_eq!(outcome, AddOutcome::Cached);

    let cached = cache.get::<Versioned<String>>("u1").unwrap().unwrap();
    assert_eq!(cached.revision(), Some(5));

    cache.invalidate_object("u1").unwrap();
    assert!(cache.get::<Versioned<String>>("u1").unwrap().is_none());
}

#[test]
fn test_remote_event_for_unseen_key_blocks_in_flight_load() {
    let cache = manager();
    assert!(cache.revisions().get("u2").is_none());
    let before = cache.current_counter();

    cache.invalidation_event_received(&"u2".to_string());

    let rev = cache.revisions().get("u2").unwrap();
    assert!(rev > before);

    let outcome = cache.add_revisioned(user("u2", 3), 1).unwrap();
    assert_eq!(outcome, AddOutcome::ConcurrentUpdate);
    assert!(cache.get_revisioned("u2").unwrap().is_none());
}

#[test]
fn test_concurrent_adds_cache_exactly_one() {
    for _ in 0..50 {
        let cache = Arc::new(manager());
        let start = cache.current_counter();
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = [3, 7]
            .into_iter()
            .map(|revision| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.add_revisioned(user("k", revision), start).unwrap()
                })
            })
            .collect();

        let outcomes: Vec<AddOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let cached = outcomes.iter().filter(|o| o.is_cached()).count();
        assert_eq!(cached, 1, "outcomes: {outcomes:?}");

        // the cached object agrees with the revision store
        let object = cache.get_revisioned("k").unwrap().unwrap();
        assert_eq!(object.revision(), cache.revisions().get("k"));
    }
}

#[test]
fn test_write_after_invalidation_is_rejected() {
    let cache = manager();
    let start = cache.current_counter();

    // another request writes the user while ours is still reading
    cache.invalidate_object("u1").unwrap();

    let outcome = cache.add_revisioned(user("u1", start), start).unwrap();
    assert_eq!(outcome, AddOutcome::ConcurrentUpdate);
    assert!(cache.entry_store().get("u1").unwrap().is_none());

    // a read started after the write may cache
    let start = cache.current_counter();
    let outcome = cache.add_revisioned(user("u1", start), start).unwrap();
    assert_eq!(outcome, AddOutcome::Cached);
}

#[test]
fn test_concurrent_invalidation_wins_over_slow_reader() {
    for _ in 0..50 {
        let cache = Arc::new(manager());
        let start = cache.current_counter();
        let barrier = Arc::new(Barrier::new(2));

        let writer = {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                cache.invalidate_object("u1").unwrap();
                barrier.wait();
            })
        };

        barrier.wait();
        let outcome = cache.add_revisioned(user("u1", start), start).unwrap();
        writer.join().unwrap();

        assert!(!outcome.is_cached());
        assert!(cache.get_revisioned("u1").unwrap().is_none());
    }
}

#[test]
fn test_invalidation_is_idempotent() {
    let cache = manager();
    let start = cache.current_counter();
    cache.add_revisioned(user("u1", start), start).unwrap();

    assert!(cache.invalidate_object("u1").unwrap().is_some());
    let after_first = cache.revisions().get("u1").unwrap();

    assert!(cache.invalidate_object("u1").unwrap().is_none());
    let after_second = cache.revisions().get("u1").unwrap();

    assert!(after_second >= after_first);
    assert!(cache.get_revisioned("u1").unwrap().is_none());
}

#[test]
fn test_invalidation_never_lowers_advanced_revision() {
    let cache = manager();
    cache.add_revisioned(user("u1", 100), 1).unwrap();
    assert_eq!(cache.revisions().get("u1"), Some(100));

    cache.invalidate_object("u1").unwrap();
    assert!(cache.revisions().get("u1").unwrap() > 100);
}

#[test]
fn test_random_operations_never_serve_invalidated_entries() {
    let cache = manager();
    let keys = ["a", "b", "c", "d"];
    let mut invalidated: HashMap<&str, bool> = HashMap::new();

    for _ in 0..2000 {
        let key = keys[fastrand::usize(..keys.len())];
        match fastrand::u8(..3) {
            0 => {
                let start = cache.current_counter() - fastrand::i64(0..3);
                let revision = start + fastrand::i64(-2..3);
                if cache.add_revisioned(user(key, revision), start).unwrap().is_cached() {
                    invalidated.insert(key, false);
                }
            }
            1 => {
                cache.invalidate_object(key).unwrap();
                invalidated.insert(key, true);
            }
            _ => {
                let found = cache.get_revisioned(key).unwrap();
                if invalidated.get(key).copied().unwrap_or(false) {
                    assert!(found.is_none(), "served {key} after invalidation");
                }
                if let Some(object) = found {
                    let rev = cache.revisions().get(key);
                    assert!(rev.is_none() || rev <= object.revision());
                }
            }
        }
    }
}

#[test]
fn test_revisions_are_monotonic_under_contention() {
    let cache = Arc::new(manager());
    let done = Arc::new(AtomicBool::new(false));

    let observer = {
        let cache = Arc::clone(&cache);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut last = i64::MIN;
            while !done.load(Ordering::SeqCst) {
                if let Some(rev) = cache.revisions().get("hot") {
                    assert!(rev >= last, "revision went from {last} to {rev}");
                    last = rev;
                }
            }
        })
    };

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for _ in 0..500 {
                    if fastrand::bool() {
                        let start = cache.current_counter();
                        let revision = start + fastrand::i64(0..20);
                        cache.add_revisioned(user("hot", revision), start).unwrap();
                    } else {
                        cache.invalidate_object("hot").unwrap();
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);
    observer.join().unwrap();
}

#[test]
#[serial]
fn test_lock_timeout_is_bounded() {
    let cache = Arc::new(
        CacheManager::<String>::local(
            CacheConfig::new("users").with_lock_timeout(Duration::from_millis(50)),
            KeyEventTranslator,
            NoopPropagator,
        )
        .unwrap(),
    );
    let start = cache.current_counter();
    let locked = Arc::new(Barrier::new(2));

    let holder = {
        let cache = Arc::clone(&cache);
        let locked = Arc::clone(&locked);
        thread::spawn(move || {
            let _guard = cache
                .revisions()
                .try_lock("u1", Duration::from_secs(1))
                .unwrap();
            locked.wait();
            thread::sleep(Duration::from_millis(500));
        })
    };

    locked.wait();
    let began = Instant::now();
    let outcome = cache.add_revisioned(user("u1", start), start).unwrap();
    let waited = began.elapsed();
    holder.join().unwrap();

    assert_eq!(outcome, AddOutcome::LockTimeout);
    assert!(waited < Duration::from_millis(400), "waited {waited:?}");
    assert!(cache.entry_store().get("u1").unwrap().is_none());

    // the next attempt succeeds once the lock is free
    let outcome = cache.add_revisioned(user("u1", start), start).unwrap();
    assert_eq!(outcome, AddOutcome::Cached);
}

#[test]
fn test_stale_object_is_not_cached() {
    let cache = manager();
    cache.add_revisioned(user("u1", 8), 8).unwrap();
    cache.entry_store().remove("u1").unwrap();

    let outcome = cache.add_revisioned(user("u1", 6), 8).unwrap();
    assert_eq!(outcome, AddOutcome::Stale);
    assert!(cache.get_revisioned("u1").unwrap().is_none());
}
