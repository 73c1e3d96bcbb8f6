use revcache::{
    CacheConfig, CacheManager, InvalidationManager, KeyEventTranslator, NoopPropagator,
    Revisioned, Versioned,
};
use std::collections::HashMap;
use std::sync::Arc;

fn manager() -> CacheManager<String> {
    CacheManager::local(CacheConfig::new("clients"), KeyEventTranslator, NoopPropagator).unwrap()
}

fn cache_all(cache: &CacheManager<String>, keys: &[&str]) {
    let start = cache.current_counter();
    for key in keys {
        let object: Arc<dyn Revisioned> = Arc::new(Versioned::new(*key, start, ()));
        assert!(cache.add_revisioned(object, start).unwrap().is_cached());
    }
}

#[test]
fn test_prefix_removes_only_matching_keys() {
    let cache = manager();
    cache_all(&cache, &["client.a", "client.b", "user.c"]);

    let removed = cache.invalidate_prefix("client.").unwrap();

    let mut ids: Vec<&str> = removed.iter().map(|o| o.id()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["client.a", "client.b"]);

    assert!(cache.get_revisioned("client.a").unwrap().is_none());
    assert!(cache.get_revisioned("client.b").unwrap().is_none());
    assert!(cache.get_revisioned("user.c").unwrap().is_some());
}

#[test]
fn test_prefix_bumps_every_matching_revision() {
    let cache = manager();
    let keys = ["r1.client.a", "r1.client.b", "r1.user.u1", "r2.user.u1"];
    cache_all(&cache, &keys);

    let before: HashMap<&str, i64> = keys
        .iter()
        .map(|k| (*k, cache.revisions().get(k).unwrap()))
        .collect();

    cache.invalidate_prefix("r1.").unwrap();

    let remaining = cache.entry_store().keys().unwrap();
    assert!(remaining.iter().all(|k| !k.starts_with("r1.")));

    for key in &keys[..3] {
        assert!(cache.revisions().get(key).unwrap() > before[key], "{key}");
    }
    assert_eq!(cache.revisions().get("r2.user.u1").unwrap(), before["r2.user.u1"]);
}

#[test]
fn test_prefix_without_matches() {
    let cache = manager();
    cache_all(&cache, &["user.a"]);

    assert!(cache.invalidate_prefix("client.").unwrap().is_empty());
    assert!(cache.get_revisioned("user.a").unwrap().is_some());
}

#[test]
fn test_run_invalidations_applies_keys_and_prefixes() {
    let cache = manager();
    cache_all(&cache, &["realm.by.name.acme", "r1.user.u1", "r1.client.c1", "r2.user.u1"]);

    let mut batch: InvalidationManager<String> = InvalidationManager::new();
    batch.add_model_invalidation("realm.by.name.acme");
    batch.add_prefix_invalidation("r1.");
    cache.run_invalidations(&batch).unwrap();

    let mut remaining = cache.entry_store().keys().unwrap();
    remaining.sort();
    assert_eq!(remaining, vec!["r2.user.u1".to_string()]);
}

#[test]
fn test_predicate_invalidations_feed_a_batch() {
    let cache = manager();
    cache_all(&cache, &["user.a", "user.b", "client.c"]);

    let mut keys = std::collections::HashSet::new();
    cache
        .add_invalidations(|key, _| key.starts_with("user."), &mut keys)
        .unwrap();
    assert_eq!(keys.len(), 2);

    let mut batch: InvalidationManager<String> = InvalidationManager::new();
    batch.extend(keys);
    cache.run_invalidations(&batch).unwrap();

    assert!(cache.get_revisioned("user.a").unwrap().is_none());
    assert!(cache.get_revisioned("client.c").unwrap().is_some());
}
