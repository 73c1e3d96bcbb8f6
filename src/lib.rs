//! # Revcache
//!
//! A revision-checked invalidation cache for clustered services.
//!
//! Each node caches objects loaded from a shared source of truth. A write on
//! any node invalidates the affected keys and publishes an invalidation event;
//! receiving nodes bump the revision of those keys whether or not they hold an
//! entry. A node only caches a freshly loaded value if its key's revision has
//! not moved since the read started, which closes the window where a slow
//! reader would otherwise cache data that another node already replaced.
//!
//! ## Features
//!
//! - **Optimistic caching**: reads race writes without blocking them
//! - **Node-local revisions**: no cluster round trip on the read path
//! - **Best-effort propagation**: a lost event costs bounded staleness, never correctness of later writes
//! - **Prefix invalidation**: drop a whole realm with one call
//!
//! ## Quick Start
//!
//! ```rust
//! use revcache::{AddOutcome, CacheConfig, ClusterBus, KeyEventTranslator, Versioned};
//! use std::sync::Arc;
//!
//! let bus = ClusterBus::<String>::new();
//! let node1 = revcache::join_cluster(&bus, "node1", "dc1", "users", CacheConfig::new("users"), KeyEventTranslator).unwrap();
//! let node2 = revcache::join_cluster(&bus, "node2", "dc1", "users", CacheConfig::new("users"), KeyEventTranslator).unwrap();
//!
//! // node1 loads and caches a user
//! let start = node1.current_counter();
//! let user = Arc::new(Versioned::new("u1", start, "alice".to_string()));
//! assert_eq!(node1.add_revisioned(user, start).unwrap(), AddOutcome::Cached);
//!
//! // node2 writes the user: invalidate locally, then tell the cluster
//! node2.invalidate_object("u1").unwrap();
//! node2.send_invalidation_events(&["u1".to_string()], "users", None);
//!
//! assert!(node1.get::<Versioned<String>>("u1").unwrap().is_none());
//! ```
//!
//! ## Error Handling
//!
//! Local operations return [`Result`]. Publishing and receiving events never
//! fail the caller: problems are logged through `tracing` and counted in
//! [`CacheStats`] when the `stats` feature is enabled.

use std::fmt::Debug;
use std::sync::Arc;

pub use revcache_core::*;

/// Joins `bus` as node `name` in `site` and returns a cache manager wired to it.
///
/// The manager publishes its events through the node and receives the events
/// published by other nodes on `channel`.
///
/// # Errors
///
/// Returns [`CacheError::Configuration`] if `config` is invalid.
///
/// # Examples
///
/// ```rust
/// use revcache::{CacheConfig, ClusterBus, KeyEventTranslator};
///
/// let bus = ClusterBus::<String>::new();
/// let cache = revcache::join_cluster(&bus, "node1", "dc1", "users", CacheConfig::new("users"), KeyEventTranslator).unwrap();
///
/// assert_eq!(cache.name(), "users");
/// assert_eq!(bus.subscription_count(), 1);
/// ```
pub fn join_cluster<E, T>(
    bus: &Arc<ClusterBus<E>>,
    name: &str,
    site: &str,
    channel: &str,
    config: CacheConfig,
    translator: T,
) -> Result<Arc<CacheManager<E>>>
where
    E: Debug + Send + Sync + 'static,
    T: EventTranslator<E> + 'static,
{
    let manager = Arc::new(CacheManager::local(
        config.with_node(name),
        translator,
        bus.join(name, site),
    )?);
    bus.join(name, site).subscribe_manager(channel, &manager);
    Ok(manager)
}
