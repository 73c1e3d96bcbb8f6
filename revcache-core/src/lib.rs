//! # Revcache Core
//!
//! Revision-checked invalidation cache for clustered deployments.
//!
//! Nodes cache read-mostly objects loaded from a shared source of truth. Writes
//! on any node invalidate the affected keys locally and publish an event so
//! every other node does the same. A per-key revision, tracked on each node,
//! lets a node refuse to cache a value whose key was invalidated while the
//! value was being loaded.
//!
//! ## Features
//!
//! - **Optimistic Caching**: [`CacheManager::add_revisioned`] only stores a value if nothing invalidated its key since the read began
//! - **Stale Reads Evicted**: [`CacheManager::get`] drops entries older than the known revision
//! - **Prefix Invalidation**: Drop every key under a prefix in one call
//! - **Invalidation Batches**: Collect keys, prefixes and events per unit of work
//! - **Pluggable Propagation**: [`InvalidationPropagator`] trait plus an in-process [`ClusterBus`]
//! - **Pluggable Translation**: [`EventTranslator`] maps inbound events to keys
//! - **Statistics**: Hit rate, skipped writes and event traffic (`stats` feature)
//!
//! ## Module Organization
//!
//! - [`counter`] - Process-local update counter
//! - [`revision_store`] - Node-local per-key revisions and revision locks
//! - [`entry_store`] - Invalidation cache holding revisioned snapshots
//! - [`manager`] - The revision protocol
//! - [`invalidation`] - Per unit-of-work invalidation batches
//! - [`propagation`] - Cluster fan-out of invalidation events
//! - [`translation`] - Event to key mapping
//! - [`keys`] and [`realm`] - Realm-scoped keys and events
//!
//! ## Example
//!
//! ```
//! use revcache_core::{
//!     AddOutcome, CacheConfig, CacheManager, KeyEventTranslator, NoopPropagator, Versioned,
//! };
//! use std::sync::Arc;
//!
//! let cache: CacheManager<String> =
//!     CacheManager::local(CacheConfig::new("users"), KeyEventTranslator, NoopPropagator).unwrap();
//!
//! // capture the counter, then load from the source of truth
//! let start = cache.current_counter();
//! let user = Arc::new(Versioned::new("u1", start, "alice".to_string()));
//!
//! assert_eq!(cache.add_revisioned(user, start).unwrap(), AddOutcome::Cached);
//! let cached = cache.get::<Versioned<String>>("u1").unwrap().unwrap();
//! assert_eq!(cached.payload(), "alice");
//!
//! // a write anywhere invalidates the key
//! cache.invalidate_object("u1").unwrap();
//! assert!(cache.get::<Versioned<String>>("u1").unwrap().is_none());
//! ```
mod cache_entry;
mod config;
mod error;
mod key_lock;
mod stats;

pub mod counter;
pub mod entry_store;
pub mod invalidation;
pub mod keys;
pub mod manager;
pub mod propagation;
pub mod realm;
pub mod revision_store;
pub mod revisioned;
pub mod translation;

pub use cache_entry::CacheEntry;
pub use config::{CacheConfig, DEFAULT_LOCK_TIMEOUT};
pub use counter::{Revision, UpdateCounter, BASELINE_REVISION};
pub use entry_store::{EntryStore, LocalEntryStore};
pub use error::{CacheError, Result};
pub use invalidation::InvalidationManager;
pub use key_lock::{KeyLockGuard, KeyLocks};
pub use manager::{AddOutcome, CacheManager};
pub use propagation::{
    ClusterBus, ClusterNode, DcNotify, InvalidationPropagator, Listener, NodeInfo, NoopPropagator,
};
pub use realm::{RealmCacheEvent, RealmEventTranslator};
pub use revision_store::RevisionStore;
pub use revisioned::{downcast, AsAnyArc, Revisioned, Versioned};
pub use stats::CacheStats;
pub use translation::{EventTranslator, KeyEventTranslator};
