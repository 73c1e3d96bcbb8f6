//! # Realm Invalidation Events
//!
//! Invalidation events for an identity-management model (realms with their
//! clients, roles and users) and the translator that maps them to cache keys.
//!
//! An event names the object that changed plus whatever is needed to derive
//! its secondary keys (lookups by name, cached list queries). Removing a realm
//! drops everything under the realm's key prefix.

use crate::error::{CacheError, Result};
use crate::invalidation::InvalidationManager;
use crate::keys;
use crate::translation::EventTranslator;
use std::collections::HashSet;

/// A change to the realm model that must be reflected in every node's cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RealmCacheEvent {
    RealmUpdated {
        realm_id: String,
        realm_name: String,
    },
    RealmRemoved {
        realm_id: String,
        realm_name: String,
    },
    ClientAdded {
        realm_id: String,
        client_uuid: String,
        client_id: String,
    },
    ClientUpdated {
        realm_id: String,
        client_uuid: String,
        client_id: String,
    },
    ClientRemoved {
        realm_id: String,
        client_uuid: String,
        client_id: String,
    },
    RoleAdded {
        realm_id: String,
        role_id: String,
        container_id: String,
        role_name: String,
    },
    RoleUpdated {
        realm_id: String,
        role_id: String,
        container_id: String,
        role_name: String,
    },
    RoleRemoved {
        realm_id: String,
        role_id: String,
        container_id: String,
        role_name: String,
    },
    UserUpdated {
        realm_id: String,
        user_id: String,
        username: String,
    },
    UserRemoved {
        realm_id: String,
        user_id: String,
        username: String,
    },
}

impl RealmCacheEvent {
    /// Id of the realm the event belongs to.
    pub fn realm_id(&self) -> &str {
        match self {
            RealmCacheEvent::RealmUpdated { realm_id, .. }
            | RealmCacheEvent::RealmRemoved { realm_id, .. }
            | RealmCacheEvent::ClientAdded { realm_id, .. }
            | RealmCacheEvent::ClientUpdated { realm_id, .. }
            | RealmCacheEvent::ClientRemoved { realm_id, .. }
            | RealmCacheEvent::RoleAdded { realm_id, .. }
            | RealmCacheEvent::RoleUpdated { realm_id, .. }
            | RealmCacheEvent::RoleRemoved { realm_id, .. }
            | RealmCacheEvent::UserUpdated { realm_id, .. }
            | RealmCacheEvent::UserRemoved { realm_id, .. } => realm_id,
        }
    }
}

/// Maps [`RealmCacheEvent`]s to the keys built by [`keys`](crate::keys).
///
/// # Examples
///
/// ```
/// use revcache_core::{EventTranslator, InvalidationManager, RealmCacheEvent, RealmEventTranslator};
/// use std::collections::HashSet;
///
/// let event = RealmCacheEvent::UserUpdated {
///     realm_id: "r1".into(),
///     user_id: "u1".into(),
///     username: "alice".into(),
/// };
///
/// let mut keys = HashSet::new();
/// let mut batch = InvalidationManager::new();
/// RealmEventTranslator.add_invalidations(&event, &mut keys, &mut batch).unwrap();
///
/// assert!(keys.contains("r1.user.u1"));
/// assert!(keys.contains("r1.user.by.username.alice"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct RealmEventTranslator;

impl EventTranslator<RealmCacheEvent> for RealmEventTranslator {
    fn add_invalidations(
        &self,
        event: &RealmCacheEvent,
        invalidations: &mut HashSet<String>,
        batch: &mut InvalidationManager<RealmCacheEvent>,
    ) -> Result<()> {
        let realm_id = event.realm_id();
        if realm_id.is_empty() {
            return Err(CacheError::Translation(format!(
                "event without realm id: {event:?}"
            )));
        }

        match event {
            RealmCacheEvent::RealmUpdated { realm_name, .. } => {
                invalidations.insert(keys::realm(realm_id));
                invalidations.insert(keys::realm_by_name(realm_name));
            }
            RealmCacheEvent::RealmRemoved { realm_name, .. } => {
                invalidations.insert(keys::realm(realm_id));
                invalidations.insert(keys::realm_by_name(realm_name));
                batch.add_prefix_invalidation(keys::realm_prefix(realm_id));
            }
            RealmCacheEvent::ClientAdded { client_id, .. } => {
                invalidations.insert(keys::client_by_client_id(realm_id, client_id));
                invalidations.insert(keys::clients_query(realm_id));
            }
            RealmCacheEvent::ClientUpdated {
                client_uuid,
                client_id,
                ..
            } => {
                invalidations.insert(keys::client(realm_id, client_uuid));
                invalidations.insert(keys::client_by_client_id(realm_id, client_id));
                invalidations.insert(keys::clients_query(realm_id));
            }
            RealmCacheEvent::ClientRemoved {
                client_uuid,
                client_id,
                ..
            } => {
                invalidations.insert(keys::client(realm_id, client_uuid));
                invalidations.insert(keys::client_by_client_id(realm_id, client_id));
                invalidations.insert(keys::clients_query(realm_id));
                // client roles go with the client
                invalidations.insert(keys::roles_query(realm_id, client_uuid));
            }
            RealmCacheEvent::RoleAdded {
                container_id,
                role_name,
                ..
            } => {
                invalidations.insert(keys::role_by_name(realm_id, container_id, role_name));
                invalidations.insert(keys::roles_query(realm_id, container_id));
            }
            RealmCacheEvent::RoleUpdated {
                role_id,
                container_id,
                role_name,
                ..
            }
            | RealmCacheEvent::RoleRemoved {
                role_id,
                container_id,
                role_name,
                ..
            } => {
                invalidations.insert(keys::role(realm_id, role_id));
                invalidations.insert(keys::role_by_name(realm_id, container_id, role_name));
                invalidations.insert(keys::roles_query(realm_id, container_id));
            }
            RealmCacheEvent::UserUpdated {
                user_id, username, ..
            }
            | RealmCacheEvent::UserRemoved {
                user_id, username, ..
            } => {
                invalidations.insert(keys::user(realm_id, user_id));
                invalidations.insert(keys::user_by_username(realm_id, username));
            }
        }

        Ok(())
    }
}
