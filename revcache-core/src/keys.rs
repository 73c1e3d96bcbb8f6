//! Realm-scoped cache key builders.
//!
//! Every object that belongs to a realm is keyed under `"<realm_id>."`, so
//! dropping a whole realm is a single prefix invalidation. The realm object
//! itself and the realm lookup by name live outside that prefix because they
//! are also read before the realm id is known.

/// Prefix shared by every key that belongs to `realm_id`.
///
/// # Examples
///
/// ```
/// use revcache_core::keys;
///
/// assert_eq!(keys::realm_prefix("r1"), "r1.");
/// assert!(keys::user("r1", "u1").starts_with(&keys::realm_prefix("r1")));
/// ```
pub fn realm_prefix(realm_id: &str) -> String {
    format!("{realm_id}.")
}

/// Key of the realm object.
pub fn realm(realm_id: &str) -> String {
    realm_id.to_string()
}

pub fn realm_by_name(name: &str) -> String {
    format!("realm.by.name.{name}")
}

pub fn client(realm_id: &str, client_uuid: &str) -> String {
    format!("{realm_id}.client.{client_uuid}")
}

pub fn client_by_client_id(realm_id: &str, client_id: &str) -> String {
    format!("{realm_id}.client.by.clientId.{client_id}")
}

/// Key of the cached list of all clients of a realm.
pub fn clients_query(realm_id: &str) -> String {
    format!("{realm_id}.clients.query")
}

pub fn role(realm_id: &str, role_id: &str) -> String {
    format!("{realm_id}.role.{role_id}")
}

/// Key of a role looked up by name inside its container (a realm or a client).
pub fn role_by_name(realm_id: &str, container_id: &str, name: &str) -> String {
    format!("{realm_id}.role.by.name.{container_id}.{name}")
}

/// Key of the cached list of all roles of a container.
pub fn roles_query(realm_id: &str, container_id: &str) -> String {
    format!("{realm_id}.roles.query.{container_id}")
}

pub fn user(realm_id: &str, user_id: &str) -> String {
    format!("{realm_id}.user.{user_id}")
}

pub fn user_by_username(realm_id: &str, username: &str) -> String {
    format!("{realm_id}.user.by.username.{username}")
}
