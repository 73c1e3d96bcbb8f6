use crate::counter::Revision;
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

/// Conversion of a shared object into a type-erased [`Any`] handle.
///
/// Implemented for every `Send + Sync + 'static` type, so it never needs to be
/// implemented by hand. It lets the cache manager downcast a stored
/// `Arc<dyn Revisioned>` to the concrete type a caller expects.
pub trait AsAnyArc {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAnyArc for T {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A cached snapshot of a domain object tagged with the revision it was read at.
///
/// The revision is the object's own version stamp, which the cache manager
/// compares against the node-local revision store. Entries are immutable:
/// they are replaced or removed, never updated in place.
pub trait Revisioned: AsAnyArc + Debug + Send + Sync {
    /// Cache key of the object
    fn id(&self) -> &str;

    /// Revision the object was loaded at, if known
    fn revision(&self) -> Option<Revision>;
}

/// Generic [`Revisioned`] wrapper around an arbitrary payload.
///
/// # Examples
///
/// ```
/// use revcache_core::{Revisioned, Versioned};
///
/// let realm = Versioned::new("realm-1", 5, "master".to_string());
/// assert_eq!(realm.id(), "realm-1");
/// assert_eq!(realm.revision(), Some(5));
/// assert_eq!(realm.payload(), "master");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    id: String,
    revision: Option<Revision>,
    payload: T,
}

impl<T> Versioned<T> {
    pub fn new(id: impl Into<String>, revision: Revision, payload: T) -> Self {
        Self {
            id: id.into(),
            revision: Some(revision),
            payload,
        }
    }

    /// Creates a snapshot without a version stamp.
    ///
    /// Such an entry compares as revision `-1` and is therefore evicted as soon
    /// as the revision store knows anything about its key.
    pub fn unversioned(id: impl Into<String>, payload: T) -> Self {
        Self {
            id: id.into(),
            revision: None,
            payload,
        }
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn into_payload(self) -> T {
        self.payload
    }
}

impl<T> Revisioned for Versioned<T>
where
    T: Debug + Send + Sync + 'static,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn revision(&self) -> Option<Revision> {
        self.revision
    }
}

/// Downcasts a stored entry to the concrete type `T`.
///
/// Returns `None` when the entry holds a different type.
pub fn downcast<T: Revisioned + 'static>(object: Arc<dyn Revisioned>) -> Option<Arc<T>> {
    object.into_any_arc().downcast::<T>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Role {
        id: String,
    }

    impl Revisioned for Role {
        fn id(&self) -> &str {
            &self.id
        }

        fn revision(&self) -> Option<Revision> {
            Some(1)
        }
    }

    #[test]
    fn test_downcast_matching_type() {
        let object: Arc<dyn Revisioned> = Arc::new(Versioned::new("u1", 3, 42u32));
        let user = downcast::<Versioned<u32>>(object).unwrap();
        assert_eq!(*user.payload(), 42);
    }

    #[test]
    fn test_downcast_mismatching_type() {
        let object: Arc<dyn Revisioned> = Arc::new(Role {
            id: "r1".to_string(),
        });
        assert!(downcast::<Versioned<u32>>(object.clone()).is_none());
        assert!(downcast::<Role>(object).is_some());
    }

    #[test]
    fn test_unversioned() {
        let object = Versioned::unversioned("u1", ());
        assert_eq!(object.revision(), None);
    }
}
