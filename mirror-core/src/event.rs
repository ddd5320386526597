use crate::ResourceKey;

/// What happened to an object.
///
/// Mirrors the three callbacks an [`EventSource`](crate) feeds into a
/// backend: an object appeared, an existing object was replaced, or an
/// object was removed. There is no `Bookmark`/`Error` variant here --
/// those are source-level concerns the controller handles before ever
/// constructing a [`MirrorEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// The object did not previously exist in the mirror.
    Added,
    /// The object replaced a prior version already held by the mirror.
    Updated,
    /// The object was removed from the mirror.
    Deleted,
}

/// A single change delivered to a subscriber.
///
/// `before` is `None` for [`EventType::Added`] and `after` is `None` for
/// [`EventType::Deleted`]; both are populated for [`EventType::Updated`].
#[derive(Debug, Clone)]
pub struct MirrorEvent<K> {
    /// The resource kind the change belongs to.
    pub kind: ResourceKey,
    /// What happened.
    pub event_type: EventType,
    /// The resource version the change landed at.
    pub version: String,
    /// The object's state before the change, if any.
    pub before: Option<K>,
    /// The object's state after the change, if any.
    pub after: Option<K>,
}

impl<K> MirrorEvent<K> {
    /// Build an `Added` event.
    #[must_use]
    pub fn added(kind: ResourceKey, version: impl Into<String>, after: K) -> Self {
        Self {
            kind,
            event_type: EventType::Added,
            version: version.into(),
            before: None,
            after: Some(after),
        }
    }

    /// Build an `Updated` event.
    #[must_use]
    pub fn updated(kind: ResourceKey, version: impl Into<String>, before: K, after: K) -> Self {
        Self {
            kind,
            event_type: EventType::Updated,
            version: version.into(),
            before: Some(before),
            after: Some(after),
        }
    }

    /// Build a `Deleted` event.
    ///
    /// The deleted object is carried in `after`, not `before` -- this is the
    /// fixed, single behavior every call site uses.
    #[must_use]
    pub fn deleted(kind: ResourceKey, version: impl Into<String>, deleted: K) -> Self {
        Self {
            kind,
            event_type: EventType::Deleted,
            version: version.into(),
            before: None,
            after: Some(deleted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestObject;

    fn key() -> ResourceKey {
        ResourceKey::new("", "v1", "pods")
    }

    #[test]
    fn added_has_no_before() {
        let obj = TestObject::new("a", Some("ns"), "1");
        let ev = MirrorEvent::added(key(), "1", obj.clone());
        assert_eq!(ev.event_type, EventType::Added);
        assert!(ev.before.is_none());
        assert_eq!(ev.after, Some(obj));
    }

    #[test]
    fn deleted_has_no_before() {
        let obj = TestObject::new("a", Some("ns"), "1");
        let ev = MirrorEvent::deleted(key(), "2", obj.clone());
        assert_eq!(ev.event_type, EventType::Deleted);
        assert!(ev.before.is_none());
        assert_eq!(ev.after, Some(obj));
    }

    #[test]
    fn updated_has_both() {
        let before = TestObject::new("a", Some("ns"), "1");
        let after = TestObject::new("a", Some("ns"), "2");
        let ev = MirrorEvent::updated(key(), "2", before.clone(), after.clone());
        assert_eq!(ev.before, Some(before));
        assert_eq!(ev.after, Some(after));
    }
}
