//! The two interchangeable storage designs behind the query builder.

mod field_index;
mod path_index;

pub use field_index::FieldIndexBackend;
pub use path_index::PathIndexBackend;

use std::time::Duration;

use mirror_core::{MirrorError, Object};

/// A scoped request materialized by [`crate::query::QueryBuilder`] and
/// handed to a [`MirrorBackend`].
///
/// Holds whichever of `namespace`/`kind`/`version`/`within` the caller set;
/// each backend turns the present fields into its own native key or query
/// string.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// The object's namespace, absent for cluster-scoped kinds.
    pub namespace: Option<String>,
    /// The resource kind, e.g. `"pods"`.
    pub kind: Option<String>,
    /// The object's API version segment, if the caller constrained it.
    pub version: Option<String>,
    /// Restrict matches to objects modified within this duration of now
    /// (field-index backend only; ignored by the path-index backend).
    pub within: Option<Duration>,
}

/// The capability set both backend designs implement.
///
/// Object-safe so a [`crate::query::QueryBuilder`] can hold
/// `Arc<dyn MirrorBackend<K>>` without knowing which variant it's talking
/// to, per the adapter pattern this crate's backends are built around.
pub trait MirrorBackend<K: Object>: Send + Sync {
    /// Validate one scope segment's character set. The two backends accept
    /// different alphabets: the field-index backend additionally allows
    /// `*` as a wildcard term.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::InvalidQuery`] if `value` contains a
    /// disallowed character.
    fn validate_segment(&self, field: &'static str, value: &str) -> Result<(), MirrorError>;

    /// Whether this backend requires `kind` to be set even for `list`
    /// (the field-index backend's query grammar makes `kind` mandatory in
    /// every query; the path-index backend only requires it when
    /// addressing a single object by name).
    fn requires_kind_for_list(&self) -> bool {
        false
    }

    /// Fetch the object at `scope` named `name`.
    ///
    /// # Errors
    ///
    /// [`MirrorError::AmbiguousResult`] if more than one object matches;
    /// [`MirrorError::BackendFailure`] on an internal failure.
    fn get(&self, scope: &Scope, name: &str) -> Result<Option<K>, MirrorError>;

    /// Upsert `object` at `scope`/`name`.
    fn set(&self, scope: &Scope, name: &str, object: K) -> Result<(), MirrorError>;

    /// Remove the object at `scope`/`name`. Returns whether anything was
    /// removed; idempotent.
    fn delete(&self, scope: &Scope, name: &str) -> Result<bool, MirrorError>;

    /// List every object matching `scope`, in unspecified order.
    fn list(&self, scope: &Scope) -> Result<Vec<K>, MirrorError>;
}
