//! The fluent, scoped query API callers use to read and write the mirror.
//!
//! A chainable `namespace()` / `kind()` / `version()` / `within()` builder in
//! Rust's consuming `self -> Self` style (the builder is cheap to clone -- an
//! `Arc<dyn MirrorBackend<K>>` plus four small optional fields -- so
//! "immutable per call" costs nothing extra).

use std::sync::Arc;
use std::time::Duration;

use mirror_core::{MirrorError, Object};

use crate::backend::{MirrorBackend, Scope};

/// A scoped, fluent query against a [`MirrorBackend`].
///
/// Each setter consumes `self` and returns a new builder with that field
/// set, so chains read left to right
/// (`store.namespace("default").kind("pods").list()`) while staying true to
/// Rust's ownership model -- nothing here is mutated in place.
#[derive(Clone)]
pub struct QueryBuilder<K> {
    backend: Arc<dyn MirrorBackend<K>>,
    scope: Scope,
}

impl<K: Object> QueryBuilder<K> {
    /// Start an unscoped query against `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn MirrorBackend<K>>) -> Self {
        Self {
            backend,
            scope: Scope::default(),
        }
    }

    /// Constrain to one namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.scope.namespace = Some(namespace.into());
        self
    }

    /// Constrain to one resource kind, e.g. `"pods"`.
    #[must_use]
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.scope.kind = Some(kind.into());
        self
    }

    /// Constrain to one API version segment.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.scope.version = Some(version.into());
        self
    }

    /// Restrict matches to objects modified within `duration` of now
    /// (field-index backend only; ignored by the path-index backend).
    #[must_use]
    pub fn within(mut self, duration: Duration) -> Self {
        self.scope.within = Some(duration);
        self
    }

    fn validate_scope(&self) -> Result<(), MirrorError> {
        if let Some(namespace) = &self.scope.namespace {
            self.backend.validate_segment("namespace", namespace)?;
        }
        if let Some(kind) = &self.scope.kind {
            self.backend.validate_segment("kind", kind)?;
        }
        if let Some(version) = &self.scope.version {
            self.backend.validate_segment("version", version)?;
        }
        Ok(())
    }

    fn require_kind_for_name_ops(&self) -> Result<(), MirrorError> {
        if self.scope.kind.is_none() {
            return Err(MirrorError::InvalidQuery {
                field: "kind",
                reason: "kind is required to address an object by name".to_string(),
            });
        }
        Ok(())
    }

    /// Fetch the object named `name` in this scope.
    ///
    /// # Errors
    ///
    /// [`MirrorError::InvalidQuery`] if the builder is invalid;
    /// [`MirrorError::AmbiguousResult`] if more than one object matches.
    pub fn get(&self, name: &str) -> Result<Option<K>, MirrorError> {
        self.validate_scope()?;
        self.require_kind_for_name_ops()?;
        self.backend.validate_segment("name", name)?;
        self.backend.get(&self.scope, name)
    }

    /// Whether an object named `name` exists in this scope. Not an error if
    /// it doesn't.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get`].
    pub fn has(&self, name: &str) -> Result<bool, MirrorError> {
        Ok(self.get(name)?.is_some())
    }

    /// Upsert `object` at `name` in this scope.
    ///
    /// # Errors
    ///
    /// [`MirrorError::InvalidQuery`] if the builder is invalid.
    pub fn set(&self, name: &str, object: K) -> Result<(), MirrorError> {
        self.validate_scope()?;
        self.require_kind_for_name_ops()?;
        self.backend.validate_segment("name", name)?;
        self.backend.set(&self.scope, name, object)
    }

    /// Remove the object named `name` in this scope. Returns whether
    /// anything was removed; idempotent.
    ///
    /// # Errors
    ///
    /// [`MirrorError::InvalidQuery`] if the builder is invalid.
    pub fn delete(&self, name: &str) -> Result<bool, MirrorError> {
        self.validate_scope()?;
        self.require_kind_for_name_ops()?;
        self.backend.validate_segment("name", name)?;
        self.backend.delete(&self.scope, name)
    }

    /// List every object matching this scope, in unspecified order. Empty
    /// is not an error.
    ///
    /// # Errors
    ///
    /// [`MirrorError::InvalidQuery`] if the builder is invalid, or if the
    /// backend requires `kind` for listing and none was set.
    pub fn list(&self) -> Result<Vec<K>, MirrorError> {
        self.validate_scope()?;
        if self.backend.requires_kind_for_list() && self.scope.kind.is_none() {
            return Err(MirrorError::InvalidQuery {
                field: "kind",
                reason: "kind is required for this backend's list queries".to_string(),
            });
        }
        self.backend.list(&self.scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FieldIndexBackend, PathIndexBackend};
    use crate::metrics::NoopMetrics;
    use mirror_core::testing::TestObject;

    fn path_query() -> QueryBuilder<TestObject> {
        QueryBuilder::new(Arc::new(PathIndexBackend::default()))
    }

    fn field_query() -> QueryBuilder<TestObject> {
        QueryBuilder::new(Arc::new(FieldIndexBackend::new(Arc::new(NoopMetrics)).unwrap()))
    }

    #[test]
    fn scoped_list_counts_match_scenario_three() {
        let backend = Arc::new(PathIndexBackend::default());
        for i in 0..10 {
            QueryBuilder::new(backend.clone())
                .namespace("default")
                .kind("pods")
                .set(&format!("pod{i}"), TestObject::new(&format!("pod{i}"), Some("default"), "1"))
                .unwrap();
        }
        let pods = QueryBuilder::new(backend.clone()).namespace("default").kind("pods");
        assert_eq!(pods.list().unwrap().len(), 10);
        assert!(pods.has("pod4").unwrap());
        pods.delete("pod4").unwrap();
        assert_eq!(pods.list().unwrap().len(), 9);
    }

    #[test]
    fn invalid_namespace_segment_is_rejected_before_touching_the_backend() {
        let q = path_query().namespace("%%.d").kind("services");
        assert!(matches!(q.set("test", TestObject::new("test", None, "1")), Err(MirrorError::InvalidQuery { .. })));

        let q = path_query().namespace("test/../").kind("services");
        assert!(matches!(q.set("test", TestObject::new("test", None, "1")), Err(MirrorError::InvalidQuery { .. })));

        let q = path_query().namespace("default").kind("services/test");
        assert!(matches!(q.set("test", TestObject::new("test", None, "1")), Err(MirrorError::InvalidQuery { .. })));
    }

    #[test]
    fn field_index_list_requires_kind() {
        let backend = Arc::new(FieldIndexBackend::new(Arc::new(NoopMetrics)).unwrap());
        let q = QueryBuilder::new(backend);
        assert!(matches!(q.list(), Err(MirrorError::InvalidQuery { field: "kind", .. })));
    }

    #[test]
    fn field_index_round_trips_through_the_builder() {
        let q = field_query().namespace("default").kind("pods");
        q.set("pod0", TestObject::new("pod0", Some("default"), "1")).unwrap();
        assert!(q.has("pod0").unwrap());
        assert_eq!(q.list().unwrap().len(), 1);
        assert!(q.delete("pod0").unwrap());
        assert!(!q.has("pod0").unwrap());
    }
}
