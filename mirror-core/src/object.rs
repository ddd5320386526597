/// The contract the mirror requires of any cached object.
///
/// The mirror does not interpret object fields beyond these three: it
/// stores and retrieves `K` values by `(namespace, kind, name)` and keys
/// its indexes off the resource version, but never inspects the rest of
/// the payload. Callers provide their own `K` (a generated API type, a
/// `serde_json::Value` wrapper, or a test fixture) and implement this
/// trait for it.
pub trait Object: Clone + Send + Sync + 'static {
    /// The object's name. Never empty for a live object.
    fn name(&self) -> &str;

    /// The object's namespace, or `None` for cluster-scoped kinds.
    fn namespace(&self) -> Option<&str>;

    /// The monotonically increasing resource version assigned by the
    /// upstream cluster.
    fn resource_version(&self) -> &str;
}

/// A minimal [`Object`] fixture shared by mirror-core and mirror-runtime's
/// test suites, so both crates exercise the same concrete type rather than
/// each inventing their own.
///
/// Not part of this crate's release-build public API: gated behind
/// `cfg(test)` for mirror-core's own suite and behind the `testing` feature
/// for mirror-runtime, which enables it only through `[dev-dependencies]`.
#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use super::Object;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct TestObject {
        pub name: String,
        pub namespace: Option<String>,
        pub resource_version: String,
    }

    impl TestObject {
        pub fn new(name: &str, namespace: Option<&str>, resource_version: &str) -> Self {
            Self {
                name: name.to_string(),
                namespace: namespace.map(str::to_string),
                resource_version: resource_version.to_string(),
            }
        }
    }

    impl Object for TestObject {
        fn name(&self) -> &str {
            &self.name
        }

        fn namespace(&self) -> Option<&str> {
            self.namespace.as_deref()
        }

        fn resource_version(&self) -> &str {
            &self.resource_version
        }
    }
}
