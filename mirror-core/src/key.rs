use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical `group/version/resource` identifier for a resource kind.
///
/// The group segment is omitted when empty, so a core-group kind such as
/// `Namespace` is `v1/namespaces` rather than `/v1/namespaces`. This is the
/// key used both by [`registry`](crate::registry) lookups and by the
/// subscriber bus.
///
/// Serializes as its `Display` string (e.g. `"apps/v1/deployments"`) so it
/// can be used directly in a [`MirrorConfig`](https://docs.rs/mirror-runtime)
/// resource list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub struct ResourceKey {
    group: &'static str,
    version: &'static str,
    resource: &'static str,
}

impl From<ResourceKey> for String {
    fn from(key: ResourceKey) -> Self {
        key.to_string()
    }
}

impl<'de> Deserialize<'de> for ResourceKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        crate::registry::lookup(&raw).map_err(serde::de::Error::custom)
    }
}

impl ResourceKey {
    /// Construct a key from its constituent parts. `group` may be empty for
    /// core-group kinds.
    #[must_use]
    pub const fn new(group: &'static str, version: &'static str, resource: &'static str) -> Self {
        Self {
            group,
            version,
            resource,
        }
    }

    /// The API group, or the empty string for the core group.
    #[must_use]
    pub fn group(&self) -> &str {
        self.group
    }

    /// The API version within the group, e.g. `v1` or `v1beta1`.
    #[must_use]
    pub fn version(&self) -> &str {
        self.version
    }

    /// The plural resource name, e.g. `pods` or `deployments`.
    ///
    /// This is also the segment used as the `kind` component of path keys
    /// and indexed-document queries.
    #[must_use]
    pub fn resource(&self) -> &str {
        self.resource
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.resource)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.resource)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_group_omits_leading_slash() {
        let key = ResourceKey::new("", "v1", "namespaces");
        assert_eq!(key.to_string(), "v1/namespaces");
    }

    #[test]
    fn grouped_kind_includes_group() {
        let key = ResourceKey::new("apps", "v1", "deployments");
        assert_eq!(key.to_string(), "apps/v1/deployments");
    }

    #[test]
    fn resource_segment_is_the_plural_name() {
        let key = ResourceKey::new("apps", "v1", "deployments");
        assert_eq!(key.resource(), "deployments");
    }

    #[test]
    fn serializes_as_display_string() {
        let key = ResourceKey::new("apps", "v1", "deployments");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"apps/v1/deployments\"");
    }

    #[test]
    fn deserializes_known_kind_from_registry() {
        let key: ResourceKey = serde_json::from_str("\"v1/pods\"").unwrap();
        assert_eq!(key, ResourceKey::new("", "v1", "pods"));
    }

    #[test]
    fn deserializing_unknown_kind_fails() {
        let err = serde_json::from_str::<ResourceKey>("\"v1/widgets\"").unwrap_err();
        assert!(err.to_string().contains("unknown resource kind"));
    }
}
