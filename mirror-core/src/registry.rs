//! The fixed set of resource kinds the mirror knows how to watch.
//!
//! This is a static table, not a discovery client: the mirror does not talk
//! to an API server's `/apis` endpoint to enumerate kinds at runtime. A
//! cluster-specific binary that needs a kind missing here adds an entry
//! and recompiles.

use crate::{MirrorError, ResourceKey};

macro_rules! registry {
    ($(($group:literal, $version:literal, $resource:literal)),+ $(,)?) => {
        /// All resource kinds the mirror can subscribe to, in registration order.
        pub static ENTRIES: &[ResourceKey] = &[
            $(ResourceKey::new($group, $version, $resource)),+
        ];
    };
}

registry![
    ("apps", "v1beta1", "controllerrevisions"),
    ("apps", "v1beta1", "deployments"),
    ("apps", "v1beta1", "statefulsets"),
    ("autoscaling", "v1", "horizontalpodautoscalers"),
    ("batch", "v1", "jobs"),
    ("batch", "v1beta1", "cronjobs"),
    ("certificates.k8s.io", "v1beta1", "certificatesigningrequests"),
    ("coordination.k8s.io", "v1beta1", "leases"),
    ("", "v1", "componentstatuses"),
    ("", "v1", "configmaps"),
    ("", "v1", "endpoints"),
    ("", "v1", "events"),
    ("", "v1", "limitranges"),
    ("", "v1", "namespaces"),
    ("", "v1", "nodes"),
    ("", "v1", "persistentvolumeclaims"),
    ("", "v1", "persistentvolumes"),
    ("", "v1", "pods"),
    ("", "v1", "podtemplates"),
    ("", "v1", "replicationcontrollers"),
    ("", "v1", "resourcequotas"),
    ("", "v1", "secrets"),
    ("", "v1", "serviceaccounts"),
    ("", "v1", "services"),
    ("events.k8s.io", "v1beta1", "events"),
    ("extensions", "v1beta1", "daemonsets"),
    ("extensions", "v1beta1", "deployments"),
    ("extensions", "v1beta1", "ingresses"),
    ("extensions", "v1beta1", "podsecuritypolicies"),
    ("networking.k8s.io", "v1", "networkpolicies"),
    ("policy", "v1beta1", "poddisruptionbudgets"),
    ("policy", "v1beta1", "podsecuritypolicies"),
    ("rbac.authorization.k8s.io", "v1", "clusterrolebindings"),
    ("rbac.authorization.k8s.io", "v1", "clusterroles"),
    ("rbac.authorization.k8s.io", "v1", "rolebindings"),
    ("rbac.authorization.k8s.io", "v1", "roles"),
    ("rbac.authorization.k8s.io", "v1alpha1", "clusterrolebindings"),
    ("rbac.authorization.k8s.io", "v1alpha1", "clusterroles"),
    ("rbac.authorization.k8s.io", "v1alpha1", "rolebindings"),
    ("rbac.authorization.k8s.io", "v1alpha1", "roles"),
    ("rbac.authorization.k8s.io", "v1beta1", "clusterrolebindings"),
    ("rbac.authorization.k8s.io", "v1beta1", "clusterroles"),
    ("rbac.authorization.k8s.io", "v1beta1", "rolebindings"),
    ("rbac.authorization.k8s.io", "v1beta1", "roles"),
    ("scheduling.k8s.io", "v1alpha1", "priorityclasses"),
    ("scheduling.k8s.io", "v1beta1", "priorityclasses"),
    ("settings.k8s.io", "v1alpha1", "podpresets"),
    ("storage.k8s.io", "v1", "storageclasses"),
    ("storage.k8s.io", "v1alpha1", "volumeattachments"),
    ("storage.k8s.io", "v1beta1", "storageclasses"),
    ("storage.k8s.io", "v1beta1", "volumeattachments"),
    ("apps", "v1", "controllerrevisions"),
    ("apps", "v1", "daemonsets"),
    ("apps", "v1", "deployments"),
    ("apps", "v1", "replicasets"),
    ("apps", "v1", "statefulsets"),
    ("admissionregistration.k8s.io", "v1alpha1", "initializerconfigurations"),
    ("admissionregistration.k8s.io", "v1alpha1", "mutatingwebhookconfigurations"),
    ("admissionregistration.k8s.io", "v1beta1", "validatingwebhookconfigurations"),
    ("apps", "v1beta2", "controllerrevisions"),
    ("apps", "v1beta2", "daemonsets"),
    ("apps", "v1beta2", "deployments"),
    ("apps", "v1beta2", "statefulsets"),
    ("batch", "v2alpha1", "cronjobs"),
    ("autoscaling", "v2beta1", "horizontalpodautoscalers"),
];

/// Resolve a `group/version/resource` (or `version/resource` for the core
/// group) string against the registry.
///
/// # Errors
///
/// Returns [`MirrorError::UnknownKind`] if no entry's [`ResourceKey::to_string`]
/// matches `name`.
pub fn lookup(name: &str) -> Result<ResourceKey, MirrorError> {
    ENTRIES
        .iter()
        .find(|key| key.to_string() == name)
        .cloned()
        .ok_or_else(|| MirrorError::UnknownKind(name.to_string()))
}

/// All registered kinds, in registration order.
#[must_use]
pub fn all() -> &'static [ResourceKey] {
    ENTRIES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_nonempty_and_has_no_duplicates() {
        let mut seen = std::collections::HashSet::new();
        for key in all() {
            assert!(seen.insert(key.clone()), "duplicate entry: {key}");
        }
        assert!(all().len() >= 60);
    }

    #[test]
    fn pods_resolves_without_group_prefix() {
        let key = lookup("v1/pods").expect("pods should be registered");
        assert_eq!(key.group(), "");
        assert_eq!(key.resource(), "pods");
    }

    #[test]
    fn deployments_resolves_with_group_prefix() {
        let key = lookup("apps/v1/deployments").expect("deployments should be registered");
        assert_eq!(key.group(), "apps");
        assert_eq!(key.version(), "v1");
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = lookup("v1/widgets").unwrap_err();
        assert!(matches!(err, MirrorError::UnknownKind(ref s) if s == "v1/widgets"));
    }
}
