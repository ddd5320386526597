//! Knobs internal to this subsystem, loadable from YAML/TOML via `serde`.
//! Everything out of scope here (TLS, the HTTP server, CLI flags) lives one
//! layer up, in whatever binary embeds this crate.

use std::time::Duration;

use mirror_core::ResourceKey;
use serde::Deserialize;

/// Which backend design to build the controller on top of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// The path-indexed tree.
    PathIndex,
    /// The tantivy-backed full-text index.
    FieldIndex,
}

fn default_sync_timeout_secs() -> u64 {
    30
}

fn default_listener_capacity() -> usize {
    64
}

fn default_backend() -> BackendKind {
    BackendKind::PathIndex
}

/// The full set of knobs a [`crate::controller::MirrorController`] needs to
/// start.
///
/// ```yaml
/// backend: path-index
/// sync_timeout_secs: 30
/// listener_capacity: 64
/// kinds:
///   - v1/pods
///   - v1/namespaces
///   - apps/v1/deployments
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    /// The resource kinds to watch. Each entry is looked up against
    /// [`mirror_core::registry`] at deserialization time, so an unknown
    /// kind fails config loading rather than controller startup.
    pub kinds: Vec<ResourceKey>,

    /// Which backend variant to construct.
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// How long to wait for every source's initial cache-sync before
    /// [`MirrorController::new`](crate::controller::MirrorController::new)
    /// fails with [`mirror_core::MirrorError::SyncTimeout`].
    #[serde(default = "default_sync_timeout_secs")]
    pub sync_timeout_secs: u64,

    /// The bounded capacity of each listener's internal serial-dispatch
    /// queue (see [`crate::bus`]).
    #[serde(default = "default_listener_capacity")]
    pub listener_capacity: usize,
}

impl MirrorConfig {
    /// `sync_timeout_secs` as a [`Duration`].
    #[must_use]
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }

    /// Parse a config from a YAML document.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_yaml` error on malformed YAML or an
    /// unrecognized resource kind.
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    /// Parse a config from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns the underlying `toml` error on malformed TOML or an
    /// unrecognized resource kind.
    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_minimal_yaml_document() {
        let yaml = "kinds:\n  - v1/pods\n  - v1/namespaces\n";
        let config = MirrorConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.kinds.len(), 2);
        assert_eq!(config.backend, BackendKind::PathIndex);
        assert_eq!(config.sync_timeout(), Duration::from_secs(30));
        assert_eq!(config.listener_capacity, 64);
    }

    #[test]
    fn loads_overridden_fields_from_toml() {
        let toml_doc = "kinds = [\"v1/pods\"]\nbackend = \"field-index\"\nsync_timeout_secs = 5\nlistener_capacity = 16\n";
        let config = MirrorConfig::from_toml(toml_doc).unwrap();
        assert_eq!(config.backend, BackendKind::FieldIndex);
        assert_eq!(config.sync_timeout(), Duration::from_secs(5));
        assert_eq!(config.listener_capacity, 16);
    }

    #[test]
    fn unknown_kind_fails_to_parse() {
        let yaml = "kinds:\n  - v1/widgets\n";
        assert!(MirrorConfig::from_yaml(yaml).is_err());
    }
}
