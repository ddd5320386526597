//! Concurrent prefix-tree backend keyed by `"/"`-joined path segments.
//!
//! An [`Entity`](crate) tree would normally need a parent back-reference
//! alongside the owning parent -> children links, which is exactly the
//! cyclic-ownership shape `Rc<RefCell<..>>` fights. Per the recommendation
//! in the design notes, nodes live in a flat arena and parent links are
//! plain integer indices -- never owning, strictly for recursive delete and
//! future upward traversal.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Instant;

use mirror_core::{MirrorError, Object};
use parking_lot::RwLock;
use regex::Regex;

use super::{MirrorBackend, Scope};
use crate::metrics::MirrorMetrics;
use std::sync::Arc;

const ROOT: usize = 0;

fn segment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_\-]*$").expect("static regex"))
}

struct Node<K> {
    name: String,
    parent: Option<usize>,
    children: HashMap<String, usize>,
    value: Option<K>,
}

impl<K> Node<K> {
    fn new(name: String, parent: Option<usize>) -> Self {
        Self {
            name,
            parent,
            children: HashMap::new(),
            value: None,
        }
    }
}

/// The arena: a `Vec` of slots, with freed slots tracked so long-running
/// churn (pods created and deleted constantly) doesn't grow it forever.
struct Arena<K> {
    nodes: Vec<Option<Node<K>>>,
    free: Vec<usize>,
}

impl<K> Arena<K> {
    fn new() -> Self {
        Self {
            nodes: vec![Some(Node::new(String::new(), None))],
            free: Vec::new(),
        }
    }

    fn node(&self, idx: usize) -> &Node<K> {
        self.nodes[idx].as_ref().expect("dangling arena index")
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node<K> {
        self.nodes[idx].as_mut().expect("dangling arena index")
    }

    fn alloc(&mut self, name: String, parent: usize) -> usize {
        let node = Node::new(name, Some(parent));
        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = Some(node);
            idx
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    /// Descend from the root, creating any missing intermediate nodes.
    fn ensure_path(&mut self, segments: &[String]) -> usize {
        let mut cur = ROOT;
        for seg in segments {
            let existing = self.node(cur).children.get(seg).copied();
            cur = match existing {
                Some(idx) => idx,
                None => {
                    let idx = self.alloc(seg.clone(), cur);
                    self.node_mut(cur).children.insert(seg.clone(), idx);
                    idx
                }
            };
        }
        cur
    }

    /// Descend from the root without creating anything.
    fn find(&self, segments: &[String]) -> Option<usize> {
        let mut cur = ROOT;
        for seg in segments {
            cur = *self.node(cur).children.get(seg)?;
        }
        Some(cur)
    }

    /// Free `idx` and every descendant, leaves outward. Does not unlink
    /// `idx` from its own parent -- the caller does that once, at the top.
    fn free_subtree(&mut self, idx: usize) {
        let children: Vec<usize> = self.node(idx).children.values().copied().collect();
        for child in children {
            self.free_subtree(child);
        }
        self.nodes[idx] = None;
        self.free.push(idx);
    }

    fn delete(&mut self, segments: &[String]) -> bool {
        let Some(idx) = self.find(segments) else {
            return false;
        };
        let parent = self.node(idx).parent;
        let name = self.node(idx).name.clone();
        self.free_subtree(idx);
        if let Some(parent) = parent {
            self.node_mut(parent).children.remove(&name);
        }
        true
    }

    fn list_children(&self, segments: &[String]) -> Vec<K>
    where
        K: Clone,
    {
        let Some(idx) = self.find(segments) else {
            return Vec::new();
        };
        self.node(idx)
            .children
            .values()
            .filter_map(|&child| self.node(child).value.clone())
            .collect()
    }
}

/// The path-index mirror backend: a concurrent tree keyed by path segments,
/// e.g. `namespaces/default/pods/my-pod` or `nodes/node1`.
pub struct PathIndexBackend<K> {
    tree: RwLock<Arena<K>>,
    metrics: Arc<dyn MirrorMetrics>,
}

impl<K> PathIndexBackend<K> {
    /// Build an empty tree.
    #[must_use]
    pub fn new(metrics: Arc<dyn MirrorMetrics>) -> Self {
        Self {
            tree: RwLock::new(Arena::new()),
            metrics,
        }
    }
}

impl<K> Default for PathIndexBackend<K> {
    fn default() -> Self {
        Self::new(Arc::new(crate::metrics::NoopMetrics))
    }
}

/// `buildKey` joins, in order, any present: `"namespaces"`, `<namespace>`,
/// `<kind>`, `<version>`, `<name>`. Cluster-scoped kinds (no namespace)
/// start straight from `<kind>`.
fn build_segments(scope: &Scope, name: Option<&str>) -> Vec<String> {
    let mut segments = Vec::with_capacity(5);
    if let Some(ns) = &scope.namespace {
        segments.push("namespaces".to_string());
        segments.push(ns.clone());
    }
    if let Some(kind) = &scope.kind {
        segments.push(kind.clone());
    }
    if let Some(version) = &scope.version {
        segments.push(version.clone());
    }
    if let Some(name) = name {
        segments.push(name.to_string());
    }
    segments
}

impl<K: Object> MirrorBackend<K> for PathIndexBackend<K> {
    fn validate_segment(&self, field: &'static str, value: &str) -> Result<(), MirrorError> {
        if segment_regex().is_match(value) {
            Ok(())
        } else {
            Err(MirrorError::InvalidQuery {
                field,
                reason: format!("segment {value:?} contains characters outside [A-Za-z0-9_-]"),
            })
        }
    }

    fn get(&self, scope: &Scope, name: &str) -> Result<Option<K>, MirrorError> {
        let started = Instant::now();
        let segments = build_segments(scope, Some(name));
        let tree = self.tree.read();
        let result = tree.find(&segments).and_then(|idx| tree.node(idx).value.clone());
        self.metrics
            .record("path.get", scope.kind.as_deref().unwrap_or("-"), true, started.elapsed());
        Ok(result)
    }

    fn set(&self, scope: &Scope, name: &str, object: K) -> Result<(), MirrorError> {
        let started = Instant::now();
        let segments = build_segments(scope, Some(name));
        let mut tree = self.tree.write();
        let idx = tree.ensure_path(&segments);
        tree.node_mut(idx).value = Some(object);
        self.metrics
            .record("path.set", scope.kind.as_deref().unwrap_or("-"), true, started.elapsed());
        Ok(())
    }

    fn delete(&self, scope: &Scope, name: &str) -> Result<bool, MirrorError> {
        let started = Instant::now();
        let segments = build_segments(scope, Some(name));
        let removed = self.tree.write().delete(&segments);
        self.metrics
            .record("path.delete", scope.kind.as_deref().unwrap_or("-"), true, started.elapsed());
        Ok(removed)
    }

    fn list(&self, scope: &Scope) -> Result<Vec<K>, MirrorError> {
        let started = Instant::now();
        let segments = build_segments(scope, None);
        let values = self.tree.read().list_children(&segments);
        self.metrics
            .record("path.list", scope.kind.as_deref().unwrap_or("-"), true, started.elapsed());
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_core::testing::TestObject;

    fn backend() -> PathIndexBackend<TestObject> {
        PathIndexBackend::default()
    }

    fn scope(namespace: Option<&str>, kind: Option<&str>) -> Scope {
        Scope {
            namespace: namespace.map(str::to_string),
            kind: kind.map(str::to_string),
            version: None,
            within: None,
        }
    }

    #[test]
    fn round_trips_a_value() {
        let backend = backend();
        let s = scope(Some("default"), Some("pods"));
        let obj = TestObject::new("pod0", Some("default"), "1");
        backend.set(&s, "pod0", obj.clone()).unwrap();
        assert_eq!(backend.get(&s, "pod0").unwrap(), Some(obj));
    }

    #[test]
    fn has_matches_get() {
        let backend = backend();
        let s = scope(Some("default"), Some("pods"));
        assert_eq!(backend.get(&s, "pod0").unwrap(), None);
        backend
            .set(&s, "pod0", TestObject::new("pod0", Some("default"), "1"))
            .unwrap();
        assert!(backend.get(&s, "pod0").unwrap().is_some());
    }

    #[test]
    fn delete_is_idempotent() {
        let backend = backend();
        let s = scope(Some("default"), Some("pods"));
        backend
            .set(&s, "pod0", TestObject::new("pod0", Some("default"), "1"))
            .unwrap();
        assert!(backend.delete(&s, "pod0").unwrap());
        assert!(!backend.delete(&s, "pod0").unwrap());
        assert_eq!(backend.get(&s, "pod0").unwrap(), None);
    }

    #[test]
    fn list_returns_only_direct_children() {
        let backend = backend();
        let s = scope(Some("default"), Some("pods"));
        for i in 0..10 {
            backend
                .set(&s, &format!("pod{i}"), TestObject::new(&format!("pod{i}"), Some("default"), "1"))
                .unwrap();
        }
        assert_eq!(backend.list(&s).unwrap().len(), 10);
        backend.delete(&s, "pod4").unwrap();
        assert_eq!(backend.list(&s).unwrap().len(), 9);
    }

    #[test]
    fn deleting_a_namespace_recursively_clears_its_children() {
        let backend = backend();
        let pods = scope(Some("default"), Some("pods"));
        let services = scope(Some("default"), Some("services"));
        for i in 0..10 {
            backend
                .set(&pods, &format!("pod{i}"), TestObject::new(&format!("pod{i}"), Some("default"), "1"))
                .unwrap();
        }
        for i in 0..2 {
            backend
                .set(&services, &format!("svc{i}"), TestObject::new(&format!("svc{i}"), Some("default"), "1"))
                .unwrap();
        }
        let namespaces = scope(None, Some("namespaces"));
        backend
            .set(&namespaces, "default", TestObject::new("default", None, "1"))
            .unwrap();

        assert!(backend.delete(&namespaces, "default").unwrap());
        assert_eq!(backend.list(&pods).unwrap().len(), 0);
        assert_eq!(backend.list(&services).unwrap().len(), 0);
    }

    #[test]
    fn cluster_scoped_key_omits_namespace_pair() {
        let backend = backend();
        let nodes = scope(None, Some("nodes"));
        backend
            .set(&nodes, "node1", TestObject::new("node1", None, "1"))
            .unwrap();
        assert!(backend.get(&nodes, "node1").unwrap().is_some());
    }

    #[test]
    fn rejects_segments_with_forbidden_characters() {
        let backend = backend();
        assert!(backend.validate_segment("namespace", "%%.d").is_err());
        assert!(backend.validate_segment("namespace", "test/../").is_err());
        assert!(backend.validate_segment("kind", "services/test").is_err());
        assert!(backend.validate_segment("kind", "services").is_ok());
    }
}
