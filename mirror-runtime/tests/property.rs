//! Randomized invariant checks: drive a large randomized sequence of
//! `Set`/`Delete` calls through a backend and check the resulting state
//! against a plain reference model, rather than hand-enumerating cases.

use std::collections::{HashMap, HashSet};

use mirror_core::testing::TestObject;
use mirror_runtime::{MirrorBackend, PathIndexBackend, Scope};
use rand::distr::{Bernoulli, Uniform};
use rand::Rng;

fn scope() -> Scope {
    Scope {
        namespace: Some("default".to_string()),
        kind: Some("pods".to_string()),
        version: None,
        within: None,
    }
}

/// Invariants 1, 7: after a long randomized sequence of `Set`/`Delete` over
/// a small key space, the backend's contents exactly match a `HashMap`
/// model driven by the same sequence (no lost updates), and every `Set` is
/// immediately visible to `Get`.
#[test]
fn path_index_matches_a_reference_model_under_random_churn() {
    let backend = PathIndexBackend::default();
    let s = scope();
    let mut rng = rand::rng();
    let item_dist = Uniform::new(0_u32, 20).unwrap();
    let deleted_dist = Bernoulli::new(0.4).unwrap();

    let mut model: HashMap<String, String> = HashMap::new();

    for version in 0_u32..20_000 {
        let key = format!("pod{}", rng.sample(item_dist));
        if rng.sample(deleted_dist) {
            let removed = backend.delete(&s, &key).unwrap();
            assert_eq!(removed, model.remove(&key).is_some());
        } else {
            let version = version.to_string();
            backend
                .set(&s, &key, TestObject::new(&key, Some("default"), &version))
                .unwrap();
            assert_eq!(
                backend.get(&s, &key).unwrap().unwrap().resource_version,
                version
            );
            model.insert(key, version);
        }
    }

    let mut expected: Vec<(String, String)> = model.into_iter().collect();
    expected.sort();
    let mut actual: Vec<(String, String)> = backend
        .list(&s)
        .unwrap()
        .into_iter()
        .map(|o| (o.name, o.resource_version))
        .collect();
    actual.sort();
    assert_eq!(actual, expected);
}

/// Invariants 3, 4: `Has` always agrees with `Get`, and a successful
/// `Delete` makes `Has` false until the next `Set` lands.
#[test]
fn has_tracks_get_through_random_churn() {
    let backend = PathIndexBackend::default();
    let s = scope();
    let mut rng = rand::rng();
    let item_dist = Uniform::new(0_u32, 10).unwrap();

    let mut present: HashSet<String> = HashSet::new();

    for i in 0_u32..10_000 {
        let key = format!("pod{}", rng.sample(item_dist));
        match i % 3 {
            0 => {
                backend
                    .set(&s, &key, TestObject::new(&key, Some("default"), "1"))
                    .unwrap();
                present.insert(key.clone());
            }
            1 => {
                backend.delete(&s, &key).unwrap();
                present.remove(&key);
            }
            _ => {}
        }
        let has = backend.get(&s, &key).unwrap().is_some();
        assert_eq!(has, present.contains(&key));
    }
}

/// Invariant 8: deleting the same key twice in a row returns `false` the
/// second time, for every key a randomized run ever touched.
#[test]
fn delete_is_idempotent_under_random_churn() {
    let backend = PathIndexBackend::default();
    let s = scope();
    let mut rng = rand::rng();
    let item_dist = Uniform::new(0_u32, 15).unwrap();

    for _ in 0_u32..5_000 {
        let key = format!("pod{}", rng.sample(item_dist));
        backend
            .set(&s, &key, TestObject::new(&key, Some("default"), "1"))
            .unwrap();
        assert!(backend.delete(&s, &key).unwrap());
        assert!(!backend.delete(&s, &key).unwrap());
    }
}
