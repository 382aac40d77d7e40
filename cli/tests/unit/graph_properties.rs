//! Property-based tests for dependency graph validation.
//!
//! Uses `proptest` to verify invariants across many random graphs.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;

use bootchain_cli::domain::{GraphError, find_cycle, find_duplicate, launch_order, validate};
use bootchain_common::ContainerSpec;
use proptest::prelude::*;

use crate::mocks::container;

/// Random DAG: node `i` may require any node `j < i`. Declared in reverse so
/// dependents usually come before their dependencies.
fn dag() -> impl Strategy<Value = Vec<ContainerSpec>> {
    (1usize..12)
        .prop_flat_map(|n| proptest::collection::vec(proptest::collection::vec(any::<bool>(), n), n))
        .prop_map(|edges| {
            let n = edges.len();
            (0..n)
                .rev()
                .map(|i| {
                    let requires: Vec<String> = (0..i)
                        .filter(|&j| edges[i][j])
                        .map(|j| format!("c{j}"))
                        .collect();
                    let requires: Vec<&str> = requires.iter().map(String::as_str).collect();
                    container(&format!("c{i}"), &requires)
                })
                .collect()
        })
}

proptest! {
    /// Acyclic graphs always validate.
    #[test]
    fn prop_dag_has_no_cycle(app in dag()) {
        prop_assert_eq!(find_cycle(&app), None);
        prop_assert_eq!(validate(&app), Ok(()));
    }

    /// The launch order of a DAG lists every container once, each after all
    /// of its dependencies.
    #[test]
    fn prop_launch_order_respects_dependencies(app in dag()) {
        let order = launch_order(&app);
        prop_assert_eq!(order.len(), app.len());
        let position: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.as_str(), i))
            .collect();
        prop_assert_eq!(position.len(), app.len());
        for spec in &app {
            for dep in &spec.requires {
                prop_assert!(position[dep.as_str()] < position[spec.name.as_str()]);
            }
        }
    }

    /// Closing a dependency chain into a ring is always detected, and the
    /// reported container is on the ring.
    #[test]
    fn prop_ring_is_a_cycle(n in 1usize..10) {
        let app: Vec<ContainerSpec> = (0..n)
            .map(|i| {
                let dep = format!("c{}", (i + 1) % n);
                container(&format!("c{i}"), &[dep.as_str()])
            })
            .collect();
        match validate(&app) {
            Err(GraphError::Cycle { container, path }) => {
                prop_assert!(app.iter().any(|c| c.name == container));
                prop_assert_eq!(path.first(), path.last());
            }
            other => prop_assert!(false, "expected a cycle, got {:?}", other),
        }
    }

    /// Unique names never report a duplicate; repeating any name always does.
    #[test]
    fn prop_duplicate_detection(n in 1usize..10, pick in any::<prop::sample::Index>()) {
        let mut app: Vec<ContainerSpec> = (0..n).map(|i| container(&format!("c{i}"), &[])).collect();
        prop_assert_eq!(find_duplicate(&app), None);

        let repeated = app[pick.index(n)].name.clone();
        app.push(container(&repeated, &[]));
        prop_assert_eq!(find_duplicate(&app), Some(repeated.as_str()));
    }
}

#[test]
fn test_shared_dependency_in_sibling_branches_is_not_a_cycle() {
    let app = [
        container("gateway", &["orders", "billing"]),
        container("orders", &["postgres"]),
        container("billing", &["postgres"]),
        container("postgres", &[]),
    ];
    assert_eq!(validate(&app), Ok(()));
}
