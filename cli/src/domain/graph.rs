//! Dependency graph validation.
//!
//! An application is deployable when container names are unique, every
//! `requires` entry names a declared container, and the `requires` relation
//! has no cycle. Agents of a cyclic or dangling graph would wait on each
//! other forever, so these checks run once, centrally, before any launch.

use std::collections::{HashMap, HashSet};

use bootchain_common::ContainerSpec;

use crate::domain::error::GraphError;

/// Run every structural check: duplicates first, then unknown dependencies,
/// then cycles.
///
/// # Errors
///
/// Returns the first [`GraphError`] found.
pub fn validate(containers: &[ContainerSpec]) -> Result<(), GraphError> {
    if let Some(name) = find_duplicate(containers) {
        return Err(GraphError::DuplicateContainer(name.to_string()));
    }
    if let Some((container, dependency)) = find_unknown_dependency(containers) {
        return Err(GraphError::UnknownDependency {
            container: container.to_string(),
            dependency: dependency.to_string(),
        });
    }
    if let Some(path) = find_cycle(containers) {
        let container = path.last().cloned().unwrap_or_default();
        return Err(GraphError::Cycle { container, path });
    }
    Ok(())
}

/// First name that repeats an earlier container's name.
#[must_use]
pub fn find_duplicate(containers: &[ContainerSpec]) -> Option<&str> {
    let mut seen = HashSet::new();
    containers
        .iter()
        .map(|c| c.name.as_str())
        .find(|name| !seen.insert(*name))
}

/// First `(container, dependency)` pair whose dependency is not declared.
#[must_use]
pub fn find_unknown_dependency(containers: &[ContainerSpec]) -> Option<(&str, &str)> {
    let declared: HashSet<&str> = containers.iter().map(|c| c.name.as_str()).collect();
    containers.iter().find_map(|c| {
        c.requires
            .iter()
            .find(|dep| !declared.contains(dep.as_str()))
            .map(|dep| (c.name.as_str(), dep.as_str()))
    })
}

/// Depth-first search for a cycle in the `requires` relation.
///
/// Returns the visitation chain that closed the cycle, ending with the
/// container that was revisited (`["a", "b", "a"]`). A container requiring
/// itself is a cycle of length one. Undeclared dependencies are skipped.
#[must_use]
pub fn find_cycle(containers: &[ContainerSpec]) -> Option<Vec<String>> {
    let graph: HashMap<&str, &[String]> = containers
        .iter()
        .map(|c| (c.name.as_str(), c.requires.as_slice()))
        .collect();
    let mut cleared = HashSet::new();

    containers
        .iter()
        .filter(|c| !c.requires.is_empty())
        .find_map(|c| walk(&graph, &c.name, Vec::new(), &mut cleared))
        .map(|chain| chain.into_iter().map(str::to_string).collect())
}

/// Each descent gets its own copy of `chain`, so a dependency shared by two
/// sibling branches is not mistaken for a cycle. Nodes whose whole subtree
/// was explored without a cycle are `cleared` and not walked again.
fn walk<'a>(
    graph: &HashMap<&'a str, &'a [String]>,
    node: &'a str,
    mut chain: Vec<&'a str>,
    cleared: &mut HashSet<&'a str>,
) -> Option<Vec<&'a str>> {
    if chain.contains(&node) {
        chain.push(node);
        return Some(chain);
    }
    if cleared.contains(node) {
        return None;
    }
    let requires = graph.get(node)?;
    chain.push(node);
    for dep in *requires {
        if let Some(cycle) = walk(graph, dep, chain.clone(), cleared) {
            return Some(cycle);
        }
    }
    cleared.insert(node);
    None
}

/// Containers ordered so every dependency precedes its dependents, keeping
/// declaration order where the graph allows. Agents coordinate through the
/// store whatever the launch order; launching providers first only shortens
/// the time dependents spend waiting.
///
/// Expects a graph that passed [`validate`]; on a cyclic graph the members of
/// the cycle are emitted in declaration order once their other dependencies are.
#[must_use]
pub fn launch_order(containers: &[ContainerSpec]) -> Vec<&ContainerSpec> {
    let by_name: HashMap<&str, &ContainerSpec> =
        containers.iter().map(|c| (c.name.as_str(), c)).collect();
    let mut placed: HashSet<&str> = HashSet::new();
    let mut visiting: HashSet<&str> = HashSet::new();
    let mut order = Vec::with_capacity(containers.len());
    for spec in containers {
        place(spec, &by_name, &mut placed, &mut visiting, &mut order);
    }
    order
}

fn place<'a>(
    spec: &'a ContainerSpec,
    by_name: &HashMap<&str, &'a ContainerSpec>,
    placed: &mut HashSet<&'a str>,
    visiting: &mut HashSet<&'a str>,
    order: &mut Vec<&'a ContainerSpec>,
) {
    if placed.contains(spec.name.as_str()) || !visiting.insert(spec.name.as_str()) {
        return;
    }
    for dep in &spec.requires {
        if let Some(dep_spec) = by_name.get(dep.as_str()) {
            place(dep_spec, by_name, placed, visiting, order);
        }
    }
    placed.insert(spec.name.as_str());
    order.push(spec);
}
