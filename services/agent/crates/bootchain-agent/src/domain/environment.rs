//! Environment resolution for a container's processes.
//!
//! A container sees, in order of precedence from low to high:
//! 1. its own `environment`, keys uppercased;
//! 2. each direct dependency's declared variables, prefixed with the
//!    dependency's env prefix, in `requires` order (a later dependency
//!    overwrites an earlier one on collision);
//! 3. its `aliases`, resolved against the merged map above.
//!
//! Dependencies of dependencies are never visible.

use std::collections::BTreeMap;

use bootchain_common::{ContainerSpec, description::env_prefix};

/// Immutable variable set passed to every command of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentMap(BTreeMap<String, String>);

impl EnvironmentMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// `self` overlaid with `other`; keys of `other` win.
    #[must_use]
    pub fn overlaid_with(mut self, other: &Self) -> Self {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvironmentMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// An alias whose target is not in the merged environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedAlias {
    pub alias: String,
    pub target: String,
}

/// Outcome of [`resolve`]: the map plus the aliases that had to be skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub env: EnvironmentMap,
    pub unresolved: Vec<UnresolvedAlias>,
}

/// Build the environment of `own` from its direct `dependencies`.
///
/// `dependencies` must be given in `own.requires` order. Specs of containers
/// that `own` does not require are ignored, so a caller can pass every
/// processed descriptor it knows about.
#[must_use]
pub fn resolve(own: &ContainerSpec, dependencies: &[&ContainerSpec]) -> Resolution {
    let mut env: EnvironmentMap = own
        .environment
        .iter()
        .map(|(key, value)| (key.to_uppercase(), value.clone()))
        .collect();

    for required in &own.requires {
        let Some(dep) = dependencies.iter().find(|d| &d.name == required) else {
            continue;
        };
        let prefix = env_prefix(&dep.name);
        for (key, value) in &dep.environment {
            env.insert(format!("{prefix}{}", key.to_uppercase()), value.clone());
        }
    }

    // Aliases read from the merged snapshot, never from each other.
    let snapshot = env.clone();
    let mut unresolved = Vec::new();
    for (alias, target) in &own.aliases {
        match snapshot.get(&target.to_uppercase()) {
            Some(value) => env.insert(alias.to_uppercase(), value),
            None => unresolved.push(UnresolvedAlias {
                alias: alias.to_uppercase(),
                target: target.clone(),
            }),
        }
    }

    Resolution { env, unresolved }
}
