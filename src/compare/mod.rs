//! Structural and textual comparison of two stored states.
//!
//! Resources are identified by `<module>.<type>.<name>` where the root
//! module is written `root`. The instance key is not part of the identity,
//! so the instances of a `count`/`for_each` block collapse onto one key,
//! represented by the first stored instance.

pub mod model;
pub mod render;

use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::state::models::{Resource, State};
pub use model::{CompareStats, Differences, ResourceDiff, StateCompare, StateInfo};
use render::{diff_header, render_resource, unified_diff};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompareError {
    /// One side did not resolve to a stored state
    #[error("Cannot compare: the `{side}` state is unknown")]
    UnknownState { side: &'static str },

    /// No resource with this key in the state
    #[error("Resource {key} not found in {path}")]
    ResourceNotFound { key: String, path: String },
}

/// Display form of a module path inside a resource key.
pub fn module_label(path: &str) -> &str {
    if path.is_empty() {
        "root"
    } else {
        path
    }
}

pub fn resource_key(module_path: &str, resource: &Resource) -> String {
    format!(
        "{}.{}.{}",
        module_label(module_path),
        resource.resource_type,
        resource.name
    )
}

/// Key → first instance carrying that key, in stored order.
fn index_resources(state: &State) -> BTreeMap<String, &Resource> {
    let mut index = BTreeMap::new();
    for module in &state.modules {
        for resource in &module.resources {
            index
                .entry(resource_key(&module.path, resource))
                .or_insert(resource);
        }
    }
    index
}

/// Look up one resource by key.
pub fn find_resource<'a>(state: &'a State, key: &str) -> Result<&'a Resource, CompareError> {
    state
        .modules
        .iter()
        .flat_map(|m| m.resources.iter().map(move |r| (m, r)))
        .find(|(m, r)| resource_key(&m.path, r) == key)
        .map(|(_, r)| r)
        .ok_or_else(|| CompareError::ResourceNotFound {
            key: key.to_string(),
            path: state.path.clone(),
        })
}

/// Attribute pairs of `a` that `b` does not carry with the same value.
fn missing_pairs(a: &Resource, b: &Resource) -> BTreeMap<String, String> {
    let b_pairs: BTreeSet<(&str, &str)> = b
        .attributes
        .iter()
        .map(|attr| (attr.key.as_str(), attr.value.as_str()))
        .collect();
    a.attributes
        .iter()
        .filter(|attr| !b_pairs.contains(&(attr.key.as_str(), attr.value.as_str())))
        .map(|attr| (attr.key.clone(), attr.value.clone()))
        .collect()
}

/// Attribute and textual diff of one resource present in both states.
pub fn compare_resource(from: &State, to: &State, old: &Resource, new: &Resource) -> ResourceDiff {
    ResourceDiff {
        only_in_old: missing_pairs(old, new),
        only_in_new: missing_pairs(new, old),
        unified_diff: unified_diff(
            &render_resource(old),
            &render_resource(new),
            &diff_header(from),
            &diff_header(to),
        ),
    }
}

/// Compare two states. Both must have resolved to a stored path.
pub fn compare(from: &State, to: &State) -> Result<StateCompare, CompareError> {
    if from.path.is_empty() {
        return Err(CompareError::UnknownState { side: "from" });
    }
    if to.path.is_empty() {
        return Err(CompareError::UnknownState { side: "to" });
    }

    let old = index_resources(from);
    let new = index_resources(to);

    let mut differences = Differences::default();
    for (key, resource) in &old {
        if !new.contains_key(key) {
            differences
                .only_in_old
                .insert(key.clone(), render_resource(resource));
        }
    }
    for (key, resource) in &new {
        match old.get(key) {
            None => {
                differences
                    .only_in_new
                    .insert(key.clone(), render_resource(resource));
            }
            Some(old_resource) => {
                differences.in_both.push(key.clone());
                differences.resource_diff.insert(
                    key.clone(),
                    compare_resource(from, to, old_resource, resource),
                );
            }
        }
    }

    tracing::debug!(
        path = %from.path,
        from = %from.version.version_id,
        to = %to.version.version_id,
        only_in_old = differences.only_in_old.len(),
        only_in_new = differences.only_in_new.len(),
        in_both = differences.in_both.len(),
        "Compared states"
    );

    Ok(StateCompare {
        stats: CompareStats {
            from: StateInfo {
                version_id: from.version.version_id.clone(),
                resource_count: from.resource_count(),
            },
            to: StateInfo {
                version_id: to.version.version_id.clone(),
                resource_count: to.resource_count(),
            },
        },
        differences,
    })
}
