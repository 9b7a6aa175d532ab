use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of comparing two states of one lineage. Field names are part of
/// the public JSON output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCompare {
    pub stats: CompareStats,
    pub differences: Differences,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareStats {
    pub from: StateInfo,
    pub to: StateInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateInfo {
    pub version_id: String,
    pub resource_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Differences {
    /// Resource key → rendering, for resources only in the `from` state.
    pub only_in_old: BTreeMap<String, String>,
    /// Resource key → rendering, for resources only in the `to` state.
    pub only_in_new: BTreeMap<String, String>,
    /// Sorted keys present in both.
    pub in_both: Vec<String>,
    pub resource_diff: BTreeMap<String, ResourceDiff>,
}

/// Attribute-level difference of one resource present in both states.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDiff {
    pub only_in_old: BTreeMap<String, String>,
    pub only_in_new: BTreeMap<String, String>,
    pub unified_diff: String,
}

impl ResourceDiff {
    pub fn is_unchanged(&self) -> bool {
        self.only_in_old.is_empty() && self.only_in_new.is_empty() && self.unified_diff.is_empty()
    }
}
