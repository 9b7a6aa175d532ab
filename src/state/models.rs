use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Lineage / Version ──────────────────────────────────────────────────────

/// Stable identifier grouping every snapshot of one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    pub id: String,
    pub value: String,
}

/// A storage-level revision of a state path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub version_id: String,
    pub last_modified: DateTime<Utc>,
}

impl Version {
    pub fn new(version_id: &str, last_modified: DateTime<Utc>) -> Self {
        Self {
            version_id: version_id.to_string(),
            last_modified,
        }
    }
}

// ─── State tree ─────────────────────────────────────────────────────────────

/// One ingested snapshot with its full module/resource/attribute tree.
///
/// `State::default()` (empty path) stands for "no such state".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub id: String,
    pub path: String,
    pub lineage: String,
    pub version: Version,
    pub tf_version: String,
    pub serial: i64,
    pub modules: Vec<Module>,
}

impl State {
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// Number of resource instances across all modules.
    pub fn resource_count(&self) -> usize {
        self.modules.iter().map(|m| m.resources.len()).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub path: String,
    pub resources: Vec<Resource>,
    pub outputs: Vec<OutputValue>,
}

/// One resource instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    pub mode: String,
    pub index: String,
    pub attributes: Vec<Attribute>,
}

/// `value` is always canonical JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputValue {
    pub name: String,
    pub value: String,
    pub sensitive: bool,
}

// ─── Query Results ──────────────────────────────────────────────────────────

/// Summary row of one state: what lists and activity timelines show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateStat {
    pub path: String,
    pub lineage_value: String,
    pub version_id: String,
    pub last_modified: DateTime<Utc>,
    pub serial: i64,
    pub tf_version: String,
    pub resource_count: i64,
}

/// One attribute hit of an attribute search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub path: String,
    pub version_id: String,
    pub tf_version: String,
    pub serial: i64,
    pub module_path: String,
    pub resource_type: String,
    pub resource_name: String,
    pub resource_index: String,
    pub attribute_key: String,
    pub attribute_value: String,
}

/// A page of results plus the size of the whole result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionCount {
    pub tf_version: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTypeCount {
    pub resource_type: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageStat {
    pub value: String,
    pub path_count: i64,
    pub state_count: i64,
}

/// Distinct-value listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    Paths,
    ResourceTypes,
    ResourceNames,
    TfVersions,
    AttributeKeys { resource_type: Option<String> },
}
