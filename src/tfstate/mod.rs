//! In-memory tree of a raw state snapshot, as produced by the parser.
//!
//! A `StateDocument` is the hand-off point between storage providers and the
//! normalizer: modules → resources → instances → attributes, plus outputs.

pub mod parser;

use std::collections::BTreeMap;

pub use parser::parse_state;

/// A parsed state snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDocument {
    pub lineage: String,
    pub serial: i64,
    pub terraform_version: String,
    pub modules: Vec<ModuleDocument>,
}

impl StateDocument {
    /// Total number of resource instances across every module.
    pub fn instance_count(&self) -> usize {
        self.modules
            .iter()
            .flat_map(|m| m.resources.iter())
            .map(|r| r.instances.len())
            .sum()
    }
}

/// One module of a snapshot. `path` is the dotted module address, `""` for root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleDocument {
    pub path: String,
    pub resources: Vec<ResourceDocument>,
    pub outputs: Vec<OutputDocument>,
}

/// A resource block. Under `count`/`for_each` it fans out into several instances.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDocument {
    pub mode: String,
    pub resource_type: String,
    pub name: String,
    pub instances: Vec<InstanceDocument>,
}

/// Instance key of a multi-instance resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceKey {
    None,
    Int(i64),
    Str(String),
}

impl InstanceKey {
    /// Render the key the way it is stored: empty, decimal, or quoted JSON string.
    pub fn render(&self) -> String {
        match self {
            InstanceKey::None => String::new(),
            InstanceKey::Int(i) => i.to_string(),
            InstanceKey::Str(s) => {
                serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
            }
        }
    }
}

/// Attribute payload of an instance.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeSource {
    /// Already flattened key → string mapping (legacy providers / v3 states).
    Flat(BTreeMap<String, String>),
    /// Raw JSON object text, flattened one level by the normalizer.
    Json(String),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceDocument {
    pub key: InstanceKey,
    pub attributes: AttributeSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputDocument {
    pub name: String,
    pub value: serde_json::Value,
    pub value_type: Option<serde_json::Value>,
    pub sensitive: bool,
}
