use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{
    AttributeSource, InstanceDocument, InstanceKey, ModuleDocument, OutputDocument,
    ResourceDocument, StateDocument,
};

/// Parse raw state bytes into a `StateDocument`.
///
/// Handles the current JSON layout (`resources[]` with per-resource `module`
/// addresses) and the legacy v3 layout (`modules[]` with flattened
/// `primary.attributes`). Empty input yields an empty document.
pub fn parse_state(bytes: &[u8]) -> Result<StateDocument> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(StateDocument::default());
    }

    let raw: serde_json::Value =
        serde_json::from_slice(bytes).context("Failed to parse state JSON")?;
    if raw.is_null() {
        return Ok(StateDocument::default());
    }

    let version = raw.get("version").and_then(|v| v.as_u64()).unwrap_or(4);
    if version <= 3 {
        let state: TfStateV3 =
            serde_json::from_value(raw).context("Failed to decode v3 state document")?;
        Ok(from_v3(state))
    } else {
        let state: TfState =
            serde_json::from_value(raw).context("Failed to decode state document")?;
        Ok(from_v4(state))
    }
}

// ─── Current layout ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TfState {
    #[serde(default)]
    terraform_version: String,
    #[serde(default)]
    serial: i64,
    #[serde(default)]
    lineage: String,
    #[serde(default)]
    outputs: BTreeMap<String, TfOutput>,
    #[serde(default)]
    resources: Vec<TfStateResource>,
}

#[derive(Debug, Deserialize)]
struct TfStateResource {
    #[serde(default)]
    module: Option<String>,
    #[serde(default = "default_mode")]
    mode: String,
    #[serde(rename = "type")]
    resource_type: String,
    name: String,
    #[serde(default)]
    instances: Vec<TfInstance>,
}

fn default_mode() -> String {
    "managed".to_string()
}

#[derive(Debug, Deserialize)]
struct TfInstance {
    #[serde(default)]
    index_key: Option<serde_json::Value>,
    #[serde(default)]
    attributes: Option<serde_json::Value>,
    #[serde(default)]
    attributes_flat: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct TfOutput {
    #[serde(default)]
    value: serde_json::Value,
    #[serde(rename = "type", default)]
    output_type: Option<serde_json::Value>,
    #[serde(default)]
    sensitive: bool,
}

fn from_v4(state: TfState) -> StateDocument {
    let mut root = ModuleDocument::default();
    let mut nested: Vec<ModuleDocument> = Vec::new();

    for (name, output) in state.outputs {
        root.outputs.push(OutputDocument {
            name,
            value: output.value,
            value_type: output.output_type,
            sensitive: output.sensitive,
        });
    }

    for resource in state.resources {
        let module_path = resource.module.unwrap_or_default();
        let instances = resource
            .instances
            .into_iter()
            .map(|inst| InstanceDocument {
                key: instance_key(inst.index_key),
                attributes: match (inst.attributes_flat, inst.attributes) {
                    (Some(flat), _) => AttributeSource::Flat(flat),
                    (None, Some(json)) => AttributeSource::Json(json.to_string()),
                    (None, None) => AttributeSource::Empty,
                },
            })
            .collect();
        let doc = ResourceDocument {
            mode: resource.mode,
            resource_type: resource.resource_type,
            name: resource.name,
            instances,
        };

        if module_path.is_empty() {
            root.resources.push(doc);
        } else if let Some(m) = nested.iter_mut().find(|m| m.path == module_path) {
            m.resources.push(doc);
        } else {
            nested.push(ModuleDocument {
                path: module_path,
                resources: vec![doc],
                outputs: vec![],
            });
        }
    }

    let mut modules = vec![root];
    modules.extend(nested);

    StateDocument {
        lineage: state.lineage,
        serial: state.serial,
        terraform_version: state.terraform_version,
        modules,
    }
}

fn instance_key(raw: Option<serde_json::Value>) -> InstanceKey {
    match raw {
        Some(serde_json::Value::Number(n)) => match n.as_i64() {
            Some(i) => InstanceKey::Int(i),
            None => InstanceKey::Str(n.to_string()),
        },
        Some(serde_json::Value::String(s)) => InstanceKey::Str(s),
        _ => InstanceKey::None,
    }
}

// ─── Legacy v3 layout ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TfStateV3 {
    #[serde(default)]
    terraform_version: String,
    #[serde(default)]
    serial: i64,
    #[serde(default)]
    lineage: String,
    #[serde(default)]
    modules: Vec<TfModuleV3>,
}

#[derive(Debug, Deserialize)]
struct TfModuleV3 {
    #[serde(default)]
    path: Vec<String>,
    #[serde(default)]
    outputs: BTreeMap<String, TfOutput>,
    #[serde(default)]
    resources: BTreeMap<String, TfResourceV3>,
}

#[derive(Debug, Deserialize)]
struct TfResourceV3 {
    #[serde(rename = "type", default)]
    resource_type: String,
    #[serde(default)]
    primary: Option<TfPrimaryV3>,
}

#[derive(Debug, Deserialize)]
struct TfPrimaryV3 {
    #[serde(default)]
    attributes: BTreeMap<String, String>,
}

fn from_v3(state: TfStateV3) -> StateDocument {
    let modules = state
        .modules
        .into_iter()
        .map(|module| {
            let path = module
                .path
                .iter()
                .skip_while(|p| p.as_str() == "root")
                .map(|p| format!("module.{}", p))
                .collect::<Vec<_>>()
                .join(".");

            let mut resources: Vec<ResourceDocument> = Vec::new();
            for (address, resource) in module.resources {
                let (mode, rtype, name, key) = split_v3_address(&address);
                let rtype = if resource.resource_type.is_empty() {
                    rtype
                } else {
                    resource.resource_type
                };
                let attributes = resource
                    .primary
                    .map(|p| AttributeSource::Flat(p.attributes))
                    .unwrap_or(AttributeSource::Empty);
                let instance = InstanceDocument { key, attributes };

                match resources
                    .iter_mut()
                    .find(|r| r.mode == mode && r.resource_type == rtype && r.name == name)
                {
                    Some(existing) => existing.instances.push(instance),
                    None => resources.push(ResourceDocument {
                        mode,
                        resource_type: rtype,
                        name,
                        instances: vec![instance],
                    }),
                }
            }
            for r in &mut resources {
                r.instances.sort_by_key(|i| match i.key {
                    InstanceKey::Int(n) => n,
                    _ => -1,
                });
            }

            let outputs = module
                .outputs
                .into_iter()
                .map(|(name, o)| OutputDocument {
                    name,
                    value: o.value,
                    value_type: o.output_type,
                    sensitive: o.sensitive,
                })
                .collect();

            ModuleDocument {
                path,
                resources,
                outputs,
            }
        })
        .collect();

    StateDocument {
        lineage: state.lineage,
        serial: state.serial,
        terraform_version: state.terraform_version,
        modules,
    }
}

/// Split a v3 resource address (`data.aws_ami.x`, `aws_instance.web.2`).
fn split_v3_address(address: &str) -> (String, String, String, InstanceKey) {
    let (mode, rest) = match address.strip_prefix("data.") {
        Some(rest) => ("data", rest),
        None => ("managed", address),
    };
    let mut parts = rest.splitn(3, '.');
    let rtype = parts.next().unwrap_or_default().to_string();
    let name = parts.next().unwrap_or_default().to_string();
    let key = match parts.next() {
        Some(idx) => match idx.parse::<i64>() {
            Ok(n) => InstanceKey::Int(n),
            Err(_) => InstanceKey::Str(idx.to_string()),
        },
        None => InstanceKey::None,
    };
    (mode.to_string(), rtype, name, key)
}
