//! Document → relational records.

use crate::state::models::{Attribute, Module, OutputValue, Resource, State, Version};
use crate::tfstate::{AttributeSource, InstanceDocument, StateDocument};

/// Flatten a parsed snapshot into a `State` ready for insertion.
///
/// One `Resource` is produced per instance, so a `count = 3` block yields
/// three rows. A `None` document yields a state with no modules.
pub fn normalize(doc: Option<&StateDocument>, path: &str, version_id: &str) -> State {
    let mut state = State {
        path: path.to_string(),
        version: Version {
            version_id: version_id.to_string(),
            ..Default::default()
        },
        ..Default::default()
    };

    let doc = match doc {
        Some(doc) => doc,
        None => return state,
    };

    state.lineage = doc.lineage.clone();
    state.serial = doc.serial;
    state.tf_version = doc.terraform_version.clone();

    for module in &doc.modules {
        let mut m = Module {
            path: module.path.clone(),
            ..Default::default()
        };

        for resource in &module.resources {
            for instance in &resource.instances {
                m.resources.push(Resource {
                    resource_type: resource.resource_type.clone(),
                    name: resource.name.clone(),
                    mode: resource.mode.clone(),
                    index: instance.key.render(),
                    attributes: instance_attributes(path, &resource.resource_type, instance),
                });
            }
        }

        for output in &module.outputs {
            m.outputs.push(OutputValue {
                name: output.name.clone(),
                value: output_json(&output.value, output.value_type.as_ref()),
                sensitive: output.sensitive,
            });
        }

        state.modules.push(m);
    }

    state
}

/// Attributes of one instance as `(key, canonical JSON)` pairs.
///
/// A flat mapping is used as is. A JSON object is flattened one level.
/// Anything unparseable yields no attributes.
fn instance_attributes(path: &str, resource_type: &str, instance: &InstanceDocument) -> Vec<Attribute> {
    match &instance.attributes {
        AttributeSource::Flat(flat) => flat
            .iter()
            .map(|(key, value)| Attribute {
                key: key.clone(),
                value: canonical_json(&serde_json::Value::String(value.clone())),
            })
            .collect(),
        AttributeSource::Json(raw) => {
            match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(raw) {
                Ok(object) => object
                    .iter()
                    .map(|(key, value)| Attribute {
                        key: key.clone(),
                        value: canonical_json(value),
                    })
                    .collect(),
                Err(e) => {
                    tracing::warn!(
                        path = path,
                        resource_type = resource_type,
                        error = %e,
                        "Malformed attribute payload, storing no attributes"
                    );
                    Vec::new()
                }
            }
        }
        AttributeSource::Empty => Vec::new(),
    }
}

/// Serialize a value to canonical JSON text (object keys sorted, no whitespace).
pub fn canonical_json(value: &serde_json::Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

fn output_json(value: &serde_json::Value, value_type: Option<&serde_json::Value>) -> String {
    let mut object = serde_json::Map::new();
    object.insert("value".to_string(), value.clone());
    object.insert(
        "type".to_string(),
        value_type.cloned().unwrap_or(serde_json::Value::Null),
    );
    canonical_json(&serde_json::Value::Object(object))
}
