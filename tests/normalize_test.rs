use std::path::{Path, PathBuf};

use tfboard::ingest::normalize;
use tfboard::state::models::State;
use tfboard::tfstate::{
    parse_state, AttributeSource, InstanceDocument, InstanceKey, ModuleDocument, ResourceDocument,
    StateDocument,
};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn normalized(name: &str, version_id: &str) -> State {
    let bytes = std::fs::read(fixture(name)).unwrap();
    let doc = parse_state(&bytes).unwrap();
    normalize(Some(&doc), "envs/prod.tfstate", version_id)
}

fn attr<'a>(state: &'a State, module: usize, resource: usize, key: &str) -> Option<&'a str> {
    state.modules[module].resources[resource]
        .attributes
        .iter()
        .find(|a| a.key == key)
        .map(|a| a.value.as_str())
}

#[test]
fn test_v4_header_is_copied_verbatim() {
    let state = normalized("prod_v1.tfstate", "v1");
    assert_eq!(state.path, "envs/prod.tfstate");
    assert_eq!(state.version.version_id, "v1");
    assert_eq!(state.lineage, "L1");
    assert_eq!(state.serial, 1);
    assert_eq!(state.tf_version, "1.5.7");
}

#[test]
fn test_resource_count_is_instance_count() {
    let state = normalized("prod_v1.tfstate", "v1");
    // aws_instance.web + aws_s3_bucket.logs[0..2] + module.vpc.aws_subnet.a
    assert_eq!(state.resource_count(), 4);
    assert_eq!(state.modules.len(), 2);
    assert_eq!(state.modules[0].path, "");
    assert_eq!(state.modules[0].resources.len(), 3);
    assert_eq!(state.modules[1].path, "module.vpc");
    assert_eq!(state.modules[1].resources.len(), 1);
}

#[test]
fn test_instance_keys_render() {
    let state = normalized("prod_v1.tfstate", "v1");
    let root = &state.modules[0];
    assert_eq!(root.resources[0].index, "");
    assert_eq!(root.resources[1].index, "0");
    assert_eq!(root.resources[2].index, "1");

    let doc = StateDocument {
        lineage: "L".to_string(),
        serial: 1,
        terraform_version: "1.6.0".to_string(),
        modules: vec![ModuleDocument {
            path: String::new(),
            resources: vec![ResourceDocument {
                mode: "managed".to_string(),
                resource_type: "aws_iam_user".to_string(),
                name: "team".to_string(),
                instances: vec![InstanceDocument {
                    key: InstanceKey::Str("alice".to_string()),
                    attributes: AttributeSource::Empty,
                }],
            }],
            outputs: vec![],
        }],
    };
    let state = normalize(Some(&doc), "iam.tfstate", "v1");
    assert_eq!(state.modules[0].resources[0].index, "\"alice\"");
}

#[test]
fn test_attribute_values_are_canonical_json() {
    let state = normalized("prod_v1.tfstate", "v1");
    assert_eq!(attr(&state, 0, 0, "ami"), Some("\"x\""));
    assert_eq!(attr(&state, 0, 1, "versioning"), Some("4"));
    assert_eq!(
        attr(&state, 1, 0, "tags"),
        Some(r#"{"Env":"prod","Name":"a"}"#)
    );

    let v2 = normalized("prod_v2.tfstate", "v2");
    // integer 4 and string "4" stay distinct
    assert_eq!(attr(&v2, 0, 2, "versioning"), Some("\"4\""));
    assert_eq!(attr(&v2, 0, 0, "most_recent"), Some("true"));
    assert_eq!(
        attr(&v2, 0, 3, "ingress"),
        Some(r#"[{"from_port":443,"to_port":443}]"#)
    );
}

#[test]
fn test_data_sources_keep_their_mode() {
    let state = normalized("prod_v2.tfstate", "v2");
    let ami = &state.modules[0].resources[0];
    assert_eq!(ami.resource_type, "aws_ami");
    assert_eq!(ami.mode, "data");
    assert_eq!(state.modules[0].resources[1].mode, "managed");
}

#[test]
fn test_outputs_serialize_value_and_type() {
    let state = normalized("prod_v2.tfstate", "v2");
    let outputs = &state.modules[0].outputs;
    assert_eq!(outputs.len(), 2);

    let password = outputs.iter().find(|o| o.name == "db_password").unwrap();
    assert!(password.sensitive);
    assert_eq!(password.value, r#"{"type":"string","value":"hunter2"}"#);

    let ip = outputs.iter().find(|o| o.name == "web_ip").unwrap();
    assert!(!ip.sensitive);
    assert_eq!(ip.value, r#"{"type":"string","value":"10.0.0.11"}"#);
}

#[test]
fn test_legacy_v3_state() {
    let state = normalized("legacy_v3.tfstate", "v3");
    assert_eq!(state.lineage, "L3");
    assert_eq!(state.serial, 7);
    assert_eq!(state.tf_version, "0.11.14");
    assert_eq!(state.resource_count(), 4);

    let root = &state.modules[0];
    assert_eq!(root.path, "");
    assert_eq!(root.resources[0].resource_type, "aws_instance");
    assert_eq!(root.resources[0].name, "app");
    assert_eq!(root.resources[0].index, "0");
    assert_eq!(root.resources[1].index, "1");
    assert_eq!(root.resources[2].mode, "data");
    assert_eq!(root.resources[2].resource_type, "aws_region");

    let db = &state.modules[1];
    assert_eq!(db.path, "module.db");
    // flat attributes are strings, stored as JSON strings
    assert_eq!(attr(&state, 1, 0, "allocated_storage"), Some("\"20\""));
    assert_eq!(db.resources[0].attributes[0].key, "allocated_storage");
    assert_eq!(db.resources[0].attributes[1].key, "engine");
}

#[test]
fn test_malformed_attribute_json_yields_no_attributes() {
    let doc = StateDocument {
        lineage: "L".to_string(),
        serial: 1,
        terraform_version: "1.6.0".to_string(),
        modules: vec![ModuleDocument {
            path: String::new(),
            resources: vec![ResourceDocument {
                mode: "managed".to_string(),
                resource_type: "aws_instance".to_string(),
                name: "broken".to_string(),
                instances: vec![InstanceDocument {
                    key: InstanceKey::None,
                    attributes: AttributeSource::Json("{not json".to_string()),
                }],
            }],
            outputs: vec![],
        }],
    };

    let state = normalize(Some(&doc), "a.tfstate", "v1");
    assert_eq!(state.resource_count(), 1);
    assert!(state.modules[0].resources[0].attributes.is_empty());
}

#[test]
fn test_missing_document_is_not_an_error() {
    let state = normalize(None, "a.tfstate", "v1");
    assert!(state.modules.is_empty());
    assert_eq!(state.resource_count(), 0);

    let empty = parse_state(b"").unwrap();
    let state = normalize(Some(&empty), "a.tfstate", "v1");
    assert!(state.modules.is_empty());
}

#[test]
fn test_invalid_state_bytes_fail_to_parse() {
    assert!(parse_state(b"{\"version\": 4, \"resources\": 12}").is_err());
    assert!(parse_state(b"not json at all").is_err());
}
