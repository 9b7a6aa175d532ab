use std::path::Path;

use chrono::{TimeZone, Utc};

use tfboard::compare::{compare, find_resource, resource_key, CompareError};
use tfboard::ingest::normalize;
use tfboard::state::models::{Attribute, Module, Resource, State, Version};
use tfboard::state::{SqliteRepository, StateRepository};
use tfboard::tfstate::parse_state;

fn resource(rtype: &str, name: &str, attrs: &[(&str, &str)]) -> Resource {
    Resource {
        resource_type: rtype.to_string(),
        name: name.to_string(),
        mode: "managed".to_string(),
        index: String::new(),
        attributes: attrs
            .iter()
            .map(|(k, v)| Attribute {
                key: k.to_string(),
                value: v.to_string(),
            })
            .collect(),
    }
}

fn state(version_id: &str, resources: Vec<Resource>) -> State {
    State {
        path: "a.tfstate".to_string(),
        lineage: "L1".to_string(),
        version: Version::new(
            version_id,
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        ),
        serial: 1,
        tf_version: "1.6.0".to_string(),
        modules: vec![Module {
            path: String::new(),
            resources,
            outputs: vec![],
        }],
        ..Default::default()
    }
}

#[test]
fn test_attribute_change_in_both_directions() {
    let from = state("v1", vec![resource("A", "a", &[("k1", "\"v1\""), ("k2", "\"v2\"")])]);
    let to = state("v2", vec![resource("A", "a", &[("k1", "\"v1\""), ("k2", "\"v3\"")])]);

    let result = compare(&to, &from).unwrap();
    let diff = &result.differences;
    assert_eq!(diff.in_both, vec!["root.A.a"]);
    assert!(diff.only_in_old.is_empty());
    assert!(diff.only_in_new.is_empty());

    let resource_diff = &diff.resource_diff["root.A.a"];
    assert_eq!(resource_diff.only_in_old.len(), 1);
    assert_eq!(resource_diff.only_in_old["k2"], "\"v3\"");
    assert_eq!(resource_diff.only_in_new["k2"], "\"v2\"");
    assert!(resource_diff.unified_diff.contains("-  k2 = \"\\\"v3\\\"\"\n"));
    assert!(resource_diff.unified_diff.contains("+  k2 = \"\\\"v2\\\"\"\n"));
    assert!(resource_diff.unified_diff.contains("   k1 = \"\\\"v1\\\"\"\n"));
}

#[test]
fn test_unknown_side_is_named() {
    let known = state("v1", vec![]);
    let unknown = State::default();

    let err = compare(&unknown, &known).unwrap_err();
    assert_eq!(err, CompareError::UnknownState { side: "from" });
    assert!(err.to_string().contains("from"));

    let err = compare(&known, &unknown).unwrap_err();
    assert_eq!(err, CompareError::UnknownState { side: "to" });
}

#[test]
fn test_integer_and_string_values_differ() {
    let from = state("v1", vec![resource("aws_s3_bucket", "logs", &[("versioning", "4")])]);
    let to = state("v2", vec![resource("aws_s3_bucket", "logs", &[("versioning", "\"4\"")])]);

    let result = compare(&from, &to).unwrap();
    let resource_diff = &result.differences.resource_diff["root.aws_s3_bucket.logs"];
    assert_eq!(resource_diff.only_in_old["versioning"], "4");
    assert_eq!(resource_diff.only_in_new["versioning"], "\"4\"");
    assert!(!resource_diff.is_unchanged());
    assert!(resource_diff.unified_diff.contains("-  versioning = \"4\"\n"));
    assert!(resource_diff.unified_diff.contains(r#"+  versioning = "\"4\"""#));
}

#[test]
fn test_unchanged_resources_have_empty_diffs() {
    let from = state("v1", vec![resource("A", "a", &[("k", "1")])]);
    let to = state("v2", vec![resource("A", "a", &[("k", "1")])]);

    let result = compare(&from, &to).unwrap();
    let resource_diff = &result.differences.resource_diff["root.A.a"];
    assert!(resource_diff.is_unchanged());
    assert_eq!(resource_diff.unified_diff, "");
}

#[test]
fn test_find_resource_by_key() {
    let s = state("v1", vec![resource("A", "a", &[("k", "1")])]);
    assert_eq!(resource_key("", &s.modules[0].resources[0]), "root.A.a");

    let found = find_resource(&s, "root.A.a").unwrap();
    assert_eq!(found.name, "a");

    let err = find_resource(&s, "root.A.missing").unwrap_err();
    assert_eq!(
        err,
        CompareError::ResourceNotFound {
            key: "root.A.missing".to_string(),
            path: "a.tfstate".to_string(),
        }
    );
}

#[test]
fn test_instances_share_one_key() {
    let mut first = resource("aws_instance", "web", &[("ami", "\"x\"")]);
    first.index = "0".to_string();
    let mut second = resource("aws_instance", "web", &[("ami", "\"other\"")]);
    second.index = "1".to_string();
    let from = state("v1", vec![first.clone(), second]);
    let to = state("v2", vec![first]);

    let result = compare(&from, &to).unwrap();
    assert_eq!(result.differences.in_both, vec!["root.aws_instance.web"]);
    assert!(result.differences.resource_diff["root.aws_instance.web"].is_unchanged());
    // counts are still per instance
    assert_eq!(result.stats.from.resource_count, 2);
    assert_eq!(result.stats.to.resource_count, 1);
}

#[test]
fn test_output_field_names_are_stable() {
    let from = state("v1", vec![resource("A", "a", &[("k", "1")])]);
    let to = state("v2", vec![resource("B", "b", &[])]);

    let json = serde_json::to_value(compare(&from, &to).unwrap()).unwrap();
    assert_eq!(json["stats"]["from"]["version_id"], "v1");
    assert_eq!(json["stats"]["to"]["resource_count"], 1);
    assert_eq!(
        json["differences"]["only_in_old"]["root.A.a"],
        "resource \"A\" \"a\" {\n  k = \"1\"\n}\n"
    );
    assert_eq!(
        json["differences"]["only_in_new"]["root.B.b"],
        "resource \"B\" \"b\" {\n}\n"
    );
    assert!(json["differences"]["in_both"].as_array().unwrap().is_empty());
    assert!(json["differences"]["resource_diff"].as_object().unwrap().is_empty());
}

async fn ingest_fixture(repo: &SqliteRepository, name: &str, version_id: &str, minute: u32) {
    let bytes = std::fs::read(
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(name),
    )
    .unwrap();
    let doc = parse_state(&bytes).unwrap();
    let version = Version::new(
        version_id,
        Utc.with_ymd_and_hms(2026, 3, 1, 12, minute, 0).unwrap(),
    );
    repo.insert_version(&version).await.unwrap();
    let state = normalize(Some(&doc), "envs/prod.tfstate", version_id);
    repo.insert_state("envs/prod.tfstate", version_id, &state)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_two_ingested_revisions() {
    let repo = SqliteRepository::open_memory().unwrap();
    repo.initialize().await.unwrap();
    ingest_fixture(&repo, "prod_v1.tfstate", "v1", 0).await;
    ingest_fixture(&repo, "prod_v2.tfstate", "v2", 5).await;

    assert_eq!(
        repo.default_version("envs/prod.tfstate").await.unwrap(),
        Some("v2".to_string())
    );

    let from = repo.get_state("envs/prod.tfstate", "v1").await.unwrap();
    let to = repo.get_state("envs/prod.tfstate", "v2").await.unwrap();
    let result = compare(&from, &to).unwrap();

    assert_eq!(result.stats.from.version_id, "v1");
    assert_eq!(result.stats.from.resource_count, 4);
    assert_eq!(result.stats.to.version_id, "v2");
    assert_eq!(result.stats.to.resource_count, 4);

    let diff = &result.differences;
    assert_eq!(
        diff.only_in_old.keys().collect::<Vec<_>>(),
        vec!["module.vpc.aws_subnet.a"]
    );
    assert_eq!(
        diff.only_in_new.keys().collect::<Vec<_>>(),
        vec!["root.aws_ami.ubuntu", "root.aws_security_group.web"]
    );
    assert_eq!(
        diff.in_both,
        vec!["root.aws_instance.web", "root.aws_s3_bucket.logs"]
    );

    let web = &diff.resource_diff["root.aws_instance.web"];
    assert_eq!(web.only_in_old.len(), 1);
    assert_eq!(web.only_in_old["ami"], "\"x\"");
    assert_eq!(web.only_in_new.len(), 1);
    assert_eq!(web.only_in_new["ami"], "\"y\"");
    assert!(web
        .unified_diff
        .starts_with("--- envs/prod.tfstate\t2026-03-01T12:00:00Z\n+++ envs/prod.tfstate\t2026-03-01T12:05:00Z\n"));
    assert!(web.unified_diff.contains(r#"-  ami = "\"x\"""#));
    assert!(web.unified_diff.contains(r#"+  ami = "\"y\"""#));

    let logs = &diff.resource_diff["root.aws_s3_bucket.logs"];
    assert_eq!(logs.only_in_old["versioning"], "4");
    assert_eq!(logs.only_in_new["versioning"], "\"4\"");
    assert!(!logs.only_in_old.contains_key("bucket"));

    let subnet = &diff.only_in_old["module.vpc.aws_subnet.a"];
    assert!(subnet.starts_with("resource \"aws_subnet\" \"a\" {\n"));
    assert!(subnet.contains(r#"  cidr_block = "\"10.0.1.0/24\"""#));
}
