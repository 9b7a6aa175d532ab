use similar::{Algorithm, TextDiff};

use crate::state::models::{Resource, State};

/// Lines of context around each hunk.
pub const CONTEXT_LINES: usize = 3;

/// Canonical text of a resource: one line per attribute in stored order.
/// Each value is its canonical JSON text written as a quoted string, so
/// `4` renders `"4"` and `"4"` renders `"\"4\""`.
pub fn render_resource(resource: &Resource) -> String {
    let mut out = format!(
        "resource \"{}\" \"{}\" {{\n",
        resource.resource_type, resource.name
    );
    for attr in &resource.attributes {
        out.push_str(&format!("  {} = {}\n", attr.key, quote(&attr.value)));
    }
    out.push_str("}\n");
    out
}

fn quote(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

/// Header line of one side of a unified diff: path plus revision time.
pub fn diff_header(state: &State) -> String {
    format!(
        "{}\t{}",
        state.path,
        state
            .version
            .last_modified
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    )
}

/// LCS-based unified diff. Empty when both texts are equal.
pub fn unified_diff(old: &str, new: &str, old_header: &str, new_header: &str) -> String {
    if old == new {
        return String::new();
    }
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Lcs)
        .diff_lines(old, new);
    diff.unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(old_header, new_header)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::models::Attribute;

    fn resource(attrs: &[(&str, &str)]) -> Resource {
        Resource {
            resource_type: "aws_instance".to_string(),
            name: "web".to_string(),
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

    #[test]
    fn renders_block_with_attributes_in_order() {
        let r = resource(&[("ami", "\"x\""), ("count", "4"), ("tags", r#"{"a":1}"#)]);
        assert_eq!(
            render_resource(&r),
            concat!(
                "resource \"aws_instance\" \"web\" {\n",
                r#"  ami = "\"x\"""#,
                "\n",
                r#"  count = "4""#,
                "\n",
                r#"  tags = "{\"a\":1}""#,
                "\n}\n"
            )
        );
    }

    #[test]
    fn number_and_string_render_differently() {
        let number = render_resource(&resource(&[("versioning", "4")]));
        let string = render_resource(&resource(&[("versioning", "\"4\"")]));
        assert!(number.contains(r#"  versioning = "4""#));
        assert!(string.contains(r#"  versioning = "\"4\"""#));
        assert_ne!(unified_diff(&number, &string, "a", "b"), "");
    }

    #[test]
    fn identical_text_has_empty_diff() {
        let text = render_resource(&resource(&[("ami", "\"x\"")]));
        assert_eq!(unified_diff(&text, &text, "a", "b"), "");
    }

    #[test]
    fn changed_line_shows_removed_and_added() {
        let old = render_resource(&resource(&[("ami", "\"x\"")]));
        let new = render_resource(&resource(&[("ami", "\"y\"")]));
        let diff = unified_diff(&old, &new, "a.tfstate\tT1", "a.tfstate\tT2");
        assert!(diff.starts_with("--- a.tfstate\tT1\n+++ a.tfstate\tT2\n"));
        assert!(diff.contains("-  ami = \"\\\"x\\\"\"\n"));
        assert!(diff.contains("+  ami = \"\\\"y\\\"\"\n"));
        assert!(diff.contains(" resource \"aws_instance\" \"web\" {\n"));
    }
}
