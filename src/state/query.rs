use anyhow::{bail, Result};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

/// Rows per page for every paged listing.
pub const PAGE_SIZE: usize = 20;

/// Which states a search runs against.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VersionSelector {
    /// The current (highest-serial) state of each path.
    #[default]
    Current,
    /// Every ingested state.
    All,
    /// States stored under this version id.
    Exact(String),
}

/// Ordering for tool-version counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionOrder {
    #[default]
    Count,
    Version,
}

impl VersionOrder {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "version" | "tf_version" => VersionOrder::Version,
            _ => VersionOrder::Count,
        }
    }
}

/// Filters decoded from the key/string pairs an API caller passes in.
///
/// Unknown keys are ignored, empty values mean "no filter", and a page that
/// is not a positive integer falls back to page 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilters {
    pub resource_type: Option<String>,
    pub resource_name: Option<String>,
    pub attribute_key: Option<String>,
    pub attribute_value: Option<String>,
    pub tf_version: Option<String>,
    pub lineage: Option<String>,
    pub version: VersionSelector,
    pub page: usize,
    pub order_by: VersionOrder,
}

impl QueryFilters {
    pub fn new() -> Self {
        Self {
            page: 1,
            ..Default::default()
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filters = Self::new();
        for (key, value) in pairs {
            let value = value.as_ref();
            let non_empty = || {
                let v = value.trim();
                (!v.is_empty()).then(|| v.to_string())
            };
            match key.as_ref() {
                "type" => filters.resource_type = non_empty(),
                "name" => filters.resource_name = non_empty(),
                "key" => filters.attribute_key = non_empty(),
                "value" => filters.attribute_value = non_empty(),
                "tf_version" => filters.tf_version = non_empty(),
                "lineage_value" | "lineage" => filters.lineage = non_empty(),
                "versionid" => {
                    filters.version = match value.trim() {
                        "" => VersionSelector::Current,
                        "*" => VersionSelector::All,
                        id => VersionSelector::Exact(id.to_string()),
                    }
                }
                "page" => filters.page = parse_page(value),
                "orderBy" | "order_by" => filters.order_by = VersionOrder::parse(value),
                other => {
                    tracing::debug!(filter = other, "Ignoring unknown query filter");
                }
            }
        }
        filters
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn offset(&self) -> usize {
        page_offset(self.page)
    }
}

/// Largest row offset SQLite accepts in `OFFSET`.
pub const MAX_OFFSET: usize = i64::MAX as usize;

/// Parse a 1-indexed page number; anything else, including a page whose
/// offset would not fit in `MAX_OFFSET`, is page 1.
pub fn parse_page(raw: &str) -> usize {
    let page = raw.trim().parse::<usize>().ok().filter(|&p| {
        p >= 1
            && (p - 1)
                .checked_mul(PAGE_SIZE)
                .is_some_and(|offset| offset <= MAX_OFFSET)
    });
    match page {
        Some(p) => p,
        None => {
            if !raw.trim().is_empty() {
                tracing::warn!(page = raw, "Invalid page parameter, using page 1");
            }
            1
        }
    }
}

pub fn page_offset(page: usize) -> usize {
    page.max(1)
        .saturating_sub(1)
        .saturating_mul(PAGE_SIZE)
        .min(MAX_OFFSET)
}

/// Numeric components of a dotted tool version (`"v1.5.7"` → `[1, 5, 7]`).
pub fn version_components(re: &regex::Regex, version: &str) -> Vec<u64> {
    re.find_iter(version)
        .filter_map(|m| m.as_str().parse::<u64>().ok())
        .collect()
}

/// Sort tool versions newest first by their numeric components.
pub fn sort_versions_desc<T>(items: &mut [T], version_of: impl Fn(&T) -> &str) {
    let re = match regex::Regex::new(r"\d+") {
        Ok(re) => re,
        Err(_) => return,
    };
    items.sort_by_cached_key(|item| std::cmp::Reverse(version_components(&re, version_of(item))));
}

/// Run a read with a deadline. On expiry the read is abandoned and reported failed.
pub async fn with_deadline<T, F>(limit: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                operation = operation,
                deadline_ms = limit.as_millis() as u64,
                "Query deadline expired"
            );
            bail!(
                "Query '{}' did not finish within {:.1}s",
                operation,
                limit.as_secs_f64()
            )
        }
    }
}

// ─── Row rendering ──────────────────────────────────────────────────────────

/// Output format for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryFormat {
    Table,
    Json,
    Csv,
}

impl QueryFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => QueryFormat::Json,
            "csv" => QueryFormat::Csv,
            _ => QueryFormat::Table,
        }
    }
}

/// Render serializable rows in the requested format.
pub fn render_rows<T: Serialize>(rows: &[T], format: QueryFormat) -> Result<String> {
    let rows: Vec<serde_json::Value> = rows
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<_, _>>()?;

    if rows.is_empty() {
        return Ok(match format {
            QueryFormat::Json => "[]".to_string(),
            _ => "No results.".to_string(),
        });
    }

    match format {
        QueryFormat::Table => format_table(&rows),
        QueryFormat::Json => Ok(serde_json::to_string_pretty(&rows)?),
        QueryFormat::Csv => format_csv(&rows),
    }
}

fn columns(rows: &[serde_json::Value]) -> Vec<String> {
    rows.first()
        .and_then(|r| r.as_object())
        .map(|obj| obj.keys().cloned().collect())
        .unwrap_or_default()
}

fn format_table(rows: &[serde_json::Value]) -> Result<String> {
    let columns = columns(rows);

    let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
    for row in rows {
        if let Some(obj) = row.as_object() {
            for (i, col) in columns.iter().enumerate() {
                let val = obj.get(col).map(value_to_display).unwrap_or_default();
                widths[i] = widths[i].max(val.chars().count());
            }
        }
    }

    let mut output = String::new();

    let header: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{:width$}", c.to_uppercase(), width = widths[i]))
        .collect();
    output.push_str(&header.join(" | "));
    output.push('\n');

    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&sep.join("-+-"));
    output.push('\n');

    for row in rows {
        if let Some(obj) = row.as_object() {
            let vals: Vec<String> = columns
                .iter()
                .enumerate()
                .map(|(i, col)| {
                    let val = obj.get(col).map(value_to_display).unwrap_or_default();
                    format!("{:width$}", val, width = widths[i])
                })
                .collect();
            output.push_str(&vals.join(" | "));
            output.push('\n');
        }
    }

    output.push_str(&format!("\n({} rows)", rows.len()));
    Ok(output)
}

fn format_csv(rows: &[serde_json::Value]) -> Result<String> {
    let columns = columns(rows);

    let mut output = String::new();
    output.push_str(&columns.join(","));
    output.push('\n');

    for row in rows {
        if let Some(obj) = row.as_object() {
            let vals: Vec<String> = columns
                .iter()
                .map(|col| {
                    let val = obj.get(col).map(value_to_display).unwrap_or_default();
                    if val.contains(',') || val.contains('"') || val.contains('\n') {
                        format!("\"{}\"", val.replace('"', "\"\""))
                    } else {
                        val
                    }
                })
                .collect();
            output.push_str(&vals.join(","));
            output.push('\n');
        }
    }

    Ok(output)
}

fn value_to_display(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
