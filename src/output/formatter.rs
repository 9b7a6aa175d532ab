use colored::Colorize;
use std::collections::BTreeMap;

use crate::compare::StateCompare;
use crate::ingest::IngestSummary;
use crate::provider::LockInfo;
use crate::state::models::{
    LineageStat, Page, ResourceTypeCount, SearchResult, State, StateStat, VersionCount,
};
use crate::state::query::PAGE_SIZE;

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg.green());
}

/// Print an error message.
pub fn print_error(msg: &str) {
    println!("{} {}", "✗".red().bold(), msg.red());
}

fn timestamp(stat: &StateStat) -> String {
    stat.last_modified.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn print_page_footer(page: usize, shown: usize, total: usize) {
    let pages = total.div_ceil(PAGE_SIZE).max(1);
    println!();
    println!(
        "  {} of {} row(s), page {}/{}.",
        shown, total, page, pages
    );
    println!();
}

/// Print the current state of each path.
pub fn print_state_stats(page: &Page<StateStat>) {
    if page.items.is_empty() {
        println!("{}", "No states ingested.".dimmed());
        return;
    }

    println!();
    println!("{}", "States".bold().cyan());
    println!("{}", "─".repeat(100));
    println!(
        "  {:<35} {:<20} {:>6} {:<10} {:>9}  {}",
        "PATH".bold(),
        "LAST MODIFIED".bold(),
        "SERIAL".bold(),
        "TF".bold(),
        "RESOURCES".bold(),
        "LINEAGE".bold()
    );
    println!("{}", "─".repeat(100));

    for stat in &page.items {
        println!(
            "  {:<35} {:<20} {:>6} {:<10} {:>9}  {}",
            stat.path,
            timestamp(stat),
            stat.serial,
            stat.tf_version,
            stat.resource_count,
            stat.lineage_value.dimmed()
        );
    }

    print_page_footer(page.page, page.items.len(), page.total);
}

/// Print every ingested version of one path, oldest first.
pub fn print_activity(path: &str, activity: &[StateStat]) {
    if activity.is_empty() {
        println!("{} {}", "No versions found for".dimmed(), path.dimmed());
        return;
    }

    println!();
    println!("{} {}", "Activity:".bold().cyan(), path.bold());
    println!("{}", "─".repeat(80));
    println!(
        "  {:<20} {:<20} {:>6} {:<10} {:>9}",
        "VERSION".bold(),
        "LAST MODIFIED".bold(),
        "SERIAL".bold(),
        "TF".bold(),
        "RESOURCES".bold()
    );
    println!("{}", "─".repeat(80));

    let mut previous: Option<i64> = None;
    for stat in activity {
        let count = match previous {
            Some(p) if stat.resource_count > p => stat.resource_count.to_string().green(),
            Some(p) if stat.resource_count < p => stat.resource_count.to_string().red(),
            _ => stat.resource_count.to_string().normal(),
        };
        println!(
            "  {:<20} {:<20} {:>6} {:<10} {:>9}",
            stat.version_id,
            timestamp(stat),
            stat.serial,
            stat.tf_version,
            count
        );
        previous = Some(stat.resource_count);
    }

    println!();
    println!("  {} version(s).", activity.len());
    println!();
}

/// Print a full state tree.
pub fn print_state(state: &State) {
    println!();
    println!("{} {}", "State:".bold().cyan(), state.path.bold());
    println!("{}", "─".repeat(60));
    println!("  {:<16} {}", "Version:".bold(), state.version.version_id);
    println!(
        "  {:<16} {}",
        "Last modified:".bold(),
        state.version.last_modified.to_rfc3339()
    );
    println!("  {:<16} {}", "Lineage:".bold(), state.lineage);
    println!("  {:<16} {}", "Serial:".bold(), state.serial);
    println!("  {:<16} {}", "TF version:".bold(), state.tf_version);
    println!("  {:<16} {}", "Resources:".bold(), state.resource_count());

    for module in &state.modules {
        println!();
        let label = if module.path.is_empty() {
            "root"
        } else {
            module.path.as_str()
        };
        println!("  {} {}", "Module".bold(), label.cyan());

        for resource in &module.resources {
            let mut address = format!("{}.{}", resource.resource_type, resource.name);
            if resource.mode == "data" {
                address = format!("data.{}", address);
            }
            if !resource.index.is_empty() {
                address = format!("{}[{}]", address, resource.index);
            }
            println!("    {}", address.bold());
            let width = resource
                .attributes
                .iter()
                .map(|a| a.key.len())
                .max()
                .unwrap_or(0)
                .min(35);
            for attr in &resource.attributes {
                println!("      {:<width$} = {}", attr.key, attr.value, width = width);
            }
        }

        if !module.outputs.is_empty() {
            println!("    {}", "Outputs".bold());
            for output in &module.outputs {
                let value = if output.sensitive {
                    "(sensitive)".dimmed().to_string()
                } else {
                    output.value.clone()
                };
                println!("      {} = {}", output.name, value);
            }
        }
    }

    println!("{}", "─".repeat(60));
    println!();
}

/// Print one page of attribute search hits.
pub fn print_search_results(page: &Page<SearchResult>) {
    if page.items.is_empty() {
        println!("{}", "No matching attributes.".dimmed());
        return;
    }

    println!();
    for hit in &page.items {
        let module = if hit.module_path.is_empty() {
            "root"
        } else {
            hit.module_path.as_str()
        };
        let index = if hit.resource_index.is_empty() {
            String::new()
        } else {
            format!("[{}]", hit.resource_index)
        };
        println!(
            "  {} {} {}.{}.{}{}  {} = {}",
            hit.path.cyan(),
            format!("#{}", hit.serial).dimmed(),
            module,
            hit.resource_type,
            hit.resource_name,
            index,
            hit.attribute_key.bold(),
            hit.attribute_value
        );
    }

    print_page_footer(page.page, page.items.len(), page.total);
}

/// Print a state comparison: added and removed resources, then each
/// changed resource's unified diff.
pub fn print_compare(path: &str, compare: &StateCompare) {
    let stats = &compare.stats;
    let diff = &compare.differences;

    println!();
    println!(
        "{} {}  {} ({} resources) → {} ({} resources)",
        "Compare:".bold().cyan(),
        path.bold(),
        stats.from.version_id,
        stats.from.resource_count,
        stats.to.version_id,
        stats.to.resource_count
    );
    println!("{}", "─".repeat(80));

    for key in diff.only_in_new.keys() {
        println!("  {} {}", "+".green().bold(), key.green());
    }
    for key in diff.only_in_old.keys() {
        println!("  {} {}", "-".red().bold(), key.red());
    }

    let changed: Vec<&String> = diff
        .in_both
        .iter()
        .filter(|key| {
            diff.resource_diff
                .get(key.as_str())
                .map(|d| !d.is_unchanged())
                .unwrap_or(false)
        })
        .collect();

    for key in &changed {
        println!("  {} {}", "~".yellow().bold(), key.yellow());
    }

    for key in &changed {
        if let Some(resource_diff) = diff.resource_diff.get(key.as_str()) {
            println!();
            println!("  {}", key.bold());
            for line in resource_diff.unified_diff.lines() {
                let colored = if line.starts_with("+++") || line.starts_with("---") {
                    line.bold()
                } else if line.starts_with('+') {
                    line.green()
                } else if line.starts_with('-') {
                    line.red()
                } else if line.starts_with("@@") {
                    line.cyan()
                } else {
                    line.normal()
                };
                println!("    {}", colored);
            }
        }
    }

    println!();
    println!(
        "  {} added, {} removed, {} changed, {} unchanged.",
        diff.only_in_new.len(),
        diff.only_in_old.len(),
        changed.len(),
        diff.in_both.len() - changed.len()
    );
    println!();
}

/// Print a distinct-value listing.
pub fn print_values(title: &str, values: &[String]) {
    if values.is_empty() {
        println!("{}", "No values.".dimmed());
        return;
    }
    println!();
    println!("{}", title.bold().cyan());
    println!("{}", "─".repeat(60));
    for value in values {
        println!("  {}", value);
    }
    println!();
}

pub fn print_version_counts(counts: &[VersionCount]) {
    if counts.is_empty() {
        println!("{}", "No states ingested.".dimmed());
        return;
    }
    println!();
    println!("  {:<20} {}", "TF VERSION".bold(), "STATES".bold());
    for row in counts {
        println!("  {:<20} {}", row.tf_version, row.count);
    }
    println!();
}

pub fn print_resource_type_counts(counts: &[ResourceTypeCount]) {
    if counts.is_empty() {
        println!("{}", "No resources.".dimmed());
        return;
    }
    println!();
    println!("  {:<40} {}", "TYPE".bold(), "COUNT".bold());
    for row in counts {
        println!("  {:<40} {}", row.resource_type, row.count);
    }
    println!();
}

pub fn print_lineages(lineages: &[LineageStat]) {
    if lineages.is_empty() {
        println!("{}", "No lineages.".dimmed());
        return;
    }
    println!();
    println!(
        "  {:<40} {:>6} {:>7}",
        "LINEAGE".bold(),
        "PATHS".bold(),
        "STATES".bold()
    );
    for row in lineages {
        println!(
            "  {:<40} {:>6} {:>7}",
            row.value, row.path_count, row.state_count
        );
    }
    println!();
}

/// Print currently held locks.
pub fn print_locks(locks: &BTreeMap<String, LockInfo>) {
    if locks.is_empty() {
        println!("{}", "No locks held.".green());
        return;
    }

    println!();
    println!("{}", "Locks".bold().cyan());
    println!("{}", "─".repeat(80));
    for (path, lock) in locks {
        println!("  {} {}", "●".yellow(), path.bold());
        println!("    {:<12} {}", "ID:".bold(), lock.id);
        println!("    {:<12} {}", "Operation:".bold(), lock.operation);
        println!("    {:<12} {}", "Who:".bold(), lock.who);
        println!("    {:<12} {}", "Created:".bold(), lock.created);
        if !lock.info.is_empty() {
            println!("    {:<12} {}", "Info:".bold(), lock.info);
        }
    }
    println!();
}

/// Print the outcome of an ingestion run.
pub fn print_ingest_summary(summary: &IngestSummary) {
    for failure in &summary.failures {
        print_error(&format!(
            "{} {}@{}: {:#}",
            failure.provider, failure.path, failure.version_id, failure.error
        ));
    }
    if summary.failures.is_empty() {
        print_success(&summary.to_string());
    } else {
        println!("{}", summary.to_string().yellow());
    }
}
