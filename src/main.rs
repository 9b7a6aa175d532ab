use std::sync::Arc;
use std::time::Duration;

/// Reset SIGPIPE to default behavior so piping (e.g. `tfboard states | head`)
/// exits cleanly instead of panicking on broken pipe.
#[cfg(unix)]
fn reset_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use tfboard::compare;
use tfboard::config::{self, BoardConfig};
use tfboard::ingest::{collect_locks, Ingestor};
use tfboard::output::formatter;
use tfboard::state::models::Listing;
use tfboard::state::query::{render_rows, with_deadline, QueryFilters, QueryFormat, VersionOrder};
use tfboard::state::{SqliteRepository, StateRepository};

/// tfboard - ingest, search and compare infrastructure state history
#[derive(Parser)]
#[command(name = "tfboard", version, about, long_about = None)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_FILE)]
    config: String,

    /// State database path (overrides database.path)
    #[arg(long)]
    db: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Number of ingestion workers (overrides ingest.parallelism)
    #[arg(short, long)]
    parallelism: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every new state revision from the configured providers
    Ingest {
        /// Extra local state directory to ingest, in addition to the config
        #[arg(long)]
        local: Vec<String>,
    },

    /// List the current state of every path
    States {
        #[arg(long, default_value = "1")]
        page: String,

        /// Only states whose lineage contains this text
        #[arg(long)]
        lineage: Option<String>,

        /// Output format: table, json, csv
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Show every ingested version of one path
    Activity {
        path: String,

        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Show a full state tree (current version by default)
    Show {
        path: String,

        /// Version id to show
        #[arg(long)]
        version: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search resource attributes
    Search {
        /// Resource type contains
        #[arg(long = "type")]
        resource_type: Option<String>,

        /// Resource name contains
        #[arg(long)]
        name: Option<String>,

        /// Attribute key contains
        #[arg(long)]
        key: Option<String>,

        /// Attribute value contains
        #[arg(long)]
        value: Option<String>,

        /// Tool version contains
        #[arg(long)]
        tf_version: Option<String>,

        /// Lineage contains
        #[arg(long)]
        lineage: Option<String>,

        /// Version id to search, or `*` for every version (default: current)
        #[arg(long)]
        versionid: Option<String>,

        #[arg(long, default_value = "1")]
        page: String,

        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Compare two versions of one path
    Compare {
        path: String,

        /// Older version id
        #[arg(long)]
        from: String,

        /// Newer version id (default: current)
        #[arg(long)]
        to: Option<String>,

        /// Only compare this resource key (e.g. root.aws_instance.web)
        #[arg(long)]
        resource: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List distinct values
    List {
        #[arg(value_enum)]
        kind: ListKind,

        /// Restrict attribute keys to one resource type
        #[arg(long = "type")]
        resource_type: Option<String>,
    },

    /// Count current states per tool version
    TfVersions {
        /// Order by: count or version
        #[arg(long, default_value = "count")]
        order_by: String,

        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Count resources per type across current states
    ResourceTypes {
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// List lineages with their path and state counts
    Lineages {
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Show locks currently held in the configured providers
    Locks {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ListKind {
    Paths,
    Types,
    Names,
    TfVersions,
    Keys,
}

#[tokio::main]
async fn main() -> Result<()> {
    #[cfg(unix)]
    reset_sigpipe();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest { ref local } => cmd_ingest(&cli, &config, local).await,
        Commands::States {
            ref page,
            ref lineage,
            ref format,
        } => cmd_states(&cli, &config, page, lineage.as_deref(), format).await,
        Commands::Activity {
            ref path,
            ref format,
        } => cmd_activity(&cli, &config, path, format).await,
        Commands::Show {
            ref path,
            ref version,
            json,
        } => cmd_show(&cli, &config, path, version.as_deref(), json).await,
        Commands::Search {
            ref resource_type,
            ref name,
            ref key,
            ref value,
            ref tf_version,
            ref lineage,
            ref versionid,
            ref page,
            ref format,
        } => {
            let pairs = [
                ("type", resource_type),
                ("name", name),
                ("key", key),
                ("value", value),
                ("tf_version", tf_version),
                ("lineage", lineage),
                ("versionid", versionid),
            ];
            let filters = QueryFilters::from_pairs(
                pairs
                    .iter()
                    .filter_map(|(k, v)| v.as_deref().map(|v| (*k, v)))
                    .chain(std::iter::once(("page", page.as_str()))),
            );
            cmd_search(&cli, &config, &filters, format).await
        }
        Commands::Compare {
            ref path,
            ref from,
            ref to,
            ref resource,
            json,
        } => {
            cmd_compare(
                &cli,
                &config,
                path,
                from,
                to.as_deref(),
                resource.as_deref(),
                json,
            )
            .await
        }
        Commands::List {
            kind,
            ref resource_type,
        } => cmd_list(&cli, &config, kind, resource_type.clone()).await,
        Commands::TfVersions {
            ref order_by,
            ref format,
        } => cmd_tf_versions(&cli, &config, order_by, format).await,
        Commands::ResourceTypes { ref format } => cmd_resource_types(&cli, &config, format).await,
        Commands::Lineages { ref format } => cmd_lineages(&cli, &config, format).await,
        Commands::Locks { json } => cmd_locks(&config, json).await,
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

async fn open_repository(cli: &Cli, config: &BoardConfig) -> Result<SqliteRepository> {
    let db_path = cli.db.as_deref().unwrap_or(&config.database.path);
    let repository = SqliteRepository::open(db_path)?;
    repository.initialize().await?;
    Ok(repository)
}

fn deadline(config: &BoardConfig) -> Duration {
    config.query.timeout()
}

fn print_rows<T: serde::Serialize>(rows: &[T], format: &str) -> Result<()> {
    println!("{}", render_rows(rows, QueryFormat::parse(format))?);
    Ok(())
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn cmd_ingest(cli: &Cli, config: &BoardConfig, extra_local: &[String]) -> Result<()> {
    let mut provider_configs = config.providers.clone();
    provider_configs.extend(extra_local.iter().map(|root| config::ProviderConfig::Local {
        root: root.clone(),
        history_dir: None,
    }));
    if provider_configs.is_empty() {
        bail!(
            "No providers configured. Add a 'providers' section to {} or pass --local <dir>",
            cli.config
        );
    }

    let repository: Arc<dyn StateRepository> = Arc::new(open_repository(cli, config).await?);
    let providers = config::build_providers(&provider_configs);
    let parallelism = cli.parallelism.unwrap_or(config.ingest.parallelism);

    println!(
        "{} Ingesting from {} provider(s) with {} worker(s)...",
        "→".cyan().bold(),
        providers.len(),
        parallelism
    );

    let summary = Ingestor::new(providers, repository, parallelism)
        .run()
        .await?;
    formatter::print_ingest_summary(&summary);

    if !summary.failures.is_empty() {
        bail!("{} state revision(s) failed to ingest", summary.failures.len());
    }
    Ok(())
}

async fn cmd_states(
    cli: &Cli,
    config: &BoardConfig,
    page: &str,
    lineage: Option<&str>,
    format: &str,
) -> Result<()> {
    let repository = open_repository(cli, config).await?;
    let mut pairs = vec![("page", page)];
    if let Some(lineage) = lineage {
        pairs.push(("lineage", lineage));
    }
    let filters = QueryFilters::from_pairs(pairs);

    let stats = with_deadline(
        deadline(config),
        "list_state_stats",
        repository.list_state_stats(&filters),
    )
    .await?;

    match QueryFormat::parse(format) {
        QueryFormat::Table => formatter::print_state_stats(&stats),
        QueryFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        QueryFormat::Csv => print_rows(&stats.items, format)?,
    }
    Ok(())
}

async fn cmd_activity(cli: &Cli, config: &BoardConfig, path: &str, format: &str) -> Result<()> {
    let repository = open_repository(cli, config).await?;
    let activity = with_deadline(
        deadline(config),
        "get_state_activity",
        repository.get_state_activity(path),
    )
    .await?;

    match QueryFormat::parse(format) {
        QueryFormat::Table => formatter::print_activity(path, &activity),
        _ => print_rows(&activity, format)?,
    }
    Ok(())
}

async fn cmd_show(
    cli: &Cli,
    config: &BoardConfig,
    path: &str,
    version: Option<&str>,
    json: bool,
) -> Result<()> {
    let repository = open_repository(cli, config).await?;
    let limit = deadline(config);

    let version_id = match version {
        Some(v) => v.to_string(),
        None => with_deadline(limit, "default_version", repository.default_version(path))
            .await?
            .with_context(|| format!("No state ingested for '{}'", path))?,
    };

    let state = with_deadline(limit, "get_state", repository.get_state(path, &version_id)).await?;
    if state.is_empty() {
        bail!("State '{}' at version '{}' not found", path, version_id);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        formatter::print_state(&state);
    }
    Ok(())
}

async fn cmd_search(
    cli: &Cli,
    config: &BoardConfig,
    filters: &QueryFilters,
    format: &str,
) -> Result<()> {
    let repository = open_repository(cli, config).await?;
    let results = with_deadline(
        deadline(config),
        "search_attribute",
        repository.search_attribute(filters),
    )
    .await?;

    match QueryFormat::parse(format) {
        QueryFormat::Table => formatter::print_search_results(&results),
        QueryFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        QueryFormat::Csv => print_rows(&results.items, format)?,
    }
    Ok(())
}

async fn cmd_compare(
    cli: &Cli,
    config: &BoardConfig,
    path: &str,
    from: &str,
    to: Option<&str>,
    resource: Option<&str>,
    json: bool,
) -> Result<()> {
    let repository = open_repository(cli, config).await?;
    let limit = deadline(config);

    let to_version = match to {
        Some(v) => v.to_string(),
        None => with_deadline(limit, "default_version", repository.default_version(path))
            .await?
            .unwrap_or_default(),
    };

    let from_state = with_deadline(limit, "get_state", repository.get_state(path, from)).await?;
    let to_state =
        with_deadline(limit, "get_state", repository.get_state(path, &to_version)).await?;

    let result = compare::compare(&from_state, &to_state)?;

    if let Some(key) = resource {
        let old = compare::find_resource(&from_state, key)?;
        let new = compare::find_resource(&to_state, key)?;
        let diff = compare::compare_resource(&from_state, &to_state, old, new);
        if json {
            println!("{}", serde_json::to_string_pretty(&diff)?);
        } else if diff.is_unchanged() {
            formatter::print_success(&format!("{} is unchanged.", key));
        } else {
            print!("{}", diff.unified_diff);
        }
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        formatter::print_compare(path, &result);
    }
    Ok(())
}

async fn cmd_list(
    cli: &Cli,
    config: &BoardConfig,
    kind: ListKind,
    resource_type: Option<String>,
) -> Result<()> {
    let repository = open_repository(cli, config).await?;
    let (title, listing) = match kind {
        ListKind::Paths => ("Paths", Listing::Paths),
        ListKind::Types => ("Resource types", Listing::ResourceTypes),
        ListKind::Names => ("Resource names", Listing::ResourceNames),
        ListKind::TfVersions => ("Terraform versions", Listing::TfVersions),
        ListKind::Keys => ("Attribute keys", Listing::AttributeKeys { resource_type }),
    };

    let values = with_deadline(
        deadline(config),
        "list_distinct",
        repository.list_distinct(&listing),
    )
    .await?;
    formatter::print_values(title, &values);
    Ok(())
}

async fn cmd_tf_versions(
    cli: &Cli,
    config: &BoardConfig,
    order_by: &str,
    format: &str,
) -> Result<()> {
    let repository = open_repository(cli, config).await?;
    let counts = with_deadline(
        deadline(config),
        "list_tf_versions_with_count",
        repository.list_tf_versions_with_count(VersionOrder::parse(order_by)),
    )
    .await?;

    match QueryFormat::parse(format) {
        QueryFormat::Table => formatter::print_version_counts(&counts),
        _ => print_rows(&counts, format)?,
    }
    Ok(())
}

async fn cmd_resource_types(cli: &Cli, config: &BoardConfig, format: &str) -> Result<()> {
    let repository = open_repository(cli, config).await?;
    let counts = with_deadline(
        deadline(config),
        "list_resource_types_with_count",
        repository.list_resource_types_with_count(),
    )
    .await?;

    match QueryFormat::parse(format) {
        QueryFormat::Table => formatter::print_resource_type_counts(&counts),
        _ => print_rows(&counts, format)?,
    }
    Ok(())
}

async fn cmd_lineages(cli: &Cli, config: &BoardConfig, format: &str) -> Result<()> {
    let repository = open_repository(cli, config).await?;
    let lineages = with_deadline(deadline(config), "list_lineages", repository.list_lineages())
        .await?;

    match QueryFormat::parse(format) {
        QueryFormat::Table => formatter::print_lineages(&lineages),
        _ => print_rows(&lineages, format)?,
    }
    Ok(())
}

async fn cmd_locks(config: &BoardConfig, json: bool) -> Result<()> {
    let providers = config::build_providers(&config.providers);
    let locks = collect_locks(&providers).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&locks)?);
    } else {
        formatter::print_locks(&locks);
    }
    Ok(())
}
