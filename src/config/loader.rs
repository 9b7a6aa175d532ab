use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::types::{BoardConfig, ProviderConfig};
use crate::provider::{LocalProvider, StorageProvider};

/// Default config file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "tfboard.yaml";

/// Load configuration from `path`.
///
/// A missing default file yields the built-in defaults; a missing file that
/// was named explicitly is an error.
pub fn load_config(path: &str) -> Result<BoardConfig> {
    let p = Path::new(path);

    if p.is_file() {
        let content = fs::read_to_string(p)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let config = parse_config(&content)
            .with_context(|| format!("Failed to parse YAML in: {}", path))?;
        tracing::debug!(path = %path, providers = config.providers.len(), "Loaded config");
        return Ok(config);
    }

    if path == DEFAULT_CONFIG_FILE && !p.exists() {
        tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
        return Ok(BoardConfig::default());
    }

    bail!(
        "Config not found: '{}'. Create {} or specify a path with -c",
        path,
        DEFAULT_CONFIG_FILE
    )
}

/// Parse YAML content into a BoardConfig.
pub fn parse_config(content: &str) -> Result<BoardConfig> {
    if content.trim().is_empty() {
        return Ok(BoardConfig::default());
    }
    let config: BoardConfig =
        serde_yaml::from_str(content).context("Failed to parse YAML configuration")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &BoardConfig) -> Result<()> {
    if config.ingest.parallelism == 0 {
        bail!("ingest.parallelism must be at least 1");
    }
    for provider in &config.providers {
        match provider {
            ProviderConfig::Local { root, .. } if root.trim().is_empty() => {
                bail!("local provider requires a non-empty 'root'")
            }
            ProviderConfig::Local { .. } => {}
        }
    }
    Ok(())
}

/// Instantiate every configured provider, in config order.
pub fn build_providers(configs: &[ProviderConfig]) -> Vec<Arc<dyn StorageProvider>> {
    configs
        .iter()
        .map(|config| -> Arc<dyn StorageProvider> {
            match config {
                ProviderConfig::Local { root, history_dir } => match history_dir {
                    Some(dir) => Arc::new(LocalProvider::with_history_dir(root, dir.as_str())),
                    None => Arc::new(LocalProvider::new(root)),
                },
            }
        })
        .collect()
}
