pub mod loader;
pub mod types;

pub use loader::{build_providers, load_config, DEFAULT_CONFIG_FILE};
pub use types::{BoardConfig, ProviderConfig};
