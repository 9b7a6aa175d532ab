//! Storage provider capability.
//!
//! A provider knows where raw state snapshots live and how to enumerate their
//! revisions. Ingestion is handed an explicit list of providers and is
//! indifferent to which vendor backs each one.

pub mod local;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::tfstate::StateDocument;

pub use local::LocalProvider;
pub use memory::MemoryProvider;

/// Errors raised by a storage provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested path/version does not exist in the backing store
    #[error("State {path} at version {version_id} not found")]
    NotFound { path: String, version_id: String },

    /// The stored bytes could not be parsed as a state document
    #[error("Invalid state file {path}: {message}")]
    InvalidState { path: String, message: String },

    /// Local I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Network or vendor API failure
    #[error("Transport error: {0}")]
    Transport(String),
}

impl ProviderError {
    pub fn not_found(path: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self::NotFound {
            path: path.into(),
            version_id: version_id.into(),
        }
    }

    pub fn invalid_state(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidState {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// One storage revision of a state path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub id: String,
    pub last_modified: DateTime<Utc>,
}

/// Lock metadata as written by the IaC tool next to a locked state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LockInfo {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub info: String,
    #[serde(default)]
    pub who: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub path: String,
}

/// Read-only access to a vendor's state storage.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Short label used in logs (e.g. `local:/srv/states`).
    fn name(&self) -> String;

    /// List every state path known to the store.
    async fn list_states(&self) -> ProviderResult<Vec<String>>;

    /// List the stored revisions of one path, oldest first.
    async fn list_versions(&self, path: &str) -> ProviderResult<Vec<VersionInfo>>;

    /// Fetch and parse one revision.
    async fn get_state(&self, path: &str, version_id: &str) -> ProviderResult<StateDocument>;

    /// Currently held locks, keyed by state path.
    async fn get_locks(&self) -> ProviderResult<BTreeMap<String, LockInfo>>;
}
