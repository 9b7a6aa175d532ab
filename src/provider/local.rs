//! Local directory provider.
//!
//! Layout under `root`:
//!
//! ```text
//!   envs/prod.tfstate                         current snapshot of "envs/prod.tfstate"
//!   envs/.prod.tfstate.lock.info              lock held on that state
//!   .history/envs/prod.tfstate/*.tfstate      archived snapshots of the same path
//! ```
//!
//! Version ids are content-addressed (truncated SHA-256), so the same bytes
//! always map to the same version no matter where they were found.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{LockInfo, ProviderError, ProviderResult, StorageProvider, VersionInfo};
use crate::tfstate::{self, StateDocument};

const VERSION_ID_LEN: usize = 16;

pub struct LocalProvider {
    root: PathBuf,
    history_dir: String,
}

impl LocalProvider {
    pub const DEFAULT_HISTORY_DIR: &'static str = ".history";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_history_dir(root, Self::DEFAULT_HISTORY_DIR)
    }

    pub fn with_history_dir(root: impl Into<PathBuf>, history_dir: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            history_dir: history_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every file holding a revision of `path`: the live file plus archived copies.
    fn revision_files(&self, path: &str) -> ProviderResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        let current = self.root.join(path);
        if current.is_file() {
            files.push(current);
        }

        let archive = self.root.join(&self.history_dir).join(path);
        if archive.is_dir() {
            let entries = std::fs::read_dir(&archive).map_err(|e| {
                ProviderError::Io(format!("Failed to read {}: {}", archive.display(), e))
            })?;
            for entry in entries.filter_map(|e| e.ok()) {
                let p = entry.path();
                if p.is_file() && p.extension().map(|e| e == "tfstate").unwrap_or(false) {
                    files.push(p);
                }
            }
        }
        Ok(files)
    }

    fn read_revision(file: &Path) -> ProviderResult<(VersionInfo, Vec<u8>)> {
        let bytes = std::fs::read(file)
            .map_err(|e| ProviderError::Io(format!("Failed to read {}: {}", file.display(), e)))?;
        let modified = std::fs::metadata(file)
            .and_then(|m| m.modified())
            .map_err(|e| ProviderError::Io(format!("Failed to stat {}: {}", file.display(), e)))?;
        let info = VersionInfo {
            id: content_version_id(&bytes),
            last_modified: DateTime::<Utc>::from(modified),
        };
        Ok((info, bytes))
    }

    fn relative(&self, file: &Path) -> Option<String> {
        let rel = file.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        Some(parts.join("/"))
    }
}

/// Truncated hex SHA-256 of a snapshot's bytes.
pub fn content_version_id(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut id = hex::encode(digest);
    id.truncate(VERSION_ID_LEN);
    id
}

#[async_trait]
impl StorageProvider for LocalProvider {
    fn name(&self) -> String {
        format!("local:{}", self.root.display())
    }

    async fn list_states(&self) -> ProviderResult<Vec<String>> {
        let pattern = format!("{}/**/*.tfstate", self.root.display());
        let entries = glob::glob(&pattern)
            .map_err(|e| ProviderError::Io(format!("Invalid discovery pattern: {}", e)))?;

        let history_prefix = format!("{}/", self.history_dir);
        let mut paths: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|p| p.is_file())
            .filter_map(|p| self.relative(&p))
            .filter(|rel| !rel.starts_with(&history_prefix))
            .collect();
        paths.sort();
        paths.dedup();
        Ok(paths)
    }

    async fn list_versions(&self, path: &str) -> ProviderResult<Vec<VersionInfo>> {
        let mut versions: Vec<VersionInfo> = Vec::new();
        for file in self.revision_files(path)? {
            let (info, _) = Self::read_revision(&file)?;
            match versions.iter_mut().find(|v| v.id == info.id) {
                Some(existing) if existing.last_modified > info.last_modified => {
                    existing.last_modified = info.last_modified;
                }
                Some(_) => {}
                None => versions.push(info),
            }
        }
        versions.sort_by(|a, b| a.last_modified.cmp(&b.last_modified).then(a.id.cmp(&b.id)));
        Ok(versions)
    }

    async fn get_state(&self, path: &str, version_id: &str) -> ProviderResult<StateDocument> {
        for file in self.revision_files(path)? {
            let (info, bytes) = Self::read_revision(&file)?;
            if info.id == version_id {
                return tfstate::parse_state(&bytes)
                    .map_err(|e| ProviderError::invalid_state(path, format!("{:#}", e)));
            }
        }
        Err(ProviderError::not_found(path, version_id))
    }

    async fn get_locks(&self) -> ProviderResult<BTreeMap<String, LockInfo>> {
        let mut locks = BTreeMap::new();
        for path in self.list_states().await? {
            let state_file = self.root.join(&path);
            let file_name = match state_file.file_name() {
                Some(n) => n.to_string_lossy().to_string(),
                None => continue,
            };
            let lock_file = state_file.with_file_name(format!(".{}.lock.info", file_name));
            if !lock_file.is_file() {
                continue;
            }
            let content = std::fs::read_to_string(&lock_file).map_err(|e| {
                ProviderError::Io(format!("Failed to read {}: {}", lock_file.display(), e))
            })?;
            match serde_json::from_str::<LockInfo>(&content) {
                Ok(lock) => {
                    locks.insert(path, lock);
                }
                Err(e) => {
                    tracing::warn!(
                        lock_file = %lock_file.display(),
                        error = %e,
                        "Ignoring unreadable lock file"
                    );
                }
            }
        }
        Ok(locks)
    }
}
