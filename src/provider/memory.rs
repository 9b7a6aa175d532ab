use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use super::{LockInfo, ProviderError, ProviderResult, StorageProvider, VersionInfo};
use crate::tfstate::StateDocument;

#[derive(Default)]
struct Inner {
    states: BTreeMap<String, Vec<(VersionInfo, StateDocument)>>,
    locks: BTreeMap<String, LockInfo>,
    broken: HashSet<(String, String)>,
}

/// In-process provider holding parsed snapshots. Used to embed the engine
/// without a vendor backend, and in tests.
#[derive(Default)]
pub struct MemoryProvider {
    inner: Mutex<Inner>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a revision of `path`.
    pub fn put(
        &self,
        path: &str,
        version_id: &str,
        last_modified: DateTime<Utc>,
        document: StateDocument,
    ) -> ProviderResult<()> {
        let mut inner = self.lock()?;
        let versions = inner.states.entry(path.to_string()).or_default();
        versions.retain(|(v, _)| v.id != version_id);
        versions.push((
            VersionInfo {
                id: version_id.to_string(),
                last_modified,
            },
            document,
        ));
        versions.sort_by(|a, b| a.0.last_modified.cmp(&b.0.last_modified));
        Ok(())
    }

    /// Make every fetch of this revision fail with a transport error.
    pub fn break_version(&self, path: &str, version_id: &str) -> ProviderResult<()> {
        self.lock()?
            .broken
            .insert((path.to_string(), version_id.to_string()));
        Ok(())
    }

    pub fn set_lock(&self, path: &str, lock: LockInfo) -> ProviderResult<()> {
        self.lock()?.locks.insert(path.to_string(), lock);
        Ok(())
    }

    fn lock(&self) -> ProviderResult<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| ProviderError::Io("memory provider mutex poisoned".to_string()))
    }
}

#[async_trait]
impl StorageProvider for MemoryProvider {
    fn name(&self) -> String {
        "memory".to_string()
    }

    async fn list_states(&self) -> ProviderResult<Vec<String>> {
        Ok(self.lock()?.states.keys().cloned().collect())
    }

    async fn list_versions(&self, path: &str) -> ProviderResult<Vec<VersionInfo>> {
        Ok(self
            .lock()?
            .states
            .get(path)
            .map(|vs| vs.iter().map(|(v, _)| v.clone()).collect())
            .unwrap_or_default())
    }

    async fn get_state(&self, path: &str, version_id: &str) -> ProviderResult<StateDocument> {
        let inner = self.lock()?;
        if inner
            .broken
            .contains(&(path.to_string(), version_id.to_string()))
        {
            return Err(ProviderError::Transport(format!(
                "fetch of {}@{} failed",
                path, version_id
            )));
        }
        inner
            .states
            .get(path)
            .and_then(|vs| vs.iter().find(|(v, _)| v.id == version_id))
            .map(|(_, doc)| doc.clone())
            .ok_or_else(|| ProviderError::not_found(path, version_id))
    }

    async fn get_locks(&self) -> ProviderResult<BTreeMap<String, LockInfo>> {
        Ok(self.lock()?.locks.clone())
    }
}
