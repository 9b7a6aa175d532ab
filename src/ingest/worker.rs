use anyhow::{anyhow, Result};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use super::normalizer::normalize;
use crate::provider::{LockInfo, StorageProvider, VersionInfo};
use crate::state::models::Version;
use crate::state::repository::StateRepository;

/// One `(provider, path, version)` to fetch, normalize and store.
#[derive(Clone)]
pub struct WorkItem {
    pub provider: Arc<dyn StorageProvider>,
    pub path: String,
    pub version: VersionInfo,
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("provider", &self.provider.name())
            .field("path", &self.path)
            .field("version", &self.version.id)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedState {
    pub path: String,
    pub version_id: String,
    pub state_id: String,
}

/// A job that did not make it into the repository. `error` keeps the
/// original cause (a `ProviderError` for upstream failures).
#[derive(Debug)]
pub struct IngestFailure {
    pub provider: String,
    pub path: String,
    pub version_id: String,
    pub error: anyhow::Error,
}

#[derive(Debug, Default)]
pub struct IngestSummary {
    pub discovered: usize,
    pub skipped: usize,
    pub ingested: Vec<IngestedState>,
    pub failures: Vec<IngestFailure>,
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ingest complete! Discovered {}, ingested {}, skipped {}, failed {}.",
            self.discovered,
            self.ingested.len(),
            self.skipped,
            self.failures.len()
        )
    }
}

/// Drives ingestion over an explicit set of providers into one repository.
pub struct Ingestor {
    providers: Vec<Arc<dyn StorageProvider>>,
    repository: Arc<dyn StateRepository>,
    parallelism: usize,
}

impl Ingestor {
    pub fn new(
        providers: Vec<Arc<dyn StorageProvider>>,
        repository: Arc<dyn StateRepository>,
        parallelism: usize,
    ) -> Self {
        Self {
            providers,
            repository,
            parallelism: parallelism.max(1),
        }
    }

    /// Enumerate every revision not yet stored. Provider listing failures
    /// are returned as-is.
    pub async fn discover(&self) -> Result<(Vec<WorkItem>, usize)> {
        let mut items = Vec::new();
        let mut skipped = 0;
        let mut queued: HashSet<(String, String)> = HashSet::new();

        for provider in &self.providers {
            let paths = provider.list_states().await?;
            tracing::info!(
                provider = %provider.name(),
                states = paths.len(),
                "Listed states"
            );

            for path in paths {
                let known = self.repository.known_versions(&path).await?;
                for version in provider.list_versions(&path).await? {
                    if known.contains(&version.id)
                        || !queued.insert((path.clone(), version.id.clone()))
                    {
                        skipped += 1;
                        continue;
                    }
                    items.push(WorkItem {
                        provider: Arc::clone(provider),
                        path: path.clone(),
                        version,
                    });
                }
            }
        }

        Ok((items, skipped))
    }

    /// Discover and ingest everything new.
    pub async fn run(&self) -> Result<IngestSummary> {
        let (items, skipped) = self.discover().await?;
        let mut summary = self.ingest(items).await?;
        summary.skipped += skipped;
        Ok(summary)
    }

    /// Ingest the given work items with `parallelism` workers sharing one queue.
    pub async fn ingest(&self, items: Vec<WorkItem>) -> Result<IngestSummary> {
        let mut summary = IngestSummary {
            discovered: items.len(),
            ..Default::default()
        };
        if items.is_empty() {
            return Ok(summary);
        }

        let (tx, rx) = mpsc::unbounded_channel::<WorkItem>();
        for item in items {
            tx.send(item).map_err(|_| anyhow!("ingest queue closed"))?;
        }
        drop(tx);
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..self.parallelism).map(|worker| {
            let rx = Arc::clone(&rx);
            let repository = Arc::clone(&self.repository);
            tokio::spawn(async move {
                let mut outcomes = Vec::new();
                loop {
                    let next = rx.lock().await.recv().await;
                    let item = match next {
                        Some(item) => item,
                        None => break,
                    };
                    outcomes.push(run_job(worker, item, repository.as_ref()).await);
                }
                outcomes
            })
        });

        for handle in futures::future::join_all(workers).await {
            let outcomes = handle.map_err(|e| anyhow!("ingest worker panicked: {}", e))?;
            for outcome in outcomes {
                match outcome {
                    Ok(done) => summary.ingested.push(done),
                    Err(failure) => summary.failures.push(failure),
                }
            }
        }

        summary.ingested.sort_by(|a, b| {
            a.path
                .cmp(&b.path)
                .then_with(|| a.version_id.cmp(&b.version_id))
        });
        Ok(summary)
    }
}

/// fetch → parse → normalize → write for one revision.
async fn run_job(
    worker: usize,
    item: WorkItem,
    repository: &dyn StateRepository,
) -> std::result::Result<IngestedState, IngestFailure> {
    let fail = |error: anyhow::Error| IngestFailure {
        provider: item.provider.name(),
        path: item.path.clone(),
        version_id: item.version.id.clone(),
        error,
    };

    tracing::info!(
        worker = worker,
        path = %item.path,
        version = %item.version.id,
        "Ingesting state"
    );

    let document = match item.provider.get_state(&item.path, &item.version.id).await {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(path = %item.path, version = %item.version.id, error = %e, "Fetch failed");
            return Err(fail(e.into()));
        }
    };

    let version = Version::new(&item.version.id, item.version.last_modified);
    if let Err(e) = repository.insert_version(&version).await {
        return Err(fail(e));
    }

    let state = normalize(Some(&document), &item.path, &item.version.id);
    match repository
        .insert_state(&item.path, &item.version.id, &state)
        .await
    {
        Ok(state_id) => Ok(IngestedState {
            path: item.path.clone(),
            version_id: item.version.id.clone(),
            state_id,
        }),
        Err(e) => {
            tracing::error!(path = %item.path, version = %item.version.id, error = %e, "Store failed");
            Err(fail(e))
        }
    }
}

/// Locks currently held across every provider, keyed by state path.
pub async fn collect_locks(
    providers: &[Arc<dyn StorageProvider>],
) -> Result<BTreeMap<String, LockInfo>> {
    let mut locks = BTreeMap::new();
    for provider in providers {
        locks.extend(provider.get_locks().await?);
    }
    Ok(locks)
}
