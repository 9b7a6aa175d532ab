use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use tfboard::ingest::{collect_locks, Ingestor};
use tfboard::provider::local::content_version_id;
use tfboard::provider::{
    LocalProvider, LockInfo, MemoryProvider, ProviderError, ProviderResult, StorageProvider,
    VersionInfo,
};
use tfboard::state::{SqliteRepository, StateRepository};
use tfboard::tfstate::{parse_state, StateDocument};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn document(name: &str) -> StateDocument {
    parse_state(&std::fs::read(fixture(name)).unwrap()).unwrap()
}

async fn create_repo() -> Arc<SqliteRepository> {
    let repo = SqliteRepository::open_memory().unwrap();
    repo.initialize().await.unwrap();
    Arc::new(repo)
}

fn memory_provider() -> Arc<MemoryProvider> {
    let provider = MemoryProvider::new();
    let t = |m| Utc.with_ymd_and_hms(2026, 2, 1, 9, m, 0).unwrap();
    provider
        .put("envs/prod.tfstate", "v1", t(0), document("prod_v1.tfstate"))
        .unwrap();
    provider
        .put("envs/prod.tfstate", "v2", t(5), document("prod_v2.tfstate"))
        .unwrap();
    provider
        .put("legacy.tfstate", "l1", t(1), document("legacy_v3.tfstate"))
        .unwrap();
    Arc::new(provider)
}

struct UnreachableProvider;

#[async_trait]
impl StorageProvider for UnreachableProvider {
    fn name(&self) -> String {
        "unreachable".to_string()
    }

    async fn list_states(&self) -> ProviderResult<Vec<String>> {
        Err(ProviderError::Transport("connection refused".to_string()))
    }

    async fn list_versions(&self, _path: &str) -> ProviderResult<Vec<VersionInfo>> {
        Ok(vec![])
    }

    async fn get_state(&self, path: &str, version_id: &str) -> ProviderResult<StateDocument> {
        Err(ProviderError::not_found(path, version_id))
    }

    async fn get_locks(&self) -> ProviderResult<BTreeMap<String, LockInfo>> {
        Err(ProviderError::Transport("connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_ingest_all_revisions() {
    let repo = create_repo().await;
    let ingestor = Ingestor::new(vec![memory_provider()], repo.clone(), 4);

    let summary = ingestor.run().await.unwrap();
    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.ingested.len(), 3);
    assert_eq!(summary.skipped, 0);
    assert!(summary.failures.is_empty());
    assert_eq!(summary.ingested[0].path, "envs/prod.tfstate");
    assert_eq!(summary.ingested[0].version_id, "v1");
    assert_eq!(summary.ingested[2].path, "legacy.tfstate");
    assert_eq!(
        summary.to_string(),
        "Ingest complete! Discovered 3, ingested 3, skipped 0, failed 0."
    );

    assert_eq!(
        repo.default_version("envs/prod.tfstate").await.unwrap(),
        Some("v2".to_string())
    );
    let v1 = repo.get_state("envs/prod.tfstate", "v1").await.unwrap();
    assert_eq!(v1.resource_count(), 4);
    assert_eq!(
        v1.version.last_modified,
        Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap()
    );
    let legacy = repo.get_state("legacy.tfstate", "l1").await.unwrap();
    assert_eq!(legacy.lineage, "L3");
}

#[tokio::test]
async fn test_second_run_skips_known_versions() {
    let repo = create_repo().await;
    let provider = memory_provider();
    Ingestor::new(vec![provider.clone()], repo.clone(), 2)
        .run()
        .await
        .unwrap();

    let summary = Ingestor::new(vec![provider.clone()], repo.clone(), 2)
        .run()
        .await
        .unwrap();
    assert_eq!(summary.discovered, 0);
    assert_eq!(summary.skipped, 3);
    assert!(summary.ingested.is_empty());
    assert_eq!(repo.get_state_activity("envs/prod.tfstate").await.unwrap().len(), 2);

    // a new revision is picked up on the next run
    provider
        .put(
            "envs/prod.tfstate",
            "v3",
            Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap(),
            document("prod_v2.tfstate"),
        )
        .unwrap();
    let summary = Ingestor::new(vec![provider], repo.clone(), 2)
        .run()
        .await
        .unwrap();
    assert_eq!(summary.ingested.len(), 1);
    assert_eq!(summary.ingested[0].version_id, "v3");
}

#[tokio::test]
async fn test_failed_fetch_keeps_provider_error() {
    let repo = create_repo().await;
    let provider = memory_provider();
    provider.break_version("envs/prod.tfstate", "v2").unwrap();

    let summary = Ingestor::new(vec![provider], repo.clone(), 3)
        .run()
        .await
        .unwrap();
    assert_eq!(summary.ingested.len(), 2);
    assert_eq!(summary.failures.len(), 1);

    let failure = &summary.failures[0];
    assert_eq!(failure.provider, "memory");
    assert_eq!(failure.path, "envs/prod.tfstate");
    assert_eq!(failure.version_id, "v2");
    assert!(matches!(
        failure.error.downcast_ref::<ProviderError>(),
        Some(ProviderError::Transport(_))
    ));

    // the failed revision was not recorded, so a retry can pick it up
    assert_eq!(
        repo.default_version("envs/prod.tfstate").await.unwrap(),
        Some("v1".to_string())
    );
}

#[tokio::test]
async fn test_same_revision_in_two_providers_is_ingested_once() {
    let repo = create_repo().await;
    let summary = Ingestor::new(vec![memory_provider(), memory_provider()], repo.clone(), 4)
        .run()
        .await
        .unwrap();
    assert_eq!(summary.ingested.len(), 3);
    assert_eq!(summary.skipped, 3);
    assert_eq!(repo.get_state_activity("envs/prod.tfstate").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_listing_failure_propagates() {
    let repo = create_repo().await;
    let providers: Vec<Arc<dyn StorageProvider>> =
        vec![memory_provider(), Arc::new(UnreachableProvider)];
    let err = Ingestor::new(providers, repo, 1).run().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ProviderError>(),
        Some(ProviderError::Transport(_))
    ));
}

#[tokio::test]
async fn test_empty_work_list() {
    let repo = create_repo().await;
    let summary = Ingestor::new(vec![], repo, 0).ingest(vec![]).await.unwrap();
    assert_eq!(summary.discovered, 0);
    assert!(summary.ingested.is_empty());
}

#[tokio::test]
async fn test_memory_provider_locks() {
    let provider = memory_provider();
    provider
        .set_lock(
            "envs/prod.tfstate",
            LockInfo {
                id: "lock-1".to_string(),
                who: "alice@laptop".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

    let providers: Vec<Arc<dyn StorageProvider>> = vec![provider];
    let locks = collect_locks(&providers).await.unwrap();
    assert_eq!(locks.len(), 1);
    assert_eq!(locks["envs/prod.tfstate"].who, "alice@laptop");

    let failing: Vec<Arc<dyn StorageProvider>> = vec![Arc::new(UnreachableProvider)];
    assert!(collect_locks(&failing).await.is_err());
}

// ─── Local directory provider ───────────────────────────────────────────────

/// Lay out a state directory with one live file, one archived revision and a lock.
fn local_tree() -> (TempDir, Vec<u8>, Vec<u8>) {
    let dir = TempDir::new().unwrap();
    let v1 = std::fs::read(fixture("prod_v1.tfstate")).unwrap();
    let v2 = std::fs::read(fixture("prod_v2.tfstate")).unwrap();

    let envs = dir.path().join("envs");
    std::fs::create_dir_all(&envs).unwrap();
    std::fs::write(envs.join("prod.tfstate"), &v2).unwrap();
    std::fs::copy(fixture("lock.info"), envs.join(".prod.tfstate.lock.info")).unwrap();

    let history = dir.path().join(".history").join("envs").join("prod.tfstate");
    std::fs::create_dir_all(&history).unwrap();
    std::fs::write(history.join("1.tfstate"), &v1).unwrap();
    // the live revision archived again is the same version
    std::fs::write(history.join("2.tfstate"), &v2).unwrap();

    std::fs::write(dir.path().join("notes.txt"), "not a state").unwrap();
    (dir, v1, v2)
}

#[tokio::test]
async fn test_local_provider_discovers_revisions() {
    let (dir, v1, v2) = local_tree();
    let provider = LocalProvider::new(dir.path());

    assert_eq!(
        provider.list_states().await.unwrap(),
        vec!["envs/prod.tfstate"]
    );

    let versions = provider.list_versions("envs/prod.tfstate").await.unwrap();
    let mut ids: Vec<String> = versions.into_iter().map(|v| v.id).collect();
    ids.sort();
    let mut expected = vec![content_version_id(&v1), content_version_id(&v2)];
    expected.sort();
    assert_eq!(ids, expected);

    let doc = provider
        .get_state("envs/prod.tfstate", &content_version_id(&v1))
        .await
        .unwrap();
    assert_eq!(doc.serial, 1);

    let err = provider
        .get_state("envs/prod.tfstate", "0000000000000000")
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::NotFound { .. }));
}

#[tokio::test]
async fn test_local_provider_ingest_and_locks() {
    let (dir, _v1, v2) = local_tree();
    let repo = create_repo().await;
    let providers: Vec<Arc<dyn StorageProvider>> = vec![Arc::new(LocalProvider::new(dir.path()))];

    let summary = Ingestor::new(providers.clone(), repo.clone(), 2)
        .run()
        .await
        .unwrap();
    assert_eq!(summary.ingested.len(), 2);
    assert!(summary.failures.is_empty());
    assert_eq!(
        repo.default_version("envs/prod.tfstate").await.unwrap(),
        Some(content_version_id(&v2))
    );

    let locks = collect_locks(&providers).await.unwrap();
    let lock = &locks["envs/prod.tfstate"];
    assert_eq!(lock.who, "ci@runner-7");
    assert_eq!(lock.operation, "OperationTypeApply");
}

#[tokio::test]
async fn test_local_provider_invalid_file_is_a_job_failure() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("broken.tfstate"), b"{ this is not json").unwrap();
    let repo = create_repo().await;
    let providers: Vec<Arc<dyn StorageProvider>> = vec![Arc::new(LocalProvider::new(dir.path()))];

    let summary = Ingestor::new(providers, repo, 1).run().await.unwrap();
    assert!(summary.ingested.is_empty());
    assert_eq!(summary.failures.len(), 1);
    assert!(matches!(
        summary.failures[0].error.downcast_ref::<ProviderError>(),
        Some(ProviderError::InvalidState { .. })
    ));
}
