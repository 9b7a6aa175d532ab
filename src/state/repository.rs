use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;

use super::models::{
    LineageStat, Listing, Page, ResourceTypeCount, SearchResult, State, StateStat, Version,
    VersionCount,
};
use super::query::{QueryFilters, VersionOrder};

/// Persistence for normalized snapshots and the queries run against them.
///
/// Reads never mutate. "Current" state of a path = highest serial, ties
/// broken by latest revision, then latest ingestion.
#[async_trait]
pub trait StateRepository: Send + Sync {
    // ─── Initialization ─────────────────────────────────────────────────────

    /// Create tables and run migrations.
    async fn initialize(&self) -> Result<()>;

    // ─── Writes ─────────────────────────────────────────────────────────────

    /// Record a storage revision if `(version_id, last_modified)` is new.
    async fn insert_version(&self, version: &Version) -> Result<()>;

    /// Persist a normalized state with its whole tree. Resolves the lineage
    /// (created on first sighting) and the version (first match by
    /// version id, created if unknown). Always inserts a new row.
    /// Returns the new state id.
    async fn insert_state(&self, path: &str, version_id: &str, state: &State) -> Result<String>;

    // ─── State reads ────────────────────────────────────────────────────────

    /// Full tree for `(path, version_id)`, or `State::default()` when absent.
    async fn get_state(&self, path: &str, version_id: &str) -> Result<State>;

    /// One row per stored state of `path`, oldest revision first.
    async fn get_state_activity(&self, path: &str) -> Result<Vec<StateStat>>;

    /// Version id of the current state of `path`.
    async fn default_version(&self, path: &str) -> Result<Option<String>>;

    /// Version ids already ingested for `path`.
    async fn known_versions(&self, path: &str) -> Result<HashSet<String>>;

    /// Current state of every path, newest first, one page at a time.
    async fn list_state_stats(&self, filters: &QueryFilters) -> Result<Page<StateStat>>;

    // ─── Search ─────────────────────────────────────────────────────────────

    /// Attribute search across states/modules/resources/attributes.
    async fn search_attribute(&self, filters: &QueryFilters) -> Result<Page<SearchResult>>;

    // ─── Listings ───────────────────────────────────────────────────────────

    /// Distinct sorted values for one of the listing kinds.
    async fn list_distinct(&self, listing: &Listing) -> Result<Vec<String>>;

    /// Tool-version counts over the current state of every path.
    async fn list_tf_versions_with_count(&self, order: VersionOrder) -> Result<Vec<VersionCount>>;

    /// Resource-type counts over the current state of every path.
    async fn list_resource_types_with_count(&self) -> Result<Vec<ResourceTypeCount>>;

    /// Every lineage with the number of paths and states it spans.
    async fn list_lineages(&self) -> Result<Vec<LineageStat>>;
}
