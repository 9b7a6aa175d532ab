use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, InterruptHandle, OptionalExtension, Row, ToSql, Transaction};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use super::migration;
use super::models::*;
use super::query::{sort_versions_desc, QueryFilters, VersionOrder, VersionSelector, PAGE_SIZE};
use super::repository::StateRepository;
use super::schema::CURRENT_STATES_CTE;

/// SQLite-backed snapshot repository.
///
/// Every call runs on tokio's blocking pool. A caller that stops waiting
/// (e.g. a query deadline expiring) interrupts the statement in flight.
pub struct SqliteRepository {
    conn: Arc<Mutex<Connection>>,
    interrupt: Arc<InterruptHandle>,
}

impl SqliteRepository {
    /// Open or create the SQLite database.
    pub fn open(db_path: &str) -> Result<Self> {
        let parent = Path::new(db_path).parent();
        if let Some(dir) = parent {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open state database at {}", db_path))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        let interrupt = Arc::new(conn.get_interrupt_handle());
        Self {
            conn: Arc::new(Mutex::new(conn)),
            interrupt,
        }
    }

    /// Run `op` against the connection on the blocking pool.
    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let call = Arc::new(CallState::default());
        let _abandon = AbandonOnDrop {
            call: call.clone(),
            interrupt: self.interrupt.clone(),
        };
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| anyhow!("state database mutex poisoned"))?;
            let _running = Running::enter(&call)?;
            op(&mut conn)
        })
        .await
        .context("State database task failed")?
    }
}

// ─── Call cancellation ──────────────────────────────────────────────────────

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;
const ABANDONED: u8 = 3;
const INTERRUPTING: u8 = 4;
const INTERRUPTED: u8 = 5;

/// Lifecycle of one repository call, shared by the waiting future and the
/// blocking task. The interrupt is only ever issued while this call holds
/// the connection, so it cannot hit the next caller's statements.
#[derive(Default)]
struct CallState(AtomicU8);

impl CallState {
    fn transition(&self, from: u8, to: u8) -> bool {
        self.0
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn get(&self) -> u8 {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, to: u8) {
        self.0.store(to, Ordering::Release);
    }
}

/// Held by the blocking task while it owns the connection.
struct Running<'a>(&'a CallState);

impl<'a> Running<'a> {
    fn enter(call: &'a CallState) -> Result<Self> {
        if !call.transition(PENDING, RUNNING) {
            bail!("State database call abandoned before it started");
        }
        Ok(Self(call))
    }
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        if self.0.transition(RUNNING, DONE) {
            return;
        }
        // an interrupt is being issued; keep the connection until it lands
        while self.0.get() != INTERRUPTED {
            std::thread::yield_now();
        }
    }
}

/// Held by the waiting future. Dropped early, it cancels a queued call or
/// interrupts a running one.
struct AbandonOnDrop {
    call: Arc<CallState>,
    interrupt: Arc<InterruptHandle>,
}

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        if self.call.transition(PENDING, ABANDONED) {
            tracing::debug!("Abandoned queued state database call");
        } else if self.call.transition(RUNNING, INTERRUPTING) {
            tracing::debug!("Interrupting state database call");
            self.interrupt.interrupt();
            self.call.set(INTERRUPTED);
        }
    }
}

fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn now() -> String {
    timestamp(&Utc::now())
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn get_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Columns read by `stat_from_row`; expects `states`, `versions`, `lineages` in scope.
const STAT_COLUMNS: &str = "states.path, COALESCE(lineages.value, ''), versions.version_id,
    versions.last_modified, states.serial, states.tf_version,
    (SELECT COUNT(*) FROM resources JOIN modules ON modules.id = resources.module_id
     WHERE modules.state_id = states.id)";

fn stat_from_row(row: &Row<'_>) -> rusqlite::Result<StateStat> {
    Ok(StateStat {
        path: row.get(0)?,
        lineage_value: row.get(1)?,
        version_id: row.get(2)?,
        last_modified: get_timestamp(row, 3)?,
        serial: row.get(4)?,
        tf_version: row.get(5)?,
        resource_count: row.get(6)?,
    })
}

/// Integer instance keys sort numerically (`2` before `10`); empty and string
/// keys sort first, as text.
const INDEX_KEY_ORDER: &str = "CASE WHEN resources.index_key <> ''
         AND resources.index_key NOT GLOB '*[^0-9]*'
         THEN CAST(resources.index_key AS INTEGER) END,
    resources.index_key";

fn param_refs(values: &[String]) -> Vec<&dyn ToSql> {
    values.iter().map(|v| v as &dyn ToSql).collect()
}

// ─── Write helpers ──────────────────────────────────────────────────────────

/// Create-if-absent by value. Safe against a concurrent first sighting: the
/// losing insert is a no-op and the row is re-read.
fn resolve_lineage(tx: &Transaction<'_>, value: &str) -> Result<Option<String>> {
    if value.is_empty() {
        return Ok(None);
    }
    tx.execute(
        "INSERT INTO lineages (id, value, created_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(value) DO NOTHING",
        params![new_id(), value, now()],
    )?;
    let id: String = tx
        .query_row(
            "SELECT id FROM lineages WHERE value = ?1",
            params![value],
            |row| row.get(0),
        )
        .with_context(|| format!("Failed to resolve lineage {}", value))?;
    Ok(Some(id))
}

/// First version row with this id, created (stamped now) if unknown.
fn resolve_version(tx: &Transaction<'_>, version_id: &str) -> Result<String> {
    let existing: Option<String> = tx
        .query_row(
            "SELECT id FROM versions WHERE version_id = ?1 ORDER BY last_modified DESC LIMIT 1",
            params![version_id],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let id = new_id();
    tx.execute(
        "INSERT INTO versions (id, version_id, last_modified) VALUES (?1, ?2, ?3)
         ON CONFLICT(version_id, last_modified) DO NOTHING",
        params![id, version_id, now()],
    )?;
    let id = tx.query_row(
        "SELECT id FROM versions WHERE version_id = ?1 ORDER BY last_modified DESC LIMIT 1",
        params![version_id],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn insert_tree(tx: &Transaction<'_>, state_id: &str, modules: &[Module]) -> Result<()> {
    let mut module_stmt = tx.prepare_cached(
        "INSERT INTO modules (id, state_id, path, position) VALUES (?1, ?2, ?3, ?4)",
    )?;
    let mut resource_stmt = tx.prepare_cached(
        "INSERT INTO resources (id, module_id, type, name, mode, index_key, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    let mut attribute_stmt = tx.prepare_cached(
        "INSERT INTO attributes (id, resource_id, key, value, position) VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    let mut output_stmt = tx.prepare_cached(
        "INSERT INTO output_values (id, module_id, name, value, sensitive, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;

    for (m_pos, module) in modules.iter().enumerate() {
        let module_id = new_id();
        module_stmt.execute(params![module_id, state_id, module.path, m_pos as i64])?;

        for (r_pos, resource) in module.resources.iter().enumerate() {
            let resource_id = new_id();
            resource_stmt.execute(params![
                resource_id,
                module_id,
                resource.resource_type,
                resource.name,
                resource.mode,
                resource.index,
                r_pos as i64,
            ])?;
            for (a_pos, attr) in resource.attributes.iter().enumerate() {
                attribute_stmt.execute(params![
                    new_id(),
                    resource_id,
                    attr.key,
                    attr.value,
                    a_pos as i64
                ])?;
            }
        }

        for (o_pos, output) in module.outputs.iter().enumerate() {
            output_stmt.execute(params![
                new_id(),
                module_id,
                output.name,
                output.value,
                output.sensitive as i32,
                o_pos as i64,
            ])?;
        }
    }
    Ok(())
}

// ─── Read helpers ───────────────────────────────────────────────────────────

fn load_modules(conn: &Connection, state_id: &str) -> Result<Vec<Module>> {
    let mut module_stmt =
        conn.prepare_cached("SELECT id, path FROM modules WHERE state_id = ?1 ORDER BY position")?;
    let mut resource_stmt = conn.prepare_cached(
        "SELECT id, type, name, mode, index_key FROM resources
         WHERE module_id = ?1 ORDER BY position",
    )?;
    let mut attribute_stmt = conn.prepare_cached(
        "SELECT key, value FROM attributes WHERE resource_id = ?1 ORDER BY position",
    )?;
    let mut output_stmt = conn.prepare_cached(
        "SELECT name, value, sensitive FROM output_values WHERE module_id = ?1 ORDER BY position",
    )?;

    let module_rows = module_stmt
        .query_map(params![state_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut modules = Vec::with_capacity(module_rows.len());
    for (module_id, path) in module_rows {
        let resource_rows = resource_stmt
            .query_map(params![module_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    Resource {
                        resource_type: row.get(1)?,
                        name: row.get(2)?,
                        mode: row.get(3)?,
                        index: row.get(4)?,
                        attributes: vec![],
                    },
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut resources = Vec::with_capacity(resource_rows.len());
        for (resource_id, mut resource) in resource_rows {
            resource.attributes = attribute_stmt
                .query_map(params![resource_id], |row| {
                    Ok(Attribute {
                        key: row.get(0)?,
                        value: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            resources.push(resource);
        }

        let outputs = output_stmt
            .query_map(params![module_id], |row| {
                Ok(OutputValue {
                    name: row.get(0)?,
                    value: row.get(1)?,
                    sensitive: row.get::<_, i32>(2)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        modules.push(Module {
            path,
            resources,
            outputs,
        });
    }
    Ok(modules)
}

#[async_trait]
impl StateRepository for SqliteRepository {
    // ─── Initialization ─────────────────────────────────────────────────────

    async fn initialize(&self) -> Result<()> {
        self.run(|conn| migration::check_and_migrate(conn)).await
    }

    // ─── Writes ─────────────────────────────────────────────────────────────

    async fn insert_version(&self, version: &Version) -> Result<()> {
        let version = version.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO versions (id, version_id, last_modified) VALUES (?1, ?2, ?3)
                 ON CONFLICT(version_id, last_modified) DO NOTHING",
                params![
                    new_id(),
                    version.version_id,
                    timestamp(&version.last_modified)
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn insert_state(&self, path: &str, version_id: &str, state: &State) -> Result<String> {
        let path = path.to_string();
        let version_id = version_id.to_string();
        let state = state.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;

            let lineage_id = resolve_lineage(&tx, &state.lineage)?;
            let version_row = resolve_version(&tx, &version_id)?;
            let state_id = new_id();

            tx.execute(
                "INSERT INTO states (id, path, lineage_id, version_id, tf_version, serial, ingested_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    state_id,
                    path,
                    lineage_id,
                    version_row,
                    state.tf_version,
                    state.serial,
                    now()
                ],
            )?;
            insert_tree(&tx, &state_id, &state.modules)?;
            tx.commit()
                .with_context(|| format!("Failed to commit state {}@{}", path, version_id))?;

            tracing::debug!(
                path = %path,
                version = %version_id,
                serial = state.serial,
                resources = state.resource_count(),
                "Stored state"
            );
            Ok(state_id)
        })
        .await
    }

    // ─── State reads ────────────────────────────────────────────────────────

    async fn get_state(&self, path: &str, version_id: &str) -> Result<State> {
        let path = path.to_string();
        let version_id = version_id.to_string();
        self.run(move |conn| {
            let header = conn
                .query_row(
                    "SELECT states.id, states.path, COALESCE(lineages.value, ''), versions.version_id,
                            versions.last_modified, states.tf_version, states.serial
                     FROM states
                     JOIN versions ON versions.id = states.version_id
                     LEFT JOIN lineages ON lineages.id = states.lineage_id
                     WHERE states.path = ?1 AND versions.version_id = ?2
                     ORDER BY states.serial DESC, states.ingested_at DESC, states.rowid DESC
                     LIMIT 1",
                    params![path, version_id],
                    |row| {
                        Ok(State {
                            id: row.get(0)?,
                            path: row.get(1)?,
                            lineage: row.get(2)?,
                            version: Version {
                                version_id: row.get(3)?,
                                last_modified: get_timestamp(row, 4)?,
                            },
                            tf_version: row.get(5)?,
                            serial: row.get(6)?,
                            modules: vec![],
                        })
                    },
                )
                .optional()?;

            let mut state = match header {
                Some(s) => s,
                None => {
                    tracing::debug!(path = %path, version = %version_id, "State not found");
                    return Ok(State::default());
                }
            };
            state.modules = load_modules(conn, &state.id)?;
            Ok(state)
        })
        .await
    }

    async fn get_state_activity(&self, path: &str) -> Result<Vec<StateStat>> {
        let path = path.to_string();
        self.run(move |conn| {
            let sql = format!(
                "SELECT {STAT_COLUMNS}
                 FROM states
                 JOIN versions ON versions.id = states.version_id
                 LEFT JOIN lineages ON lineages.id = states.lineage_id
                 WHERE states.path = ?1
                 ORDER BY versions.last_modified ASC, states.serial ASC, states.ingested_at ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![path], stat_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn default_version(&self, path: &str) -> Result<Option<String>> {
        let path = path.to_string();
        self.run(move |conn| {
            let sql = format!(
                "{CURRENT_STATES_CTE}
                 SELECT versions.version_id FROM current_states
                 JOIN versions ON versions.id = current_states.version_id
                 WHERE current_states.path = ?1"
            );
            let version = conn
                .query_row(&sql, params![path], |row| row.get(0))
                .optional()?;
            Ok(version)
        })
        .await
    }

    async fn known_versions(&self, path: &str) -> Result<HashSet<String>> {
        let path = path.to_string();
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT versions.version_id FROM states
                 JOIN versions ON versions.id = states.version_id
                 WHERE states.path = ?1",
            )?;
            let rows = stmt
                .query_map(params![path], |row| row.get(0))?
                .collect::<Result<HashSet<String>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn list_state_stats(&self, filters: &QueryFilters) -> Result<Page<StateStat>> {
        let filters = filters.clone();
        self.run(move |conn| {
            let mut where_sql = String::new();
            let mut param_values: Vec<String> = Vec::new();
            if let Some(ref lineage) = filters.lineage {
                where_sql.push_str(" WHERE instr(COALESCE(lineages.value, ''), ?1) > 0");
                param_values.push(lineage.clone());
            }
            let from_sql = format!(
                " FROM current_states AS states
                  JOIN versions ON versions.id = states.version_id
                  LEFT JOIN lineages ON lineages.id = states.lineage_id{where_sql}"
            );

            let total: i64 = conn.query_row(
                &format!("{CURRENT_STATES_CTE} SELECT COUNT(*){from_sql}"),
                param_refs(&param_values).as_slice(),
                |row| row.get(0),
            )?;

            let sql = format!(
                "{CURRENT_STATES_CTE} SELECT {STAT_COLUMNS}{from_sql}
                 ORDER BY versions.last_modified DESC, states.path ASC
                 LIMIT {PAGE_SIZE} OFFSET {}",
                filters.offset()
            );
            let mut stmt = conn.prepare(&sql)?;
            let items = stmt
                .query_map(param_refs(&param_values).as_slice(), stat_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Page {
                items,
                page: filters.page.max(1),
                total: total as usize,
            })
        })
        .await
    }

    // ─── Search ─────────────────────────────────────────────────────────────

    async fn search_attribute(&self, filters: &QueryFilters) -> Result<Page<SearchResult>> {
        let filters = filters.clone();
        self.run(move |conn| {
            let (prefix, source) = match filters.version {
                VersionSelector::Current => (CURRENT_STATES_CTE, "current_states AS states"),
                VersionSelector::All | VersionSelector::Exact(_) => ("", "states"),
            };

            let mut conditions: Vec<String> = Vec::new();
            let mut param_values: Vec<String> = Vec::new();
            let mut push = |column: &str, exact: bool, value: &str| {
                param_values.push(value.to_string());
                let idx = param_values.len();
                if exact {
                    conditions.push(format!("{} = ?{}", column, idx));
                } else {
                    conditions.push(format!("instr({}, ?{}) > 0", column, idx));
                }
            };

            if let VersionSelector::Exact(ref id) = filters.version {
                push("versions.version_id", true, id);
            }
            if let Some(ref v) = filters.resource_type {
                push("resources.type", false, v);
            }
            if let Some(ref v) = filters.resource_name {
                push("resources.name", false, v);
            }
            if let Some(ref v) = filters.attribute_key {
                push("attributes.key", false, v);
            }
            if let Some(ref v) = filters.attribute_value {
                push("attributes.value", false, v);
            }
            if let Some(ref v) = filters.tf_version {
                push("states.tf_version", false, v);
            }
            if let Some(ref v) = filters.lineage {
                push("COALESCE(lineages.value, '')", false, v);
            }

            let where_sql = if conditions.is_empty() {
                String::new()
            } else {
                format!(" WHERE {}", conditions.join(" AND "))
            };
            let from_sql = format!(
                " FROM {source}
                  JOIN versions ON versions.id = states.version_id
                  LEFT JOIN lineages ON lineages.id = states.lineage_id
                  JOIN modules ON modules.state_id = states.id
                  JOIN resources ON resources.module_id = modules.id
                  JOIN attributes ON attributes.resource_id = resources.id{where_sql}"
            );

            let total: i64 = conn.query_row(
                &format!("{prefix} SELECT COUNT(*){from_sql}"),
                param_refs(&param_values).as_slice(),
                |row| row.get(0),
            )?;

            let sql = format!(
                "{prefix} SELECT states.path, versions.version_id, states.tf_version, states.serial,
                        modules.path, resources.type, resources.name, resources.index_key,
                        attributes.key, attributes.value
                 {from_sql}
                 ORDER BY states.path, states.serial, modules.path, resources.type, resources.name,
                          {INDEX_KEY_ORDER}, attributes.key,
                          versions.last_modified, states.ingested_at, attributes.position
                 LIMIT {PAGE_SIZE} OFFSET {}",
                filters.offset()
            );
            tracing::debug!(sql = %sql, params = ?param_values, "Attribute search");

            let mut stmt = conn.prepare(&sql)?;
            let items = stmt
                .query_map(param_refs(&param_values).as_slice(), |row| {
                    Ok(SearchResult {
                        path: row.get(0)?,
                        version_id: row.get(1)?,
                        tf_version: row.get(2)?,
                        serial: row.get(3)?,
                        module_path: row.get(4)?,
                        resource_type: row.get(5)?,
                        resource_name: row.get(6)?,
                        resource_index: row.get(7)?,
                        attribute_key: row.get(8)?,
                        attribute_value: row.get(9)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Page {
                items,
                page: filters.page.max(1),
                total: total as usize,
            })
        })
        .await
    }

    // ─── Listings ───────────────────────────────────────────────────────────

    async fn list_distinct(&self, listing: &Listing) -> Result<Vec<String>> {
        let listing = listing.clone();
        self.run(move |conn| {
            let (sql, param_values): (&str, Vec<String>) = match &listing {
                Listing::Paths => ("SELECT DISTINCT path FROM states ORDER BY path", vec![]),
                Listing::ResourceTypes => {
                    ("SELECT DISTINCT type FROM resources ORDER BY type", vec![])
                }
                Listing::ResourceNames => {
                    ("SELECT DISTINCT name FROM resources ORDER BY name", vec![])
                }
                Listing::TfVersions => ("SELECT DISTINCT tf_version FROM states", vec![]),
                Listing::AttributeKeys {
                    resource_type: Some(rt),
                } => (
                    "SELECT DISTINCT attributes.key FROM attributes
                     JOIN resources ON resources.id = attributes.resource_id
                     WHERE resources.type = ?1 ORDER BY attributes.key",
                    vec![rt.clone()],
                ),
                Listing::AttributeKeys {
                    resource_type: None,
                } => ("SELECT DISTINCT key FROM attributes ORDER BY key", vec![]),
            };

            let mut stmt = conn.prepare(sql)?;
            let mut values = stmt
                .query_map(param_refs(&param_values).as_slice(), |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;

            if listing == Listing::TfVersions {
                sort_versions_desc(&mut values, |v| v.as_str());
            }
            Ok(values)
        })
        .await
    }

    async fn list_tf_versions_with_count(&self, order: VersionOrder) -> Result<Vec<VersionCount>> {
        self.run(move |conn| {
            let sql = format!(
                "{CURRENT_STATES_CTE}
                 SELECT tf_version, COUNT(*) AS cnt FROM current_states
                 GROUP BY tf_version
                 ORDER BY cnt DESC, tf_version DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt
                .query_map([], |row| {
                    Ok(VersionCount {
                        tf_version: row.get(0)?,
                        count: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            if order == VersionOrder::Version {
                sort_versions_desc(&mut rows, |r| r.tf_version.as_str());
            }
            Ok(rows)
        })
        .await
    }

    async fn list_resource_types_with_count(&self) -> Result<Vec<ResourceTypeCount>> {
        self.run(move |conn| {
            let sql = format!(
                "{CURRENT_STATES_CTE}
                 SELECT resources.type, COUNT(*) AS cnt FROM current_states
                 JOIN modules ON modules.state_id = current_states.id
                 JOIN resources ON resources.module_id = modules.id
                 GROUP BY resources.type
                 ORDER BY cnt DESC, resources.type ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(ResourceTypeCount {
                        resource_type: row.get(0)?,
                        count: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn list_lineages(&self) -> Result<Vec<LineageStat>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT lineages.value, COUNT(DISTINCT states.path), COUNT(states.id)
                 FROM lineages LEFT JOIN states ON states.lineage_id = lineages.id
                 GROUP BY lineages.id, lineages.value
                 ORDER BY lineages.value",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(LineageStat {
                        value: row.get(0)?,
                        path_count: row.get(1)?,
                        state_count: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }
}
