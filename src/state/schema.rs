/// SQL DDL for the tfboard state database.
/// Snapshots are stored relationally: states own modules, modules own
/// resources and outputs, resources own attributes. Lineages and versions
/// are shared lookup rows.
///
/// Timestamps are RFC 3339 TEXT (UTC, millisecond precision) so that text
/// ordering equals time ordering. Attribute and output values are canonical
/// JSON TEXT.

pub const SCHEMA_VERSION: i32 = 1;

pub const CREATE_TABLES_SQL: &str = "
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL,
    description TEXT
);

-- Lineages: one row per distinct lineage value ever seen
CREATE TABLE IF NOT EXISTS lineages (
    id TEXT PRIMARY KEY,
    value TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

-- Storage revisions
CREATE TABLE IF NOT EXISTS versions (
    id TEXT PRIMARY KEY,
    version_id TEXT NOT NULL,
    last_modified TEXT NOT NULL,
    UNIQUE(version_id, last_modified)
);

-- One row per ingestion of a (path, version)
CREATE TABLE IF NOT EXISTS states (
    id TEXT PRIMARY KEY,
    path TEXT NOT NULL,
    lineage_id TEXT,
    version_id TEXT NOT NULL,
    tf_version TEXT NOT NULL DEFAULT '',
    serial INTEGER NOT NULL DEFAULT 0,
    ingested_at TEXT NOT NULL,
    FOREIGN KEY (lineage_id) REFERENCES lineages(id),
    FOREIGN KEY (version_id) REFERENCES versions(id)
);

CREATE TABLE IF NOT EXISTS modules (
    id TEXT PRIMARY KEY,
    state_id TEXT NOT NULL,
    path TEXT NOT NULL DEFAULT '',
    position INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (state_id) REFERENCES states(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS resources (
    id TEXT PRIMARY KEY,
    module_id TEXT NOT NULL,
    type TEXT NOT NULL,
    name TEXT NOT NULL,
    mode TEXT NOT NULL DEFAULT 'managed',
    index_key TEXT NOT NULL DEFAULT '',
    position INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (module_id) REFERENCES modules(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS attributes (
    id TEXT PRIMARY KEY,
    resource_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    position INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (resource_id) REFERENCES resources(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS output_values (
    id TEXT PRIMARY KEY,
    module_id TEXT NOT NULL,
    name TEXT NOT NULL,
    value TEXT NOT NULL,
    sensitive INTEGER NOT NULL DEFAULT 0,
    position INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (module_id) REFERENCES modules(id) ON DELETE CASCADE
);
";

pub const CREATE_INDEXES_SQL: &str = "
CREATE INDEX IF NOT EXISTS idx_versions_version_id ON versions(version_id);
CREATE INDEX IF NOT EXISTS idx_states_path ON states(path);
CREATE INDEX IF NOT EXISTS idx_states_path_serial ON states(path, serial);
CREATE INDEX IF NOT EXISTS idx_states_lineage ON states(lineage_id);
CREATE INDEX IF NOT EXISTS idx_modules_state ON modules(state_id);
CREATE INDEX IF NOT EXISTS idx_resources_module ON resources(module_id);
CREATE INDEX IF NOT EXISTS idx_resources_type ON resources(type);
CREATE INDEX IF NOT EXISTS idx_attributes_resource ON attributes(resource_id);
CREATE INDEX IF NOT EXISTS idx_attributes_key ON attributes(key);
CREATE INDEX IF NOT EXISTS idx_output_values_module ON output_values(module_id);
";

/// Common table expression selecting the current state of every path:
/// highest serial, then latest revision, then latest ingestion.
pub const CURRENT_STATES_CTE: &str = "
WITH ranked AS (
    SELECT states.id AS state_id,
           ROW_NUMBER() OVER (
               PARTITION BY states.path
               ORDER BY states.serial DESC, versions.last_modified DESC,
                        states.ingested_at DESC, states.rowid DESC
           ) AS rn
    FROM states JOIN versions ON versions.id = states.version_id
),
current_states AS (
    SELECT states.* FROM states JOIN ranked ON ranked.state_id = states.id
    WHERE ranked.rn = 1
)
";
