use anyhow::{Context, Result};
use rusqlite::Connection;

use super::schema;

/// Check the schema version and bring the database up to date.
pub fn check_and_migrate(conn: &Connection) -> Result<()> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get::<_, i64>(0),
        )
        .map(|c| c > 0)
        .unwrap_or(false);

    if !table_exists {
        // Fresh database
        conn.execute_batch(schema::CREATE_TABLES_SQL)
            .context("Failed to create state tables")?;
        conn.execute_batch(schema::CREATE_INDEXES_SQL)
            .context("Failed to create state indexes")?;
        conn.execute(
            "INSERT INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
            rusqlite::params![schema::SCHEMA_VERSION, now(), "Initial schema"],
        )?;
        return Ok(());
    }

    let current_version = current_version(conn)?;
    if current_version < schema::SCHEMA_VERSION {
        apply_migrations(conn, current_version)?;
    }

    Ok(())
}

/// Highest applied schema version, 0 when none is recorded.
pub fn current_version(conn: &Connection) -> Result<i32> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

fn apply_migrations(conn: &Connection, from_version: i32) -> Result<()> {
    if from_version < 1 {
        conn.execute_batch(schema::CREATE_TABLES_SQL)?;
        conn.execute_batch(schema::CREATE_INDEXES_SQL)?;
        conn.execute(
            "INSERT OR REPLACE INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
            rusqlite::params![1, now(), "Initial snapshot schema"],
        )?;
    }

    // Migration 1 -> 2 goes here when the schema changes:
    // if from_version < 2 { conn.execute_batch("ALTER TABLE ...")?; ... }

    Ok(())
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
