//! Database migrations and schema management.

use crate::error::DbResult;
use rusqlite::Connection;
use tracing::info;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema.
pub fn initialize_schema(conn: &Connection) -> DbResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating initial database schema...");
        create_initial_schema(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!(
            "Migrating database from version {} to {}",
            current_version, SCHEMA_VERSION
        );
        set_schema_version(conn, SCHEMA_VERSION)?;
    }

    Ok(())
}

fn get_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> DbResult<()> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

fn create_initial_schema(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- One row per uploaded file
        CREATE TABLE IF NOT EXISTS documents (
            file_id TEXT PRIMARY KEY,
            file_name TEXT NOT NULL,
            content_type TEXT NOT NULL,
            raw_payload_ref TEXT NOT NULL,
            creation_date TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_documents_created ON documents(creation_date);
        CREATE INDEX IF NOT EXISTS idx_documents_payload ON documents(raw_payload_ref);

        -- Append-only result log; seq is the insertion order within a document
        CREATE TABLE IF NOT EXISTS stage_results (
            file_id TEXT NOT NULL REFERENCES documents(file_id) ON DELETE CASCADE,
            seq INTEGER NOT NULL,
            process TEXT NOT NULL,
            data TEXT NOT NULL,
            duration REAL NOT NULL,
            timestamp TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            PRIMARY KEY (file_id, seq)
        );

        CREATE INDEX IF NOT EXISTS idx_results_process ON stage_results(process, file_id);

        -- Failure ledger with retry budget
        CREATE TABLE IF NOT EXISTS stage_failures (
            file_id TEXT NOT NULL REFERENCES documents(file_id) ON DELETE CASCADE,
            stage TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT NOT NULL,
            dead_lettered INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (file_id, stage)
        );

        -- Leases taken by a stage process while it works on a document
        CREATE TABLE IF NOT EXISTS stage_claims (
            file_id TEXT NOT NULL REFERENCES documents(file_id) ON DELETE CASCADE,
            stage TEXT NOT NULL,
            owner TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            PRIMARY KEY (file_id, stage)
        );
        "#,
    )?;

    Ok(())
}
