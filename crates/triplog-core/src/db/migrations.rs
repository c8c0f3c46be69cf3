//! Database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get::<_, i32>(0).map(|value| value != 0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Migration to version 1: initial schema.
///
/// The synced flag on a trip row covers *metadata* only; trips with unsynced
/// traces are found through the per-row flags on the trace table. The uuid
/// column is the real cross-device primary key; id is device-local.
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;
         CREATE TABLE IF NOT EXISTS schema_version (
             version INTEGER PRIMARY KEY
         );
         CREATE TABLE IF NOT EXISTS user (
             email TEXT NOT NULL,
             firstname TEXT,
             lastname TEXT,
             token TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS trip (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             uuid TEXT NOT NULL UNIQUE,
             starttime INTEGER NOT NULL,
             endtime INTEGER NOT NULL,
             distance REAL NOT NULL DEFAULT 0,
             score REAL NOT NULL DEFAULT 10,
             tilt REAL NOT NULL DEFAULT 0,
             status INTEGER NOT NULL,
             synced INTEGER NOT NULL DEFAULT 0,
             email TEXT NOT NULL DEFAULT ''
         );
         CREATE TABLE IF NOT EXISTS trace (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             tripid INTEGER NOT NULL REFERENCES trip(id),
             type TEXT NOT NULL CHECK (type <> ''),
             value TEXT NOT NULL,
             synced INTEGER NOT NULL DEFAULT 0
         );
         CREATE INDEX IF NOT EXISTS idx_trace_trip_type ON trace(tripid, type);
         CREATE INDEX IF NOT EXISTS idx_trace_synced ON trace(synced);
         CREATE INDEX IF NOT EXISTS idx_trip_starttime ON trip(starttime DESC);
         CREATE INDEX IF NOT EXISTS idx_trip_email ON trip(email);
         INSERT INTO schema_version (version) VALUES (1);
         COMMIT;",
    )?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}
