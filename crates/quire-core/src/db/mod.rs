//! SQLite comment store utilities.
//!
//! Runtime defaults:
//! - `journal_mode = WAL` to allow concurrent readers while writers append
//! - `busy_timeout = 5s` to reduce transient lock failures under contention
//! - `foreign_keys = ON` so comments cannot point at unknown posts

pub mod migrations;
pub mod query;
pub mod schema;

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OpenFlags};
use std::{path::Path, time::Duration};

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) the comment store, apply runtime pragmas, and migrate
/// the schema to the latest version.
///
/// # Errors
///
/// Returns an error if opening/configuring/migrating the database fails.
pub fn open_store(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create store directory {}", parent.display()))?;
    }

    let mut conn =
        Connection::open(path).with_context(|| format!("open store {}", path.display()))?;

    configure_connection(&conn).context("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).context("apply store migrations")?;

    Ok(conn)
}

/// Connect to an existing, already-migrated store.
///
/// Used on the request path: one short-lived connection per request, never
/// creating the file.
///
/// # Errors
///
/// Returns an error if the store does not exist, cannot be opened, or was
/// written by a newer schema.
pub fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("connect to store {}", path.display()))?;

    configure_connection(&conn).context("configure sqlite pragmas")?;

    let version = migrations::current_schema_version(&conn).context("read schema version")?;
    if version != migrations::LATEST_SCHEMA_VERSION {
        bail!(
            "store {} is at schema v{version}, expected v{}; run `quire init`",
            path.display(),
            migrations::LATEST_SCHEMA_VERSION
        );
    }

    Ok(conn)
}

/// Fresh in-memory store, migrated. Handy for tests and dry runs.
///
/// # Errors
///
/// Returns an error if SQLite cannot allocate the database.
pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory().context("open in-memory store")?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("enable foreign keys")?;
    migrations::migrate(&mut conn).context("apply store migrations")?;
    Ok(conn)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}
