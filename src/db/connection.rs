//! Connection pool construction.

use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;

use crate::error::SearchError;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Open (or create) a file-backed database and build a connection pool.
pub fn open_pool(db_path: &Path) -> Result<DbPool, SearchError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let manager = SqliteConnectionManager::file(db_path).with_flags(
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
    );

    let pool = Pool::builder().max_size(10).build(manager)?;

    {
        let conn = pool.get()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        // WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    }

    Ok(pool)
}

/// Build a pool over a private in-memory database.
///
/// A single connection is used so that temporary tables and the database
/// itself share one lifetime.
pub fn open_in_memory_pool() -> Result<DbPool, SearchError> {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(manager)?;

    {
        let conn = pool.get()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    }

    Ok(pool)
}
