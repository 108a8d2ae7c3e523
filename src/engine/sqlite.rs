//! SQLite-backed engine
//!
//! A single `WITHOUT ROWID` table keyed by BLOB gives ordered point access.
//! Writes accumulate in an open transaction that `sync` commits, so the
//! store decides where durability boundaries fall.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{InfoDbError, Result};

use super::KvEngine;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv (
    key   BLOB PRIMARY KEY NOT NULL,
    value BLOB NOT NULL
) WITHOUT ROWID";

/// Durable engine stored in one SQLite file
pub struct SqliteEngine {
    conn: Connection,
    path: PathBuf,
}

impl SqliteEngine {
    /// Open (or create) the database file named by `config.path`
    pub fn open(config: &Config) -> Result<Self> {
        let path = config.path.as_path();

        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        if config.create_if_missing {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        } else if !path.exists() {
            return Err(InfoDbError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("database file `{}' does not exist", path.display()),
            )));
        }

        let conn = Connection::open_with_flags(path, flags)?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        Self::init(conn, path.to_path_buf())
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, path: PathBuf) -> Result<Self> {
        debug!(path = %path.display(), "applying SQLite pragmas");

        // FULL sync so that a committed `sync` survives power loss.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.execute_batch(SCHEMA)?;

        let engine = Self { conn, path };
        engine.begin()?;
        Ok(engine)
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether writes are currently held in an open transaction
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Open a transaction unless one is already open. A failed COMMIT can
    /// leave the connection in autocommit mode.
    fn begin(&self) -> Result<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }
}

impl KvEngine for SqliteEngine {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT value FROM kv WHERE key = ?1")?;
        let value = stmt
            .query_row(params![key], |row| row.get::<_, Vec<u8>>(0))
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.begin()?;
        let mut stmt = self
            .conn
            .prepare_cached("INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)")?;
        stmt.execute(params![key, value])?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.begin()?;
        let mut stmt = self.conn.prepare_cached("DELETE FROM kv WHERE key = ?1")?;
        stmt.execute(params![key])?;
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        let committed = self.commit();
        self.begin()?;
        committed
    }

    fn close(&self) -> Result<()> {
        self.commit()
    }
}

impl Drop for SqliteEngine {
    fn drop(&mut self) {
        if let Err(e) = self.commit() {
            warn!(path = %self.path.display(), error = %e, "failed to commit on drop");
        }
    }
}
