use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, Params, Row, Transaction};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::LibraryError;
use crate::schema::create_schema;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryStats {
    pub artists: usize,
    pub albums: usize,
    pub tracks: usize,
}

/// The catalog database. Clones share one connection; every write runs in its own
/// transaction while holding the connection lock, so a lookup and the insert that
/// follows it can never interleave with another writer.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl Store {
    /// Opens the catalog at `path`, creating the schema only when the file is new.
    pub fn open(path: &Path) -> Result<Self, LibraryError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let existed = path.exists();
        let conn = Connection::open(path)?;
        configure(&conn)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;

        if existed {
            info!("Opened catalog {:?}", path);
        } else {
            create_schema(&conn)?;
            info!("Created catalog {:?}", path);
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self, LibraryError> {
        let conn = Connection::open_in_memory()?;
        configure(&conn)?;
        create_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize, LibraryError> {
        let conn = self.conn.lock();
        Ok(conn.execute(sql, params)?)
    }

    pub fn query<T, P, F>(&self, sql: &str, params: P, map: F) -> Result<Vec<T>, LibraryError>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, map)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn last_insert_id(&self) -> i64 {
        self.conn.lock().last_insert_rowid()
    }

    /// Runs `f` inside one transaction. Commits when `f` returns `Ok`; an `Err`
    /// or a panic drops the transaction, which rolls it back.
    pub fn write<T, F>(&self, f: F) -> Result<T, LibraryError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, LibraryError>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    pub fn read<T, F>(&self, f: F) -> Result<T, LibraryError>
    where
        F: FnOnce(&Connection) -> Result<T, LibraryError>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    pub fn stats(&self) -> Result<LibraryStats, LibraryError> {
        self.read(|conn| {
            Ok(LibraryStats {
                artists: count_rows(conn, "artist")?,
                albums: count_rows(conn, "album")?,
                tracks: count_rows(conn, "track")?,
            })
        })
    }
}

fn configure(conn: &Connection) -> Result<(), LibraryError> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}

fn count_rows(conn: &Connection, table: &str) -> Result<usize, LibraryError> {
    let sql = format!("SELECT COUNT(*) FROM {}", table);
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count.max(0) as usize)
}
