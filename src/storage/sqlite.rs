//! SQLite-backed document storage.

use std::{
    io,
    path::Path,
    sync::{Mutex, MutexGuard},
};

use rusqlite::{Connection, OptionalExtension, params};

use super::{Storage, StorageError, StorageResult, join_key, parent_of};

/// [`Storage`] implementation keeping documents as rows of one SQLite file.
///
/// Each `write_atomic` is a single upsert inside a transaction, so it has the
/// same all-or-nothing behavior as the rename-based filesystem backend.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens or creates a SQLite-backed store at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory SQLite store.
    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> rusqlite::Result<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for SqliteStorage {
    fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        let conn = self.lock();
        let body: Option<Vec<u8>> = conn
            .query_row("SELECT body FROM documents WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| StorageError::read(key, sql_io(e)))?;
        body.ok_or_else(|| StorageError::read(key, io::ErrorKind::NotFound.into()))
    }

    fn write_atomic(&self, key: &str, bytes: &[u8]) -> StorageResult<()> {
        let mut conn = self.lock();
        let dir = parent_of(key);

        let tx = conn
            .transaction()
            .map_err(|e| StorageError::write(key, sql_io(e)))?;
        if !dir.is_empty() && !dir_exists(&tx, dir).map_err(|e| StorageError::write(key, sql_io(e)))? {
            return Err(StorageError::write(key, io::ErrorKind::NotFound.into()));
        }
        tx.execute(
            "INSERT INTO documents(key, dir, body) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET body = excluded.body",
            params![key, dir, bytes],
        )
        .map_err(|e| StorageError::write(key, sql_io(e)))?;
        tx.commit().map_err(|e| StorageError::write(key, sql_io(e)))?;

        tracing::debug!(key, bytes = bytes.len(), "document replaced");
        Ok(())
    }

    fn list_entries(&self, dir: &str) -> StorageResult<Vec<String>> {
        let conn = self.lock();
        let dir = dir.trim_end_matches('/');
        if !dir.is_empty() && !dir_exists(&conn, dir).map_err(|e| StorageError::read(dir, sql_io(e)))? {
            return Err(StorageError::read(dir, io::ErrorKind::NotFound.into()));
        }

        let mut stmt = conn
            .prepare(
                "SELECT key FROM documents WHERE dir = ?1
                 UNION SELECT path FROM dirs WHERE path LIKE ?2 ESCAPE '\\'",
            )
            .map_err(|e| StorageError::read(dir, sql_io(e)))?;
        let pattern = if dir.is_empty() {
            "%".to_string()
        } else {
            format!("{}/%", escape_like(dir))
        };
        let rows = stmt
            .query_map(params![dir, pattern], |row| row.get::<_, String>(0))
            .map_err(|e| StorageError::read(dir, sql_io(e)))?;

        let mut names = Vec::new();
        for row in rows {
            let key = row.map_err(|e| StorageError::read(dir, sql_io(e)))?;
            if parent_of(&key) == dir {
                names.push(key.rsplit('/').next().unwrap_or(key.as_str()).to_string());
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        let conn = self.lock();
        let count = conn
            .execute("DELETE FROM documents WHERE key = ?1", params![key])
            .map_err(|e| StorageError::write(key, sql_io(e)))?;
        Ok(count > 0)
    }

    fn create_dir(&self, dir: &str) -> StorageResult<()> {
        let mut conn = self.lock();
        let tx = conn
            .transaction()
            .map_err(|e| StorageError::write(dir, sql_io(e)))?;
        let mut current = String::new();
        for part in dir.split('/').filter(|p| !p.is_empty()) {
            current = join_key(&current, part);
            tx.execute("INSERT OR IGNORE INTO dirs(path) VALUES (?1)", params![current])
                .map_err(|e| StorageError::write(dir, sql_io(e)))?;
        }
        tx.commit().map_err(|e| StorageError::write(dir, sql_io(e)))
    }
}

fn dir_exists(conn: &Connection, dir: &str) -> rusqlite::Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM dirs WHERE path = ?1", params![dir], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn sql_io(err: rusqlite::Error) -> io::Error {
    io::Error::other(err)
}
