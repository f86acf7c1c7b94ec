//! Durable key-value backends for the save store.
//!
//! The store needs four primitives and nothing else: atomic single-key
//! `put`, `get`, prefix listing, and `delete`. Each save is one value under
//! one key, so a reader either sees the whole record or none of it.
//!
//! Two backends are provided:
//!
//! - [`MemoryKv`]: a sorted in-process map, for tests and embedding.
//! - [`SqliteKv`]: a single SQLite table:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS kv (
//!     key   TEXT PRIMARY KEY,
//!     value BLOB NOT NULL
//! );
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};

use crate::error::Result;

/// Minimal durable key-value interface.
///
/// Implementations must make `put` and `delete` atomic per key. Failures are
/// reported as [`crate::error::ChronicleError::StoreUnavailable`].
pub trait KvBackend: Send + Sync {
    /// Insert or replace the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium rejects the write.
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Fetch the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be read.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// All keys starting with `prefix`, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be read.
    fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remove `key`. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium rejects the delete.
    fn delete(&self, key: &str) -> Result<bool>;
}

impl<B: KvBackend + ?Sized> KvBackend for Arc<B> {
    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        (**self).put(key, value)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).list_keys(prefix)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        (**self).delete(key)
    }
}

impl<B: KvBackend + ?Sized> KvBackend for Box<B> {
    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        (**self).put(key, value)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).list_keys(prefix)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        (**self).delete(key)
    }
}

// ---------------------------------------------------------------------------
// MemoryKv
// ---------------------------------------------------------------------------

/// In-process backend. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryKv {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KvBackend for MemoryKv {
    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.write().insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.entries.read();
        Ok(entries
            .range(prefix.to_owned()..)
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }
}

// ---------------------------------------------------------------------------
// SqliteKv
// ---------------------------------------------------------------------------

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv (
    key   TEXT PRIMARY KEY,
    value BLOB NOT NULL
);";

/// SQLite-backed store.
///
/// The connection is guarded by a mutex, so one handle can be shared across
/// threads; SQLite itself serialises writers.
pub struct SqliteKv {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteKv")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl SqliteKv {
    /// Open (or create) a database at `path`.
    ///
    /// The schema is created if missing. WAL mode is enabled when
    /// `wal_mode` is `true`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ChronicleError::StoreUnavailable`] on SQLite
    /// failures, or an I/O error if the parent directory cannot be created.
    pub fn open<P: AsRef<Path>>(path: P, wal_mode: bool) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&db_path, flags)?;

        if wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(path = %db_path.display(), wal = wal_mode, "Save database opened");

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ChronicleError::StoreUnavailable`] on SQLite
    /// failures.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Path to the database file (`:memory:` for in-memory databases).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run SQLite's integrity check. `Ok(false)` means corruption.
    ///
    /// # Errors
    ///
    /// Returns an error if the check itself cannot run.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn
            .lock()
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }
}

impl KvBackend for SqliteKv {
    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let start = Instant::now();
        self.conn.lock().execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        debug!(key, bytes = value.len(), elapsed_us = start.elapsed().as_micros(), "kv put");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("SELECT value FROM kv WHERE key = ?1")?;
        let value = stmt.query_row(params![key], |row| row.get(0)).optional()?;
        Ok(value)
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT key FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )?;
        let rows = stmt.query_map(params![prefix], |row| row.get::<_, String>(0))?;
        let keys = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let deleted = self
            .conn
            .lock()
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(deleted > 0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(kv: &dyn KvBackend) {
        kv.put("saves/a/1", b"one").expect("put");
        kv.put("saves/a/2", b"two").expect("put");
        kv.put("saves/b/1", b"three").expect("put");
        kv.put("other", b"x").expect("put");

        assert_eq!(kv.get("saves/a/1").expect("get"), Some(b"one".to_vec()));
        assert_eq!(kv.get("missing").expect("get"), None);

        assert_eq!(kv.list_keys("saves/a/").expect("list"), ["saves/a/1", "saves/a/2"]);
        assert_eq!(kv.list_keys("saves/").expect("list").len(), 3);
        assert!(kv.list_keys("nope/").expect("list").is_empty());

        kv.put("saves/a/1", b"replaced").expect("overwrite");
        assert_eq!(kv.get("saves/a/1").expect("get"), Some(b"replaced".to_vec()));

        assert!(kv.delete("saves/a/1").expect("delete"));
        assert!(!kv.delete("saves/a/1").expect("delete again"));
        assert_eq!(kv.list_keys("saves/a/").expect("list"), ["saves/a/2"]);
    }

    #[test]
    fn memory_backend_contract() {
        let kv = MemoryKv::new();
        exercise(&kv);
        assert_eq!(kv.len(), 3);
    }

    #[test]
    fn sqlite_in_memory_contract() {
        let kv = SqliteKv::open_in_memory().expect("open");
        exercise(&kv);
        assert!(kv.integrity_check().expect("check"));
    }

    #[test]
    fn sqlite_file_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("saves.db");
        {
            let kv = SqliteKv::open(&path, true).expect("open");
            kv.put("saves/p/s", &[0, 159, 146, 150]).expect("put");
        }
        let kv = SqliteKv::open(&path, true).expect("reopen");
        assert_eq!(kv.get("saves/p/s").expect("get"), Some(vec![0, 159, 146, 150]));
        assert_eq!(kv.db_path(), path.as_path());
    }

    #[test]
    fn sqlite_prefix_is_literal() {
        let kv = SqliteKv::open_in_memory().expect("open");
        kv.put("a%b/1", b"x").expect("put");
        kv.put("axb/1", b"y").expect("put");
        assert_eq!(kv.list_keys("a%b/").expect("list"), ["a%b/1"]);
    }

    #[test]
    fn arc_backend_delegates() {
        let kv = Arc::new(MemoryKv::new());
        KvBackend::put(&kv, "k", b"v").expect("put");
        assert_eq!(kv.len(), 1);
    }
}
