use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// String key-value persistence used by the profile store
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn keys(&self) -> Result<Vec<String>, StoreError>;
    fn delete(&mut self, key: &str) -> Result<(), StoreError>;
}

/// The Library manages the SQLite database holding every profile.
/// Each profile's notes live under one key as a JSON array.
pub struct Library {
    conn: Connection,
    db_path: PathBuf,
    /// Largest value accepted by `set`
    max_value_bytes: usize,
}

impl Library {
    /// Open (or create) the database at `db_path` and initialize the schema.
    pub fn open(db_path: &Path, max_value_bytes: usize) -> Result<Self, StoreError> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let conn = Connection::open(db_path)?;
        log::info!("Database opened at: {}", db_path.display());

        let library = Library {
            conn,
            db_path: db_path.to_path_buf(),
            max_value_bytes,
        };
        library.init_schema()?;

        Ok(library)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key             TEXT PRIMARY KEY,
                value           TEXT NOT NULL,
                updated_at      INTEGER NOT NULL
            )",
            [],
        )?;

        log::debug!("Database schema initialized");
        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }
}

impl KeyValueStore for Library {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if value.len() > self.max_value_bytes {
            return Err(StoreError::QuotaExceeded {
                size: value.len(),
                limit: self.max_value_bytes,
            });
        }

        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .finish()
    }
}

/// In-memory store with an optional per-value quota.
///
/// Counts successful writes so callers can check that nothing was persisted.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: std::collections::BTreeMap<String, String>,
    quota: Option<usize>,
    writes: usize,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject any value longer than `quota` bytes
    pub fn with_quota(quota: usize) -> Self {
        Self {
            quota: Some(quota),
            ..Self::default()
        }
    }

    pub fn set_quota(&mut self, quota: Option<usize>) {
        self.quota = quota;
    }

    /// Number of successful `set`/`delete` calls
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Some(limit) = self.quota {
            if value.len() > limit {
                return Err(StoreError::QuotaExceeded {
                    size: value.len(),
                    limit,
                });
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        self.writes += 1;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        self.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_library(max: usize) -> (tempfile::TempDir, Library) {
        let dir = tempfile::tempdir().unwrap();
        let library = Library::open(&dir.path().join("nested").join("test.db"), max).unwrap();
        (dir, library)
    }

    #[test]
    fn test_sqlite_get_set_delete() {
        let (_dir, mut library) = temp_library(1024);

        assert_eq!(library.get("a").unwrap(), None);
        library.set("a", "1").unwrap();
        library.set("b", "2").unwrap();
        library.set("a", "3").unwrap();

        assert_eq!(library.get("a").unwrap().as_deref(), Some("3"));
        assert_eq!(library.keys().unwrap(), vec!["a".to_string(), "b".to_string()]);

        library.delete("a").unwrap();
        assert_eq!(library.get("a").unwrap(), None);
        // Deleting a missing key is not an error
        library.delete("a").unwrap();
    }

    #[test]
    fn test_sqlite_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        {
            let mut library = Library::open(&path, 1024).unwrap();
            library.set("profile:Default", "[]").unwrap();
        }
        let library = Library::open(&path, 1024).unwrap();
        assert_eq!(library.get("profile:Default").unwrap().as_deref(), Some("[]"));
        assert_eq!(library.path(), &path);
    }

    #[test]
    fn test_sqlite_quota() {
        let (_dir, mut library) = temp_library(4);
        assert!(library.set("k", "1234").is_ok());
        let err = library.set("k", "12345").unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { size: 5, limit: 4 }));
        assert_eq!(library.get("k").unwrap().as_deref(), Some("1234"));
    }

    #[test]
    fn test_memory_store_counts_writes() {
        let mut store = MemoryStore::with_quota(3);
        store.set("a", "abc").unwrap();
        assert!(store.set("a", "abcd").is_err());
        store.delete("a").unwrap();
        assert_eq!(store.write_count(), 2);
        assert!(store.keys().unwrap().is_empty());
    }
}
