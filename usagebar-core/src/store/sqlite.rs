//! SQLite-backed preference store
//!
//! The database file is shared by every usagebar process (the refresh
//! daemon, one-shot CLI invocations, any tray shell), so it runs in WAL mode
//! and each operation takes the connection lock only for its own statement.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::PreferenceStore;
use crate::error::{Error, Result};

/// Preference store handle (single connection)
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path and run migrations
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;
        super::schema::run_migrations(&conn)?;

        tracing::debug!(path = %path.display(), "Opened preference store");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        super::schema::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Store("connection lock poisoned".to_string()))
    }
}

impl PreferenceStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.connection()?;
        let value = conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                params![key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            r#"
            INSERT INTO preferences (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.connection()?;
        conn.execute("DELETE FROM preferences WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare("SELECT key FROM preferences ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_upsert_overwrites() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("refresh_interval", b"30").unwrap();
        store.set("refresh_interval", b"60").unwrap();
        assert_eq!(
            store.get("refresh_interval").unwrap(),
            Some(b"60".to_vec())
        );
        assert_eq!(store.keys().unwrap(), vec!["refresh_interval"]);
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/preferences.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("icon_style", b"ring").unwrap();
            store.set("blob", &[0u8, 159, 146, 150]).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("icon_style").unwrap(), Some(b"ring".to_vec()));
        assert_eq!(store.get("blob").unwrap(), Some(vec![0u8, 159, 146, 150]));
    }

    #[test]
    fn test_two_handles_share_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preferences.db");

        let writer = SqliteStore::open(&path).unwrap();
        let reader = SqliteStore::open(&path).unwrap();

        writer.set("monochrome_icon", b"true").unwrap();
        assert!(reader.contains("monochrome_icon").unwrap());

        reader.remove("monochrome_icon").unwrap();
        assert!(!writer.contains("monochrome_icon").unwrap());
    }
}
