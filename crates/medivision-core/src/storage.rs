// SQLite-backed key-value store for client-side persisted state.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

/// Key holding the bearer token of the current session.
pub const TOKEN_KEY: &str = "access_token";

/// Key holding the light/dark theme preference.
pub const THEME_KEY: &str = "theme";

/// Local key-value store. Values are plain strings; the client only ever
/// stores the session token and the theme preference here.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the store at `path`, creating parent directories
    /// as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create store directory {}", parent.display())
                })?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open store at {}", path.display()))?;
        Self::init(conn)
    }

    /// Ephemeral store, used by tests and by `--no-persist` style callers.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory store")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA busy_timeout = 5000;
             CREATE TABLE IF NOT EXISTS kv_store (
                 key   TEXT PRIMARY KEY,
                 value TEXT NOT NULL
             );",
        )
        .context("failed to create store schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// The connection is only held for single statements, so a poisoned
    /// lock still guards a consistent table.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT value FROM kv_store WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("failed to read key {key}"))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .with_context(|| format!("failed to write key {key}"))?;
        Ok(())
    }

    /// Remove `key`. Removing a missing key is a no-op.
    pub fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])
            .with_context(|| format!("failed to remove key {key}"))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_missing_key_is_none() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn set_overwrites_previous_value() {
        let store = Store::open_in_memory().unwrap();
        store.set(TOKEN_KEY, "first").unwrap();
        store.set(TOKEN_KEY, "second").unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn remove_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        store.set(THEME_KEY, "dark").unwrap();
        store.remove(THEME_KEY).unwrap();
        store.remove(THEME_KEY).unwrap();
        assert_eq!(store.get(THEME_KEY).unwrap(), None);
    }

    #[test]
    fn keys_are_independent() {
        let store = Store::open_in_memory().unwrap();
        store.set(TOKEN_KEY, "tok").unwrap();
        store.set(THEME_KEY, "dark").unwrap();
        store.remove(TOKEN_KEY).unwrap();
        assert_eq!(store.get(THEME_KEY).unwrap().as_deref(), Some("dark"));
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.db");
        {
            let store = Store::open(&path).unwrap();
            store.set(TOKEN_KEY, "persisted-token").unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert_eq!(
            store.get(TOKEN_KEY).unwrap().as_deref(),
            Some("persisted-token")
        );
    }
}
