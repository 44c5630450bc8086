use std::collections::BTreeMap;
use std::path::Path;
#[cfg(unix)]
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use tracing::warn;

use crate::error::{Result, TabSeekError};
use crate::host::KeyValueStorage;

mod memory;
mod migration;

pub use memory::MemoryStorage;

/// Persisted key-value storage backed by a single SQLite file.
#[derive(Clone)]
pub struct SqliteStateStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStateStore").finish_non_exhaustive()
    }
}

impl SqliteStateStore {
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| TabSeekError::mutex_poisoned("sqlite"))?;
        f(&conn)
    }

    fn with_tx<T>(&self, f: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| TabSeekError::mutex_poisoned("sqlite"))?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        drop(conn);
        Ok(value)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        #[cfg(unix)]
        harden_sqlite_permissions(path)?;
        Ok(store)
    }

    pub fn get_system_value(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM system_kv WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    pub fn set_system_value(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r"
                INSERT INTO system_kv(key, value, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET
                  value = excluded.value,
                  updated_at = excluded.updated_at
                ",
                params![key, value, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
    }

    /// Reads the given keys. Rows whose JSON no longer parses are skipped.
    pub fn get_values(&self, keys: &[String]) -> Result<BTreeMap<String, Value>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT value_json FROM tab_index WHERE key = ?1")?;
            let mut out = BTreeMap::new();
            for key in keys {
                let raw = stmt
                    .query_row(params![key], |row| row.get::<_, String>(0))
                    .optional()?;
                let Some(raw) = raw else {
                    continue;
                };
                match serde_json::from_str::<Value>(&raw) {
                    Ok(value) => {
                        out.insert(key.clone(), value);
                    }
                    Err(err) => warn!(key = %key, "skipping undecodable stored value: {err}"),
                }
            }
            Ok(out)
        })
    }

    pub fn set_values(&self, items: &BTreeMap<String, Value>) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.with_tx(|tx| {
            for (key, value) in items {
                tx.execute(
                    r"
                    INSERT INTO tab_index(key, value_json, updated_at)
                    VALUES (?1, ?2, ?3)
                    ON CONFLICT(key) DO UPDATE SET
                      value_json = excluded.value_json,
                      updated_at = excluded.updated_at
                    ",
                    params![key, serde_json::to_string(value)?, now],
                )?;
            }
            Ok(())
        })
    }

    pub fn remove_values(&self, keys: &[String]) -> Result<usize> {
        self.with_tx(|tx| {
            let mut affected = 0;
            for key in keys {
                affected += tx.execute("DELETE FROM tab_index WHERE key = ?1", params![key])?;
            }
            Ok(affected)
        })
    }

    pub fn list_keys(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM tab_index ORDER BY key ASC")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }
}

#[async_trait]
impl KeyValueStorage for SqliteStateStore {
    async fn get(&self, keys: &[String]) -> Result<BTreeMap<String, Value>> {
        self.get_values(keys)
    }

    async fn set(&self, items: BTreeMap<String, Value>) -> Result<()> {
        self.set_values(&items)
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        self.remove_values(keys).map(|_| ())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.list_keys()
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.set_system_value(key, value)
    }

    async fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        self.get_system_value(key)
    }
}

#[cfg(unix)]
fn harden_sqlite_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    for suffix in ["", "-wal", "-shm"] {
        let mut os = path.as_os_str().to_os_string();
        os.push(suffix);
        let candidate = PathBuf::from(os);
        if candidate.exists() {
            std::fs::set_permissions(candidate, std::fs::Permissions::from_mode(0o600))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
