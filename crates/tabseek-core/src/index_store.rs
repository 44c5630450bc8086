//! Typed view of the persisted tab index over a [`KeyValueStorage`].

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use crate::error::Result;
use crate::host::KeyValueStorage;
use crate::models::{IndexSnapshot, TabEntry, TabId};

#[derive(Clone)]
pub struct TabIndexStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl std::fmt::Debug for TabIndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabIndexStore")
            .field("backend", &self.storage.backend_name())
            .finish()
    }
}

fn storage_keys(ids: &[TabId]) -> Vec<String> {
    ids.iter().map(|id| id.storage_key()).collect()
}

impl TabIndexStore {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.storage.backend_name()
    }

    pub(crate) fn storage(&self) -> &dyn KeyValueStorage {
        self.storage.as_ref()
    }

    /// Entries for `ids`; ids without an entry are absent from the snapshot.
    pub async fn get(&self, ids: &[TabId]) -> Result<IndexSnapshot> {
        let raw = self.storage.get(&storage_keys(ids)).await?;
        let mut snapshot = IndexSnapshot::new();
        for (key, value) in raw {
            match serde_json::from_value::<TabEntry>(value) {
                Ok(entry) => {
                    snapshot.insert(entry.id, entry);
                }
                Err(err) => warn!(key = %key, "skipping malformed index entry: {err}"),
            }
        }
        Ok(snapshot)
    }

    pub async fn set(&self, entries: impl IntoIterator<Item = TabEntry>) -> Result<()> {
        let mut items = BTreeMap::new();
        for entry in entries {
            items.insert(entry.id.storage_key(), serde_json::to_value(&entry)?);
        }
        if items.is_empty() {
            return Ok(());
        }
        self.storage.set(items).await
    }

    pub async fn put(&self, entry: TabEntry) -> Result<()> {
        self.set([entry]).await
    }

    pub async fn remove(&self, ids: &[TabId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.storage.remove(&storage_keys(ids)).await
    }

    /// Runtime metadata recorded next to the index, when the backend keeps any.
    pub async fn metadata(&self, key: &str) -> Result<Option<String>> {
        self.storage.get_metadata(key).await
    }

    /// Every indexed id across windows, ascending. Keys that are not tab ids are ignored.
    pub async fn list_ids(&self) -> Result<Vec<TabId>> {
        let mut ids = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter_map(|key| key.parse::<TabId>().ok())
            .collect::<Vec<_>>();
        ids.sort_unstable();
        Ok(ids)
    }
}
