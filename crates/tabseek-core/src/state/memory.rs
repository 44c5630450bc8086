use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, TabSeekError};
use crate::host::KeyValueStorage;

/// Volatile storage backend; lost when the process exits.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    values: Arc<Mutex<BTreeMap<String, Value>>>,
    metadata: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_values<T>(&self, f: impl FnOnce(&mut BTreeMap<String, Value>) -> T) -> Result<T> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| TabSeekError::mutex_poisoned("memory storage"))?;
        Ok(f(&mut values))
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn get(&self, keys: &[String]) -> Result<BTreeMap<String, Value>> {
        self.with_values(|values| {
            keys.iter()
                .filter_map(|key| values.get(key).map(|value| (key.clone(), value.clone())))
                .collect()
        })
    }

    async fn set(&self, items: BTreeMap<String, Value>) -> Result<()> {
        self.with_values(|values| values.extend(items))
    }

    async fn remove(&self, keys: &[String]) -> Result<()> {
        self.with_values(|values| {
            for key in keys {
                values.remove(key);
            }
        })
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.with_values(|values| values.keys().cloned().collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.metadata
            .lock()
            .map_err(|_| TabSeekError::mutex_poisoned("memory metadata"))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .metadata
            .lock()
            .map_err(|_| TabSeekError::mutex_poisoned("memory metadata"))?
            .get(key)
            .cloned())
    }
}
