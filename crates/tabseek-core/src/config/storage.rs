use std::path::PathBuf;

use crate::error::{Result, TabSeekError};

pub(super) const ENV_STORAGE_BACKEND: &str = "TABSEEK_STORAGE_BACKEND";

pub(crate) const DEFAULT_STATE_FILE: &str = "tabseek_state.sqlite3";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

impl StorageBackend {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        }
    }

    pub(super) fn parse(raw: Option<&str>) -> Result<Self> {
        let normalized = raw.map(|value| value.trim().to_ascii_lowercase());
        match normalized.as_deref() {
            None | Some("sqlite") => Ok(Self::Sqlite),
            Some("memory") => Ok(Self::Memory),
            Some(other) => Err(TabSeekError::Validation(format!(
                "invalid {ENV_STORAGE_BACKEND}: {other} (expected sqlite|memory)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

impl StorageConfig {
    /// Location of the SQLite file under a state root directory.
    #[must_use]
    pub fn state_path(root: impl Into<PathBuf>) -> PathBuf {
        root.into().join(DEFAULT_STATE_FILE)
    }
}
