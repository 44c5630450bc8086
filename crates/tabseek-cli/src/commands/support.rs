use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tabseek_core::config::{AppConfig, StorageBackend, StorageConfig};
use tabseek_core::host::{KeyValueStorage, SessionFixture};
use tabseek_core::state::{MemoryStorage, SqliteStateStore};

const DEFAULT_SESSION_FILE: &str = "session.json";

pub(super) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

pub(super) fn session_path(root: &Path, session: Option<&Path>) -> PathBuf {
    session.map_or_else(|| root.join(DEFAULT_SESSION_FILE), Path::to_path_buf)
}

/// A missing fixture is an empty browser.
pub(super) fn load_session(path: &Path) -> Result<SessionFixture> {
    if !path.exists() {
        return Ok(SessionFixture::default());
    }
    SessionFixture::load(path)
        .with_context(|| format!("failed to load session fixture {}", path.display()))
}

pub(super) fn save_session(path: &Path, fixture: &SessionFixture) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    fixture
        .save(path)
        .with_context(|| format!("failed to save session fixture {}", path.display()))
}

pub(super) fn open_storage(root: &Path, config: &AppConfig) -> Result<Arc<dyn KeyValueStorage>> {
    match config.storage.backend {
        StorageBackend::Sqlite => {
            let path = StorageConfig::state_path(root);
            let store = SqliteStateStore::open(&path)
                .with_context(|| format!("failed to open state store {}", path.display()))?;
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => Ok(Arc::new(MemoryStorage::new())),
    }
}
