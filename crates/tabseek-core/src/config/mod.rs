use std::time::Duration;

use crate::error::Result;

mod env;
mod storage;
mod sync;

pub use storage::{StorageBackend, StorageConfig};
pub use sync::{RpcConfig, SyncConfig};

use self::env::{
    parse_enabled_default_true, parse_u64_at_least, parse_usize_at_least, read_non_empty_env,
};
use self::storage::ENV_STORAGE_BACKEND;
use self::sync::{
    DEFAULT_EVENT_QUEUE_CAPACITY, DEFAULT_RPC_TIMEOUT_MS, ENV_EVENT_QUEUE_CAPACITY,
    ENV_RPC_TIMEOUT_MS, ENV_VERIFY_LIVENESS,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub rpc: RpcConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(read_non_empty_env)
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let backend = StorageBackend::parse(lookup(ENV_STORAGE_BACKEND).as_deref())?;
        let timeout_ms = parse_u64_at_least(
            ENV_RPC_TIMEOUT_MS,
            lookup(ENV_RPC_TIMEOUT_MS).as_deref(),
            DEFAULT_RPC_TIMEOUT_MS,
            1,
        )?;
        let event_queue_capacity = parse_usize_at_least(
            ENV_EVENT_QUEUE_CAPACITY,
            lookup(ENV_EVENT_QUEUE_CAPACITY).as_deref(),
            DEFAULT_EVENT_QUEUE_CAPACITY,
            1,
        )?;
        Ok(Self {
            storage: StorageConfig { backend },
            sync: SyncConfig {
                verify_liveness: parse_enabled_default_true(
                    lookup(ENV_VERIFY_LIVENESS).as_deref(),
                ),
                event_queue_capacity,
            },
            rpc: RpcConfig {
                timeout: Duration::from_millis(timeout_ms),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect::<HashMap<_, _>>();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = AppConfig::from_lookup(|_| None).expect("config");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.rpc.timeout, Duration::from_millis(2_000));
        assert!(config.sync.verify_liveness);
    }

    #[test]
    fn overrides_are_applied() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("TABSEEK_STORAGE_BACKEND", "memory"),
            ("TABSEEK_RPC_TIMEOUT_MS", "150"),
            ("TABSEEK_VERIFY_LIVENESS", "off"),
            ("TABSEEK_EVENT_QUEUE_CAPACITY", "8"),
        ]))
        .expect("config");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.rpc.timeout, Duration::from_millis(150));
        assert!(!config.sync.verify_liveness);
        assert_eq!(config.sync.event_queue_capacity, 8);
    }

    #[test]
    fn invalid_backend_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("TABSEEK_STORAGE_BACKEND", "s3")]))
            .expect_err("invalid");
        assert_eq!(err.code(), "VALIDATION_FAILED");
    }

    #[test]
    fn invalid_numeric_overrides_are_rejected() {
        for (name, value) in [
            ("TABSEEK_RPC_TIMEOUT_MS", "fast"),
            ("TABSEEK_RPC_TIMEOUT_MS", "0"),
            ("TABSEEK_EVENT_QUEUE_CAPACITY", "0"),
            ("TABSEEK_EVENT_QUEUE_CAPACITY", "lots"),
        ] {
            let err = AppConfig::from_lookup(lookup_from(&[(name, value)]))
                .expect_err("invalid override");
            assert_eq!(err.code(), "VALIDATION_FAILED", "{name}={value}");
            assert!(err.to_string().contains(name));
        }
    }
}
