use std::time::Duration;

pub(super) const ENV_RPC_TIMEOUT_MS: &str = "TABSEEK_RPC_TIMEOUT_MS";
pub(super) const ENV_VERIFY_LIVENESS: &str = "TABSEEK_VERIFY_LIVENESS";
pub(super) const ENV_EVENT_QUEUE_CAPACITY: &str = "TABSEEK_EVENT_QUEUE_CAPACITY";

pub(super) const DEFAULT_RPC_TIMEOUT_MS: u64 = 2_000;
pub(super) const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Re-check that the tab still shows the same url before committing extracted text.
    pub verify_liveness: bool,
    pub event_queue_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            verify_liveness: true,
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcConfig {
    pub timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_RPC_TIMEOUT_MS),
        }
    }
}
