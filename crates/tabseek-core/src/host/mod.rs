//! Host platform capabilities consumed by the index.
//!
//! The tab, scripting, storage and messaging primitives belong to the host. This module
//! only fixes their contracts so the synchronizer, background service and content side can
//! be driven by a real host binding or by [`SimulatedBrowser`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::models::{TabDescriptor, TabId, TabUpdateChange};
use crate::rpc::{ContentCommand, Envelope};

mod simulated;

pub use simulated::{SessionFixture, SessionTab, SimulatedBrowser};

/// Page state visible to a script injected into a tab.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageDocument {
    pub body_text: String,
}

/// Zero-argument routine executed inside a page context.
pub trait PageScript: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(&self, page: &PageDocument) -> String;
}

/// Tab query/update capability, scoped to the focused window.
#[async_trait]
pub trait TabHost: Send + Sync {
    async fn query_window_tabs(&self) -> Result<Vec<TabDescriptor>>;

    async fn active_tab(&self) -> Result<Option<TabDescriptor>>;

    /// Liveness check; `None` once the tab is closed.
    async fn get_tab(&self, tab_id: TabId) -> Result<Option<TabDescriptor>>;

    async fn activate_tab(&self, tab_id: TabId) -> Result<()>;
}

/// Remote script execution capability.
#[async_trait]
pub trait ScriptHost: Send + Sync {
    async fn execute_script(&self, tab_id: TabId, script: &dyn PageScript) -> Result<String>;
}

/// Persistent key-value capability. Each key is written atomically; nothing spans keys.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// Missing keys are simply absent from the result.
    async fn get(&self, keys: &[String]) -> Result<BTreeMap<String, Value>>;

    async fn set(&self, items: BTreeMap<String, Value>) -> Result<()>;

    async fn remove(&self, keys: &[String]) -> Result<()>;

    async fn keys(&self) -> Result<Vec<String>>;

    fn backend_name(&self) -> &'static str;

    async fn set_metadata(&self, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    async fn get_metadata(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Background to content push channel.
#[async_trait]
pub trait ContentMessenger: Send + Sync {
    async fn send_to_tab(&self, tab_id: TabId, command: ContentCommand) -> Result<()>;
}

/// Everything the host delivers to the background context.
#[derive(Debug)]
pub enum HostEvent {
    Installed,
    TabUpdated {
        tab_id: TabId,
        change: TabUpdateChange,
        tab: TabDescriptor,
    },
    TabRemoved {
        tab_id: TabId,
    },
    Command(String),
    Message(Envelope),
}

impl HostEvent {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::TabUpdated { .. } => "tab_updated",
            Self::TabRemoved { .. } => "tab_removed",
            Self::Command(_) => "command",
            Self::Message(_) => "message",
        }
    }
}
