//! Content-side search over the window-scoped index snapshot.

use tracing::debug;

use crate::error::Result;
use crate::models::{IndexSnapshot, TabEntry};
use crate::rpc::RpcClient;

/// Substring match against the entry text or its lowercased title.
///
/// `lowered_query` must already be lowercase.
#[must_use]
pub fn entry_matches(entry: &TabEntry, lowered_query: &str) -> bool {
    entry
        .tab_text
        .as_deref()
        .is_some_and(|text| text.contains(lowered_query))
        || entry.title.to_lowercase().contains(lowered_query)
}

/// Matching entries in snapshot order (ascending tab id).
#[must_use]
pub fn filter_snapshot(snapshot: IndexSnapshot, query: &str) -> Vec<TabEntry> {
    let lowered = query.to_lowercase();
    snapshot
        .into_values()
        .filter(|entry| entry_matches(entry, &lowered))
        .collect()
}

#[derive(Debug, Clone)]
pub struct SearchEngine {
    client: RpcClient,
}

impl SearchEngine {
    #[must_use]
    pub fn new(client: RpcClient) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    /// A background that never answers yields no results.
    pub async fn search(&self, query: &str) -> Result<Vec<TabEntry>> {
        let Some(snapshot) = self.client.get_all_tabs().await? else {
            debug!("index snapshot unavailable; returning no results");
            return Ok(Vec::new());
        };
        Ok(filter_snapshot(snapshot, query))
    }
}
