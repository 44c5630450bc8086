//! Keeps the tab index aligned with tab lifecycle events.
//!
//! Every transition for a tab id runs in two short critical sections around the
//! extraction: the first bumps the tab generation and removes the old entry, the second
//! commits the new entry only if no later transition or removal bumped the generation in
//! between and the tab still shows the url that was extracted. Removal takes the same
//! per-tab lock, so it can never interleave with a commit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{Result, TabSeekError};
use crate::extractor::extract_tab_text;
use crate::host::{ScriptHost, TabHost};
use crate::index_store::TabIndexStore;
use crate::models::{
    SyncReport, TabDescriptor, TabEntry, TabId, TabSyncState, TabUpdateChange, TransitionOutcome,
};

/// Storage metadata key holding the finish time of the last install sync.
pub const LAST_INSTALL_SYNC_KEY: &str = "last_install_sync_at";

#[derive(Debug, Default)]
struct TabLedger {
    state: TabSyncState,
    generation: u64,
}

type LedgerSlot = Arc<tokio::sync::Mutex<TabLedger>>;

/// Result of the first critical section: the old entry is gone and `generation` owns the tab.
#[derive(Debug, Clone, Copy)]
struct Claim {
    generation: u64,
}

/// Extraction result waiting for its commit check.
#[derive(Debug)]
struct Extracted {
    claim: Claim,
    tab_text: Option<String>,
}

/// A claimed transition whose extraction has not run yet.
pub struct PendingTransition {
    slot: LedgerSlot,
    claim: Claim,
    tab: TabDescriptor,
}

impl std::fmt::Debug for PendingTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTransition")
            .field("tab_id", &self.tab.id)
            .field("generation", &self.claim.generation)
            .finish()
    }
}

impl PendingTransition {
    #[must_use]
    pub fn tab_id(&self) -> TabId {
        self.tab.id
    }
}

pub struct TabSynchronizer {
    tabs: Arc<dyn TabHost>,
    scripts: Arc<dyn ScriptHost>,
    index: TabIndexStore,
    config: SyncConfig,
    ledgers: Mutex<HashMap<TabId, LedgerSlot>>,
}

impl std::fmt::Debug for TabSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabSynchronizer")
            .field("index", &self.index)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TabSynchronizer {
    #[must_use]
    pub fn new(
        tabs: Arc<dyn TabHost>,
        scripts: Arc<dyn ScriptHost>,
        index: TabIndexStore,
        config: SyncConfig,
    ) -> Self {
        Self {
            tabs,
            scripts,
            index,
            config,
            ledgers: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn index(&self) -> &TabIndexStore {
        &self.index
    }

    fn slot(&self, tab_id: TabId) -> Result<LedgerSlot> {
        let mut ledgers = self
            .ledgers
            .lock()
            .map_err(|_| TabSeekError::mutex_poisoned("tab ledgers"))?;
        Ok(Arc::clone(ledgers.entry(tab_id).or_default()))
    }

    /// Forgets an untracked tab once no other task holds its slot.
    ///
    /// Slots are only handed out under the map lock, so a strong count of two (map plus
    /// `slot`) seen under that lock means nobody can still claim or commit through it.
    fn release(&self, tab_id: TabId, slot: LedgerSlot) -> Result<()> {
        let mut ledgers = self
            .ledgers
            .lock()
            .map_err(|_| TabSeekError::mutex_poisoned("tab ledgers"))?;
        let idle = ledgers.get(&tab_id).is_some_and(|current| {
            Arc::ptr_eq(current, &slot)
                && Arc::strong_count(&slot) == 2
                && slot
                    .try_lock()
                    .is_ok_and(|ledger| ledger.state == TabSyncState::Untracked)
        });
        if idle {
            ledgers.remove(&tab_id);
        }
        Ok(())
    }

    #[cfg(test)]
    fn tracked_ledgers(&self) -> Result<usize> {
        Ok(self
            .ledgers
            .lock()
            .map_err(|_| TabSeekError::mutex_poisoned("tab ledgers"))?
            .len())
    }

    pub async fn state_of(&self, tab_id: TabId) -> Result<TabSyncState> {
        let slot = self
            .ledgers
            .lock()
            .map_err(|_| TabSeekError::mutex_poisoned("tab ledgers"))?
            .get(&tab_id)
            .cloned();
        match slot {
            Some(slot) => Ok(slot.lock().await.state),
            None => Ok(TabSyncState::Untracked),
        }
    }

    /// Enumerates the focused window and runs the install transition for every tab, one at
    /// a time. Ineligible tabs lose any entry left from a navigation missed while offline.
    pub async fn install_window(&self) -> Result<SyncReport> {
        let mut report = SyncReport {
            started_at: Utc::now().to_rfc3339(),
            ..SyncReport::default()
        };
        let tabs = self.tabs.query_window_tabs().await?;
        report.enumerated = tabs.len();

        for tab in &tabs {
            let outcome = self.index_tab(tab).await?;
            report.record(outcome);
        }
        report.pruned = self.prune_stale().await?;

        report.finished_at = Utc::now().to_rfc3339();
        if let Err(err) = self
            .index
            .storage()
            .set_metadata(LAST_INSTALL_SYNC_KEY, &report.finished_at)
            .await
        {
            warn!("failed to record install sync time: {err}");
        }
        info!(
            enumerated = report.enumerated,
            indexed = report.indexed,
            pruned = report.pruned,
            "install sync finished"
        );
        Ok(report)
    }

    /// Handles an update event; only navigation completion triggers a transition.
    pub async fn tab_updated(
        &self,
        tab_id: TabId,
        change: &TabUpdateChange,
        tab: &TabDescriptor,
    ) -> Result<Option<TransitionOutcome>> {
        if !change.is_complete() {
            debug!(tab_id = %tab_id, "ignoring non-terminal tab update");
            return Ok(None);
        }
        if tab.id != tab_id {
            return Err(TabSeekError::Validation(format!(
                "update for tab {tab_id} carried descriptor for tab {}",
                tab.id
            )));
        }
        self.navigation_complete(tab).await.map(Some)
    }

    pub async fn navigation_complete(&self, tab: &TabDescriptor) -> Result<TransitionOutcome> {
        self.index_tab(tab).await
    }

    /// Deletes the entry whatever state the tab is in and invalidates in-flight work.
    pub async fn removed(&self, tab_id: TabId) -> Result<TransitionOutcome> {
        let slot = self.slot(tab_id)?;
        let mut ledger = slot.lock().await;
        ledger.generation += 1;
        self.index.remove(&[tab_id]).await?;
        ledger.state = TabSyncState::Untracked;
        drop(ledger);
        self.release(tab_id, slot)?;
        info!("Tab {tab_id}: removed from index");
        Ok(TransitionOutcome::Removed)
    }

    async fn index_tab(&self, tab: &TabDescriptor) -> Result<TransitionOutcome> {
        match self.begin(tab).await? {
            Some(pending) => self.complete(pending).await,
            None => Ok(TransitionOutcome::Skipped),
        }
    }

    /// First half of a navigation transition: claims the tab and drops its old entry.
    ///
    /// Returns `None` for ineligible urls, which end the transition right away. Callers
    /// that process events concurrently must await this in event order and may run
    /// [`Self::complete`] on a separate task.
    pub async fn begin(&self, tab: &TabDescriptor) -> Result<Option<PendingTransition>> {
        let slot = self.slot(tab.id)?;
        let claim = self.claim(&slot, tab.id).await?;

        if !tab.is_eligible() {
            settle(&slot, claim, TabSyncState::Untracked).await;
            self.release(tab.id, slot)?;
            debug!(tab_id = %tab.id, url = %tab.url, "ineligible url; tab left untracked");
            return Ok(None);
        }
        Ok(Some(PendingTransition {
            slot,
            claim,
            tab: tab.clone(),
        }))
    }

    /// Extracts page text and commits it unless the tab moved on in the meantime.
    pub async fn complete(&self, pending: PendingTransition) -> Result<TransitionOutcome> {
        let PendingTransition { slot, claim, tab } = pending;
        let extracted = self.extract(&tab, claim).await;
        let outcome = self.commit(&slot, &tab, extracted).await?;
        if outcome == TransitionOutcome::Discarded {
            self.release(tab.id, slot)?;
        }
        Ok(outcome)
    }

    async fn claim(&self, slot: &LedgerSlot, tab_id: TabId) -> Result<Claim> {
        let mut ledger = slot.lock().await;
        ledger.generation += 1;
        self.index.remove(&[tab_id]).await?;
        if ledger.state == TabSyncState::Indexed {
            debug!("Tab {tab_id}: removed stale entry before re-indexing");
        }
        ledger.state = TabSyncState::Indexing;
        Ok(Claim {
            generation: ledger.generation,
        })
    }

    async fn extract(&self, tab: &TabDescriptor, claim: Claim) -> Extracted {
        let tab_text = match extract_tab_text(self.scripts.as_ref(), tab.id).await {
            Ok(text) => Some(text),
            Err(err) if err.is_injection_denied() => {
                debug!(tab_id = %tab.id, "extraction denied; indexing title only: {err}");
                None
            }
            Err(err) => {
                warn!(tab_id = %tab.id, "extraction failed; indexing title only: {err}");
                None
            }
        };
        Extracted { claim, tab_text }
    }

    async fn commit(
        &self,
        slot: &LedgerSlot,
        tab: &TabDescriptor,
        extracted: Extracted,
    ) -> Result<TransitionOutcome> {
        let mut ledger = slot.lock().await;
        if ledger.generation != extracted.claim.generation {
            debug!(tab_id = %tab.id, "superseded while extracting; result dropped");
            return Ok(TransitionOutcome::Discarded);
        }
        if !self.still_showing(tab).await {
            ledger.state = TabSyncState::Untracked;
            debug!(tab_id = %tab.id, "tab closed or moved on while extracting; result dropped");
            return Ok(TransitionOutcome::Discarded);
        }

        let with_text = extracted.tab_text.is_some();
        self.index
            .put(TabEntry::from_descriptor(tab, extracted.tab_text))
            .await?;
        ledger.state = TabSyncState::Indexed;
        drop(ledger);
        info!("Tab {}: added to index", tab.id);
        Ok(TransitionOutcome::Indexed { with_text })
    }

    async fn still_showing(&self, tab: &TabDescriptor) -> bool {
        if !self.config.verify_liveness {
            return true;
        }
        match self.tabs.get_tab(tab.id).await {
            Ok(Some(current)) => current.url == tab.url,
            Ok(None) => false,
            Err(err) => {
                warn!(tab_id = %tab.id, "liveness check failed; committing anyway: {err}");
                true
            }
        }
    }

    /// Drops stored entries whose tab is closed or now shows an ineligible url.
    async fn prune_stale(&self) -> Result<usize> {
        let mut pruned = 0;
        for tab_id in self.index.list_ids().await? {
            match self.tabs.get_tab(tab_id).await {
                Ok(Some(tab)) if tab.is_eligible() => {}
                Ok(_) => {
                    self.removed(tab_id).await?;
                    pruned += 1;
                }
                Err(err) => warn!(tab_id = %tab_id, "liveness check failed during prune: {err}"),
            }
        }
        Ok(pruned)
    }
}

async fn settle(slot: &LedgerSlot, claim: Claim, state: TabSyncState) {
    let mut ledger = slot.lock().await;
    if ledger.generation == claim.generation {
        ledger.state = state;
    }
}
