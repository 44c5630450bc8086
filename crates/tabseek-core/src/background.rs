//! Single background service: the sole writer of the index and the RPC responder.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{Result, TabSeekError};
use crate::host::{ContentMessenger, HostEvent, ScriptHost, TabHost};
use crate::index_store::TabIndexStore;
use crate::models::{IndexSnapshot, SyncReport, TabId, TransitionOutcome};
use crate::rpc::{
    BackgroundRequest, BackgroundResponse, ContentCommand, Envelope, ShortcutCommand,
    decode_request,
};
use crate::synchronizer::TabSynchronizer;

/// What handling one [`HostEvent`] amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Installed(SyncReport),
    Transition(TransitionOutcome),
    /// Search toggle pushed into the content context of this tab.
    CommandDelivered(TabId),
    Responded,
    Ignored,
}

pub struct BackgroundService {
    tabs: Arc<dyn TabHost>,
    messenger: Arc<dyn ContentMessenger>,
    sync: Arc<TabSynchronizer>,
    config: SyncConfig,
}

impl std::fmt::Debug for BackgroundService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundService")
            .field("sync", &self.sync)
            .finish_non_exhaustive()
    }
}

impl BackgroundService {
    #[must_use]
    pub fn new(
        tabs: Arc<dyn TabHost>,
        scripts: Arc<dyn ScriptHost>,
        messenger: Arc<dyn ContentMessenger>,
        index: TabIndexStore,
        config: SyncConfig,
    ) -> Self {
        let sync = TabSynchronizer::new(Arc::clone(&tabs), scripts, index, config);
        Self {
            tabs,
            messenger,
            sync: Arc::new(sync),
            config,
        }
    }

    #[must_use]
    pub fn synchronizer(&self) -> &TabSynchronizer {
        &self.sync
    }

    #[must_use]
    pub fn index(&self) -> &TabIndexStore {
        self.sync.index()
    }

    /// Bounded host event channel sized from config.
    #[must_use]
    pub fn event_channel(&self) -> (mpsc::Sender<HostEvent>, mpsc::Receiver<HostEvent>) {
        mpsc::channel(self.config.event_queue_capacity)
    }

    /// Handles one event to completion.
    pub async fn handle_event(&self, event: HostEvent) -> Result<EventOutcome> {
        debug!(kind = event.kind(), "host event");
        match event {
            HostEvent::Installed => Ok(EventOutcome::Installed(self.sync.install_window().await?)),
            HostEvent::TabUpdated {
                tab_id,
                change,
                tab,
            } => Ok(self
                .sync
                .tab_updated(tab_id, &change, &tab)
                .await?
                .map_or(EventOutcome::Ignored, EventOutcome::Transition)),
            HostEvent::TabRemoved { tab_id } => {
                Ok(EventOutcome::Transition(self.sync.removed(tab_id).await?))
            }
            HostEvent::Command(name) => self.handle_command(&name).await,
            HostEvent::Message(envelope) => self.handle_message(envelope).await,
        }
    }

    /// Consumes events in delivery order until every sender is dropped.
    ///
    /// Navigation transitions are claimed in order on this loop; their extraction and
    /// commit run on spawned tasks so a later removal is never stuck behind a slow page.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<HostEvent>) {
        let mut inflight = JoinSet::new();
        while let Some(event) = events.recv().await {
            reap_finished(&mut inflight);
            if let HostEvent::TabUpdated {
                tab_id,
                change,
                tab,
            } = &event
                && change.is_complete()
                && tab.id == *tab_id
            {
                match self.sync.begin(tab).await {
                    Ok(Some(pending)) => {
                        let service = Arc::clone(&self);
                        inflight.spawn(async move {
                            let tab_id = pending.tab_id();
                            if let Err(err) = service.sync.complete(pending).await {
                                warn!(tab_id = %tab_id, "tab transition failed: {err}");
                            }
                        });
                    }
                    Ok(None) => {}
                    Err(err) => warn!(tab_id = %tab_id, "tab transition failed: {err}"),
                }
                continue;
            }

            let kind = event.kind();
            if let Err(err) = self.handle_event(event).await {
                warn!(kind, "host event failed: {err}");
            }
        }
        while inflight.join_next().await.is_some() {}
        info!("background event channel closed");
    }

    async fn handle_command(&self, name: &str) -> Result<EventOutcome> {
        info!(command = name, "command received");
        let Some(command) = ShortcutCommand::parse(name) else {
            debug!(command = name, "ignoring unknown command");
            return Ok(EventOutcome::Ignored);
        };
        match command {
            ShortcutCommand::Search => match self.toggle_search().await {
                Ok(tab_id) => Ok(EventOutcome::CommandDelivered(tab_id)),
                Err(TabSeekError::MissingActiveTab) => {
                    debug!("no active tab in focused window; search toggle skipped");
                    Ok(EventOutcome::Ignored)
                }
                Err(err) => {
                    warn!("search toggle not delivered: {err}");
                    Ok(EventOutcome::Ignored)
                }
            },
        }
    }

    async fn toggle_search(&self) -> Result<TabId> {
        let active = self
            .tabs
            .active_tab()
            .await?
            .ok_or(TabSeekError::MissingActiveTab)?;
        self.messenger
            .send_to_tab(active.id, ContentCommand::SearchHandler)
            .await?;
        Ok(active.id)
    }

    async fn handle_message(&self, envelope: Envelope) -> Result<EventOutcome> {
        let request = match decode_request(&envelope.payload) {
            Ok(request) => request,
            Err(err) => {
                debug!(sender = ?envelope.sender, "dropping message without reply: {err}");
                return Ok(EventOutcome::Ignored);
            }
        };
        let response = match self.respond_to(&request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(action = request.action(), "request failed; no reply sent: {err}");
                return Ok(EventOutcome::Ignored);
            }
        };
        if !envelope.respond(response.into_value()?) {
            debug!(action = request.action(), "requester stopped waiting");
        }
        Ok(EventOutcome::Responded)
    }

    async fn respond_to(&self, request: &BackgroundRequest) -> Result<BackgroundResponse> {
        match request {
            BackgroundRequest::GetAllTabsFromLocalStorage => {
                Ok(BackgroundResponse::Tabs(self.window_snapshot().await?))
            }
            BackgroundRequest::MoveToTab { tab } => {
                self.tabs.activate_tab(tab.id).await?;
                Ok(BackgroundResponse::Ack)
            }
        }
    }

    /// Index entries for exactly the tabs open in the focused window.
    pub async fn window_snapshot(&self) -> Result<IndexSnapshot> {
        let ids = self
            .tabs
            .query_window_tabs()
            .await?
            .into_iter()
            .map(|tab| tab.id)
            .collect::<Vec<_>>();
        self.index().get(&ids).await
    }
}

/// Joins every transition task that already finished. Returns how many were joined.
fn reap_finished(inflight: &mut JoinSet<()>) -> usize {
    let mut joined = 0;
    while let Some(result) = inflight.try_join_next() {
        if let Err(err) = result {
            warn!("tab transition task aborted: {err}");
        }
        joined += 1;
    }
    joined
}
