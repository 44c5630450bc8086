use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, watch};

use crate::error::{Result, TabSeekError};
use crate::models::{TabDescriptor, TabId, TabUpdateChange, is_eligible_url};
use crate::rpc::ContentCommand;

use super::{ContentMessenger, HostEvent, PageDocument, PageScript, ScriptHost, TabHost};

/// One tab of a serialized browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTab {
    pub id: TabId,
    #[serde(default = "default_window_id")]
    pub window_id: i64,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub fav_icon_url: String,
    #[serde(default)]
    pub body_text: String,
    #[serde(default)]
    pub active: bool,
    /// The host refuses injection into this tab even on an http(s) url.
    #[serde(default)]
    pub restricted: bool,
}

impl SessionTab {
    fn descriptor(&self) -> TabDescriptor {
        TabDescriptor {
            id: self.id,
            url: self.url.clone(),
            title: self.title.clone(),
            fav_icon_url: self.fav_icon_url.clone(),
        }
    }
}

/// Serialized browser session used to seed a [`SimulatedBrowser`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFixture {
    #[serde(default = "default_window_id")]
    pub focused_window: i64,
    #[serde(default)]
    pub tabs: Vec<SessionTab>,
}

impl Default for SessionFixture {
    fn default() -> Self {
        Self {
            focused_window: default_window_id(),
            tabs: Vec::new(),
        }
    }
}

impl SessionFixture {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut raw = serde_json::to_string_pretty(self)?;
        raw.push('\n');
        std::fs::write(path, raw)?;
        Ok(())
    }
}

const fn default_window_id() -> i64 {
    1
}

#[derive(Debug, Default)]
struct BrowserState {
    focused_window: i64,
    tabs: BTreeMap<TabId, SessionTab>,
    next_id: i64,
    delivered: Vec<(TabId, ContentCommand)>,
    activations: Vec<TabId>,
}

impl BrowserState {
    fn window_tabs(&self) -> impl Iterator<Item = &SessionTab> {
        self.tabs
            .values()
            .filter(move |tab| tab.window_id == self.focused_window)
    }

    fn tab_mut(&mut self, tab_id: TabId) -> Result<&mut SessionTab> {
        self.tabs
            .get_mut(&tab_id)
            .ok_or_else(|| TabSeekError::NotFound(format!("tab {tab_id}")))
    }
}

/// In-memory browser host: windows, tabs, page text and injection policy.
///
/// Mutations return the [`HostEvent`] the real host would deliver so callers decide when
/// the background sees it.
#[derive(Clone)]
pub struct SimulatedBrowser {
    state: Arc<Mutex<BrowserState>>,
    gate: Arc<watch::Sender<bool>>,
    held: Arc<Notify>,
}

impl std::fmt::Debug for SimulatedBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedBrowser").finish_non_exhaustive()
    }
}

impl Default for SimulatedBrowser {
    fn default() -> Self {
        Self::from_fixture(SessionFixture::default())
    }
}

impl SimulatedBrowser {
    #[must_use]
    pub fn from_fixture(fixture: SessionFixture) -> Self {
        let next_id = fixture
            .tabs
            .iter()
            .map(|tab| tab.id.get())
            .max()
            .unwrap_or(0)
            + 1;
        let tabs = fixture.tabs.into_iter().map(|tab| (tab.id, tab)).collect();
        let (gate, _) = watch::channel(false);
        Self {
            state: Arc::new(Mutex::new(BrowserState {
                focused_window: fixture.focused_window,
                tabs,
                next_id,
                delivered: Vec::new(),
                activations: Vec::new(),
            })),
            gate: Arc::new(gate),
            held: Arc::new(Notify::new()),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut BrowserState) -> Result<T>) -> Result<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| TabSeekError::mutex_poisoned("browser"))?;
        f(&mut state)
    }

    pub fn to_fixture(&self) -> Result<SessionFixture> {
        self.with_state(|state| {
            Ok(SessionFixture {
                focused_window: state.focused_window,
                tabs: state.tabs.values().cloned().collect(),
            })
        })
    }

    /// Opens a tab with a fresh id in the focused window and loads `url`.
    pub fn open_tab(&self, url: &str, title: &str, body_text: &str) -> Result<HostEvent> {
        let id = self.with_state(|state| {
            let id = TabId::new(state.next_id);
            state.next_id += 1;
            Ok(id)
        })?;
        self.open_tab_with_id(id, url, title, body_text)
    }

    /// Opens a tab under an explicit id, e.g. to reproduce host id reuse.
    pub fn open_tab_with_id(
        &self,
        id: TabId,
        url: &str,
        title: &str,
        body_text: &str,
    ) -> Result<HostEvent> {
        self.with_state(|state| {
            if state.tabs.contains_key(&id) {
                return Err(TabSeekError::Validation(format!("tab {id} already open")));
            }
            let tab = SessionTab {
                id,
                window_id: state.focused_window,
                url: url.to_string(),
                title: title.to_string(),
                fav_icon_url: String::new(),
                body_text: body_text.to_string(),
                active: false,
                restricted: false,
            };
            let event = HostEvent::TabUpdated {
                tab_id: id,
                change: TabUpdateChange::complete(),
                tab: tab.descriptor(),
            };
            state.next_id = state.next_id.max(id.get() + 1);
            state.tabs.insert(id, tab);
            Ok(event)
        })
    }

    /// Loads a new page in an existing tab and reports navigation completion.
    pub fn navigate(&self, tab_id: TabId, url: &str, title: &str, body_text: &str) -> Result<HostEvent> {
        self.with_state(|state| {
            let tab = state.tab_mut(tab_id)?;
            tab.url = url.to_string();
            tab.title = title.to_string();
            tab.body_text = body_text.to_string();
            Ok(HostEvent::TabUpdated {
                tab_id,
                change: TabUpdateChange::complete(),
                tab: tab.descriptor(),
            })
        })
    }

    /// Mutates visible text without a navigation event.
    pub fn mutate_page(&self, tab_id: TabId, body_text: &str) -> Result<()> {
        self.with_state(|state| {
            state.tab_mut(tab_id)?.body_text = body_text.to_string();
            Ok(())
        })
    }

    pub fn close_tab(&self, tab_id: TabId) -> Result<HostEvent> {
        self.with_state(|state| {
            state
                .tabs
                .remove(&tab_id)
                .ok_or_else(|| TabSeekError::NotFound(format!("tab {tab_id}")))?;
            Ok(HostEvent::TabRemoved { tab_id })
        })
    }

    pub fn set_active(&self, tab_id: TabId) -> Result<()> {
        self.with_state(|state| {
            let window_id = state.tab_mut(tab_id)?.window_id;
            for tab in state.tabs.values_mut() {
                if tab.window_id == window_id {
                    tab.active = tab.id == tab_id;
                }
            }
            Ok(())
        })
    }

    pub fn set_restricted(&self, tab_id: TabId, restricted: bool) -> Result<()> {
        self.with_state(|state| {
            state.tab_mut(tab_id)?.restricted = restricted;
            Ok(())
        })
    }

    pub fn focus_window(&self, window_id: i64) -> Result<()> {
        self.with_state(|state| {
            state.focused_window = window_id;
            Ok(())
        })
    }

    /// Commands pushed to content contexts so far.
    pub fn delivered_commands(&self) -> Result<Vec<(TabId, ContentCommand)>> {
        self.with_state(|state| Ok(state.delivered.clone()))
    }

    pub fn activations(&self) -> Result<Vec<TabId>> {
        self.with_state(|state| Ok(state.activations.clone()))
    }

    /// Holds every subsequent extraction open until [`Self::release_extractions`].
    pub fn hold_extractions(&self) {
        self.gate.send_replace(true);
    }

    pub fn release_extractions(&self) {
        self.gate.send_replace(false);
    }

    /// Resolves once a held extraction has read its page.
    pub async fn wait_for_held_extraction(&self) {
        self.held.notified().await;
    }

    async fn pass_gate(&self) {
        let mut rx = self.gate.subscribe();
        if !*rx.borrow_and_update() {
            return;
        }
        self.held.notify_one();
        while *rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}

#[async_trait]
impl TabHost for SimulatedBrowser {
    async fn query_window_tabs(&self) -> Result<Vec<TabDescriptor>> {
        self.with_state(|state| Ok(state.window_tabs().map(SessionTab::descriptor).collect()))
    }

    async fn active_tab(&self) -> Result<Option<TabDescriptor>> {
        self.with_state(|state| {
            Ok(state
                .window_tabs()
                .find(|tab| tab.active)
                .map(SessionTab::descriptor))
        })
    }

    async fn get_tab(&self, tab_id: TabId) -> Result<Option<TabDescriptor>> {
        self.with_state(|state| Ok(state.tabs.get(&tab_id).map(SessionTab::descriptor)))
    }

    async fn activate_tab(&self, tab_id: TabId) -> Result<()> {
        self.set_active(tab_id)?;
        self.with_state(|state| {
            state.activations.push(tab_id);
            Ok(())
        })
    }
}

#[async_trait]
impl ScriptHost for SimulatedBrowser {
    async fn execute_script(&self, tab_id: TabId, script: &dyn PageScript) -> Result<String> {
        let page = self.with_state(|state| {
            let tab = state
                .tabs
                .get(&tab_id)
                .ok_or_else(|| TabSeekError::NotFound(format!("tab {tab_id}")))?;
            if tab.restricted || !is_eligible_url(&tab.url) {
                return Err(TabSeekError::InjectionDenied {
                    tab_id,
                    reason: format!("cannot run {} on {}", script.name(), tab.url),
                });
            }
            Ok(PageDocument {
                body_text: tab.body_text.clone(),
            })
        })?;
        self.pass_gate().await;
        Ok(script.run(&page))
    }
}

#[async_trait]
impl ContentMessenger for SimulatedBrowser {
    async fn send_to_tab(&self, tab_id: TabId, command: ContentCommand) -> Result<()> {
        self.with_state(|state| {
            if !state.tabs.contains_key(&tab_id) {
                return Err(TabSeekError::NotFound(format!("tab {tab_id}")));
            }
            state.delivered.push((tab_id, command));
            Ok(())
        })
    }
}
