//! Overlay state machine for the content context. Rendering is left to the embedder; this
//! tracks visibility, the query, the result rows and keyboard activation.

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::models::{TabEntry, TabId};
use crate::rpc::ContentCommand;
use crate::search::SearchEngine;
use crate::text::truncate_text;

const MAX_TITLE_CHARS: usize = 80;

/// Keys the overlay reacts to while visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKey {
    Enter,
    /// Alt plus a digit key; `1` is the first result.
    AltDigit(u8),
}

/// One rendered result line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRow {
    /// 1-based, matching the Alt+digit shortcut.
    pub index: usize,
    pub title: String,
    pub fav_icon_url: String,
    pub tab_id: TabId,
}

impl ResultRow {
    fn from_entry(position: usize, entry: &TabEntry) -> Self {
        Self {
            index: position + 1,
            title: truncate_text(&entry.title, MAX_TITLE_CHARS),
            fav_icon_url: entry.fav_icon_url.clone(),
            tab_id: entry.id,
        }
    }
}

#[derive(Debug)]
pub struct OverlayController {
    engine: SearchEngine,
    visible: bool,
    query: String,
    results: Vec<TabEntry>,
}

impl OverlayController {
    #[must_use]
    pub fn new(engine: SearchEngine) -> Self {
        Self {
            engine,
            visible: false,
            query: String::new(),
            results: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub fn rows(&self) -> Vec<ResultRow> {
        self.results
            .iter()
            .enumerate()
            .map(|(position, entry)| ResultRow::from_entry(position, entry))
            .collect()
    }

    /// Shows a fresh overlay or tears down the visible one. Returns the new visibility.
    pub fn toggle(&mut self) -> bool {
        if self.visible {
            self.dismiss();
        } else {
            self.visible = true;
        }
        self.visible
    }

    pub fn dismiss(&mut self) {
        self.visible = false;
        self.query.clear();
        self.results.clear();
    }

    pub fn handle_command(&mut self, command: ContentCommand) -> bool {
        match command {
            ContentCommand::SearchHandler => self.toggle(),
        }
    }

    /// Clicks inside the overlay are handled by the embedder and never reach here.
    pub fn click_outside(&mut self) {
        if self.visible {
            self.dismiss();
        }
    }

    /// Records the input value and refreshes results; empty input only clears them.
    pub async fn input(&mut self, query: &str) -> Result<Vec<ResultRow>> {
        if !self.visible {
            return Ok(Vec::new());
        }
        query.clone_into(&mut self.query);
        if query.is_empty() {
            self.results.clear();
            return Ok(Vec::new());
        }
        self.results = self.engine.search(query).await?;
        debug!(query, results = self.results.len(), "overlay results refreshed");
        Ok(self.rows())
    }

    pub async fn handle_key(&mut self, key: OverlayKey) -> Result<Option<TabId>> {
        if !self.visible {
            return Ok(None);
        }
        match key {
            OverlayKey::Enter => self.activate(0).await,
            OverlayKey::AltDigit(0) => Ok(None),
            OverlayKey::AltDigit(digit) => self.activate(usize::from(digit) - 1).await,
        }
    }

    /// Hides the overlay and asks the background to switch to the result at `position`.
    ///
    /// Returns the requested tab id, or `None` when no result sits at `position`.
    pub async fn activate(&mut self, position: usize) -> Result<Option<TabId>> {
        let Some(tab_id) = self.results.get(position).map(|entry| entry.id) else {
            return Ok(None);
        };
        self.dismiss();
        if !self.engine.client().move_to_tab(tab_id).await? {
            debug!(tab_id = %tab_id, "tab switch not acknowledged");
        }
        Ok(Some(tab_id))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{Value, json};
    use tokio::sync::mpsc;

    use super::*;
    use crate::config::RpcConfig;
    use crate::host::HostEvent;
    use crate::rpc::RpcClient;

    /// Answers every request: snapshot for reads, null for switches. Records switch ids.
    fn responder(snapshot: Value) -> (RpcClient, mpsc::UnboundedReceiver<Value>) {
        let (tx, mut rx) = mpsc::channel::<HostEvent>(8);
        let (moves_tx, moves_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let HostEvent::Message(envelope) = event else {
                    continue;
                };
                if envelope.payload["action"] == "moveToTab" {
                    let _ = moves_tx.send(envelope.payload["tab"]["id"].clone());
                    envelope.respond(Value::Null);
                } else {
                    envelope.respond(snapshot.clone());
                }
            }
        });
        let config = RpcConfig {
            timeout: Duration::from_secs(1),
        };
        (RpcClient::new(tx, Some(TabId::new(1)), &config), moves_rx)
    }

    fn snapshot() -> Value {
        json!({
            "1": {"id": 1, "url": "http://a", "title": "Rust Book", "favIconUrl": "http://a/i.png", "tabText": "rust ownership"},
            "2": {"id": 2, "url": "http://b", "title": "Cats", "tabText": "cute cats"},
            "5": {"id": 5, "url": "http://c", "title": "Rust by Example"}
        })
    }

    fn overlay() -> (OverlayController, mpsc::UnboundedReceiver<Value>) {
        let (client, moves) = responder(snapshot());
        (OverlayController::new(SearchEngine::new(client)), moves)
    }

    #[tokio::test]
    async fn search_handler_command_toggles_visibility() {
        let (mut overlay, _) = overlay();
        assert!(overlay.handle_command(ContentCommand::SearchHandler));
        assert!(!overlay.handle_command(ContentCommand::SearchHandler));
        assert!(!overlay.is_visible());
    }

    #[tokio::test]
    async fn input_renders_numbered_rows() {
        let (mut overlay, _) = overlay();
        overlay.toggle();
        let rows = overlay.input("rust").await.expect("input");
        assert_eq!(
            rows.iter().map(|row| (row.index, row.tab_id.get())).collect::<Vec<_>>(),
            vec![(1, 1), (2, 5)]
        );
        assert_eq!(rows[0].fav_icon_url, "http://a/i.png");
    }

    #[tokio::test]
    async fn empty_input_clears_results_without_searching() {
        let (mut overlay, _) = overlay();
        overlay.toggle();
        overlay.input("cat").await.expect("input");
        assert_eq!(overlay.rows().len(), 1);
        assert!(overlay.input("").await.expect("clear").is_empty());
        assert!(overlay.rows().is_empty());
    }

    #[tokio::test]
    async fn enter_activates_first_result_and_hides() {
        let (mut overlay, mut moves) = overlay();
        overlay.toggle();
        overlay.input("rust").await.expect("input");
        let target = overlay.handle_key(OverlayKey::Enter).await.expect("enter");
        assert_eq!(target, Some(TabId::new(1)));
        assert!(!overlay.is_visible());
        assert_eq!(moves.recv().await, Some(json!(1)));
    }

    #[tokio::test]
    async fn alt_digit_activates_nth_result() {
        let (mut overlay, mut moves) = overlay();
        overlay.toggle();
        overlay.input("rust").await.expect("input");
        assert_eq!(
            overlay.handle_key(OverlayKey::AltDigit(0)).await.expect("zero"),
            None
        );
        assert_eq!(
            overlay.handle_key(OverlayKey::AltDigit(7)).await.expect("past end"),
            None
        );
        assert!(overlay.is_visible());
        assert_eq!(
            overlay.handle_key(OverlayKey::AltDigit(2)).await.expect("second"),
            Some(TabId::new(5))
        );
        assert_eq!(moves.recv().await, Some(json!(5)));
    }

    #[tokio::test]
    async fn click_outside_dismisses_and_resets() {
        let (mut overlay, _) = overlay();
        overlay.toggle();
        overlay.input("cats").await.expect("input");
        overlay.click_outside();
        assert!(!overlay.is_visible());
        assert_eq!(overlay.query(), "");
        assert!(overlay.rows().is_empty());
    }

    #[test]
    fn long_titles_are_truncated_in_rows() {
        let entry = TabEntry {
            id: TabId::new(3),
            url: "http://x".to_string(),
            title: "x".repeat(MAX_TITLE_CHARS + 5),
            fav_icon_url: String::new(),
            tab_text: None,
        };
        let row = ResultRow::from_entry(0, &entry);
        assert_eq!(row.index, 1);
        assert!(row.title.ends_with("..."));
        assert_eq!(row.title.chars().count(), MAX_TITLE_CHARS + 3);
    }
}
