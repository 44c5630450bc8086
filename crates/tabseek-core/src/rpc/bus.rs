use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::config::RpcConfig;
use crate::error::{Result, TabSeekError};
use crate::host::{ContentMessenger, HostEvent};
use crate::models::{IndexSnapshot, TabId};

use super::protocol::{BackgroundRequest, ContentCommand, TabRef, decode_content_command};

const CONTENT_QUEUE_CAPACITY: usize = 16;

/// A content to background message plus its optional single-use reply slot.
#[derive(Debug)]
pub struct Envelope {
    pub sender: Option<TabId>,
    pub payload: Value,
    reply: Option<oneshot::Sender<Value>>,
}

impl Envelope {
    #[must_use]
    pub fn new(sender: Option<TabId>, payload: Value) -> (Self, oneshot::Receiver<Value>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sender,
                payload,
                reply: Some(tx),
            },
            rx,
        )
    }

    /// Fire-and-forget message; the sender does not wait for a response.
    #[must_use]
    pub fn one_way(sender: Option<TabId>, payload: Value) -> Self {
        Self {
            sender,
            payload,
            reply: None,
        }
    }

    /// Sends the response; returns false when nobody is waiting any more.
    pub fn respond(mut self, value: Value) -> bool {
        match self.reply.take() {
            Some(reply) => reply.send(value).is_ok(),
            None => false,
        }
    }
}

/// Content-side request handle. Applies its own timeout since the protocol has none.
#[derive(Debug, Clone)]
pub struct RpcClient {
    sender: Option<TabId>,
    outbound: mpsc::Sender<HostEvent>,
    timeout: Duration,
}

impl RpcClient {
    #[must_use]
    pub fn new(outbound: mpsc::Sender<HostEvent>, sender: Option<TabId>, config: &RpcConfig) -> Self {
        Self {
            sender,
            outbound,
            timeout: config.timeout,
        }
    }

    /// Sends a raw payload and waits for one response.
    ///
    /// `Ok(None)` covers every "no answer" case: unrecognized action, reply dropped,
    /// timeout, or a background that is no longer listening.
    pub async fn request_raw(&self, payload: Value) -> Result<Option<Value>> {
        let (envelope, reply) = Envelope::new(self.sender, payload);
        if self.outbound.send(HostEvent::Message(envelope)).await.is_err() {
            warn!("background context is not listening; request dropped");
            return Ok(None);
        }
        match tokio::time::timeout(self.timeout, reply).await {
            Ok(Ok(value)) => Ok(Some(value)),
            Ok(Err(_)) => {
                debug!("request closed without a response");
                Ok(None)
            }
            Err(_) => {
                debug!(timeout_ms = self.timeout.as_millis(), "request timed out");
                Ok(None)
            }
        }
    }

    pub async fn request(&self, request: &BackgroundRequest) -> Result<Option<Value>> {
        self.request_raw(serde_json::to_value(request)?).await
    }

    pub async fn get_all_tabs(&self) -> Result<Option<IndexSnapshot>> {
        let Some(value) = self
            .request(&BackgroundRequest::GetAllTabsFromLocalStorage)
            .await?
        else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_value(value)?))
    }

    /// Returns whether the background acknowledged the switch.
    pub async fn move_to_tab(&self, tab_id: TabId) -> Result<bool> {
        let acked = self
            .request(&BackgroundRequest::MoveToTab {
                tab: TabRef { id: tab_id },
            })
            .await?
            .is_some();
        Ok(acked)
    }
}

/// Receiving half of a content context: commands pushed by the background.
#[derive(Debug)]
pub struct ContentEndpoint {
    tab_id: TabId,
    inbound: mpsc::Receiver<Value>,
}

impl ContentEndpoint {
    #[must_use]
    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }

    /// Next recognized command; unrecognized payloads are skipped.
    pub async fn next_command(&mut self) -> Option<ContentCommand> {
        while let Some(payload) = self.inbound.recv().await {
            match decode_content_command(&payload) {
                Ok(command) => return Some(command),
                Err(err) => debug!(tab_id = %self.tab_id, "ignoring push payload: {err}"),
            }
        }
        None
    }

    /// Non-blocking variant of [`Self::next_command`].
    pub fn try_next_command(&mut self) -> Option<ContentCommand> {
        while let Ok(payload) = self.inbound.try_recv() {
            if let Ok(command) = decode_content_command(&payload) {
                return Some(command);
            }
        }
        None
    }
}

/// In-process [`ContentMessenger`] routing pushes to registered content endpoints.
#[derive(Debug, Clone, Default)]
pub struct ContentRouter {
    routes: Arc<Mutex<HashMap<TabId, mpsc::Sender<Value>>>>,
}

impl ContentRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a content context to `tab_id`, replacing any previous one.
    pub fn register(&self, tab_id: TabId) -> Result<ContentEndpoint> {
        let (tx, rx) = mpsc::channel(CONTENT_QUEUE_CAPACITY);
        self.routes
            .lock()
            .map_err(|_| TabSeekError::mutex_poisoned("content routes"))?
            .insert(tab_id, tx);
        Ok(ContentEndpoint {
            tab_id,
            inbound: rx,
        })
    }

    pub fn unregister(&self, tab_id: TabId) -> Result<()> {
        self.routes
            .lock()
            .map_err(|_| TabSeekError::mutex_poisoned("content routes"))?
            .remove(&tab_id);
        Ok(())
    }
}

#[async_trait]
impl ContentMessenger for ContentRouter {
    async fn send_to_tab(&self, tab_id: TabId, command: ContentCommand) -> Result<()> {
        let route = self
            .routes
            .lock()
            .map_err(|_| TabSeekError::mutex_poisoned("content routes"))?
            .get(&tab_id)
            .cloned()
            .ok_or_else(|| TabSeekError::NotFound(format!("no content context in tab {tab_id}")))?;
        route
            .send(serde_json::to_value(command)?)
            .await
            .map_err(|_| TabSeekError::HostUnavailable(format!("content context {tab_id} closed")))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn config(timeout_ms: u64) -> RpcConfig {
        RpcConfig {
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    #[tokio::test]
    async fn dropped_reply_yields_no_response() {
        let (tx, mut rx) = mpsc::channel(4);
        let client = RpcClient::new(tx, Some(TabId::new(1)), &config(1_000));
        let responder = tokio::spawn(async move {
            if let Some(HostEvent::Message(envelope)) = rx.recv().await {
                assert_eq!(envelope.sender, Some(TabId::new(1)));
                drop(envelope);
            }
        });
        let response = client
            .request_raw(json!({"action": "nope"}))
            .await
            .expect("request");
        assert_eq!(response, None);
        responder.await.expect("responder");
    }

    #[tokio::test(start_paused = true)]
    async fn silent_background_times_out() {
        let (tx, _rx) = mpsc::channel(4);
        let client = RpcClient::new(tx, None, &config(50));
        let response = client.get_all_tabs().await.expect("request");
        assert_eq!(response, None);
    }

    #[tokio::test]
    async fn closed_background_yields_no_response() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let client = RpcClient::new(tx, None, &config(50));
        assert!(!client.move_to_tab(TabId::new(3)).await.expect("request"));
    }

    #[tokio::test]
    async fn responded_envelope_reaches_client() {
        let (tx, mut rx) = mpsc::channel(4);
        let client = RpcClient::new(tx, None, &config(1_000));
        tokio::spawn(async move {
            if let Some(HostEvent::Message(envelope)) = rx.recv().await {
                envelope.respond(Value::Null);
            }
        });
        assert!(client.move_to_tab(TabId::new(3)).await.expect("request"));
    }

    #[tokio::test]
    async fn router_delivers_to_registered_endpoint_only() {
        let router = ContentRouter::new();
        let mut endpoint = router.register(TabId::new(2)).expect("register");
        router
            .send_to_tab(TabId::new(2), ContentCommand::SearchHandler)
            .await
            .expect("send");
        assert_eq!(endpoint.next_command().await, Some(ContentCommand::SearchHandler));

        let err = router
            .send_to_tab(TabId::new(9), ContentCommand::SearchHandler)
            .await
            .expect_err("no route");
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn unregistered_tab_stops_receiving_pushes() {
        let router = ContentRouter::new();
        let mut endpoint = router.register(TabId::new(4)).expect("register");
        router
            .routes
            .lock()
            .expect("routes")
            .get(&TabId::new(4))
            .cloned()
            .expect("route")
            .send(json!({"action": "unknown"}))
            .await
            .expect("raw push");
        assert_eq!(endpoint.try_next_command(), None);

        router.unregister(TabId::new(4)).expect("unregister");
        let err = router
            .send_to_tab(TabId::new(4), ContentCommand::SearchHandler)
            .await
            .expect_err("route removed");
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(endpoint.next_command().await, None);
    }

    #[test]
    fn one_way_envelope_has_nobody_to_answer() {
        let envelope = Envelope::one_way(None, json!({"action": "moveToTab"}));
        assert!(!envelope.respond(Value::Null));
    }
}
