//! WebSocket implementation of the realtime backend
//!
//! One socket per virtual client, split into a reader task and a writer task
//! communicating over bounded channels. Requests that expect a `phx_reply`
//! (joins, presence tracks, broadcast pushes, leaves) park a oneshot waiter
//! in a pending map keyed by the frame ref; the reader task resolves it.

use crate::config::EndpointConfig;
use crate::constants::{ACK_TIMEOUT, CHANNEL_BUFFER_SIZE, HEARTBEAT_INTERVAL, JOIN_TIMEOUT};
use crate::errors::{ErrorContext, Result, StampedeError};
use crate::realtime::protocol::{self, Envelope};
use crate::realtime::{
    BroadcastChannel, BroadcastMessage, PresenceChannel, PresenceEvent, PresencePayload,
    RealtimeBackend, RealtimeConnection, broadcast_topic, presence_topic,
};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::connect_async;
use tracing::{debug, error, warn};
use url::Url;

/// Backend that opens one realtime WebSocket per client connection
#[derive(Debug, Default)]
pub struct SocketBackend;

impl SocketBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RealtimeBackend for SocketBackend {
    async fn connect(&self, credentials: &EndpointConfig) -> Result<Box<dyn RealtimeConnection>> {
        let url = realtime_socket_url(credentials)?;
        let connection = SocketConnection::open(&url).await?;
        Ok(Box::new(connection))
    }
}

/// Derive the realtime socket URL from the configured endpoint.
///
/// Accepts ws/wss URLs as-is and rewrites http/https project URLs to their
/// realtime socket path. The api key rides as a query parameter.
pub fn realtime_socket_url(credentials: &EndpointConfig) -> Result<Url> {
    let mut url = Url::parse(&credentials.url)?;

    let scheme = match url.scheme() {
        "ws" | "wss" => None,
        "http" => Some("ws"),
        "https" => Some("wss"),
        other => {
            return Err(StampedeError::config(format!(
                "Unsupported endpoint scheme '{}'",
                other
            )));
        }
    };
    if let Some(scheme) = scheme {
        url.set_scheme(scheme)
            .map_err(|_| StampedeError::config("Failed to rewrite endpoint scheme"))?;
    }

    if url.path() == "/" || url.path().is_empty() {
        url.set_path("/realtime/v1/websocket");
    }

    url.query_pairs_mut()
        .append_pair("apikey", &credentials.api_key)
        .append_pair("vsn", "1.0.0");

    Ok(url)
}

/// State shared between the connection handle, its channels, and its tasks
struct SocketShared {
    out_tx: mpsc::Sender<Envelope>,
    pending: Mutex<HashMap<String, oneshot::Sender<bool>>>,
    routes: Mutex<HashMap<String, TopicRoute>>,
    next_ref: AtomicU64,
}

#[derive(Default)]
struct TopicRoute {
    broadcast_tx: Option<mpsc::Sender<BroadcastMessage>>,
    presence_tx: Option<mpsc::Sender<PresenceEvent>>,
}

pub struct SocketConnection {
    shared: Arc<SocketShared>,
    tasks: Vec<JoinHandle<()>>,
}

impl SocketConnection {
    async fn open(url: &Url) -> Result<Self> {
        let (ws_stream, _response) = connect_async(url.as_str())
            .await
            .with_transport_context(&format!("Failed to connect to realtime endpoint at {}", url))?;

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::channel::<Envelope>(CHANNEL_BUFFER_SIZE);

        let shared = Arc::new(SocketShared {
            out_tx,
            pending: Mutex::new(HashMap::new()),
            routes: Mutex::new(HashMap::new()),
            next_ref: AtomicU64::new(1),
        });

        // Reader task: routes replies to waiters and channel events to subscribers
        let reader_shared = Arc::clone(&shared);
        let reader = tokio::spawn(async move {
            while let Some(message) = ws_stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        handle_incoming(&reader_shared, text.as_str()).await;
                    }
                    Ok(Message::Close(_)) => {
                        debug!("Realtime socket received close frame");
                        break;
                    }
                    Err(e) => {
                        error!("Realtime socket error: {}", e);
                        break;
                    }
                    _ => {
                        // Ignore binary, ping and pong frames
                    }
                }
            }
            // Drop all subscriber senders so listeners drain and stop
            reader_shared.routes.lock().await.clear();
            reader_shared.pending.lock().await.clear();
        });

        // Writer task: serializes envelopes onto the socket
        let writer = tokio::spawn(async move {
            while let Some(envelope) = out_rx.recv().await {
                let json = match serde_json::to_string(&envelope) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize outbound frame: {}", e);
                        continue;
                    }
                };
                if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                    error!("Failed to send realtime frame: {}", e);
                    break;
                }
            }
            let _ = ws_sink.close().await;
        });

        // Heartbeat task keeps the server from reaping idle sockets
        let heartbeat_shared = Arc::clone(&shared);
        let heartbeat = tokio::spawn(async move {
            let mut timer = tokio::time::interval(HEARTBEAT_INTERVAL);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                timer.tick().await;
                let mut envelope = Envelope::heartbeat();
                envelope.reference = Some(next_reference(&heartbeat_shared));
                if heartbeat_shared.out_tx.send(envelope).await.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            shared,
            tasks: vec![reader, writer, heartbeat],
        })
    }
}

fn next_reference(shared: &SocketShared) -> String {
    shared.next_ref.fetch_add(1, Ordering::Relaxed).to_string()
}

async fn handle_incoming(shared: &SocketShared, raw: &str) {
    let envelope: Envelope = match serde_json::from_str(raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Dropping unparseable realtime frame: {}", e);
            return;
        }
    };

    match envelope.event.as_str() {
        protocol::PHX_REPLY => {
            if let Some(reference) = envelope.reference {
                // Heartbeat replies have no waiter; ignore unknown refs
                if let Some(waiter) = shared.pending.lock().await.remove(&reference) {
                    let _ = waiter.send(Envelope::reply_is_ok(&envelope.payload));
                }
            }
        }
        protocol::BROADCAST_EVENT => {
            let routes = shared.routes.lock().await;
            if let Some(tx) = routes
                .get(&envelope.topic)
                .and_then(|r| r.broadcast_tx.as_ref())
            {
                if let Some((event, payload)) = protocol::parse_broadcast_payload(&envelope.payload)
                {
                    // Lossy under backpressure; a slow listener must not stall the socket
                    let _ = tx.try_send(BroadcastMessage { event, payload });
                }
            }
        }
        protocol::PRESENCE_STATE_EVENT => {
            deliver_presence(shared, &envelope.topic, PresenceEvent::Sync).await;
        }
        protocol::PRESENCE_DIFF_EVENT => {
            let (joins, leaves) = protocol::parse_presence_diff(&envelope.payload);
            if joins {
                deliver_presence(shared, &envelope.topic, PresenceEvent::Join).await;
            }
            if leaves {
                deliver_presence(shared, &envelope.topic, PresenceEvent::Leave).await;
            }
        }
        protocol::PHX_ERROR | protocol::PHX_CLOSE => {
            debug!("Channel {} closed by server ({})", envelope.topic, envelope.event);
            shared.routes.lock().await.remove(&envelope.topic);
        }
        _ => {
            debug!("Ignoring realtime event '{}'", envelope.event);
        }
    }
}

async fn deliver_presence(shared: &SocketShared, topic: &str, event: PresenceEvent) {
    let routes = shared.routes.lock().await;
    if let Some(tx) = routes.get(topic).and_then(|r| r.presence_tx.as_ref()) {
        let _ = tx.try_send(event);
    }
}

/// Send a frame that expects a `phx_reply` and wait for the acknowledgement
async fn request(
    shared: &SocketShared,
    mut envelope: Envelope,
    timeout: Duration,
    what: &str,
) -> Result<()> {
    let reference = next_reference(shared);
    envelope.reference = Some(reference.clone());

    let (tx, rx) = oneshot::channel();
    shared.pending.lock().await.insert(reference.clone(), tx);

    if shared.out_tx.send(envelope).await.is_err() {
        shared.pending.lock().await.remove(&reference);
        return Err(StampedeError::transport(format!(
            "{} failed: connection closed",
            what
        )));
    }

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(true)) => Ok(()),
        Ok(Ok(false)) => Err(StampedeError::subscription(format!(
            "{} rejected by server",
            what
        ))),
        Ok(Err(_)) => Err(StampedeError::transport(format!(
            "{} failed: connection closed before reply",
            what
        ))),
        Err(_) => {
            shared.pending.lock().await.remove(&reference);
            Err(StampedeError::subscription(format!("{} timed out", what)))
        }
    }
}

#[async_trait]
impl RealtimeConnection for SocketConnection {
    async fn join_presence(
        &mut self,
        channel_id: &str,
        self_key: &str,
    ) -> Result<Box<dyn PresenceChannel>> {
        let topic = format!("realtime:{}", presence_topic(channel_id));

        let (presence_tx, presence_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        self.shared
            .routes
            .lock()
            .await
            .entry(topic.clone())
            .or_default()
            .presence_tx = Some(presence_tx);

        let join = Envelope::join(&topic, self_key);
        if let Err(e) = request(&self.shared, join, JOIN_TIMEOUT, "presence join").await {
            self.shared.routes.lock().await.remove(&topic);
            return Err(e);
        }

        Ok(Box::new(SocketPresenceChannel {
            shared: Arc::clone(&self.shared),
            topic,
            updates: Some(presence_rx),
        }))
    }

    async fn join_broadcast(&mut self, channel_id: &str) -> Result<Box<dyn BroadcastChannel>> {
        let topic = format!("realtime:{}", broadcast_topic(channel_id));

        let (broadcast_tx, broadcast_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        self.shared
            .routes
            .lock()
            .await
            .entry(topic.clone())
            .or_default()
            .broadcast_tx = Some(broadcast_tx);

        // The broadcast channel needs no presence key; reuse the join config
        let join = Envelope::join(&topic, "");
        if let Err(e) = request(&self.shared, join, JOIN_TIMEOUT, "broadcast join").await {
            self.shared.routes.lock().await.remove(&topic);
            return Err(e);
        }

        Ok(Box::new(SocketBroadcastChannel {
            shared: Arc::clone(&self.shared),
            topic,
            messages: Some(broadcast_rx),
        }))
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.shared.routes.lock().await.clear();
        self.shared.pending.lock().await.clear();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        Ok(())
    }
}

impl Drop for SocketConnection {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

struct SocketPresenceChannel {
    shared: Arc<SocketShared>,
    topic: String,
    updates: Option<mpsc::Receiver<PresenceEvent>>,
}

#[async_trait]
impl PresenceChannel for SocketPresenceChannel {
    async fn announce(&mut self, payload: &PresencePayload) -> Result<()> {
        let track = Envelope::track(&self.topic, payload)?;
        request(&self.shared, track, ACK_TIMEOUT, "presence track").await
    }

    fn updates(&mut self) -> Option<mpsc::Receiver<PresenceEvent>> {
        self.updates.take()
    }

    async fn leave(&mut self) -> Result<()> {
        self.shared.routes.lock().await.remove(&self.topic);
        request(
            &self.shared,
            Envelope::leave(&self.topic),
            ACK_TIMEOUT,
            "presence leave",
        )
        .await
    }
}

struct SocketBroadcastChannel {
    shared: Arc<SocketShared>,
    topic: String,
    messages: Option<mpsc::Receiver<BroadcastMessage>>,
}

#[async_trait]
impl BroadcastChannel for SocketBroadcastChannel {
    async fn send(&mut self, event: &str, payload: serde_json::Value) -> Result<()> {
        let push = Envelope::broadcast(&self.topic, event, payload);
        request(&self.shared, push, ACK_TIMEOUT, "broadcast send").await
    }

    fn messages(&mut self) -> Option<mpsc::Receiver<BroadcastMessage>> {
        self.messages.take()
    }

    async fn leave(&mut self) -> Result<()> {
        self.shared.routes.lock().await.remove(&self.topic);
        request(
            &self.shared,
            Envelope::leave(&self.topic),
            ACK_TIMEOUT,
            "broadcast leave",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(url: &str) -> EndpointConfig {
        EndpointConfig {
            url: url.to_string(),
            api_key: "anon-key".to_string(),
        }
    }

    #[test]
    fn https_project_url_becomes_realtime_socket_url() {
        let url = realtime_socket_url(&credentials("https://proj.supabase.co")).expect("valid");
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.path(), "/realtime/v1/websocket");
        let query: Vec<_> = url.query_pairs().collect();
        assert!(query.iter().any(|(k, v)| k == "apikey" && v == "anon-key"));
        assert!(query.iter().any(|(k, v)| k == "vsn" && v == "1.0.0"));
    }

    #[test]
    fn explicit_ws_url_keeps_its_path() {
        let url =
            realtime_socket_url(&credentials("wss://proj.supabase.co/realtime/v1/websocket"))
                .expect("valid");
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.path(), "/realtime/v1/websocket");
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        assert!(realtime_socket_url(&credentials("ftp://example.com")).is_err());
    }
}
