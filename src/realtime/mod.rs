//! Realtime backend seam
//!
//! The orchestration core only ever talks to the pub/sub backend through the
//! traits in this module: connect, join a presence channel, announce state,
//! join a broadcast channel, send and receive messages, leave. Two
//! implementations exist: a WebSocket client speaking the Phoenix-style
//! channel protocol (`socket`) and an in-process loopback hub (`local`) for
//! dry runs and tests.

pub mod local;
pub mod protocol;
pub mod socket;

use crate::config::{Config, EndpointConfig};
use crate::errors::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Presence state a participant announces on its presence channel
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresencePayload {
    pub participant_id: String,
    pub display_name: String,
    pub current_section: String,
    /// Epoch milliseconds
    pub last_active_at: i64,
}

/// One inbound broadcast message
#[derive(Debug, Clone)]
pub struct BroadcastMessage {
    pub event: String,
    pub payload: serde_json::Value,
}

/// Presence notifications delivered to channel members
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceEvent {
    Sync,
    Join,
    Leave,
}

/// Entry point: one backend serves every client of a run
#[async_trait]
pub trait RealtimeBackend: Send + Sync {
    async fn connect(&self, credentials: &EndpointConfig) -> Result<Box<dyn RealtimeConnection>>;
}

/// One established connection, owned by a single virtual client
#[async_trait]
pub trait RealtimeConnection: Send {
    async fn join_presence(
        &mut self,
        channel_id: &str,
        self_key: &str,
    ) -> Result<Box<dyn PresenceChannel>>;

    async fn join_broadcast(&mut self, channel_id: &str) -> Result<Box<dyn BroadcastChannel>>;

    /// Tear down the transport. Channels should be left first.
    async fn disconnect(&mut self) -> Result<()>;
}

/// A joined presence channel
#[async_trait]
pub trait PresenceChannel: Send {
    /// Announce (or re-announce) this member's presence state
    async fn announce(&mut self, payload: &PresencePayload) -> Result<()>;

    /// Take the stream of presence notifications; yields `None` after the
    /// first call
    fn updates(&mut self) -> Option<mpsc::Receiver<PresenceEvent>>;

    async fn leave(&mut self) -> Result<()>;
}

/// A joined broadcast channel. Own sends are never delivered back.
#[async_trait]
pub trait BroadcastChannel: Send {
    async fn send(&mut self, event: &str, payload: serde_json::Value) -> Result<()>;

    /// Take the stream of inbound messages; yields `None` after the first call
    fn messages(&mut self) -> Option<mpsc::Receiver<BroadcastMessage>>;

    async fn leave(&mut self) -> Result<()>;
}

/// Presence topic for a logical event channel
pub fn presence_topic(channel_id: &str) -> String {
    format!("event-presence-{}", channel_id)
}

/// Broadcast topic for a logical event channel
pub fn broadcast_topic(channel_id: &str) -> String {
    format!("event-{}", channel_id)
}

/// Select the backend implementation for a config
pub fn backend_for(config: &Config) -> Arc<dyn RealtimeBackend> {
    if config.uses_local_backend() {
        Arc::new(local::LocalBackend::new())
    } else {
        Arc::new(socket::SocketBackend::new())
    }
}
