//! In-process loopback backend
//!
//! Routes presence events and broadcasts between the clients of one run
//! through an in-memory hub, with the same delivery semantics as the real
//! backend: broadcasts reach every subscriber except the sender, presence
//! announcements reach every member. Selected via the `memory://` endpoint
//! scheme for dry runs, and used by the integration tests.

use crate::config::EndpointConfig;
use crate::constants::CHANNEL_BUFFER_SIZE;
use crate::errors::Result;
use crate::realtime::{
    BroadcastChannel, BroadcastMessage, PresenceChannel, PresenceEvent, PresencePayload,
    RealtimeBackend, RealtimeConnection, broadcast_topic, presence_topic,
};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc};

/// Loopback backend; every connection made through one instance shares a hub
#[derive(Debug, Default)]
pub struct LocalBackend {
    hub: Arc<Hub>,
    next_member: AtomicU64,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RealtimeBackend for LocalBackend {
    async fn connect(&self, _credentials: &EndpointConfig) -> Result<Box<dyn RealtimeConnection>> {
        let member = self.next_member.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(LocalConnection {
            hub: Arc::clone(&self.hub),
            member,
        }))
    }
}

#[derive(Debug, Default)]
struct Hub {
    topics: Mutex<HashMap<String, Topic>>,
}

#[derive(Debug, Default)]
struct Topic {
    broadcast: Vec<(u64, mpsc::Sender<BroadcastMessage>)>,
    presence: Vec<(u64, mpsc::Sender<PresenceEvent>)>,
}

impl Hub {
    async fn register_presence(&self, topic: &str, member: u64) -> mpsc::Receiver<PresenceEvent> {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        // A new member first sees a sync of the current channel state
        let _ = tx.send(PresenceEvent::Sync).await;
        let mut topics = self.topics.lock().await;
        topics
            .entry(topic.to_string())
            .or_default()
            .presence
            .push((member, tx));
        rx
    }

    async fn register_broadcast(&self, topic: &str, member: u64) -> mpsc::Receiver<BroadcastMessage> {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let mut topics = self.topics.lock().await;
        topics
            .entry(topic.to_string())
            .or_default()
            .broadcast
            .push((member, tx));
        rx
    }

    async fn publish_presence(&self, topic: &str, event: PresenceEvent) {
        let senders: Vec<_> = {
            let topics = self.topics.lock().await;
            topics
                .get(topic)
                .map(|t| t.presence.iter().map(|(_, tx)| tx.clone()).collect())
                .unwrap_or_default()
        };
        for tx in senders {
            let _ = tx.send(event).await;
        }
    }

    async fn publish_broadcast(&self, topic: &str, sender: u64, message: BroadcastMessage) {
        let receivers: Vec<_> = {
            let topics = self.topics.lock().await;
            topics
                .get(topic)
                .map(|t| {
                    t.broadcast
                        .iter()
                        .filter(|(member, _)| *member != sender)
                        .map(|(_, tx)| tx.clone())
                        .collect()
                })
                .unwrap_or_default()
        };
        for tx in receivers {
            let _ = tx.send(message.clone()).await;
        }
    }

    async fn unregister_presence(&self, topic: &str, member: u64) {
        let mut topics = self.topics.lock().await;
        if let Some(t) = topics.get_mut(topic) {
            t.presence.retain(|(m, _)| *m != member);
        }
    }

    async fn unregister_broadcast(&self, topic: &str, member: u64) {
        let mut topics = self.topics.lock().await;
        if let Some(t) = topics.get_mut(topic) {
            t.broadcast.retain(|(m, _)| *m != member);
        }
    }
}

struct LocalConnection {
    hub: Arc<Hub>,
    member: u64,
}

#[async_trait]
impl RealtimeConnection for LocalConnection {
    async fn join_presence(
        &mut self,
        channel_id: &str,
        _self_key: &str,
    ) -> Result<Box<dyn PresenceChannel>> {
        let topic = presence_topic(channel_id);
        let updates = self.hub.register_presence(&topic, self.member).await;
        Ok(Box::new(LocalPresenceChannel {
            hub: Arc::clone(&self.hub),
            topic,
            member: self.member,
            updates: Some(updates),
        }))
    }

    async fn join_broadcast(&mut self, channel_id: &str) -> Result<Box<dyn BroadcastChannel>> {
        let topic = broadcast_topic(channel_id);
        let messages = self.hub.register_broadcast(&topic, self.member).await;
        Ok(Box::new(LocalBroadcastChannel {
            hub: Arc::clone(&self.hub),
            topic,
            member: self.member,
            messages: Some(messages),
        }))
    }

    async fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }
}

struct LocalPresenceChannel {
    hub: Arc<Hub>,
    topic: String,
    member: u64,
    updates: Option<mpsc::Receiver<PresenceEvent>>,
}

#[async_trait]
impl PresenceChannel for LocalPresenceChannel {
    async fn announce(&mut self, _payload: &PresencePayload) -> Result<()> {
        self.hub
            .publish_presence(&self.topic, PresenceEvent::Join)
            .await;
        Ok(())
    }

    fn updates(&mut self) -> Option<mpsc::Receiver<PresenceEvent>> {
        self.updates.take()
    }

    async fn leave(&mut self) -> Result<()> {
        self.hub.unregister_presence(&self.topic, self.member).await;
        self.hub
            .publish_presence(&self.topic, PresenceEvent::Leave)
            .await;
        Ok(())
    }
}

struct LocalBroadcastChannel {
    hub: Arc<Hub>,
    topic: String,
    member: u64,
    messages: Option<mpsc::Receiver<BroadcastMessage>>,
}

#[async_trait]
impl BroadcastChannel for LocalBroadcastChannel {
    async fn send(&mut self, event: &str, payload: serde_json::Value) -> Result<()> {
        self.hub
            .publish_broadcast(
                &self.topic,
                self.member,
                BroadcastMessage {
                    event: event.to_string(),
                    payload,
                },
            )
            .await;
        Ok(())
    }

    fn messages(&mut self) -> Option<mpsc::Receiver<BroadcastMessage>> {
        self.messages.take()
    }

    async fn leave(&mut self) -> Result<()> {
        self.hub.unregister_broadcast(&self.topic, self.member).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn credentials() -> EndpointConfig {
        EndpointConfig {
            url: "memory://".to_string(),
            api_key: String::new(),
        }
    }

    #[tokio::test]
    async fn broadcasts_reach_everyone_except_the_sender() {
        let backend = LocalBackend::new();
        let mut a = backend.connect(&credentials()).await.expect("connect");
        let mut b = backend.connect(&credentials()).await.expect("connect");

        let mut a_chan = a.join_broadcast("evt").await.expect("join");
        let mut b_chan = b.join_broadcast("evt").await.expect("join");
        let mut a_rx = a_chan.messages().expect("first take");
        let mut b_rx = b_chan.messages().expect("first take");

        a_chan.send("user_action", json!({"n": 1})).await.expect("send");

        let received = b_rx.recv().await.expect("delivered");
        assert_eq!(received.event, "user_action");
        assert_eq!(received.payload["n"], 1);

        // The sender must not see its own message
        assert!(a_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn presence_announcements_fan_out_to_members() {
        let backend = LocalBackend::new();
        let mut a = backend.connect(&credentials()).await.expect("connect");
        let mut b = backend.connect(&credentials()).await.expect("connect");

        let mut a_chan = a.join_presence("evt", "user_1").await.expect("join");
        let mut b_chan = b.join_presence("evt", "user_2").await.expect("join");
        let mut a_rx = a_chan.updates().expect("first take");
        let mut b_rx = b_chan.updates().expect("first take");

        // Each member starts with a sync of channel state
        assert_eq!(a_rx.recv().await, Some(PresenceEvent::Sync));
        assert_eq!(b_rx.recv().await, Some(PresenceEvent::Sync));

        let payload = PresencePayload {
            participant_id: "user_1".to_string(),
            display_name: "TestUser_1".to_string(),
            current_section: "quiz".to_string(),
            last_active_at: 0,
        };
        a_chan.announce(&payload).await.expect("announce");

        assert_eq!(a_rx.recv().await, Some(PresenceEvent::Join));
        assert_eq!(b_rx.recv().await, Some(PresenceEvent::Join));
    }

    #[tokio::test]
    async fn leaving_closes_the_member_stream() {
        let backend = LocalBackend::new();
        let mut a = backend.connect(&credentials()).await.expect("connect");
        let mut chan = a.join_broadcast("evt").await.expect("join");
        let mut rx = chan.messages().expect("first take");

        chan.leave().await.expect("leave");
        // The hub dropped its sender, so the stream terminates
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn receivers_can_only_be_taken_once() {
        let backend = LocalBackend::new();
        let mut a = backend.connect(&credentials()).await.expect("connect");
        let mut chan = a.join_broadcast("evt").await.expect("join");
        assert!(chan.messages().is_some());
        assert!(chan.messages().is_none());
    }
}
