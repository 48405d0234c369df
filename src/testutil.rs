//! Scripted realtime backend for unit tests
//!
//! Lets tests inject connect/activity/teardown failures per participant key,
//! add deterministic latency, and inspect the calls each client made.

use crate::config::EndpointConfig;
use crate::errors::{Result, StampedeError};
use crate::realtime::{
    BroadcastChannel, BroadcastMessage, PresenceChannel, PresenceEvent, PresencePayload,
    RealtimeBackend, RealtimeConnection,
};

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Clone, Default)]
pub(crate) struct MockBackend {
    state: Arc<MockState>,
}

#[derive(Default)]
struct MockState {
    fail_connect: Mutex<HashSet<String>>,
    fail_activity: Mutex<HashSet<String>>,
    fail_leave: Mutex<HashSet<String>>,
    connect_delay: Mutex<Duration>,
    activity_delay: Mutex<Duration>,
    announces: Mutex<Vec<String>>,
    broadcasts: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Participant keys whose connect attempt is rejected
    pub fn failing_connect_for(self, keys: &[&str]) -> Self {
        let mut set = self.state.fail_connect.lock().unwrap();
        set.extend(keys.iter().map(|k| k.to_string()));
        drop(set);
        self
    }

    /// Participant keys whose activity announces fail (connect still works)
    pub fn failing_activity_for(self, keys: &[&str]) -> Self {
        let mut set = self.state.fail_activity.lock().unwrap();
        set.extend(keys.iter().map(|k| k.to_string()));
        drop(set);
        self
    }

    /// Participant keys whose channel leaves fail during teardown
    pub fn failing_leave_for(self, keys: &[&str]) -> Self {
        let mut set = self.state.fail_leave.lock().unwrap();
        set.extend(keys.iter().map(|k| k.to_string()));
        drop(set);
        self
    }

    /// Latency of every connect attempt (success or failure)
    pub fn with_connect_delay(self, delay: Duration) -> Self {
        *self.state.connect_delay.lock().unwrap() = delay;
        self
    }

    /// Latency of every activity announce (the initial connect announce is instant)
    pub fn with_activity_delay(self, delay: Duration) -> Self {
        *self.state.activity_delay.lock().unwrap() = delay;
        self
    }

    pub fn into_backend(self) -> Arc<dyn RealtimeBackend> {
        Arc::new(self)
    }

    /// Keys of every successful announce, in call order (initial ones first,
    /// since ramp-up is sequential)
    pub fn announces(&self) -> Vec<String> {
        self.state.announces.lock().unwrap().clone()
    }

    /// Sender keys of every broadcast, in call order
    pub fn broadcasts(&self) -> Vec<String> {
        self.state.broadcasts.lock().unwrap().clone()
    }
}

#[async_trait]
impl RealtimeBackend for MockBackend {
    async fn connect(&self, _credentials: &EndpointConfig) -> Result<Box<dyn RealtimeConnection>> {
        Ok(Box::new(MockConnection {
            state: Arc::clone(&self.state),
            key: None,
        }))
    }
}

struct MockConnection {
    state: Arc<MockState>,
    key: Option<String>,
}

#[async_trait]
impl RealtimeConnection for MockConnection {
    async fn join_presence(
        &mut self,
        _channel_id: &str,
        self_key: &str,
    ) -> Result<Box<dyn PresenceChannel>> {
        let delay = *self.state.connect_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.state.fail_connect.lock().unwrap().contains(self_key) {
            return Err(StampedeError::subscription(format!(
                "presence join rejected for {}",
                self_key
            )));
        }

        self.key = Some(self_key.to_string());
        Ok(Box::new(MockPresenceChannel {
            state: Arc::clone(&self.state),
            key: self_key.to_string(),
            announced_once: false,
            updates: Some(closed_channel()),
        }))
    }

    async fn join_broadcast(&mut self, _channel_id: &str) -> Result<Box<dyn BroadcastChannel>> {
        let key = self.key.clone().unwrap_or_else(|| "unknown".to_string());
        Ok(Box::new(MockBroadcastChannel {
            state: Arc::clone(&self.state),
            key,
            messages: Some(closed_channel()),
        }))
    }

    async fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }
}

struct MockPresenceChannel {
    state: Arc<MockState>,
    key: String,
    announced_once: bool,
    updates: Option<mpsc::Receiver<PresenceEvent>>,
}

#[async_trait]
impl PresenceChannel for MockPresenceChannel {
    async fn announce(&mut self, _payload: &PresencePayload) -> Result<()> {
        if self.announced_once {
            let delay = *self.state.activity_delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if self.state.fail_activity.lock().unwrap().contains(&self.key) {
                return Err(StampedeError::transport(format!(
                    "announce failed for {}",
                    self.key
                )));
            }
        } else {
            self.announced_once = true;
        }

        self.state.announces.lock().unwrap().push(self.key.clone());
        Ok(())
    }

    fn updates(&mut self) -> Option<mpsc::Receiver<PresenceEvent>> {
        self.updates.take()
    }

    async fn leave(&mut self) -> Result<()> {
        if self.state.fail_leave.lock().unwrap().contains(&self.key) {
            return Err(StampedeError::transport(format!(
                "presence leave failed for {}",
                self.key
            )));
        }
        Ok(())
    }
}

struct MockBroadcastChannel {
    state: Arc<MockState>,
    key: String,
    messages: Option<mpsc::Receiver<BroadcastMessage>>,
}

#[async_trait]
impl BroadcastChannel for MockBroadcastChannel {
    async fn send(&mut self, _event: &str, _payload: serde_json::Value) -> Result<()> {
        self.state.broadcasts.lock().unwrap().push(self.key.clone());
        Ok(())
    }

    fn messages(&mut self) -> Option<mpsc::Receiver<BroadcastMessage>> {
        self.messages.take()
    }

    async fn leave(&mut self) -> Result<()> {
        if self.state.fail_leave.lock().unwrap().contains(&self.key) {
            return Err(StampedeError::transport(format!(
                "broadcast leave failed for {}",
                self.key
            )));
        }
        Ok(())
    }
}

/// A receiver whose sender is already gone; listeners drain it instantly
fn closed_channel<T>() -> mpsc::Receiver<T> {
    let (tx, rx) = mpsc::channel(1);
    drop(tx);
    rx
}
