//! Virtual client: one simulated participant
//!
//! A virtual client owns its connection lifecycle, presence updates and
//! message exchange, and records its own metrics. Failures never propagate
//! past the client boundary; they are recorded as data and the run goes on.

use crate::common::ClientId;
use crate::config::Config;
use crate::constants::{
    ACTIVITY_SECTIONS, INITIAL_SECTION, LISTENER_DRAIN_TIMEOUT, USER_ACTION_EVENT,
};
use crate::errors::{Result, StampedeError};
use crate::metrics::client::{ClientMetrics, ClientMetricsSnapshot, ErrorKind};
use crate::realtime::{
    BroadcastChannel, PresenceChannel, PresencePayload, RealtimeBackend, RealtimeConnection,
};

use chrono::Utc;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Terminal: a failed client never joins the activity phase
    Failed,
}

/// One simulated participant
pub struct VirtualClient {
    id: ClientId,
    display_name: String,
    config: Config,
    backend: Arc<dyn RealtimeBackend>,
    state: ConnectionState,
    connection: Option<Box<dyn RealtimeConnection>>,
    presence: Option<Box<dyn PresenceChannel>>,
    broadcast: Option<Box<dyn BroadcastChannel>>,
    metrics: ClientMetrics,
    rng: SmallRng,
    listeners: Vec<JoinHandle<()>>,
}

impl VirtualClient {
    pub fn new(id: ClientId, config: Config, backend: Arc<dyn RealtimeBackend>) -> Self {
        let rng = match config.behavior.seed {
            Some(seed) => SmallRng::seed_from_u64(seed.wrapping_add(id.get() as u64)),
            None => SmallRng::from_entropy(),
        };
        Self {
            display_name: format!("TestUser_{}", id.get()),
            metrics: ClientMetrics::new(id),
            id,
            config,
            backend,
            state: ConnectionState::Disconnected,
            connection: None,
            presence: None,
            broadcast: None,
            rng,
            listeners: Vec::new(),
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Connect, join both channels and announce initial presence.
    ///
    /// Returns `false` on failure instead of erroring: a failed connect is a
    /// normal outcome of a load test, tallied in `failed_connections`. The
    /// elapsed time is recorded either way (time-to-failure for failures).
    pub async fn connect(&mut self) -> bool {
        self.metrics.mark_started();
        self.state = ConnectionState::Connecting;
        let started = Instant::now();

        match self.establish().await {
            Ok(()) => {
                self.metrics.connection_time_ms = elapsed_ms(started);
                self.state = ConnectionState::Connected;
                debug!(
                    "Client {} connected in {}ms",
                    self.id, self.metrics.connection_time_ms
                );
                true
            }
            Err(e) => {
                self.metrics.connection_time_ms = elapsed_ms(started);
                self.state = ConnectionState::Failed;
                self.metrics.record_error(ErrorKind::Connection, e.to_string());
                warn!("Client {} failed to connect: {}", self.id, e);
                false
            }
        }
    }

    async fn establish(&mut self) -> Result<()> {
        let mut connection = self.backend.connect(&self.config.endpoint).await?;

        let mut presence = connection
            .join_presence(&self.config.channel_id, &self.id.key())
            .await?;
        presence
            .announce(&self.presence_payload(INITIAL_SECTION))
            .await?;

        let mut broadcast = connection.join_broadcast(&self.config.channel_id).await?;

        self.spawn_presence_listener(&mut presence);
        self.spawn_broadcast_listener(&mut broadcast);

        self.connection = Some(connection);
        self.presence = Some(presence);
        self.broadcast = Some(broadcast);
        Ok(())
    }

    fn spawn_presence_listener(&mut self, presence: &mut Box<dyn PresenceChannel>) {
        if let Some(mut updates) = presence.updates() {
            let counter = self.metrics.presence_counter();
            self.listeners.push(tokio::spawn(async move {
                while updates.recv().await.is_some() {
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            }));
        }
    }

    fn spawn_broadcast_listener(&mut self, broadcast: &mut Box<dyn BroadcastChannel>) {
        if let Some(mut messages) = broadcast.messages() {
            let counter = self.metrics.received_counter();
            let log_messages = self.config.output.log_messages;
            let id = self.id;
            self.listeners.push(tokio::spawn(async move {
                while let Some(message) = messages.recv().await {
                    counter.fetch_add(1, Ordering::Relaxed);
                    if log_messages {
                        debug!("Client {} received message: {}", id, message.event);
                    }
                }
            }));
        }
    }

    /// One activity turn: re-announce presence from a random section and
    /// sometimes send a broadcast. No-op unless connected; failures are
    /// recorded per iteration and never abort the caller.
    pub async fn simulate_activity(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }

        let section = ACTIVITY_SECTIONS[self.rng.gen_range(0..ACTIVITY_SECTIONS.len())];
        let send_broadcast = self.rng.gen_range(0.0..1.0) < self.config.behavior.broadcast_probability;

        if let Err(e) = self.perform_activity(section, send_broadcast).await {
            self.metrics.record_error(ErrorKind::Activity, e.to_string());
            debug!("Client {} activity error: {}", self.id, e);
        }
    }

    async fn perform_activity(&mut self, section: &str, send_broadcast: bool) -> Result<()> {
        let payload = self.presence_payload(section);
        let presence = self
            .presence
            .as_mut()
            .ok_or_else(|| StampedeError::orchestration("connected client has no presence channel"))?;
        presence.announce(&payload).await?;
        self.metrics.record_sent();

        if send_broadcast {
            let action = json!({
                "participantId": self.id.key(),
                "action": "answer_submitted",
                "timestamp": Utc::now().timestamp_millis(),
            });
            let broadcast = self.broadcast.as_mut().ok_or_else(|| {
                StampedeError::orchestration("connected client has no broadcast channel")
            })?;
            broadcast.send(USER_ACTION_EVENT, action).await?;
            self.metrics.record_sent();
        }

        Ok(())
    }

    /// Leave both channels and tear down the transport. Teardown never fails
    /// the run; failures are recorded and swallowed.
    pub async fn disconnect(&mut self) {
        if let Some(mut presence) = self.presence.take() {
            if let Err(e) = presence.leave().await {
                self.metrics
                    .record_error(ErrorKind::Disconnection, e.to_string());
            }
        }
        if let Some(mut broadcast) = self.broadcast.take() {
            if let Err(e) = broadcast.leave().await {
                self.metrics
                    .record_error(ErrorKind::Disconnection, e.to_string());
            }
        }
        if let Some(mut connection) = self.connection.take() {
            if let Err(e) = connection.disconnect().await {
                self.metrics
                    .record_error(ErrorKind::Disconnection, e.to_string());
            }
        }

        // Let the listeners drain buffered deliveries so the final snapshot
        // includes every message that arrived before the channels closed.
        for task in self.listeners.drain(..) {
            let abort = task.abort_handle();
            if tokio::time::timeout(LISTENER_DRAIN_TIMEOUT, task).await.is_err() {
                abort.abort();
            }
        }

        if self.state == ConnectionState::Connected {
            self.state = ConnectionState::Disconnected;
        }
        self.metrics.mark_ended();
        debug!("Client {} disconnected", self.id);
    }

    /// Immutable metrics copy, safe to read after this client's turn completed
    pub fn metrics(&self) -> ClientMetricsSnapshot {
        self.metrics.snapshot()
    }

    fn presence_payload(&self, section: &str) -> PresencePayload {
        PresencePayload {
            participant_id: self.id.key(),
            display_name: self.display_name.clone(),
            current_section: section.to_string(),
            last_active_at: Utc::now().timestamp_millis(),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
