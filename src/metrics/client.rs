//! Per-client metrics collection

use crate::common::ClientId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Where in a client's lifecycle an error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Connection,
    Activity,
    Disconnection,
}

/// One recorded client error
#[derive(Debug, Clone, Serialize)]
pub struct ClientError {
    pub kind: ErrorKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Metrics owned by one virtual client.
///
/// Everything here is mutated only by the owning client, except the two
/// counters fed by asynchronously delivered channel events; those are shared
/// with the client's listener tasks as atomics.
#[derive(Debug)]
pub struct ClientMetrics {
    pub client_id: ClientId,
    pub connection_time_ms: u64,
    pub messages_sent: u64,
    messages_received: Arc<AtomicU64>,
    presence_updates: Arc<AtomicU64>,
    pub errors: Vec<ClientError>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ClientMetrics {
    pub fn new(client_id: ClientId) -> Self {
        Self {
            client_id,
            connection_time_ms: 0,
            messages_sent: 0,
            messages_received: Arc::new(AtomicU64::new(0)),
            presence_updates: Arc::new(AtomicU64::new(0)),
            errors: Vec::new(),
            started_at: None,
            ended_at: None,
        }
    }

    /// Record a message or presence announcement sent by the owning client
    pub fn record_sent(&mut self) {
        self.messages_sent += 1;
    }

    /// Record an error without interrupting the run
    pub fn record_error(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.errors.push(ClientError {
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    /// Counter handle for the broadcast listener task
    pub fn received_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.messages_received)
    }

    /// Counter handle for the presence listener task
    pub fn presence_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.presence_updates)
    }

    pub fn mark_started(&mut self) {
        self.started_at = Some(Utc::now());
    }

    pub fn mark_ended(&mut self) {
        if self.ended_at.is_none() {
            self.ended_at = Some(Utc::now());
        }
    }

    /// Immutable copy, safe to read after the owning client's turn completed
    pub fn snapshot(&self) -> ClientMetricsSnapshot {
        ClientMetricsSnapshot {
            client_id: self.client_id.key(),
            connection_time_ms: self.connection_time_ms,
            messages_sent: self.messages_sent,
            messages_received: self.messages_received.load(Ordering::Relaxed),
            presence_updates: self.presence_updates.load(Ordering::Relaxed),
            error_count: self.errors.len() as u64,
            errors: self.errors.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

/// Frozen view of one client's metrics, embedded in reports
#[derive(Debug, Clone, Serialize)]
pub struct ClientMetricsSnapshot {
    pub client_id: String,
    pub connection_time_ms: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub presence_updates: u64,
    pub error_count: u64,
    pub errors: Vec<ClientError>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ClientMetricsSnapshot {
    /// Total traffic this client participated in
    pub fn total_messages(&self) -> u64 {
        self.messages_sent + self.messages_received
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_freezes_counters() {
        let mut metrics = ClientMetrics::new(ClientId::new(1));
        metrics.record_sent();
        metrics.record_sent();
        metrics.received_counter().fetch_add(3, Ordering::Relaxed);
        metrics.presence_counter().fetch_add(1, Ordering::Relaxed);
        metrics.record_error(ErrorKind::Activity, "announce failed");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.client_id, "user_1");
        assert_eq!(snapshot.messages_sent, 2);
        assert_eq!(snapshot.messages_received, 3);
        assert_eq!(snapshot.presence_updates, 1);
        assert_eq!(snapshot.error_count, 1);
        assert_eq!(snapshot.total_messages(), 5);
        assert_eq!(snapshot.errors[0].kind, ErrorKind::Activity);
    }

    #[test]
    fn mark_ended_is_write_once() {
        let mut metrics = ClientMetrics::new(ClientId::new(1));
        metrics.mark_ended();
        let first = metrics.ended_at;
        metrics.mark_ended();
        assert_eq!(metrics.ended_at, first);
    }

    #[test]
    fn error_kind_serializes_lowercase() {
        let json = serde_json::to_string(&ErrorKind::Disconnection).expect("serializes");
        assert_eq!(json, "\"disconnection\"");
    }
}
