//! Reduction of all client metrics into summary statistics

use crate::metrics::run::RunMetrics;
use serde::Serialize;

/// Summary statistics derived once from a completed run, never mutated after
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub avg_connection_time_ms: f64,
    pub min_connection_time_ms: u64,
    pub max_connection_time_ms: u64,
    pub total_messages_sent: u64,
    pub total_messages_received: u64,
    pub total_presence_updates: u64,
    pub total_errors: u64,
    pub messages_per_second: f64,
    pub avg_messages_per_user: f64,
}

/// Pure reduction of a run's client metrics.
///
/// Connection times include failed attempts (time-to-failure), matching the
/// observed behavior of the system this tool measures capacity for. Every
/// division is guarded; empty runs yield zeros rather than NaN.
pub fn aggregate(metrics: &RunMetrics) -> Statistics {
    let users = &metrics.user_metrics;

    let total_messages_sent: u64 = users.iter().map(|m| m.messages_sent).sum();
    let total_messages_received: u64 = users.iter().map(|m| m.messages_received).sum();
    let total_presence_updates: u64 = users.iter().map(|m| m.presence_updates).sum();
    let total_errors: u64 = users.iter().map(|m| m.error_count).sum();
    let total_traffic = total_messages_sent + total_messages_received;

    let avg_connection_time_ms = if users.is_empty() {
        0.0
    } else {
        let total: u64 = users.iter().map(|m| m.connection_time_ms).sum();
        total as f64 / users.len() as f64
    };
    let min_connection_time_ms = users.iter().map(|m| m.connection_time_ms).min().unwrap_or(0);
    let max_connection_time_ms = users.iter().map(|m| m.connection_time_ms).max().unwrap_or(0);

    let duration_secs = metrics.duration_seconds();
    let messages_per_second = if duration_secs > 0.0 {
        total_traffic as f64 / duration_secs
    } else {
        0.0
    };

    let avg_messages_per_user = if metrics.total_users > 0 {
        total_traffic as f64 / metrics.total_users as f64
    } else {
        0.0
    };

    Statistics {
        avg_connection_time_ms,
        min_connection_time_ms,
        max_connection_time_ms,
        total_messages_sent,
        total_messages_received,
        total_presence_updates,
        total_errors,
        messages_per_second,
        avg_messages_per_user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ClientId;
    use crate::metrics::client::{ClientMetrics, ClientMetricsSnapshot};
    use chrono::{Duration, Utc};
    use std::sync::atomic::Ordering;

    fn snapshot(id: u32, connection_ms: u64, sent: u64, received: u64) -> ClientMetricsSnapshot {
        let mut metrics = ClientMetrics::new(ClientId::new(id));
        metrics.connection_time_ms = connection_ms;
        for _ in 0..sent {
            metrics.record_sent();
        }
        metrics.received_counter().fetch_add(received, Ordering::Relaxed);
        metrics.snapshot()
    }

    #[test]
    fn zero_users_yields_zeros_not_nan() {
        let metrics = RunMetrics::new(0);
        let stats = aggregate(&metrics);
        assert_eq!(stats.messages_per_second, 0.0);
        assert_eq!(stats.avg_messages_per_user, 0.0);
        assert_eq!(stats.avg_connection_time_ms, 0.0);
        assert_eq!(stats.min_connection_time_ms, 0);
        assert_eq!(stats.max_connection_time_ms, 0);
    }

    #[test]
    fn sums_and_extremes_cover_all_clients() {
        let mut metrics = RunMetrics::new(3);
        metrics.user_metrics = vec![
            snapshot(1, 120, 4, 6),
            snapshot(2, 80, 2, 3),
            snapshot(3, 250, 0, 0),
        ];

        let stats = aggregate(&metrics);
        assert_eq!(stats.total_messages_sent, 6);
        assert_eq!(stats.total_messages_received, 9);
        assert_eq!(stats.min_connection_time_ms, 80);
        assert_eq!(stats.max_connection_time_ms, 250);
        assert_eq!(stats.avg_connection_time_ms, 150.0);
        assert_eq!(stats.avg_messages_per_user, 5.0);
    }

    #[test]
    fn failed_connections_still_contribute_connection_time() {
        // A client that never connected still measured its time-to-failure.
        let mut metrics = RunMetrics::new(2);
        metrics.user_metrics = vec![snapshot(1, 100, 2, 2), snapshot(2, 300, 0, 0)];

        let stats = aggregate(&metrics);
        assert_eq!(stats.avg_connection_time_ms, 200.0);
        assert_eq!(stats.max_connection_time_ms, 300);
    }

    #[test]
    fn throughput_uses_wall_clock_duration() {
        let mut metrics = RunMetrics::new(2);
        let start = Utc::now();
        metrics.started_at = Some(start);
        metrics.ended_at = Some(start + Duration::seconds(10));
        metrics.user_metrics = vec![snapshot(1, 50, 10, 15), snapshot(2, 50, 10, 15)];

        let stats = aggregate(&metrics);
        assert_eq!(stats.messages_per_second, 5.0);
    }

    #[test]
    fn zero_duration_yields_zero_throughput() {
        let mut metrics = RunMetrics::new(1);
        metrics.user_metrics = vec![snapshot(1, 50, 10, 0)];
        let stats = aggregate(&metrics);
        assert_eq!(stats.messages_per_second, 0.0);
    }
}
