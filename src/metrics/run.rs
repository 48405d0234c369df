//! Aggregate run metrics owned by the phase orchestrator

use crate::metrics::client::ClientMetricsSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metrics for one whole scenario run.
///
/// `user_metrics` is populated only after every client has finished its
/// final phase, so readers never race the owning clients.
#[derive(Debug, Clone, Serialize, Default)]
pub struct RunMetrics {
    pub total_users: u32,
    pub successful_connections: u32,
    pub failed_connections: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub user_metrics: Vec<ClientMetricsSnapshot>,
}

impl RunMetrics {
    pub fn new(total_users: u32) -> Self {
        Self {
            total_users,
            ..Default::default()
        }
    }

    /// Wall-clock duration of the run in seconds, 0 until both stamps exist
    pub fn duration_seconds(&self) -> f64 {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => {
                let millis = (end - start).num_milliseconds();
                if millis > 0 { millis as f64 / 1000.0 } else { 0.0 }
            }
            _ => 0.0,
        }
    }

    /// Percentage of clients whose connect attempt succeeded (0.0 to 100.0)
    pub fn success_rate(&self) -> f64 {
        if self.total_users == 0 {
            return 0.0;
        }
        self.successful_connections as f64 / self.total_users as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_guards_zero_users() {
        let metrics = RunMetrics::new(0);
        assert_eq!(metrics.success_rate(), 0.0);
    }

    #[test]
    fn success_rate_is_a_percentage() {
        let mut metrics = RunMetrics::new(5);
        metrics.successful_connections = 3;
        metrics.failed_connections = 2;
        assert_eq!(metrics.success_rate(), 60.0);
    }

    #[test]
    fn duration_is_zero_without_both_stamps() {
        let mut metrics = RunMetrics::new(1);
        assert_eq!(metrics.duration_seconds(), 0.0);
        metrics.started_at = Some(Utc::now());
        assert_eq!(metrics.duration_seconds(), 0.0);
    }
}
