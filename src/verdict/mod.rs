//! Capacity verdict derived from a completed run

use crate::metrics::aggregate::Statistics;
use crate::metrics::run::RunMetrics;
use serde::Serialize;

/// Classification of how the backend held up at the tested concurrency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    /// The tested user count is safely supported
    Excellent,
    /// Supported with caveats; monitor before scaling further
    Acceptable,
    /// The backend struggled at this scale
    Poor,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Excellent => write!(f, "Excellent"),
            Verdict::Acceptable => write!(f, "Acceptable"),
            Verdict::Poor => write!(f, "Poor"),
        }
    }
}

/// Verdict plus the rates it was derived from and a capacity recommendation
#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    pub verdict: Verdict,
    /// Percentage of clients that connected successfully
    pub success_rate: f64,
    /// Errors as a percentage of total message traffic
    pub error_rate: f64,
    /// Estimated concurrency the backend can carry
    pub recommended_capacity: u32,
}

/// Classify a run. Rules are evaluated in order; the first match wins.
pub fn assess(metrics: &RunMetrics, stats: &Statistics) -> Assessment {
    let success_rate = metrics.success_rate();

    let total_traffic = stats.total_messages_sent + stats.total_messages_received;
    let error_rate = if total_traffic == 0 {
        0.0
    } else {
        stats.total_errors as f64 / total_traffic as f64 * 100.0
    };

    let verdict = if success_rate >= 99.0 && error_rate < 1.0 {
        Verdict::Excellent
    } else if success_rate >= 95.0 && error_rate < 5.0 {
        Verdict::Acceptable
    } else {
        Verdict::Poor
    };

    let users = metrics.total_users;
    let recommended_capacity = match verdict {
        Verdict::Excellent => (users as f64 * 1.5).floor() as u32,
        Verdict::Acceptable => users,
        Verdict::Poor => (users as f64 * 0.8).floor() as u32,
    };

    Assessment {
        verdict,
        success_rate,
        error_rate,
        recommended_capacity,
    }
}
