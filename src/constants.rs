//! Application-wide constants and configuration values

use std::time::Duration;

// Client population constants
pub const MAX_CLIENTS_LIMIT: u32 = 10_000;
pub const PROGRESS_REPORT_INTERVAL: u32 = 10;

// Activity simulation
pub const ACTIVITY_SECTIONS: [&str; 4] = ["lobby", "quiz", "poll", "qna"];
pub const INITIAL_SECTION: &str = "lobby";
pub const USER_ACTION_EVENT: &str = "user_action";
pub const DEFAULT_BROADCAST_PROBABILITY: f64 = 0.3;

// Batch driver
pub const SCENARIO_COOL_DOWN: Duration = Duration::from_secs(30);

// Realtime transport
pub const CHANNEL_BUFFER_SIZE: usize = 100;
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
pub const ACK_TIMEOUT: Duration = Duration::from_secs(10);
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
pub const LISTENER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

// Report persistence
pub const RUN_REPORT_PREFIX: &str = "load-test-report";
pub const BATCH_REPORT_PREFIX: &str = "batch-test-report";
