//! Configuration management for the Stampede load-testing tool
//!
//! This module provides a clean, layered approach to configuration:
//! - Core structures
//! - CLI argument parsing
//! - Configuration validation
//! - Preset scenarios

pub mod parser;
pub mod scenarios;
pub mod validation;

use crate::constants::DEFAULT_BROADCAST_PROBABILITY;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Realtime endpoint credentials
#[derive(Debug, Clone, Serialize)]
pub struct EndpointConfig {
    pub url: String,
    /// Never echoed into reports or logs
    #[serde(skip_serializing)]
    pub api_key: String,
}

/// Population and timing of one scenario run
#[derive(Debug, Clone, Serialize)]
pub struct LoadConfig {
    pub user_count: u32,
    pub duration_secs: u64,
    pub ramp_up_secs: u64,
    pub activity_interval_secs: u64,
}

/// Knobs controlling what simulated participants do
#[derive(Debug, Clone, Serialize)]
pub struct BehaviorConfig {
    /// Chance that an activity turn also sends a broadcast message
    pub broadcast_probability: f64,
    /// Seeds every client's RNG for reproducible runs
    pub seed: Option<u64>,
}

/// Output configuration
#[derive(Debug, Clone, Serialize)]
pub struct OutputConfig {
    pub verbose: bool,
    pub log_messages: bool,
    pub report_dir: PathBuf,
}

/// Main configuration structure, immutable for the duration of a run
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub endpoint: EndpointConfig,
    /// Logical event id the simulated participants join
    pub channel_id: String,
    pub load: LoadConfig,
    pub behavior: BehaviorConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Number of barrier-synchronized activity iterations in phase 2
    pub fn activity_iterations(&self) -> u64 {
        let activity_secs = self
            .load
            .duration_secs
            .saturating_sub(self.load.ramp_up_secs);
        if self.load.activity_interval_secs == 0 {
            return 0;
        }
        activity_secs / self.load.activity_interval_secs
    }

    /// Stagger between consecutive connects during ramp-up
    pub fn ramp_up_delay(&self) -> Duration {
        if self.load.user_count == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.load.ramp_up_secs * 1000 / self.load.user_count as u64)
    }

    /// Cadence of phase 2 iterations
    pub fn activity_interval(&self) -> Duration {
        Duration::from_secs(self.load.activity_interval_secs)
    }

    /// Whether the in-process loopback backend should be used
    pub fn uses_local_backend(&self) -> bool {
        self.endpoint.url.starts_with("memory://")
    }

    /// Copy of this config with a different population/timing block
    pub fn with_load(&self, user_count: u32, duration_secs: u64, ramp_up_secs: u64) -> Self {
        let mut config = self.clone();
        config.load.user_count = user_count;
        config.load.duration_secs = duration_secs;
        config.load.ramp_up_secs = ramp_up_secs;
        config
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("🐎 Stampede Load Test Configuration:");
        println!("   Endpoint:          {}", self.endpoint.url);
        println!("   Event Channel:     {}", self.channel_id);
        println!("   Users:             {}", self.load.user_count);
        println!("   Duration:          {}s", self.load.duration_secs);
        println!("   Ramp-up:           {}s", self.load.ramp_up_secs);
        println!(
            "   Activity Interval: {}s ({} iterations)",
            self.load.activity_interval_secs,
            self.activity_iterations()
        );
        println!(
            "   Broadcast Chance:  {:.0}%",
            self.behavior.broadcast_probability * 100.0
        );
        if let Some(seed) = self.behavior.seed {
            println!("   RNG Seed:          {}", seed);
        }
        println!("   Report Directory:  {}", self.output.report_dir.display());
        println!();
    }
}

/// Default values for fields the CLI leaves unset
pub struct Defaults;

impl Defaults {
    pub const USER_COUNT: u32 = 10;
    pub const DURATION_SECS: u64 = 60;
    pub const RAMP_UP_SECS: u64 = 10;
    pub const ACTIVITY_INTERVAL_SECS: u64 = 5;
    pub const BROADCAST_PROBABILITY: f64 = DEFAULT_BROADCAST_PROBABILITY;
    pub const REPORT_DIR: &'static str = "reports";
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_config() -> Config {
        Config {
            endpoint: EndpointConfig {
                url: "wss://example.supabase.co".to_string(),
                api_key: "anon-key".to_string(),
            },
            channel_id: "event-42".to_string(),
            load: LoadConfig {
                user_count: 5,
                duration_secs: 30,
                ramp_up_secs: 5,
                activity_interval_secs: 5,
            },
            behavior: BehaviorConfig {
                broadcast_probability: DEFAULT_BROADCAST_PROBABILITY,
                seed: None,
            },
            output: OutputConfig {
                verbose: false,
                log_messages: false,
                report_dir: PathBuf::from("reports"),
            },
        }
    }

    #[test]
    fn activity_iterations_floor_the_remaining_time() {
        let config = sample_config();
        // (30 - 5) / 5
        assert_eq!(config.activity_iterations(), 5);

        let mut uneven = sample_config();
        uneven.load.duration_secs = 33;
        assert_eq!(uneven.activity_iterations(), 5);
    }

    #[test]
    fn ramp_up_delay_spreads_connects_across_the_window() {
        let config = sample_config();
        assert_eq!(config.ramp_up_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn api_key_is_not_serialized() {
        let config = sample_config();
        let json = serde_json::to_value(&config).expect("config serializes");
        assert!(json["endpoint"].get("api_key").is_none());
        assert_eq!(json["endpoint"]["url"], "wss://example.supabase.co");
    }

    #[test]
    fn memory_scheme_selects_local_backend() {
        let mut config = sample_config();
        config.endpoint.url = "memory://".to_string();
        assert!(config.uses_local_backend());
    }
}
