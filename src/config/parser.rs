//! Command-line argument parsing for Stampede configuration

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use super::{BehaviorConfig, Config, Defaults, EndpointConfig, LoadConfig, OutputConfig};

#[derive(Parser, Debug)]
#[command(
    name = "stampede",
    version,
    about = "Load-test orchestrator that drives simulated participants against a realtime presence/broadcast backend",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a single load-test scenario
    Run(RunArgs),

    /// Pick a preset scenario interactively
    Quick(ConnectionArgs),

    /// Run the full scenario ladder and compare results
    Batch(ConnectionArgs),
}

/// Flags shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Realtime endpoint URL (ws://, wss://, https://, or memory:// for a local dry run)
    #[arg(
        long = "endpoint",
        env = "STAMPEDE_ENDPOINT_URL",
        value_name = "URL"
    )]
    pub endpoint: String,

    /// API key passed to the realtime endpoint
    #[arg(
        long = "api-key",
        env = "STAMPEDE_API_KEY",
        value_name = "KEY",
        default_value = "",
        hide_env_values = true
    )]
    pub api_key: String,

    /// Logical event/channel id the simulated participants join
    #[arg(
        short = 'e',
        long = "event",
        env = "STAMPEDE_EVENT_ID",
        value_name = "ID"
    )]
    pub event: String,

    /// Directory for JSON report artifacts
    #[arg(
        long = "report-dir",
        value_name = "DIR",
        default_value = Defaults::REPORT_DIR
    )]
    pub report_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Log every received broadcast message (noisy)
    #[arg(long = "log-messages")]
    pub log_messages: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Number of simulated users
    #[arg(
        short = 'u',
        long = "users",
        value_name = "COUNT",
        default_value_t = Defaults::USER_COUNT
    )]
    pub users: u32,

    /// Total test duration in seconds (must exceed the ramp-up time)
    #[arg(
        short = 'd',
        long = "duration",
        value_name = "SECONDS",
        default_value_t = Defaults::DURATION_SECS
    )]
    pub duration: u64,

    /// Time over which connects are staggered, in seconds
    #[arg(
        long = "ramp-up",
        value_name = "SECONDS",
        default_value_t = Defaults::RAMP_UP_SECS
    )]
    pub ramp_up: u64,

    /// Seconds between activity iterations
    #[arg(
        short = 'i',
        long = "interval",
        value_name = "SECONDS",
        default_value_t = Defaults::ACTIVITY_INTERVAL_SECS
    )]
    pub interval: u64,

    /// Chance (0.0-1.0) that an activity turn also sends a broadcast
    #[arg(
        long = "broadcast-probability",
        value_name = "P",
        default_value_t = Defaults::BROADCAST_PROBABILITY
    )]
    pub broadcast_probability: f64,

    /// Seed for reproducible activity randomness
    #[arg(long = "seed", value_name = "N")]
    pub seed: Option<u64>,
}

impl ConnectionArgs {
    /// Build a Config with the default population/timing block.
    /// Presets and the batch ladder override the load block afterwards.
    pub fn into_config(self) -> Config {
        Config {
            endpoint: EndpointConfig {
                url: self.endpoint,
                api_key: self.api_key,
            },
            channel_id: self.event,
            load: LoadConfig {
                user_count: Defaults::USER_COUNT,
                duration_secs: Defaults::DURATION_SECS,
                ramp_up_secs: Defaults::RAMP_UP_SECS,
                activity_interval_secs: Defaults::ACTIVITY_INTERVAL_SECS,
            },
            behavior: BehaviorConfig {
                broadcast_probability: Defaults::BROADCAST_PROBABILITY,
                seed: None,
            },
            output: OutputConfig {
                verbose: self.verbose,
                log_messages: self.log_messages,
                report_dir: self.report_dir,
            },
        }
    }
}

impl From<RunArgs> for Config {
    fn from(args: RunArgs) -> Self {
        let mut config = args.connection.into_config();
        config.load = LoadConfig {
            user_count: args.users,
            duration_secs: args.duration,
            ramp_up_secs: args.ramp_up,
            activity_interval_secs: args.interval,
        };
        config.behavior = BehaviorConfig {
            broadcast_probability: args.broadcast_probability,
            seed: args.seed,
        };
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_with_flags() {
        let cli = Cli::try_parse_from([
            "stampede",
            "run",
            "--endpoint",
            "wss://example.supabase.co",
            "--api-key",
            "anon",
            "--event",
            "event-42",
            "--users",
            "25",
            "--duration",
            "120",
            "--ramp-up",
            "15",
            "--interval",
            "5",
            "--seed",
            "7",
        ])
        .expect("valid args");

        match cli.command {
            Command::Run(args) => {
                let config = Config::from(args);
                assert_eq!(config.load.user_count, 25);
                assert_eq!(config.load.duration_secs, 120);
                assert_eq!(config.load.ramp_up_secs, 15);
                assert_eq!(config.load.activity_interval_secs, 5);
                assert_eq!(config.behavior.seed, Some(7));
                assert_eq!(config.channel_id, "event-42");
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn cli_parses_batch_with_defaults() {
        let cli = Cli::try_parse_from([
            "stampede",
            "batch",
            "--endpoint",
            "memory://",
            "--event",
            "event-42",
        ])
        .expect("valid args");

        match cli.command {
            Command::Batch(args) => {
                let config = args.into_config();
                assert!(config.uses_local_backend());
                assert_eq!(config.output.report_dir, PathBuf::from("reports"));
                assert!(!config.output.verbose);
            }
            _ => panic!("expected batch command"),
        }
    }
}
