//! Three-phase orchestration of one load-test scenario
//!
//! Phase 1 ramps clients up with sequential, staggered connects so the
//! backend sees organic join behavior instead of a burst. Phase 2 runs
//! barrier-synchronized activity iterations cadenced at the configured
//! interval. Phase 3 disconnects everything concurrently and always
//! completes. A fired shutdown signal abandons remaining phase 1/2 work but
//! still runs teardown, returning partial metrics.

use crate::client::VirtualClient;
use crate::common::{ClientId, ShutdownSignal};
use crate::config::{Config, validation};
use crate::constants::PROGRESS_REPORT_INTERVAL;
use crate::errors::Result;
use crate::metrics::run::RunMetrics;
use crate::realtime::RealtimeBackend;

use chrono::Utc;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Drives the client population of one scenario through its three phases
pub struct LoadTestRunner {
    config: Config,
    backend: Arc<dyn RealtimeBackend>,
    shutdown: ShutdownSignal,
    clients: Vec<VirtualClient>,
    metrics: RunMetrics,
}

impl LoadTestRunner {
    pub fn new(config: Config, backend: Arc<dyn RealtimeBackend>, shutdown: ShutdownSignal) -> Self {
        let metrics = RunMetrics::new(config.load.user_count);
        Self {
            config,
            backend,
            shutdown,
            clients: Vec::new(),
            metrics,
        }
    }

    /// Run all three phases and return the collected metrics.
    ///
    /// Fails fast on invalid configuration, before any client exists.
    pub async fn run(&mut self) -> Result<RunMetrics> {
        validation::validate(&self.config)?;

        info!(
            "🚀 Starting load test: {} users against channel '{}'",
            self.config.load.user_count, self.config.channel_id
        );
        self.metrics.started_at = Some(Utc::now());

        self.ramp_up().await;
        self.run_activity().await;
        self.shutdown_clients().await;

        self.metrics.ended_at = Some(Utc::now());
        // Every client has finished its last turn; snapshots are race-free now
        self.metrics.user_metrics = self.clients.iter().map(|c| c.metrics()).collect();

        Ok(self.metrics.clone())
    }

    /// Phase 1: connect clients one at a time, staggered across the ramp-up window
    async fn ramp_up(&mut self) {
        let count = self.config.load.user_count;
        let delay = self.config.ramp_up_delay();
        info!(
            "📈 Phase 1: ramping up {} clients over {}s",
            count, self.config.load.ramp_up_secs
        );

        for ordinal in 1..=count {
            let mut client = VirtualClient::new(
                ClientId::new(ordinal),
                self.config.clone(),
                Arc::clone(&self.backend),
            );
            if client.connect().await {
                self.metrics.successful_connections += 1;
            } else {
                self.metrics.failed_connections += 1;
            }
            self.clients.push(client);

            if ordinal % PROGRESS_REPORT_INTERVAL == 0 || ordinal == count {
                info!(
                    "  connected {}/{} clients ({} ok, {} failed)",
                    ordinal, count, self.metrics.successful_connections, self.metrics.failed_connections
                );
            }

            if ordinal < count && !self.pause(delay).await {
                warn!("Shutdown requested, abandoning ramp-up after client {}", ordinal);
                return;
            }
        }

        info!("✅ Ramp-up complete");
    }

    /// Phase 2: barrier-synchronized activity fan-outs cadenced at the interval.
    ///
    /// An iteration only starts once the previous fan-out has fully settled.
    /// If a fan-out overruns the interval the next iteration starts
    /// immediately; iterations are never skipped.
    async fn run_activity(&mut self) {
        let iterations = self.config.activity_iterations();
        let interval = self.config.activity_interval();
        info!(
            "🎮 Phase 2: simulating activity ({}s, {} iterations)",
            self.config.load.duration_secs - self.config.load.ramp_up_secs,
            iterations
        );

        for iteration in 1..=iterations {
            if self.shutdown.fired() {
                warn!("Shutdown requested, abandoning activity at iteration {}", iteration);
                return;
            }

            let started = Instant::now();
            let turns: Vec<_> = self
                .clients
                .iter_mut()
                .filter(|c| c.is_connected())
                .map(|c| c.simulate_activity())
                .collect();
            let active = turns.len();
            join_all(turns).await;

            let elapsed = started.elapsed();
            info!(
                "  iteration {}/{} done ({}ms, {} active clients)",
                iteration,
                iterations,
                elapsed.as_millis(),
                active
            );

            if iteration < iterations {
                let budget = interval.saturating_sub(elapsed);
                if !budget.is_zero() && !self.pause(budget).await {
                    warn!("Shutdown requested, abandoning activity after iteration {}", iteration);
                    return;
                }
            }
        }

        info!("✅ Activity simulation complete");
    }

    /// Phase 3: disconnect everything concurrently; always completes
    async fn shutdown_clients(&mut self) {
        info!("🔌 Phase 3: disconnecting {} clients", self.clients.len());
        join_all(self.clients.iter_mut().map(|c| c.disconnect())).await;
        info!("✅ All clients disconnected");
    }

    /// Timed suspension that doubles as a cancellation point
    async fn pause(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.shutdown.wait() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_config;
    use crate::metrics::aggregate::aggregate;
    use crate::testutil::MockBackend;
    use crate::verdict::{Verdict, assess};
    use std::collections::HashSet;
    use tokio::sync::broadcast;

    fn config() -> Config {
        // 5 users, 30s duration, 5s ramp-up, 5s interval: 5 iterations
        let mut config = sample_config();
        config.endpoint.url = "memory://".to_string();
        config.behavior.seed = Some(1);
        config.behavior.broadcast_probability = 0.0;
        config
    }

    fn runner(config: Config, backend: &MockBackend) -> LoadTestRunner {
        LoadTestRunner::new(
            config,
            backend.clone().into_backend(),
            ShutdownSignal::disabled(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn clean_run_satisfies_invariants_and_is_excellent() {
        let backend = MockBackend::new();
        let metrics = runner(config(), &backend).run().await.expect("run completes");

        assert_eq!(metrics.total_users, 5);
        assert_eq!(metrics.successful_connections, 5);
        assert_eq!(metrics.failed_connections, 0);
        assert_eq!(
            metrics.successful_connections + metrics.failed_connections,
            metrics.total_users
        );
        assert_eq!(metrics.user_metrics.len(), 5);

        // Exactly floor((30-5)/5) = 5 iterations: 5 initial announces plus 5*5 turns
        assert_eq!(backend.announces().len(), 30);

        let stats = aggregate(&metrics);
        assert_eq!(stats.total_messages_sent, 25);
        let assessment = assess(&metrics, &stats);
        assert_eq!(assessment.verdict, Verdict::Excellent);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_clients_are_tallied_and_excluded_from_activity() {
        let backend = MockBackend::new().failing_connect_for(&["user_3", "user_4"]);
        let metrics = runner(config(), &backend).run().await.expect("run completes");

        assert_eq!(metrics.successful_connections, 3);
        assert_eq!(metrics.failed_connections, 2);
        assert_eq!(metrics.user_metrics.len(), 5);

        // 3 initial announces, then every iteration fans out to exactly 3 clients
        let announces = backend.announces();
        assert_eq!(announces.len(), 3 + 5 * 3);
        let connected: HashSet<&str> = ["user_1", "user_2", "user_5"].into();
        for chunk in announces[3..].chunks(3) {
            let members: HashSet<&str> = chunk.iter().map(String::as_str).collect();
            assert_eq!(members, connected);
        }

        let stats = aggregate(&metrics);
        let assessment = assess(&metrics, &stats);
        assert_eq!(assessment.success_rate, 60.0);
        assert_eq!(assessment.verdict, Verdict::Poor);
        assert_eq!(assessment.recommended_capacity, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn iterations_never_interleave() {
        let backend = MockBackend::new()
            .with_activity_delay(Duration::from_millis(700));
        let metrics = runner(config(), &backend).run().await.expect("run completes");
        assert_eq!(metrics.successful_connections, 5);

        // Every post-ramp-up chunk of 5 announces is one complete iteration:
        // no client appears twice in a chunk, all clients appear once
        let announces = backend.announces();
        assert_eq!(announces.len(), 5 + 5 * 5);
        let everyone: HashSet<&str> = ["user_1", "user_2", "user_3", "user_4", "user_5"].into();
        for chunk in announces[5..].chunks(5) {
            let members: HashSet<&str> = chunk.iter().map(String::as_str).collect();
            assert_eq!(members, everyone);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn iterations_are_cadenced_at_the_interval() {
        let backend = MockBackend::new().with_activity_delay(Duration::from_secs(1));
        let started = Instant::now();
        runner(config(), &backend).run().await.expect("run completes");

        // Ramp-up: 4 staggers of 1s. Activity: 5 fan-outs of 1s with a 4s
        // top-up sleep after each of the first 4 iterations.
        assert_eq!(started.elapsed(), Duration::from_secs(4 + 5 + 4 * 4));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fanouts_start_the_next_iteration_immediately() {
        let backend = MockBackend::new().with_activity_delay(Duration::from_secs(6));
        let started = Instant::now();
        runner(config(), &backend).run().await.expect("run completes");

        // 6s fan-outs overrun the 5s interval: no top-up sleeps, and no
        // iteration is skipped
        assert_eq!(backend.announces().len(), 5 + 5 * 5);
        assert_eq!(started.elapsed(), Duration::from_secs(4 + 5 * 6));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_config_fails_before_any_client_exists() {
        let backend = MockBackend::new();
        let mut bad = config();
        bad.load.user_count = 0;

        let err = runner(bad, &backend).run().await.unwrap_err();
        assert!(err.to_string().contains("Configuration error"));
        assert!(backend.announces().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_signal_abandons_work_but_still_tears_down() {
        let backend = MockBackend::new();
        let (tx, rx) = broadcast::channel(1);
        tx.send(()).expect("receiver alive");

        let mut runner = LoadTestRunner::new(
            config(),
            backend.clone().into_backend(),
            ShutdownSignal::new(rx),
        );
        let metrics = runner.run().await.expect("run completes");

        // Ramp-up stopped after the first client; teardown still ran
        assert_eq!(metrics.user_metrics.len(), 1);
        assert!(metrics.ended_at.is_some());
        assert!(metrics.user_metrics[0].ended_at.is_some());
        // No activity iterations were attempted
        assert_eq!(backend.announces().len(), 1);
    }
}
