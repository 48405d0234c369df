//! Sequential scenario ladder with a cross-scenario comparison
//!
//! Scenarios run one at a time through a fresh runner (never concurrently,
//! which would confound the numbers), with a fixed cool-down in between. A
//! scenario failure is captured as a result entry and the batch moves on.

use crate::common::ShutdownSignal;
use crate::config::Config;
use crate::constants::SCENARIO_COOL_DOWN;
use crate::errors::Result;
use crate::metrics::aggregate::{Statistics, aggregate};
use crate::metrics::reporting;
use crate::metrics::run::RunMetrics;
use crate::realtime::RealtimeBackend;
use crate::report;
use crate::runner::LoadTestRunner;
use crate::verdict::assess;

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Compact per-scenario numbers used by the comparison table
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioSummary {
    pub success_rate: f64,
    pub avg_connection_time_ms: f64,
    pub total_messages: u64,
    pub error_count: u64,
}

/// Outcome of one scenario, in run order and immutable once created
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub config: Config,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Statistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ScenarioSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ScenarioResult {
    fn succeeded(
        scenario_name: String,
        config: Config,
        metrics: &RunMetrics,
        statistics: Statistics,
    ) -> Self {
        let summary = ScenarioSummary {
            success_rate: metrics.success_rate(),
            avg_connection_time_ms: statistics.avg_connection_time_ms,
            total_messages: statistics.total_messages_sent + statistics.total_messages_received,
            error_count: statistics.total_errors,
        };
        Self {
            scenario_name,
            config,
            success: true,
            statistics: Some(statistics),
            summary: Some(summary),
            error_message: None,
        }
    }

    fn failed(scenario_name: String, config: Config, error_message: String) -> Self {
        Self {
            scenario_name,
            config,
            success: false,
            statistics: None,
            summary: None,
            error_message: Some(error_message),
        }
    }
}

/// Runs an ordered list of scenarios and collects one result per scenario
pub struct BatchRunner {
    scenarios: Vec<(String, Config)>,
    backend: Arc<dyn RealtimeBackend>,
    shutdown_tx: broadcast::Sender<()>,
}

impl BatchRunner {
    pub fn new(scenarios: Vec<(String, Config)>, backend: Arc<dyn RealtimeBackend>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            scenarios,
            backend,
            shutdown_tx,
        }
    }

    /// Wire an operator shutdown channel into every scenario run
    pub fn with_shutdown(mut self, shutdown_tx: broadcast::Sender<()>) -> Self {
        self.shutdown_tx = shutdown_tx;
        self
    }

    fn signal(&self) -> ShutdownSignal {
        ShutdownSignal::new(self.shutdown_tx.subscribe())
    }

    /// Run every scenario in order. Individual failures never abort the batch.
    pub async fn run(&mut self) -> Vec<ScenarioResult> {
        let count = self.scenarios.len();
        info!("🐎 Batch run: {} scenarios", count);
        for (index, (name, config)) in self.scenarios.iter().enumerate() {
            info!(
                "  {}. {} ({} users, {}s)",
                index + 1,
                name,
                config.load.user_count,
                config.load.duration_secs
            );
        }

        let mut results = Vec::with_capacity(count);

        for (index, (name, config)) in self.scenarios.clone().into_iter().enumerate() {
            info!("Running scenario {}/{}: {}", index + 1, count, name);
            config.print_summary();

            let mut runner =
                LoadTestRunner::new(config.clone(), Arc::clone(&self.backend), self.signal());
            match runner.run().await {
                Ok(metrics) => {
                    let statistics = aggregate(&metrics);
                    let assessment = assess(&metrics, &statistics);
                    reporting::print_report(&config, &metrics, &statistics, &assessment);
                    if let Err(e) = report::save_run_report(
                        &config.output.report_dir,
                        &config,
                        &metrics,
                        &statistics,
                    ) {
                        warn!("Failed to persist scenario report: {}", e);
                    }
                    results.push(ScenarioResult::succeeded(name, config, &metrics, statistics));
                }
                Err(e) => {
                    error!("Scenario '{}' failed: {}", name, e);
                    results.push(ScenarioResult::failed(name, config, e.to_string()));
                }
            }

            if index + 1 < count && !self.cool_down().await {
                warn!("Shutdown requested, stopping batch early");
                break;
            }
        }

        results
    }

    /// Cool-down between scenarios; false once shutdown fires
    async fn cool_down(&self) -> bool {
        let mut signal = self.signal();
        if signal.fired() {
            return false;
        }
        info!(
            "⏸️  Cooling down {}s before the next scenario",
            SCENARIO_COOL_DOWN.as_secs()
        );
        tokio::select! {
            _ = tokio::time::sleep(SCENARIO_COOL_DOWN) => true,
            _ = signal.wait() => false,
        }
    }
}

/// The successful scenario with the highest user count and a success rate of
/// at least 95%, if any: the recommended safe concurrency ceiling
pub fn recommended_ceiling(results: &[ScenarioResult]) -> Option<&ScenarioResult> {
    results
        .iter()
        .filter(|r| r.success)
        .filter(|r| r.summary.as_ref().is_some_and(|s| s.success_rate >= 95.0))
        .max_by_key(|r| r.config.load.user_count)
}

/// Print the cross-scenario comparison table and the capacity summary
pub fn print_comparison(results: &[ScenarioResult]) {
    println!("\n📊 Batch Comparison");
    println!("═══════════════════════════════════════════════════════════════");
    println!("Scenario         |  Users | Success |  Avg Connect | Messages | Errors");
    println!("{}", "-".repeat(72));

    for result in results {
        match (&result.summary, &result.error_message) {
            (Some(summary), _) => {
                println!(
                    "{:<16} | {:>6} | {:>6.1}% | {:>10.0}ms | {:>8} | {:>6}",
                    result.scenario_name,
                    result.config.load.user_count,
                    summary.success_rate,
                    summary.avg_connection_time_ms,
                    summary.total_messages,
                    summary.error_count
                );
            }
            (None, Some(message)) => {
                println!("{:<16} | failed: {}", result.scenario_name, message);
            }
            (None, None) => {}
        }
    }

    println!();
    match recommended_ceiling(results) {
        Some(best) => {
            let summary = best.summary.as_ref();
            println!(
                "  ✅ Stable up to {} concurrent users ({})",
                best.config.load.user_count, best.scenario_name
            );
            if let Some(summary) = summary {
                println!(
                    "  📈 Success rate {:.2}%, avg connect {:.0}ms",
                    summary.success_rate, summary.avg_connection_time_ms
                );
            }
        }
        None => {
            let highest = results
                .iter()
                .map(|r| r.config.load.user_count)
                .max()
                .unwrap_or(0);
            println!("  ⚠️  Unstable at the highest attempted load ({} users)", highest);
            println!("  💡 Reduce concurrency or investigate errors before rerunning");
        }
    }
    println!();
}

/// Persist the batch report next to the per-run reports
pub fn save_report(results: &[ScenarioResult], config: &Config) -> Result<std::path::PathBuf> {
    report::save_batch_report(&config.output.report_dir, results)
}
