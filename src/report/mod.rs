//! Write-once JSON report artifacts
//!
//! Each run produces one file named with an epoch-millisecond timestamp in
//! the configured report directory; batch runs add a second file with the
//! cross-scenario results. Directory creation is idempotent, files are never
//! appended to.

use crate::batch::ScenarioResult;
use crate::config::Config;
use crate::constants::{BATCH_REPORT_PREFIX, RUN_REPORT_PREFIX};
use crate::errors::Result;
use crate::metrics::aggregate::Statistics;
use crate::metrics::run::RunMetrics;

use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    timestamp: String,
    config: &'a Config,
    metrics: &'a RunMetrics,
    statistics: &'a Statistics,
}

#[derive(Debug, Serialize)]
struct BatchReport<'a> {
    timestamp: String,
    scenarios: Vec<&'a Config>,
    results: &'a [ScenarioResult],
}

/// Persist one run's report; returns the file path
pub fn save_run_report(
    dir: &Path,
    config: &Config,
    metrics: &RunMetrics,
    statistics: &Statistics,
) -> Result<PathBuf> {
    let report = RunReport {
        timestamp: Utc::now().to_rfc3339(),
        config,
        metrics,
        statistics,
    };
    let path = report_path(dir, RUN_REPORT_PREFIX);
    write_report(&path, &report)?;
    info!("📄 Report saved: {}", path.display());
    Ok(path)
}

/// Persist a batch comparison report; returns the file path
pub fn save_batch_report(dir: &Path, results: &[ScenarioResult]) -> Result<PathBuf> {
    let report = BatchReport {
        timestamp: Utc::now().to_rfc3339(),
        scenarios: results.iter().map(|r| &r.config).collect(),
        results,
    };
    let path = report_path(dir, BATCH_REPORT_PREFIX);
    write_report(&path, &report)?;
    info!("📄 Batch report saved: {}", path.display());
    Ok(path)
}

fn report_path(dir: &Path, prefix: &str) -> PathBuf {
    dir.join(format!("{}-{}.json", prefix, Utc::now().timestamp_millis()))
}

fn write_report<T: Serialize>(path: &Path, report: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_config;
    use crate::metrics::aggregate::aggregate;

    #[test]
    fn run_report_has_the_expected_shape() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = sample_config();
        let mut metrics = RunMetrics::new(5);
        metrics.successful_connections = 5;
        let statistics = aggregate(&metrics);

        let path = save_run_report(dir.path(), &config, &metrics, &statistics)
            .expect("report persists");
        assert!(path.exists());
        let name = path.file_name().and_then(|n| n.to_str()).expect("utf8 name");
        assert!(name.starts_with("load-test-report-"));
        assert!(name.ends_with(".json"));

        let raw = fs::read_to_string(&path).expect("readable");
        let json: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
        assert!(json["timestamp"].is_string());
        assert_eq!(json["config"]["load"]["user_count"], 5);
        assert_eq!(json["metrics"]["total_users"], 5);
        assert_eq!(json["statistics"]["total_errors"], 0);
        // Credentials never land in report files
        assert!(json["config"]["endpoint"].get("api_key").is_none());
    }

    #[test]
    fn report_directory_creation_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("reports");
        let config = sample_config();
        let metrics = RunMetrics::new(1);
        let statistics = aggregate(&metrics);

        save_run_report(&nested, &config, &metrics, &statistics).expect("first write");
        save_run_report(&nested, &config, &metrics, &statistics).expect("second write");
    }
}
