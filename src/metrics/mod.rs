//! Metrics collection and reporting for the Stampede load-testing tool
//!
//! This module provides a clean, modular approach to metrics:
//! - Per-client metrics owned by each virtual client
//! - Aggregate run metrics owned by the phase orchestrator
//! - Reduction into summary statistics
//! - Operator-facing report output

pub mod aggregate;
pub mod client;
pub mod reporting;
pub mod run;

// Re-export public types for easier access
pub use aggregate::{Statistics, aggregate};
pub use client::{ClientError, ClientMetrics, ClientMetricsSnapshot, ErrorKind};
pub use run::RunMetrics;
