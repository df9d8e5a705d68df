//! # Observability
//!
//! - **Logging**: structured logs via `tracing`
//! - **Metrics**: Prometheus-compatible scheduler counters and round latency
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │              Scheduler task (rt::cycle)                  │
//! │   debug!(rnti, %reason), metrics.record_round(&stats)    │
//! └────────────────────────┬─────────────────────────────────┘
//!                          │
//!            ┌─────────────┴─────────────┐
//!            ▼                           ▼
//!      ┌──────────┐               ┌──────────────┐
//!      │ Logging  │               │ Metrics      │
//!      │ (JSON)   │               │ (Prometheus) │
//!      └──────────┘               └──────────────┘
//! ```

pub mod logging;
pub mod metrics;

use std::sync::Arc;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
pub use metrics::{MetricsSnapshot, SchedulerMetrics};

/// Set up logging and create the metrics shared by the scheduler task.
pub fn init(log_config: &LogConfig) -> Arc<SchedulerMetrics> {
    init_logging(log_config);
    Arc::new(SchedulerMetrics::new())
}
