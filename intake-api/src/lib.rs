//! Intake API - Report Service and Ingestion Queue
//!
//! Wires the record store to the compliance report domain and runs the
//! directory-backed ingestion queue that turns dropped payload files into
//! stored reports. The `intake-api` binary runs the queue as a service;
//! `intake-ops` inspects and repairs queue directories by hand.

pub mod config;
pub mod constants;
pub mod jobs;
pub mod services;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::IntakeConfig;
pub use jobs::{
    IngestionQueue, IngestionQueueConfig, QueueDirs, QueueMetrics, QueueMetricsSnapshot,
    QueueState, QueueStats,
};
pub use services::ReportService;
