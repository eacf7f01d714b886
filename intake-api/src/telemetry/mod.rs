//! Intake Telemetry - Structured Logging
//!
//! Installs the process-wide `tracing` subscriber used by both binaries.

pub mod tracer;

pub use tracer::{init_tracer, shutdown_tracer, LogFormat, TelemetryConfig};
