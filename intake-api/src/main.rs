//! Intake Service Entry Point
//!
//! Loads configuration, opens the record store and runs the ingestion queue
//! until Ctrl-C.

use std::sync::Arc;

use intake_api::telemetry::{init_tracer, shutdown_tracer, TelemetryConfig};
use intake_api::{IngestionQueue, IntakeConfig, ReportService};
use intake_core::IntakeResult;
use intake_storage::FileRecordStore;

#[tokio::main]
async fn main() -> IntakeResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracer(&telemetry_config)?;

    let config = IntakeConfig::from_env();
    config.validate()?;

    let store = FileRecordStore::new(config.store_config());
    let reports = Arc::new(ReportService::new(store));
    let queue = IngestionQueue::new(config.queue_config(), reports);

    tracing::info!(
        data_dir = %config.data_dir.display(),
        queue_root = %config.queue.queue_root.display(),
        "Starting intake service"
    );
    queue.initialize().await?;

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
    }

    queue.stop().await;
    shutdown_tracer();
    Ok(())
}
