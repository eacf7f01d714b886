//! Constants for the intake service
//!
//! Defaults and environment variable names used by configuration and the
//! background jobs. Centralizing them keeps `from_env` readers and tests in
//! agreement.

// ============================================================================
// RECORD STORE
// ============================================================================

/// Default directory holding table files
pub const DEFAULT_DATA_DIR: &str = "data";

/// Default number of write attempts before a store write fails
pub const DEFAULT_STORE_WRITE_ATTEMPTS: u32 = intake_storage::DEFAULT_WRITE_ATTEMPTS;

/// Default backoff step between store write attempts in milliseconds
pub const DEFAULT_STORE_RETRY_BACKOFF_MS: u64 = intake_storage::DEFAULT_RETRY_BACKOFF_MS;

// ============================================================================
// INGESTION QUEUE
// ============================================================================

/// Default queue root holding the four lifecycle directories
pub const DEFAULT_QUEUE_DIR: &str = "intake-queue";

/// Default interval between reconciliation sweeps of `queue/` in seconds
pub const DEFAULT_QUEUE_SWEEP_INTERVAL_SECS: u64 = 5;

/// Lifecycle directory for items waiting to be processed
pub const QUEUED_DIR_NAME: &str = "queue";

/// Lifecycle directory for the item currently being processed
pub const PROCESSING_DIR_NAME: &str = "processing";

/// Lifecycle directory for successfully persisted items
pub const COMPLETED_DIR_NAME: &str = "completed";

/// Lifecycle directory for items that failed processing
pub const FAILED_DIR_NAME: &str = "failed";

/// Extension of queue payload files
pub const QUEUE_FILE_EXTENSION: &str = "json";

// ============================================================================
// TELEMETRY
// ============================================================================

/// Default service name attached to log lines
pub const DEFAULT_SERVICE_NAME: &str = "intake-api";

/// Default deployment environment
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Default tracing filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "intake_api=debug,intake_storage=info,info";

// ============================================================================
// ENVIRONMENT VARIABLES
// ============================================================================

pub const ENV_DATA_DIR: &str = "INTAKE_DATA_DIR";
pub const ENV_QUEUE_DIR: &str = "INTAKE_QUEUE_DIR";
pub const ENV_STORE_WRITE_ATTEMPTS: &str = "INTAKE_STORE_WRITE_ATTEMPTS";
pub const ENV_STORE_RETRY_BACKOFF_MS: &str = "INTAKE_STORE_RETRY_BACKOFF_MS";
pub const ENV_QUEUE_SWEEP_INTERVAL_SECS: &str = "INTAKE_QUEUE_SWEEP_INTERVAL_SECS";
pub const ENV_QUEUE_WATCH_ENABLED: &str = "INTAKE_QUEUE_WATCH_ENABLED";
pub const ENV_QUEUE_RECOVER_ON_START: &str = "INTAKE_QUEUE_RECOVER_ON_START";
pub const ENV_LOG_FORMAT: &str = "INTAKE_LOG_FORMAT";
pub const ENV_SERVICE_NAME: &str = "INTAKE_SERVICE_NAME";
pub const ENV_ENVIRONMENT: &str = "INTAKE_ENVIRONMENT";
