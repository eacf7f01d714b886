//! Intake Configuration Module
//!
//! Record store and ingestion queue settings loaded from environment
//! variables with defaults suitable for local development. Unparseable
//! values fall back to their defaults; [`IntakeConfig::validate`] rejects
//! values that parse but cannot work.

use std::path::PathBuf;
use std::time::Duration;

use intake_core::ConfigError;
use intake_storage::StoreConfig;

use crate::constants::{
    DEFAULT_DATA_DIR, DEFAULT_STORE_RETRY_BACKOFF_MS, DEFAULT_STORE_WRITE_ATTEMPTS, ENV_DATA_DIR,
    ENV_QUEUE_DIR, ENV_QUEUE_SWEEP_INTERVAL_SECS, ENV_STORE_RETRY_BACKOFF_MS,
    ENV_STORE_WRITE_ATTEMPTS,
};
use crate::jobs::IngestionQueueConfig;

// ============================================================================
// INTAKE CONFIGURATION
// ============================================================================

/// Top-level configuration for the intake service.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    // ========================================================================
    // Record Store
    // ========================================================================
    /// Directory holding one JSON file per table.
    pub data_dir: PathBuf,

    /// Write attempts before a transient I/O error is surfaced.
    pub store_write_attempts: u32,

    /// Linear backoff step between write attempts.
    pub store_retry_backoff: Duration,

    // ========================================================================
    // Ingestion Queue
    // ========================================================================
    pub queue: IngestionQueueConfig,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            store_write_attempts: DEFAULT_STORE_WRITE_ATTEMPTS,
            store_retry_backoff: Duration::from_millis(DEFAULT_STORE_RETRY_BACKOFF_MS),
            queue: IngestionQueueConfig::default(),
        }
    }
}

impl IntakeConfig {
    /// Create IntakeConfig from environment variables.
    ///
    /// Environment variables:
    /// - `INTAKE_DATA_DIR`: Record store directory (default: data)
    /// - `INTAKE_STORE_WRITE_ATTEMPTS`: Write attempts (default: 3)
    /// - `INTAKE_STORE_RETRY_BACKOFF_MS`: Backoff step in ms (default: 100)
    /// - Queue variables, see [`IngestionQueueConfig::from_env`]
    pub fn from_env() -> Self {
        let data_dir = std::env::var(ENV_DATA_DIR)
            .ok()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let store_write_attempts = std::env::var(ENV_STORE_WRITE_ATTEMPTS)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_STORE_WRITE_ATTEMPTS);

        let store_retry_backoff = Duration::from_millis(
            std::env::var(ENV_STORE_RETRY_BACKOFF_MS)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_STORE_RETRY_BACKOFF_MS),
        );

        Self {
            data_dir,
            store_write_attempts,
            store_retry_backoff,
            queue: IngestionQueueConfig::from_env(),
        }
    }

    /// Reject settings that would leave the service unable to run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: ENV_DATA_DIR.to_string(),
                value: String::new(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.queue.queue_root.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: ENV_QUEUE_DIR.to_string(),
                value: String::new(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.store_write_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: ENV_STORE_WRITE_ATTEMPTS.to_string(),
                value: "0".to_string(),
                reason: "at least one write attempt is required".to_string(),
            });
        }
        if self.queue.sweep_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: ENV_QUEUE_SWEEP_INTERVAL_SECS.to_string(),
                value: "0".to_string(),
                reason: "sweep interval must be positive".to_string(),
            });
        }
        if self.data_dir == self.queue.queue_root {
            return Err(ConfigError::InvalidValue {
                field: ENV_DATA_DIR.to_string(),
                value: self.data_dir.display().to_string(),
                reason: "data and queue directories must differ".to_string(),
            });
        }
        Ok(())
    }

    /// Record store settings.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            data_dir: self.data_dir.clone(),
            write_attempts: self.store_write_attempts,
            retry_backoff: self.store_retry_backoff,
        }
    }

    /// Ingestion queue settings.
    pub fn queue_config(&self) -> IngestionQueueConfig {
        self.queue.clone()
    }
}
