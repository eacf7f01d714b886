//! Tracing Subscriber Initialization
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and a JSON or
//! human-readable `fmt` layer. `RUST_LOG` overrides the default filter.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use intake_core::{ConfigError, IntakeResult};

use crate::constants::{
    DEFAULT_ENVIRONMENT, DEFAULT_LOG_FILTER, DEFAULT_SERVICE_NAME, ENV_ENVIRONMENT,
    ENV_LOG_FORMAT, ENV_SERVICE_NAME,
};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line (default)
    #[default]
    Json,
    /// Multi-line, colored output for local development
    Pretty,
}

impl LogFormat {
    /// Parse `json` or `pretty`, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup line
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Environment (production, staging, development)
    pub environment: String,
    /// Log line format
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: std::env::var(ENV_SERVICE_NAME)
                .unwrap_or_else(|_| DEFAULT_SERVICE_NAME.to_string()),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: std::env::var(ENV_ENVIRONMENT)
                .unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string()),
            log_format: std::env::var(ENV_LOG_FORMAT)
                .ok()
                .and_then(|s| LogFormat::parse(&s))
                .unwrap_or_default(),
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Call once at startup before any tracing occurs. A second call fails
/// because a global subscriber is already installed.
pub fn init_tracer(config: &TelemetryConfig) -> IntakeResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };
    result.map_err(|e| ConfigError::InvalidValue {
        field: "tracing_subscriber".to_string(),
        value: format!("{:?}", config.log_format),
        reason: format!("Failed to init subscriber: {}", e),
    })?;

    tracing::info!(
        service_name = config.service_name,
        service_version = config.service_version,
        environment = config.environment,
        log_format = ?config.log_format,
        "Telemetry initialized"
    );

    Ok(())
}

/// Log the final line before exit.
pub fn shutdown_tracer() {
    tracing::info!("Tracer shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{env_lock, EnvVarGuard};

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse(" Pretty "), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("xml"), None);
    }

    #[test]
    fn test_telemetry_config_env() {
        let _lock = env_lock();
        let _format = EnvVarGuard::set(ENV_LOG_FORMAT, Some("pretty"));
        let _name = EnvVarGuard::set(ENV_SERVICE_NAME, None);
        let config = TelemetryConfig::default();
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.service_name, "intake-api");

        let _format = EnvVarGuard::set(ENV_LOG_FORMAT, Some("bogus"));
        assert_eq!(TelemetryConfig::default().log_format, LogFormat::Json);
    }
}
