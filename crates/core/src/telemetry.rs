// Telemetry Module
//
// Console logging setup shared by the server and the load generator:
// - EnvFilter driven by RUST_LOG / LOG_LEVEL with a per-binary default
// - Human-readable or JSON output selected by LOG_FORMAT

use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}', use 'text' or 'json'", other)),
        }
    }
}

/// Configuration for logging
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,
    /// Log filter (e.g., "info", "loadbench_server=debug")
    pub log_filter: Option<String>,
    /// Output format
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "loadbench".to_string(),
            log_filter: None,
            format: LogFormat::Text,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `RUST_LOG` or `LOG_LEVEL`: Log filter
    /// - `LOG_FORMAT`: "text" (default) or "json"; unknown values fall back to text
    pub fn from_env() -> Self {
        Self {
            service_name: "loadbench".to_string(),
            log_filter: std::env::var("RUST_LOG")
                .ok()
                .or_else(|| std::env::var("LOG_LEVEL").ok()),
            format: std::env::var("LOG_FORMAT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
        }
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Use `filter` unless a filter was already provided by the environment.
    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        if self.log_filter.is_none() {
            self.log_filter = Some(filter.into());
        }
        self
    }
}

/// Initialize the global tracing subscriber.
///
/// Call once, at the top of `main`.
pub fn init_telemetry(config: TelemetryConfig) {
    let filter = config
        .log_filter
        .as_ref()
        .and_then(|f| EnvFilter::try_new(f).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    let text_layer = (config.format == LogFormat::Text)
        .then(|| tracing_subscriber::fmt::layer().with_target(true).boxed());
    let json_layer = (config.format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .boxed()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .init();

    tracing::debug!(
        service = %config.service_name,
        format = ?config.format,
        "Telemetry initialized"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("TEXT".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_default_filter_does_not_override() {
        let config = TelemetryConfig {
            log_filter: Some("warn".to_string()),
            ..Default::default()
        };
        let config = config.with_default_filter("debug");
        assert_eq!(config.log_filter.as_deref(), Some("warn"));

        let config = TelemetryConfig::default().with_default_filter("debug");
        assert_eq!(config.log_filter.as_deref(), Some("debug"));
    }
}
