//! Configuration for observability/telemetry

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Receives each formatted log line. Called from the tracing layer; must not block.
pub type LogSink = Arc<dyn Fn(String) + Send + Sync>;

/// Console output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// Observability configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub service_name: String,

    pub service_version: Option<String>,

    /// OTLP endpoint for trace export (e.g. "http://localhost:4317")
    pub otlp_endpoint: Option<String>,

    /// Write log lines to stderr
    pub enable_console: bool,

    pub log_format: LogFormat,

    /// Filter directive (e.g. "info", "parley_runtime=debug").
    /// Falls back to `RUST_LOG`, then "info".
    pub log_level: Option<String>,

    #[serde(skip)]
    pub log_sink: Option<LogSink>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "parley".to_string(),
            service_version: None,
            otlp_endpoint: None,
            enable_console: true,
            log_format: LogFormat::default(),
            log_level: None,
            log_sink: None,
        }
    }
}

impl std::fmt::Debug for ObservabilityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservabilityConfig")
            .field("service_name", &self.service_name)
            .field("service_version", &self.service_version)
            .field("otlp_endpoint", &self.otlp_endpoint)
            .field("enable_console", &self.enable_console)
            .field("log_format", &self.log_format)
            .field("log_level", &self.log_level)
            .field("log_sink", &self.log_sink.is_some())
            .finish()
    }
}

impl ObservabilityConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = Some(version.into());
        self
    }

    pub fn with_otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_console(mut self, enable: bool) -> Self {
        self.enable_console = enable;
        self
    }

    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    pub fn with_log_sink(mut self, sink: LogSink) -> Self {
        self.log_sink = Some(sink);
        self
    }

    /// Build from environment variables
    ///
    /// Reads:
    /// - `OTEL_SERVICE_NAME` → service_name
    /// - `OTEL_SERVICE_VERSION` → service_version
    /// - `OTEL_EXPORTER_OTLP_ENDPOINT` → otlp_endpoint
    /// - `PARLEY_LOG` or `RUST_LOG` → log_level
    /// - `PARLEY_LOG_FORMAT` → log_format
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("OTEL_SERVICE_NAME") {
            config.service_name = name;
        }
        config.service_version = std::env::var("OTEL_SERVICE_VERSION").ok();
        // Export only when explicitly configured.
        config.otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();
        config.log_level = std::env::var("PARLEY_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .ok();

        if let Ok(format) = std::env::var("PARLEY_LOG_FORMAT") {
            if let Ok(val) = format.parse::<LogFormat>() {
                config.log_format = val;
            }
        }

        config
    }
}
