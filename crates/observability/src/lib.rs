//! Parley observability: tracing subscriber setup and span helpers.
//!
//! # Quick Start
//!
//! ```no_run
//! use parley_observability::{init, ObservabilityConfig};
//!
//! let config = ObservabilityConfig::new("parley").with_log_level("parley=debug");
//! let _guard = init(config)?;
//!
//! tracing::info!("ready");
//! # Ok::<(), parley_observability::ObservabilityError>(())
//! ```
//!
//! # Environment Variables
//!
//! - `PARLEY_LOG` or `RUST_LOG` - Log level filter
//! - `PARLEY_LOG_FORMAT` - `pretty`, `compact` (default) or `json`
//! - `OTEL_SERVICE_NAME` - Service name
//! - `OTEL_EXPORTER_OTLP_ENDPOINT` - OTLP endpoint; export is off when unset

pub mod config;
pub mod error;
pub mod sink_layer;
pub mod spans;
pub mod telemetry;

pub use config::{LogFormat, LogSink, ObservabilityConfig};
pub use error::ObservabilityError;
pub use sink_layer::SinkLayer;
pub use spans::{record_duration, record_error};
pub use telemetry::{init, init_from_env, TelemetryGuard};
