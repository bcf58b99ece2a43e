//! Subscriber installation with optional OTLP export (OpenTelemetry 0.31).

use opentelemetry::{global, trace::TracerProvider, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::config::{LogFormat, ObservabilityConfig};
use crate::error::ObservabilityError;
use crate::sink_layer::SinkLayer;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Flushes and shuts down the tracer provider when dropped.
#[must_use = "dropping the guard shuts telemetry down"]
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    pub fn exports_traces(&self) -> bool {
        self.provider.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            // Export errors are reported by the SDK itself.
            let _ = provider.shutdown();
        }
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(config: ObservabilityConfig) -> Result<TelemetryGuard, ObservabilityError> {
    let filter = build_filter(config.log_level.as_deref())?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if config.enable_console {
        layers.push(console_layer(config.log_format));
    }
    if let Some(sink) = config.log_sink.clone() {
        layers.push(SinkLayer::new(sink).boxed());
    }

    let mut provider = None;
    let mut otlp_failure = None;
    if let Some(endpoint) = &config.otlp_endpoint {
        match build_otlp_tracer_provider(&config, endpoint) {
            Ok((tracer, tracer_provider)) => {
                // Global provider must be set before the layer is created.
                global::set_tracer_provider(tracer_provider.clone());
                layers.push(OpenTelemetryLayer::new(tracer).boxed());
                provider = Some(tracer_provider);
            }
            Err(e) => otlp_failure = Some(e),
        }
    }

    Registry::default()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| ObservabilityError::InitFailed(e.to_string()))?;

    match (&config.otlp_endpoint, &otlp_failure) {
        (Some(endpoint), None) => tracing::info!(
            service.name = %config.service_name,
            otlp.endpoint = %endpoint,
            "OTLP tracing enabled"
        ),
        (Some(endpoint), Some(e)) => tracing::warn!(
            service.name = %config.service_name,
            otlp.endpoint = %endpoint,
            error = %e,
            "Failed to initialize OTLP export, continuing without it"
        ),
        (None, _) => tracing::debug!(service.name = %config.service_name, "Tracing initialized"),
    }

    Ok(TelemetryGuard { provider })
}

/// Initialize from [`ObservabilityConfig::from_env`].
pub fn init_from_env() -> Result<TelemetryGuard, ObservabilityError> {
    init(ObservabilityConfig::from_env())
}

fn build_filter(directive: Option<&str>) -> Result<EnvFilter, ObservabilityError> {
    match directive {
        Some(directive) => EnvFilter::try_new(directive)
            .map_err(|e| ObservabilityError::Config(format!("invalid log filter {:?}: {}", directive, e))),
        None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))),
    }
}

/// Console output goes to stderr; stdout belongs to command output.
fn console_layer(format: LogFormat) -> BoxedLayer {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);
    match format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

fn build_otlp_tracer_provider(
    config: &ObservabilityConfig,
    endpoint: &str,
) -> Result<(SdkTracer, SdkTracerProvider), ObservabilityError> {
    let mut attributes = vec![KeyValue::new("service.name", config.service_name.clone())];
    if let Some(version) = &config.service_version {
        attributes.push(KeyValue::new("service.version", version.clone()));
    }
    let resource = Resource::builder().with_attributes(attributes).build();

    let span_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint.to_string())
        .build()
        .map_err(|e| ObservabilityError::InitFailed(e.to_string()))?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(span_exporter)
        .with_resource(resource)
        .build();
    let tracer = provider.tracer(config.service_name.clone());

    Ok((tracer, provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_rejects_bad_directive() {
        let err = build_filter(Some("parley=notalevel")).unwrap_err();
        assert!(matches!(err, ObservabilityError::Config(_)));
    }

    #[test]
    fn test_build_filter_accepts_directive() {
        assert!(build_filter(Some("parley_runtime=debug,info")).is_ok());
    }
}
