use opentelemetry_sdk::{logs::LoggerProvider, trace::TracerProvider as SdkTracerProvider};

/// Log output and optional OTLP export
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    pub service_name: String,
    /// OTLP/gRPC collector endpoint, used only when `otel_enabled`
    pub otel_endpoint: String,
    pub otel_enabled: bool,
    /// Default filter directive when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "ac-control".into(),
            otel_endpoint: "http://localhost:4317".into(),
            otel_enabled: false,
            log_level: "info".into(),
        }
    }
}

/// Exporter handles that must outlive the subscriber; pass to
/// `shutdown_telemetry` to flush.
pub struct TelemetryProviders {
    pub tracer_provider: SdkTracerProvider,
    pub logger_provider: LoggerProvider,
}
