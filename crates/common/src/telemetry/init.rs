use anyhow::Result;
use opentelemetry::{trace::TracerProvider, KeyValue};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    logs::LoggerProvider,
    propagation::TraceContextPropagator,
    runtime,
    trace::{Sampler, TracerProvider as SdkTracerProvider},
    Resource,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::{TelemetryConfig, TelemetryProviders};

/// Install the global tracing subscriber.
///
/// Events are always written to stdout as JSON with the active span list.
/// With `otel_enabled`, spans and events are additionally exported over
/// OTLP/gRPC and W3C trace context propagation is installed. `RUST_LOG`
/// overrides the configured level.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<Option<TelemetryProviders>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)?,
    };

    let stdout = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true);

    let providers = if config.otel_enabled {
        opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());
        let resource = service_resource(&config.service_name);
        Some(TelemetryProviders {
            tracer_provider: tracer_provider(&config.otel_endpoint, resource.clone())?,
            logger_provider: logger_provider(&config.otel_endpoint, resource)?,
        })
    } else {
        None
    };

    let span_export = providers.as_ref().map(|providers| {
        tracing_opentelemetry::layer().with_tracer(
            providers
                .tracer_provider
                .tracer(config.service_name.clone()),
        )
    });
    let event_export = providers
        .as_ref()
        .map(|providers| OpenTelemetryTracingBridge::new(&providers.logger_provider));

    // span export goes first so exported events carry the span context
    tracing_subscriber::registry()
        .with(filter)
        .with(span_export)
        .with(event_export)
        .with(stdout)
        .try_init()?;

    Ok(providers)
}

fn service_resource(service_name: &str) -> Resource {
    Resource::new([KeyValue::new(
        opentelemetry_semantic_conventions::resource::SERVICE_NAME,
        service_name.to_string(),
    )])
}

fn tracer_provider(endpoint: &str, resource: Resource) -> Result<SdkTracerProvider> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(Sampler::AlwaysOn)
        .with_batch_exporter(exporter, runtime::Tokio)
        .build())
}

fn logger_provider(endpoint: &str, resource: Resource) -> Result<LoggerProvider> {
    let exporter = LogExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(LoggerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter, runtime::Tokio)
        .build())
}

/// Flush and shut down exporters. Runs after the subscriber may already be
/// torn down, so failures go to stderr.
pub fn shutdown_telemetry(providers: Option<TelemetryProviders>) {
    if let Some(providers) = providers {
        if let Err(e) = providers.tracer_provider.shutdown() {
            eprintln!("span exporter shutdown failed: {e:?}");
        }
        if let Err(e) = providers.logger_provider.shutdown() {
            eprintln!("log exporter shutdown failed: {e:?}");
        }
    }
}
