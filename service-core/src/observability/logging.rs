use crate::config::{LogLevel, Settings};
use crate::error::AppError;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, runtime, trace as sdktrace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber: env filter, optional OTLP export, JSON logs.
///
/// `RUST_LOG` takes precedence over `log_level` when it is set.
pub fn init_tracing(
    service_name: &str,
    log_level: &LogLevel,
    otlp_endpoint: Option<&str>,
) -> Result<(), AppError> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level.filter_directive()));

    let telemetry = match otlp_endpoint {
        Some(endpoint) => Some(
            tracing_opentelemetry::layer().with_tracer(otlp_tracer(service_name, endpoint)?),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(telemetry)
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .json()
                .flatten_event(true),
        )
        .try_init()
        .map_err(|e| AppError::Telemetry(e.to_string()))?;

    if !log_level.is_recognized() {
        tracing::warn!(
            log_level = %log_level,
            "Unrecognized LOG_LEVEL, falling back to info"
        );
    }
    if let Some(endpoint) = otlp_endpoint {
        tracing::info!(endpoint, "Exporting traces over OTLP");
    }

    Ok(())
}

pub fn init_tracing_from_settings(settings: &Settings) -> Result<(), AppError> {
    init_tracing(
        &settings.service.name,
        &settings.log_level,
        settings.otlp_endpoint.as_deref(),
    )
}

fn otlp_tracer(service_name: &str, endpoint: &str) -> Result<sdktrace::Tracer, AppError> {
    let otlp_exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint);

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(otlp_exporter)
        .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
            KeyValue::new("service.name", service_name.to_string()),
        ])))
        .install_batch(runtime::Tokio)
        .map_err(|e| {
            AppError::Telemetry(format!(
                "failed to initialize OTLP tracer for service '{}' at endpoint '{}': {}",
                service_name, endpoint, e
            ))
        })
}
