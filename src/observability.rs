use opentelemetry::{
    KeyValue,
    global,
};
use opentelemetry_otlp::{
    MetricExporter,
    WithExportConfig,
};
use opentelemetry_sdk::Resource;
use sentry::ClientInitGuard;
use sentry_tracing::EventFilter;
use tracing_subscriber::{
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::{
    OtelConfig,
    SentryConfig,
};

/// Service name reported to Sentry and the OTLP collector.
pub const SERVICE_NAME: &str = "cachering";

fn sentry_client_options(sentry_config: &SentryConfig) -> sentry::ClientOptions {
    sentry::ClientOptions {
        release: Some(env!("CARGO_PKG_VERSION").into()),
        environment: (!sentry_config.environment.is_empty()).then(|| sentry_config.environment.clone().into()),
        traces_sample_rate: sentry_config.sample_rate,
        ..Default::default()
    }
}

pub fn init_tracing_and_sentry(sentry_config: SentryConfig) -> Option<ClientInitGuard> {
    let guard = if sentry_config.dsn.is_empty() {
        None
    } else {
        let options = sentry_client_options(&sentry_config);
        let guard = sentry::init((sentry_config.dsn, options));
        sentry::configure_scope(|scope| scope.set_tag("service", SERVICE_NAME));
        Some(guard)
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true);

    let sentry_layer = sentry_tracing::layer().event_filter(|md| match md.level() {
        &tracing::Level::ERROR => EventFilter::Event,
        _ => EventFilter::Ignore,
    });

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(fmt_layer)
        .with(sentry_layer)
        .init();

    guard
}

pub fn init_otel_metrics(otel_config: OtelConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if otel_config.endpoint.is_empty() {
        tracing::info!("No OTEL endpoint configured, skipping metrics initialization");
        return Ok(());
    }

    let exporter = match otel_config.protocol.as_str() {
        "grpc" => MetricExporter::builder()
            .with_tonic()
            .with_endpoint(&otel_config.endpoint)
            .build()?,
        _ => MetricExporter::builder()
            .with_http()
            .with_endpoint(&otel_config.endpoint)
            .build()?,
    };

    let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .with_resource(
            Resource::builder()
                .with_attributes(vec![KeyValue::new("service.name", SERVICE_NAME)])
                .build(),
        )
        .build();

    global::set_meter_provider(provider);
    tracing::info!(
        endpoint = %otel_config.endpoint,
        protocol = %otel_config.protocol,
        "OpenTelemetry metrics initialized"
    );
    Ok(())
}
