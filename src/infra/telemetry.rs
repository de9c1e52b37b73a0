use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "folio_visitor_recorded_total",
            Unit::Count,
            "Total number of visits recorded against a client address."
        );
        describe_counter!(
            "folio_visitor_skipped_total",
            Unit::Count,
            "Total number of requests not tracked, labelled by reason."
        );
        describe_counter!(
            "folio_visitor_failed_total",
            Unit::Count,
            "Total number of visit writes rejected by storage."
        );
        describe_counter!(
            "folio_cache_hit_total",
            Unit::Count,
            "Total number of cached listing hits."
        );
        describe_counter!(
            "folio_cache_miss_total",
            Unit::Count,
            "Total number of cached listing misses."
        );
        describe_counter!(
            "folio_cache_error_total",
            Unit::Count,
            "Total number of cache reads or writes that failed."
        );
        describe_counter!(
            "folio_cache_invalidation_total",
            Unit::Count,
            "Total number of entity cache keys invalidated."
        );
        describe_counter!(
            "folio_cache_invalidation_failed_total",
            Unit::Count,
            "Total number of cache invalidations the store rejected."
        );
        describe_histogram!(
            "folio_http_request_ms",
            Unit::Milliseconds,
            "HTTP request latency in milliseconds."
        );
    });
}
