use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
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
///
/// The `ErrorLayer` lets failed mutations capture a `SpanTrace`.
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
            "folio_query_cache_hit_total",
            Unit::Count,
            "Total number of queries answered from the cache."
        );
        describe_counter!(
            "folio_query_cache_miss_total",
            Unit::Count,
            "Total number of queries that had to reach the document store."
        );
        describe_counter!(
            "folio_query_cache_evict_total",
            Unit::Count,
            "Total number of cached query results evicted due to capacity."
        );
        describe_counter!(
            "folio_query_cache_invalidate_total",
            Unit::Count,
            "Total number of cached query results dropped by tag invalidation."
        );
        describe_histogram!(
            "folio_query_fetch_ms",
            Unit::Milliseconds,
            "Document store fetch latency per query in milliseconds."
        );
        describe_gauge!(
            "folio_cache_event_queue_len",
            Unit::Count,
            "Current number of pending cache events in the queue."
        );
        describe_histogram!(
            "folio_cache_consume_ms",
            Unit::Milliseconds,
            "Cache consumption latency in milliseconds."
        );
        describe_counter!(
            "folio_cache_refetch_total",
            Unit::Count,
            "Total number of subscribed queries refetched after invalidation."
        );
        describe_counter!(
            "folio_mutation_failure_total",
            Unit::Count,
            "Total number of failed mutations reported to the user."
        );
        describe_counter!(
            "folio_http_error_total",
            Unit::Count,
            "Total number of HTTP responses with a 4xx or 5xx status."
        );
    });
}
