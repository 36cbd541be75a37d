//! Metrics and observability utilities
//!
//! Prometheus-style metrics with standardized naming under one prefix.
//! Recording is a no-op until a recorder is installed by a binary.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Peptrack metrics
pub const METRICS_PREFIX: &str = "peptrack";

/// Buckets for outbound fetch latency (in seconds)
pub const FETCH_BUCKETS: &[f64] = &[
    0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.00, 20.00,
];

/// Buckets for whole-entity processing latency (in seconds)
pub const ENTITY_BUCKETS: &[f64] = &[
    0.250, 0.500, 1.000, 2.500, 5.000, 10.00, 30.00, 60.00, 120.0,
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Gateway
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Enrichment
    describe_counter!(
        format!("{}_entities_processed_total", METRICS_PREFIX),
        Unit::Count,
        "Entities processed by kind and outcome"
    );

    describe_histogram!(
        format!("{}_entity_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Per-entity enrichment latency in seconds"
    );

    describe_counter!(
        format!("{}_source_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Source adapter queries that returned data"
    );

    describe_counter!(
        format!("{}_fetch_attempts_total", METRICS_PREFIX),
        Unit::Count,
        "Outbound HTTP attempts by status class"
    );

    describe_counter!(
        format!("{}_fetch_retries_total", METRICS_PREFIX),
        Unit::Count,
        "Outbound HTTP retries after transient failures"
    );

    describe_histogram!(
        format!("{}_fetch_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Outbound HTTP latency in seconds"
    );

    // Caches
    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total lookup cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total lookup cache misses"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record one processed entity
pub fn record_entity(kind: &str, outcome: &str, duration_secs: f64) {
    counter!(
        format!("{}_entities_processed_total", METRICS_PREFIX),
        "kind" => kind.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_entity_duration_seconds", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .record(duration_secs);
}

pub fn record_source_hit(source: &str) {
    counter!(
        format!("{}_source_hits_total", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .increment(1);
}

/// Record one outbound HTTP attempt
pub fn record_fetch(status_class: &str, duration_secs: f64) {
    counter!(
        format!("{}_fetch_attempts_total", METRICS_PREFIX),
        "status" => status_class.to_string()
    )
    .increment(1);

    histogram!(format!("{}_fetch_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

pub fn record_fetch_retry() {
    counter!(format!("{}_fetch_retries_total", METRICS_PREFIX)).increment(1);
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    if hit {
        counter!(
            format!("{}_cache_hits_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    } else {
        counter!(
            format!("{}_cache_misses_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [FETCH_BUCKETS, ENTITY_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }
    }

    #[test]
    fn test_recording_without_recorder() {
        let metrics = RequestMetrics::start("POST", "/v1/enrichment/peptides");
        metrics.finish(200);
        record_entity("peptide", "updated", 0.5);
        record_fetch("2xx", 0.1);
        // Just verify it runs without panic
    }
}
