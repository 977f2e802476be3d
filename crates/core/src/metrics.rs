//! Prometheus metrics for report runs.
//!
//! This module provides metrics for:
//! - Runs (by final status)
//! - Per-application fetches (result, duration)
//! - Remote IQ Server requests
//! - Written report rows

use std::time::Duration;

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

// =============================================================================
// Run Metrics
// =============================================================================

/// Report runs total by result.
pub static RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("iqreport_runs_total", "Total report runs"),
        &["result"], // "complete", "partial", "failed"
    )
    .expect("valid metric definition")
});

/// Rows written to report files.
pub static RECORDS_WRITTEN: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "iqreport_records_written_total",
        "Total violation rows written to reports",
    )
    .expect("valid metric definition")
});

// =============================================================================
// Item Metrics
// =============================================================================

/// Applications processed by result.
pub static ITEMS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("iqreport_items_processed_total", "Total applications processed"),
        &["result"], // "success", "empty", "failed", "skipped"
    )
    .expect("valid metric definition")
});

/// Per-application fetch duration in seconds.
pub static ITEM_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "iqreport_item_duration_seconds",
            "Duration of a single application fetch",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["result"],
    )
    .expect("valid metric definition")
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// IQ Server requests by endpoint and status class.
pub static REMOTE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("iqreport_remote_requests_total", "Total IQ Server requests"),
        &["endpoint", "status"],
    )
    .expect("valid metric definition")
});

/// IQ Server request duration in seconds.
pub static REMOTE_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "iqreport_remote_request_duration_seconds",
            "Duration of IQ Server requests",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["endpoint"],
    )
    .expect("valid metric definition")
});

/// Registry holding every metric above.
static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    for metric in all_metrics() {
        // Registration only fails on duplicate names, which the list above rules out.
        let _ = registry.register(metric);
    }
    registry
});

/// Get all metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(RUNS_TOTAL.clone()),
        Box::new(RECORDS_WRITTEN.clone()),
        Box::new(ITEMS_PROCESSED.clone()),
        Box::new(ITEM_DURATION.clone()),
        Box::new(REMOTE_REQUESTS.clone()),
        Box::new(REMOTE_REQUEST_DURATION.clone()),
    ]
}

/// Record one finished IQ Server request.
pub fn record_request(endpoint: &str, status: &str, elapsed: Duration) {
    REMOTE_REQUESTS.with_label_values(&[endpoint, status]).inc();
    REMOTE_REQUEST_DURATION
        .with_label_values(&[endpoint])
        .observe(elapsed.as_secs_f64());
}

/// Record one application reaching a terminal result.
pub fn record_item(result: &str, elapsed: Duration) {
    ITEMS_PROCESSED.with_label_values(&[result]).inc();
    ITEM_DURATION
        .with_label_values(&[result])
        .observe(elapsed.as_secs_f64());
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
