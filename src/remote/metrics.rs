//! `RemoteClient` counters, exported through the `metrics` crate's
//! Prometheus recorder (installed by `telemetry::metrics_exporter`) and
//! mirrored in-memory for the synchronous `RemoteClient::metrics()`
//! snapshot consumers rely on. See `spec.md` §4.3.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "monitoring")]
use metrics::{counter, describe_counter, describe_histogram, histogram};

#[derive(Debug, Default)]
pub struct RemoteMetrics {
    total_requests: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    rate_limited: AtomicU64,
    response_time_sum_ms: AtomicU64,
    response_time_count: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful: u64,
    pub failed: u64,
    pub retried: u64,
    pub rate_limited: u64,
    pub avg_response_time_ms: f64,
}

/// Registers descriptions for every metric this module emits. Safe to
/// call more than once; the recorder de-duplicates by name.
#[cfg(feature = "monitoring")]
pub fn register_metrics() {
    describe_counter!("remote_requests_total", "Total requests attempted against the remote backend");
    describe_counter!("remote_requests_successful_total", "Requests that completed successfully");
    describe_counter!("remote_requests_failed_total", "Requests that ended in a non-retryable failure");
    describe_counter!("remote_requests_retried_total", "Retry attempts issued after a transient failure");
    describe_counter!("remote_requests_rate_limited_total", "Requests rejected by the backend's rate limiter");
    describe_histogram!("remote_request_duration_ms", "Remote request duration in milliseconds");
}

impl RemoteMetrics {
    pub fn record_attempt(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "monitoring")]
        counter!("remote_requests_total").increment(1);
    }

    pub fn record_success(&self, elapsed_ms: u64) {
        self.successful.fetch_add(1, Ordering::Relaxed);
        self.response_time_sum_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
        self.response_time_count.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "monitoring")]
        {
            counter!("remote_requests_successful_total").increment(1);
            #[allow(clippy::cast_precision_loss)]
            histogram!("remote_request_duration_ms").record(elapsed_ms as f64);
        }
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "monitoring")]
        counter!("remote_requests_failed_total").increment(1);
    }

    pub fn record_retry(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "monitoring")]
        counter!("remote_requests_retried_total").increment(1);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "monitoring")]
        counter!("remote_requests_rate_limited_total").increment(1);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let count = self.response_time_count.load(Ordering::Relaxed);
        let sum = self.response_time_sum_ms.load(Ordering::Relaxed);
        let avg = if count == 0 { 0.0 } else { sum as f64 / count as f64 };
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful: self.successful.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            avg_response_time_ms: avg,
        }
    }

    pub fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.successful.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.retried.store(0, Ordering::Relaxed);
        self.rate_limited.store(0, Ordering::Relaxed);
        self.response_time_sum_ms.store(0, Ordering::Relaxed);
        self.response_time_count.store(0, Ordering::Relaxed);
    }
}
