//! Metrics collection and reporting for the gateway

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Thread-safe metrics collector for the gateway
#[derive(Debug)]
pub struct GatewayMetricsCollector {
    /// Total execution requests handled
    pub requests_total: AtomicU64,

    /// Total failed execution requests
    pub errors_total: AtomicU64,

    /// Requests split into partitions
    pub fan_outs_total: AtomicU64,

    /// Partition dispatches launched
    pub partitions_total: AtomicU64,

    /// Queries submitted upstream
    pub submissions_total: AtomicU64,

    /// Job-status polls issued
    pub job_polls_total: AtomicU64,

    /// Requests rejected because of an empty result
    pub empty_results_total: AtomicU64,

    /// Rows returned to callers
    pub rows_returned_total: AtomicU64,

    /// Total request handling time
    pub request_time_total_ms: AtomicU64,

    /// Service start time
    start_time: Instant,
}

impl Default for GatewayMetricsCollector {
    fn default() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            fan_outs_total: AtomicU64::new(0),
            partitions_total: AtomicU64::new(0),
            submissions_total: AtomicU64::new(0),
            job_polls_total: AtomicU64::new(0),
            empty_results_total: AtomicU64::new(0),
            rows_returned_total: AtomicU64::new(0),
            request_time_total_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl GatewayMetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed request
    pub fn record_request(&self, duration: Duration, rows_returned: usize) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.rows_returned_total
            .fetch_add(rows_returned as u64, Ordering::Relaxed);
        self.request_time_total_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Record a failed request
    pub fn record_error(&self, duration: Duration) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.errors_total.fetch_add(1, Ordering::Relaxed);
        self.request_time_total_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_empty_result(&self) {
        self.empty_results_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fan_out(&self, partitions: usize) {
        self.fan_outs_total.fetch_add(1, Ordering::Relaxed);
        self.partitions_total
            .fetch_add(partitions as u64, Ordering::Relaxed);
    }

    pub fn record_submission(&self) {
        self.submissions_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_job_poll(&self) {
        self.job_polls_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> GatewayMetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let total_time = self.request_time_total_ms.load(Ordering::Relaxed);

        GatewayMetricsSnapshot {
            requests_total: requests,
            errors_total: self.errors_total.load(Ordering::Relaxed),
            fan_outs_total: self.fan_outs_total.load(Ordering::Relaxed),
            partitions_total: self.partitions_total.load(Ordering::Relaxed),
            submissions_total: self.submissions_total.load(Ordering::Relaxed),
            job_polls_total: self.job_polls_total.load(Ordering::Relaxed),
            empty_results_total: self.empty_results_total.load(Ordering::Relaxed),
            rows_returned_total: self.rows_returned_total.load(Ordering::Relaxed),
            request_time_total_ms: total_time,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            avg_request_time_ms: if requests > 0 {
                total_time as f64 / requests as f64
            } else {
                0.0
            },
        }
    }

    /// Generate Prometheus format metrics
    pub fn prometheus_format(&self) -> String {
        let snapshot = self.snapshot();

        format!(
            "# HELP redash_gateway_requests_total Total number of execution requests\n\
             # TYPE redash_gateway_requests_total counter\n\
             redash_gateway_requests_total {}\n\
             \n\
             # HELP redash_gateway_errors_total Total number of failed execution requests\n\
             # TYPE redash_gateway_errors_total counter\n\
             redash_gateway_errors_total {}\n\
             \n\
             # HELP redash_gateway_fan_outs_total Total number of requests split into partitions\n\
             # TYPE redash_gateway_fan_outs_total counter\n\
             redash_gateway_fan_outs_total {}\n\
             \n\
             # HELP redash_gateway_partitions_total Total number of partition dispatches\n\
             # TYPE redash_gateway_partitions_total counter\n\
             redash_gateway_partitions_total {}\n\
             \n\
             # HELP redash_gateway_submissions_total Total number of upstream query submissions\n\
             # TYPE redash_gateway_submissions_total counter\n\
             redash_gateway_submissions_total {}\n\
             \n\
             # HELP redash_gateway_job_polls_total Total number of job status polls\n\
             # TYPE redash_gateway_job_polls_total counter\n\
             redash_gateway_job_polls_total {}\n\
             \n\
             # HELP redash_gateway_empty_results_total Total number of rejected empty results\n\
             # TYPE redash_gateway_empty_results_total counter\n\
             redash_gateway_empty_results_total {}\n\
             \n\
             # HELP redash_gateway_rows_returned_total Total number of rows returned\n\
             # TYPE redash_gateway_rows_returned_total counter\n\
             redash_gateway_rows_returned_total {}\n\
             \n\
             # HELP redash_gateway_request_time_total_ms Total request handling time in milliseconds\n\
             # TYPE redash_gateway_request_time_total_ms counter\n\
             redash_gateway_request_time_total_ms {}\n\
             \n\
             # HELP redash_gateway_uptime_seconds Service uptime in seconds\n\
             # TYPE redash_gateway_uptime_seconds gauge\n\
             redash_gateway_uptime_seconds {}\n\
             \n\
             # HELP redash_gateway_avg_request_time_ms Average request handling time in milliseconds\n\
             # TYPE redash_gateway_avg_request_time_ms gauge\n\
             redash_gateway_avg_request_time_ms {}\n",
            snapshot.requests_total,
            snapshot.errors_total,
            snapshot.fan_outs_total,
            snapshot.partitions_total,
            snapshot.submissions_total,
            snapshot.job_polls_total,
            snapshot.empty_results_total,
            snapshot.rows_returned_total,
            snapshot.request_time_total_ms,
            snapshot.uptime_seconds,
            snapshot.avg_request_time_ms
        )
    }
}

/// Snapshot of gateway metrics at a point in time
#[derive(Debug, Clone)]
pub struct GatewayMetricsSnapshot {
    pub requests_total: u64,
    pub errors_total: u64,
    pub fan_outs_total: u64,
    pub partitions_total: u64,
    pub submissions_total: u64,
    pub job_polls_total: u64,
    pub empty_results_total: u64,
    pub rows_returned_total: u64,
    pub request_time_total_ms: u64,
    pub uptime_seconds: u64,
    pub avg_request_time_ms: f64,
}
