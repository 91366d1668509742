// Metrics module for observability
// HTTP request counters and latency histograms; lock outcome counters live in editlock-core

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};

/// Register every metric description. Call once at startup.
pub fn init_metrics() {
    describe_counter!(
        "http_requests_total",
        "Total number of HTTP requests received"
    );
    describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_counter!(
        "http_requests_errors_total",
        "Total number of HTTP request errors"
    );

    editlock_core::metrics::describe();

    tracing::info!("Metrics initialized");
}

pub fn record_http_request(method: &'static str, path: &'static str, status: u16, duration_secs: f64) {
    counter!("http_requests_total", "method" => method, "path" => path, "status" => status.to_string()).increment(1);
    histogram!("http_request_duration_seconds", "method" => method, "path" => path).record(duration_secs);

    if status >= 400 {
        counter!("http_requests_errors_total", "method" => method, "path" => path, "status" => status.to_string()).increment(1);
    }
}

pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer() {
        let timer = Timer::new();
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(timer.elapsed_secs() >= 0.01);
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_http_request("POST", "/locks/acquire", 200, 0.001);
        record_http_request("POST", "/locks/acquire", 503, 0.001);
    }
}
