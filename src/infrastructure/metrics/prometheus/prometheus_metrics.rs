//! Prometheus metrics implementation.
//!
//! Delegates to the sibling `counters` and `recorder` modules, which talk to
//! the global `metrics` registry. A single global handle renders everything
//! collected in Prometheus text format.

use crate::domain::{AuthMethod, Metrics};
use std::time::Instant;

/// Prometheus-based metrics implementation.
///
/// Holds no state: metrics are registered globally through the `counter!()`
/// and `histogram!()` macros and the handle lives in `recorder.rs`.
pub struct PrometheusMetrics {}

impl PrometheusMetrics {
    pub fn new() -> Self {
        tracing::info!("Creating Prometheus metrics");
        PrometheusMetrics {}
    }
}

impl Metrics for PrometheusMetrics {
    fn render(&self) -> String {
        super::render_metrics()
    }

    fn record_auth_attempt(&self, method: AuthMethod, success: bool) {
        tracing::debug!("Recording {} attempt success={}", method.as_str(), success);
        super::increment_auth_attempt(method, success);
    }

    fn record_counter_replay(&self) {
        super::increment_counter_replay();
    }

    fn record_http_request(&self, start: Instant, path: &str, method: &str, status: u16) {
        super::track_http_request(start, path, method, status);
    }
}
