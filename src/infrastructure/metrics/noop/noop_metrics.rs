use crate::domain::{AuthMethod, Metrics};
use std::time::Instant;

/// Metrics backend that records nothing.
pub struct NoopMetrics;

impl NoopMetrics {
    pub fn new() -> Self {
        NoopMetrics
    }
}

impl Metrics for NoopMetrics {
    // ---
    fn render(&self) -> String {
        String::new()
    }
    fn record_auth_attempt(&self, _: AuthMethod, _: bool) {}
    fn record_counter_replay(&self) {}
    fn record_http_request(&self, _: Instant, _: &str, _: &str, _: u16) {}
}
