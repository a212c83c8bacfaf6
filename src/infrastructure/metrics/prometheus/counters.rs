use metrics::{counter, histogram};
use std::time::Instant;

use crate::domain::AuthMethod;

/// Count a finished ceremony by method and outcome.
pub fn increment_auth_attempt(method: AuthMethod, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("auth_attempts_total", "method" => method.as_str(), "outcome" => outcome)
        .increment(1);
}

/// Count an assertion rejected for a non-advancing signature counter.
pub fn increment_counter_replay() {
    counter!("webauthn_counter_replays_total").increment(1);
}

/// Track HTTP request count and latency.
pub fn track_http_request(start: Instant, path: &str, method: &str, status: u16) {
    let elapsed = start.elapsed();
    let labels = [
        ("path", path.to_string()),
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(elapsed);
}
