use std::sync::Arc;
use std::time::Instant;

/// Which half of the product an auth event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    PasskeyRegistration,
    PasskeyLogin,
    GitHub,
}

impl AuthMethod {
    // ---
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            AuthMethod::PasskeyRegistration => "passkey_registration",
            AuthMethod::PasskeyLogin => "passkey_login",
            AuthMethod::GitHub => "github",
        }
    }
}

/// Abstraction for application metrics (counters, histograms).
pub trait Metrics: Send + Sync + 'static {
    // ---
    /// Render current metrics in Prometheus text format.
    fn render(&self) -> String;

    /// Record a completed ceremony and whether it succeeded.
    fn record_auth_attempt(&self, method: AuthMethod, success: bool);

    /// Record a rejected assertion whose counter did not advance.
    fn record_counter_replay(&self);

    /// Record HTTP request duration and labels.
    fn record_http_request(&self, start: Instant, path: &str, method: &str, status: u16);
}

/// Type alias for any backend that implements Metrics.
pub type MetricsPtr = Arc<dyn Metrics>;
