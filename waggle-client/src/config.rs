//! Client configuration.

use std::time::Duration;

/// Default per-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of pooled request controllers.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

/// Tunables for the request dispatcher and its controllers.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Wall-clock deadline applied to every request. The retry loop runs
    /// until this expires; it is the only cancellation primitive.
    pub request_timeout: Duration,

    /// Number of pooled controllers, and therefore the maximum number of
    /// requests in flight at once.
    pub max_in_flight: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

impl ClientConfig {
    /// Create a configuration with explicit values.
    pub fn new(request_timeout: Duration, max_in_flight: usize) -> Self {
        Self {
            request_timeout,
            max_in_flight,
        }
    }

    /// Override the per-request deadline.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Override the in-flight request limit.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }
}
