//! Gate configuration.

use std::time::Duration;

/// Default ceiling on concurrently dispatched regular requests.
///
/// Chosen generously so that legitimate multi-panel loads (several views
/// fetching at once on a tab switch) do not create false timeout pressure.
pub const DEFAULT_MAX_CONCURRENT_REGULAR: usize = 10;

/// Default maximum time a request may wait in queue before being rejected.
///
/// Exceeds realistic backend response latency while still failing fast
/// enough for callers to react.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60);

/// Configuration for the request gate.
///
/// Groups the admission-control parameters, providing sensible defaults
/// while allowing customization.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use fetchgate::GateConfig;
///
/// // Using defaults
/// let config = GateConfig::default();
/// assert_eq!(config.max_concurrent_regular(), 10);
/// assert_eq!(config.stale_after(), Duration::from_secs(60));
///
/// // Custom configuration
/// let config = GateConfig::new()
///     .with_max_concurrent_regular(4)
///     .with_stale_after(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    /// Maximum number of concurrently dispatched regular requests
    max_concurrent_regular: usize,
    /// Maximum queue age before a request is rejected with a timeout
    stale_after: Duration,
}

impl GateConfig {
    /// Create a new gate configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ceiling on concurrently dispatched regular requests.
    ///
    /// Streaming and priority requests are not counted against this ceiling.
    /// Default: 10.
    pub fn with_max_concurrent_regular(mut self, max: usize) -> Self {
        self.max_concurrent_regular = max;
        self
    }

    /// Set the maximum time a request may wait in queue.
    ///
    /// A queued request older than this is rejected with
    /// [`AdmissionError::QueueTimeout`](crate::AdmissionError::QueueTimeout)
    /// instead of being dispatched. Default: 60 seconds.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Get the ceiling on concurrently dispatched regular requests.
    pub fn max_concurrent_regular(&self) -> usize {
        self.max_concurrent_regular
    }

    /// Get the maximum queue age before rejection.
    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_concurrent_regular: DEFAULT_MAX_CONCURRENT_REGULAR,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }
}
