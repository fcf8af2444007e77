//! Fetchgate - streaming-aware HTTP request admission control
//!
//! This library keeps long-lived streaming HTTP requests from starving the
//! short, latency-sensitive requests (status polls, panel data fetches) that
//! the same client process issues concurrently, while bounding the total
//! number of requests in flight so a backend is not overwhelmed by bursts.
//!
//! # High-Level API
//!
//! Every outbound request goes through a single [`RequestGate`]:
//!
//! ```ignore
//! use fetchgate::{GateConfig, Request, RequestGate, ReqwestTransport, SubmitOptions};
//!
//! let transport = ReqwestTransport::new()?;
//! let gate = RequestGate::new(transport, GateConfig::default());
//!
//! // Ordinary bounded request, queued FIFO when capacity is exhausted.
//! let response = gate.submit(Request::get(url), SubmitOptions::default()).await?;
//!
//! // Health checks never wait behind queued work.
//! let options = SubmitOptions::new().with_priority(true);
//! let response = gate.submit(Request::get(health_url), options).await?;
//! ```

pub mod config;
pub mod error;
pub mod gate;
pub mod transport;

pub use config::GateConfig;
pub use error::{AdmissionError, TransportError};
pub use gate::{GateStatus, RequestClass, RequestGate, RequestId, SubmitOptions};
pub use transport::{Method, Request, ReqwestTransport, Transport};

/// Version of the fetchgate library.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_manifest() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
        assert!(!VERSION.is_empty());
    }
}
