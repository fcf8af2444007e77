//! Error types for request admission and transport.
//!
//! The gate manufactures only queue-local errors (`QueueTimeout`,
//! `QueueCleared`); transport failures pass through verbatim and are never
//! retried or interpreted.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the transport collaborator.
///
/// These describe failures of the network exchange itself. An HTTP error
/// status is not a `TransportError`: the transport resolves with the
/// response and interpretation is left to the caller.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// The transport's own deadline elapsed
    #[error("transport timeout: {0}")]
    Timeout(String),

    /// Request failed after the connection was established
    #[error("HTTP request failed: {0}")]
    Http(String),
}

/// Errors returned to callers of [`RequestGate::submit`](crate::RequestGate::submit).
///
/// `QueueTimeout` signals local admission pressure, not a remote failure;
/// callers should treat it as "try again later" rather than "the server is
/// down".
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// Transport failure, propagated verbatim
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The request aged out while waiting in queue
    #[error("request timed out after {waited:?} in queue")]
    QueueTimeout {
        /// How long the request waited before being evicted
        waited: Duration,
    },

    /// The queue was cleared by shutdown while the request waited
    #[error("request queue cleared")]
    QueueCleared,

    /// Internal error (e.g., reply channel closed unexpectedly)
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Connect("refused".to_string());
        assert_eq!(format!("{}", err), "connection failed: refused");

        let err = TransportError::Http("bad gateway".to_string());
        assert_eq!(format!("{}", err), "HTTP request failed: bad gateway");
    }

    #[test]
    fn test_admission_error_display() {
        let err = AdmissionError::QueueTimeout {
            waited: Duration::from_secs(61),
        };
        assert_eq!(format!("{}", err), "request timed out after 61s in queue");

        let err = AdmissionError::QueueCleared;
        assert_eq!(format!("{}", err), "request queue cleared");
    }

    #[test]
    fn test_transport_error_converts() {
        let err: AdmissionError = TransportError::Timeout("30s elapsed".to_string()).into();
        assert!(matches!(
            err,
            AdmissionError::Transport(TransportError::Timeout(_))
        ));
    }
}
