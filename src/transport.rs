//! Transport abstraction for testability.
//!
//! The gate calls the transport through a narrow interface: one `send` that
//! performs the actual network exchange and settles exactly once. The gate
//! never inspects response bodies or status codes, so the response type is
//! an opaque associated type chosen by the implementation.

use std::future::Future;
use std::time::Duration;

use crate::error::TransportError;

/// HTTP method for a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    /// HTTP GET (the default)
    #[default]
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP DELETE
    Delete,
}

/// An outbound request specification.
///
/// Carried opaquely through the gate and handed verbatim to the transport.
///
/// # Example
///
/// ```
/// use fetchgate::Request;
///
/// let request = Request::post("https://api.example.com/messages")
///     .with_header("content-type", "application/json")
///     .with_body(r#"{"text":"hi"}"#);
/// assert_eq!(request.url(), "https://api.example.com/messages");
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    url: String,
    method: Method,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl Request {
    /// Creates a request with the given method and URL.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Creates a GET request for the given URL.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Creates a POST request for the given URL.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    /// Appends a header to the request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Returns the request URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the request method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the request body, if any.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

/// Trait for the request-issuing primitive the gate dispatches through.
///
/// Implementations must settle exactly once per `send` call. The gate holds
/// the transport for its own lifetime and shares it across spawned dispatch
/// tasks, hence the `Send + Sync + 'static` bound.
pub trait Transport: Send + Sync + 'static {
    /// Opaque response type resolved to callers.
    type Response: Send + 'static;

    /// Performs the network exchange for `request`.
    fn send(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Self::Response, TransportError>> + Send;
}

/// Default connect timeout for [`ReqwestTransport`].
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Production transport backed by `reqwest`.
///
/// Configured with connection pooling and TCP keepalive for bursty
/// multi-panel load. Deliberately sets no total request timeout: the gate
/// imposes no deadline on dispatched requests, and a total timeout would
/// sever long-lived streaming responses.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with default configuration.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    /// Creates a transport with a custom connect timeout.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| TransportError::Http(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Wraps an existing `reqwest` client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    type Response = reqwest::Response;

    async fn send(&self, request: Request) -> Result<reqwest::Response, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        // An HTTP error status still resolves with the response; only the
        // exchange itself failing is a transport error.
        builder.send().await.map_err(map_reqwest_error)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else {
        TransportError::Http(err.to_string())
    }
}
