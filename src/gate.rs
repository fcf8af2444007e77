//! Request admission control.
//!
//! This module implements the [`RequestGate`], which classifies every
//! outbound request and either dispatches it immediately through the
//! transport or parks it in an ordered waiting list. A drain pass services
//! the waiting lists whenever capacity frees up.
//!
//! # Design
//!
//! Requests fall into three classes, decided once at submission:
//!
//! ```text
//! Streaming → dispatched unconditionally; exempt from the ceiling;
//!             while one is active, newly submitted regular requests defer
//!             to the queue
//! Priority  → dispatched unconditionally, bypassing the ceiling;
//!             health checks must never wait behind queued data fetches
//! Regular   → dispatched while no stream is active and the ceiling has
//!             room; queued FIFO otherwise
//! ```
//!
//! Queued requests age: a drain pass rejects anything that has waited past
//! the staleness threshold instead of dispatching it, so a stuck backend
//! surfaces as fast queue-timeout failures rather than an ever-growing
//! backlog.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::GateConfig;
use crate::error::AdmissionError;
use crate::transport::{Request, Transport};

/// Global counter for generating unique request IDs.
static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a request passing through the gate.
///
/// IDs are monotonically increasing and unique within a process lifetime;
/// they exist to correlate log messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    /// Creates a new unique request ID.
    pub fn new() -> Self {
        Self(REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric value of this request ID.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Classification of a submitted request.
///
/// Decided exactly once at submission and carried immutably on the request
/// for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Long-lived request expected to hold the connection open.
    /// Never queued, never counted against the ceiling.
    Streaming,
    /// Must never wait behind queued regular work (e.g., health checks).
    /// Bypasses the ceiling.
    Priority,
    /// Ordinary bounded request, subject to the ceiling and FIFO queueing.
    Regular,
}

impl RequestClass {
    /// Classifies a submission from its option flags.
    ///
    /// Streaming takes precedence when both flags are set (setting both is
    /// a caller contract violation, tolerated but undefined).
    fn from_options(options: SubmitOptions) -> Self {
        if options.streaming {
            RequestClass::Streaming
        } else if options.priority {
            RequestClass::Priority
        } else {
            RequestClass::Regular
        }
    }
}

/// Submission options for [`RequestGate::submit`].
///
/// Both flags default to false. Setting both is a caller contract
/// violation; streaming takes precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubmitOptions {
    streaming: bool,
    priority: bool,
}

impl SubmitOptions {
    /// Creates options with both flags unset (a regular request).
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the request as streaming (long-lived, holds the connection).
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Marks the request as priority (never waits behind queued work).
    pub fn with_priority(mut self, priority: bool) -> Self {
        self.priority = priority;
        self
    }
}

/// Read-only snapshot of gate state for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GateStatus {
    /// In-flight streaming requests
    pub active_streaming: usize,
    /// Requests waiting in the priority queue
    pub queued_priority: usize,
    /// Requests waiting in the regular queue
    pub queued_regular: usize,
    /// In-flight regular requests counted against the ceiling
    pub active_regular: usize,
}

/// A request descriptor awaiting dispatch or in flight.
struct QueuedRequest<R> {
    id: RequestId,
    request: Request,
    class: RequestClass,
    enqueued_at: Instant,
    reply: oneshot::Sender<Result<R, AdmissionError>>,
}

/// Mutable gate state. All mutation happens in short synchronous critical
/// sections behind the mutex in [`Inner`].
struct GateState<R> {
    active_streaming: usize,
    active_regular: usize,
    /// Priority dispatches are counted separately and never checked
    /// against the ceiling.
    active_priority: usize,
    priority_queue: VecDeque<QueuedRequest<R>>,
    regular_queue: VecDeque<QueuedRequest<R>>,
    /// Re-entrancy guard: at most one drain pass pops at a time.
    draining: bool,
}

impl<R> GateState<R> {
    fn new() -> Self {
        Self {
            active_streaming: 0,
            active_regular: 0,
            active_priority: 0,
            priority_queue: VecDeque::new(),
            regular_queue: VecDeque::new(),
            draining: false,
        }
    }
}

struct Inner<T: Transport> {
    transport: T,
    config: GateConfig,
    state: Mutex<GateState<T::Response>>,
}

/// Client-side HTTP request admission controller.
///
/// One gate instance is created at process start and injected into every
/// caller; cloning produces another handle to the same gate. Dispatch runs
/// on spawned tasks, so the gate must be used from within a Tokio runtime.
///
/// Every submitted request eventually settles: with the transport's
/// response or error, with a queue timeout if it aged out while waiting,
/// or with a cleared-queue error at shutdown.
pub struct RequestGate<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for RequestGate<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> RequestGate<T> {
    /// Creates a gate dispatching through the given transport.
    ///
    /// # Panics
    ///
    /// Panics if `config.max_concurrent_regular()` is 0.
    pub fn new(transport: T, config: GateConfig) -> Self {
        assert!(
            config.max_concurrent_regular() > 0,
            "max_concurrent_regular must be > 0"
        );

        info!(
            max_concurrent_regular = config.max_concurrent_regular(),
            stale_after_ms = config.stale_after().as_millis() as u64,
            "Created request gate"
        );

        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                state: Mutex::new(GateState::new()),
            }),
        }
    }

    /// Submits a request for admission.
    ///
    /// Classification and dispatch (or queueing) happen synchronously at
    /// the call; the returned future only awaits the outcome, so a caller
    /// that delays polling does not delay the request.
    ///
    /// # Returns
    ///
    /// The transport's response, or the transport's error verbatim, or
    /// [`AdmissionError::QueueTimeout`] if the request aged out while
    /// queued, or [`AdmissionError::QueueCleared`] if [`shutdown`] ran
    /// while it waited.
    ///
    /// [`shutdown`]: RequestGate::shutdown
    pub fn submit(
        &self,
        request: Request,
        options: SubmitOptions,
    ) -> impl std::future::Future<Output = Result<T::Response, AdmissionError>> + Send {
        let (reply, response) = oneshot::channel();
        let class = RequestClass::from_options(options);
        let entry = QueuedRequest {
            id: RequestId::new(),
            request,
            class,
            enqueued_at: Instant::now(),
            reply,
        };

        match class {
            RequestClass::Streaming | RequestClass::Priority => {
                let mut state = self.inner.state.lock().unwrap();
                dispatch(&self.inner, &mut state, entry);
            }
            RequestClass::Regular => {
                let mut state = self.inner.state.lock().unwrap();
                if state.active_streaming == 0
                    && state.active_regular < self.inner.config.max_concurrent_regular()
                {
                    dispatch(&self.inner, &mut state, entry);
                } else {
                    debug!(
                        id = %entry.id,
                        url = %entry.request.url(),
                        queued_regular = state.regular_queue.len() + 1,
                        "Queueing regular request"
                    );
                    state.regular_queue.push_back(entry);
                    drop(state);
                    drain(&self.inner);
                }
            }
        }

        async move {
            match response.await {
                Ok(result) => result,
                Err(_) => Err(AdmissionError::Internal(
                    "reply channel closed before the request settled".to_string(),
                )),
            }
        }
    }

    /// Returns a read-only snapshot of gate state. No side effects.
    pub fn status(&self) -> GateStatus {
        let state = self.inner.state.lock().unwrap();
        GateStatus {
            active_streaming: state.active_streaming,
            queued_priority: state.priority_queue.len(),
            queued_regular: state.regular_queue.len(),
            active_regular: state.active_regular,
        }
    }

    /// Rejects every queued request with [`AdmissionError::QueueCleared`]
    /// and empties both queues.
    ///
    /// Already-dispatched in-flight requests are unaffected, and the gate
    /// remains usable afterward.
    pub fn shutdown(&self) {
        let (priority, regular) = {
            let mut state = self.inner.state.lock().unwrap();
            (
                std::mem::take(&mut state.priority_queue),
                std::mem::take(&mut state.regular_queue),
            )
        };

        let cleared = priority.len() + regular.len();
        for entry in priority.into_iter().chain(regular) {
            let _ = entry.reply.send(Err(AdmissionError::QueueCleared));
        }

        info!(cleared, "Request queues cleared");
    }
}

/// Dispatches a request under the held state lock.
///
/// The counter for the request's class is incremented before the transport
/// is called, in the same critical section as the capacity check that
/// admitted it, so the ceiling can never be oversubscribed by a racing
/// submission.
fn dispatch<T: Transport>(
    inner: &Arc<Inner<T>>,
    state: &mut GateState<T::Response>,
    entry: QueuedRequest<T::Response>,
) {
    match entry.class {
        RequestClass::Streaming => state.active_streaming += 1,
        RequestClass::Priority => state.active_priority += 1,
        RequestClass::Regular => state.active_regular += 1,
    }

    debug!(
        id = %entry.id,
        class = ?entry.class,
        url = %entry.request.url(),
        "Dispatching request"
    );

    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        // Guard releases the counter after the transport settles, however
        // it settles, and schedules a drain pass for freed capacity.
        let guard = DispatchGuard {
            inner: Arc::clone(&inner),
            class: entry.class,
        };

        let result = inner.transport.send(entry.request).await;

        // The receiver may have been dropped by an uninterested caller;
        // the request still ran to completion and releases its slot.
        let _ = entry.reply.send(result.map_err(AdmissionError::from));

        drop(guard);
    });
}

/// Runs one drain pass: pops queued requests and dispatches them while
/// capacity and queue contents allow.
///
/// The `draining` flag guarantees no two passes interleave their pops. The
/// state lock is released between iterations so completions arriving
/// mid-pass are not blocked.
fn drain<T: Transport>(inner: &Arc<Inner<T>>) {
    {
        let mut state = inner.state.lock().unwrap();
        if state.draining {
            return;
        }
        if state.priority_queue.is_empty() && state.regular_queue.is_empty() {
            return;
        }
        state.draining = true;
    }

    loop {
        let mut state = inner.state.lock().unwrap();

        if state.active_regular >= inner.config.max_concurrent_regular() {
            state.draining = false;
            return;
        }

        let entry = match state.priority_queue.pop_front() {
            Some(entry) => Some(entry),
            None => {
                // Newly freed capacity goes to queued regulars only once no
                // stream is holding the connection budget.
                if state.active_streaming > 0 {
                    None
                } else {
                    state.regular_queue.pop_front()
                }
            }
        };

        let Some(entry) = entry else {
            state.draining = false;
            return;
        };

        let waited = entry.enqueued_at.elapsed();
        if waited > inner.config.stale_after() {
            drop(state);
            warn!(
                id = %entry.id,
                url = %entry.request.url(),
                waited_ms = waited.as_millis() as u64,
                "Evicting stale queued request"
            );
            let _ = entry
                .reply
                .send(Err(AdmissionError::QueueTimeout { waited }));
            continue;
        }

        dispatch(inner, &mut state, entry);
    }
}

/// Schedules a drain pass on a fresh task (never re-entrant with the
/// completion that freed the capacity).
fn schedule_drain<T: Transport>(inner: Arc<Inner<T>>) {
    tokio::spawn(async move {
        drain(&inner);
    });
}

/// RAII guard releasing a dispatched request's counter slot.
///
/// Held across the transport call so the slot is released on success,
/// failure, or task abort alike.
struct DispatchGuard<T: Transport> {
    inner: Arc<Inner<T>>,
    class: RequestClass,
}

impl<T: Transport> Drop for DispatchGuard<T> {
    fn drop(&mut self) {
        {
            let mut state = self.inner.state.lock().unwrap();
            match self.class {
                RequestClass::Streaming => state.active_streaming -= 1,
                RequestClass::Priority => state.active_priority -= 1,
                RequestClass::Regular => state.active_regular -= 1,
            }
        }

        // Priority requests never held a governed slot, so their
        // completion frees no capacity for queued work.
        if !matches!(self.class, RequestClass::Priority) {
            schedule_drain(Arc::clone(&self.inner));
        }
    }
}
