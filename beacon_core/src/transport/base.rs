/**
 * Transport: dispatch of envelopes to the collector.
 *
 * `send` runs the whole delivery protocol for one envelope:
 *
 * 1. Classify the envelope by data category.
 * 2. If the category is rate limited right now, resolve with `rate_limit`
 *    without touching the buffer or the network.
 * 3. Serialize the envelope and submit one request task to the buffer.
 * 4. When the executor answers, map the status code, fold any rate-limit
 *    header into the table, and resolve with a `DeliveryOutcome`.
 *
 * Admission (steps 1-3) happens synchronously inside `send`; only the wait
 * for the response is deferred to the returned `Delivery` future. A flush
 * issued right after `send` returns therefore always covers that envelope.
 *
 * `send` never fails and never logs. Every failure path resolves the
 * future with an outcome value, so the caller decides what to do with it.
 */
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::future::{self, BoxFuture, FutureExt};
use http::HeaderMap;
use parking_lot::{Mutex, RwLock};

use super::buffer::TaskBuffer;
use super::rate_limits::RateLimits;
use super::status::DeliveryStatus;
use crate::clock::{Clock, SystemClock};
use crate::error::{BufferError, ExecutorError};
use crate::protocol::category::DataCategory;
use crate::protocol::constants::DEFAULT_BUFFER_SIZE;
use crate::protocol::envelope::Envelope;

/// Reason reported when a failed response carries no explanation at all.
const UNKNOWN_TRANSPORT_ERROR: &str = "Unknown transport error";

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// One serialized envelope ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub category: DataCategory,
    pub body: Bytes,
}

/// What the executor learned from the collector.
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    /// HTTP status, `None` when no status line was received.
    pub status_code: Option<u16>,
    pub headers: Option<HeaderMap>,
    /// Explicit failure reason supplied by the executor.
    pub reason: Option<String>,
    pub body: Option<String>,
}

impl TransportResponse {
    /// Response with only a status code.
    pub fn with_status(status_code: u16) -> Self {
        Self { status_code: Some(status_code), ..Default::default() }
    }
}

// ---------------------------------------------------------------------------
// RequestExecutor
// ---------------------------------------------------------------------------

/// Future returned by a `RequestExecutor`.
pub type ExecutorFuture = BoxFuture<'static, Result<TransportResponse, ExecutorError>>;

/**
 * Performs exactly one request against the collector.
 *
 * This is the only network I/O seam of the transport. `Err` is reserved for
 * failures before any HTTP status was received; every HTTP answer,
 * including 4xx and 5xx, is an `Ok(TransportResponse)`.
 *
 * Closures `Fn(TransportRequest) -> impl Future<Output = Result<..>>`
 * implement this trait, which keeps test doubles short.
 */
pub trait RequestExecutor: Send + Sync {
    fn execute(&self, request: TransportRequest) -> ExecutorFuture;
}

impl<F, Fut> RequestExecutor for F
where
    F: Fn(TransportRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<TransportResponse, ExecutorError>> + Send + 'static,
{
    fn execute(&self, request: TransportRequest) -> ExecutorFuture {
        self(request).boxed()
    }
}

// ---------------------------------------------------------------------------
// DeliveryOutcome
// ---------------------------------------------------------------------------

/// Terminal result of one `send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub status: DeliveryStatus,
    pub reason: Option<String>,
}

impl DeliveryOutcome {
    pub fn success(reason: Option<String>) -> Self {
        Self { status: DeliveryStatus::Success, reason }
    }

    pub fn failure(status: DeliveryStatus, reason: impl Into<String>) -> Self {
        Self { status, reason: Some(reason.into()) }
    }

    pub fn is_success(&self) -> bool {
        self.status == DeliveryStatus::Success
    }
}

/// Future resolving to the outcome of one `send`. Never fails.
pub type Delivery = BoxFuture<'static, DeliveryOutcome>;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Construction options for `Transport`.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Capacity of the buffer created when `buffer` is `None`.
    pub buffer_size: usize,

    /// Pre-built buffer to use instead of creating one.
    pub buffer: Option<Arc<TaskBuffer>>,

    /// Time source for rate-limit decisions.
    pub clock: Arc<dyn Clock>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self { buffer_size: DEFAULT_BUFFER_SIZE, buffer: None, clock: Arc::new(SystemClock) }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Delivery engine: rate-limit gate, bounded concurrency, outcome mapping.
///
/// Cheap to clone; clones share the buffer and the rate-limit table.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<Inner>,
}

struct Inner {
    executor: Arc<dyn RequestExecutor>,
    buffer: Arc<TaskBuffer>,
    /// Current snapshot; replaced as a whole on every update. The lock only
    /// guards the pointer, so readers wait at most for a pointer store.
    rate_limits: RwLock<Arc<RateLimits>>,
    /// Serializes writers so each read-modify-write sees the previous result.
    rate_limit_writer: Mutex<()>,
    clock: Arc<dyn Clock>,
}

impl Transport {
    /// Creates a transport with default options around `executor`.
    pub fn new<E>(executor: E) -> Self
    where
        E: RequestExecutor + 'static,
    {
        Self::with_options(Arc::new(executor), TransportOptions::default())
    }

    pub fn with_options(executor: Arc<dyn RequestExecutor>, options: TransportOptions) -> Self {
        let buffer = options
            .buffer
            .unwrap_or_else(|| Arc::new(TaskBuffer::new(options.buffer_size)));

        Self {
            inner: Arc::new(Inner {
                executor,
                buffer,
                rate_limits: RwLock::new(Arc::new(RateLimits::new())),
                rate_limit_writer: Mutex::new(()),
                clock: options.clock,
            }),
        }
    }

    /// The buffer bounding in-flight deliveries.
    pub fn buffer(&self) -> &Arc<TaskBuffer> {
        &self.inner.buffer
    }

    /// Snapshot of the current rate-limit table.
    pub fn rate_limits(&self) -> Arc<RateLimits> {
        self.inner.current_limits()
    }

    /**
     * Delivers `envelope`.
     *
     * Must be called from within a Tokio runtime for the request to be
     * dispatched; outside one the delivery resolves as `unknown_error`.
     */
    pub fn send(&self, envelope: &Envelope) -> Delivery {
        let category = envelope.category();
        let now = self.inner.clock.now();

        let limits = self.inner.current_limits();
        if limits.is_rate_limited(category, now) {
            let reason = limits.reason_for(category, now);
            return resolved(DeliveryOutcome::failure(DeliveryStatus::RateLimit, reason));
        }

        let body = match envelope.to_bytes() {
            Ok(body) => body,
            Err(e) => {
                return resolved(DeliveryOutcome::failure(
                    DeliveryStatus::Invalid,
                    format!("failed to serialize envelope: {e}"),
                ))
            },
        };

        let request = TransportRequest { category, body };
        let inner = Arc::clone(&self.inner);
        let task = async move {
            let result = inner.executor.execute(request).await;
            inner.settle(category, result)
        };

        match self.inner.buffer.submit(task) {
            Ok(handle) => async move {
                handle.await.unwrap_or_else(|e| {
                    DeliveryOutcome::failure(DeliveryStatus::UnknownError, e.to_string())
                })
            }
            .boxed(),
            Err(e @ BufferError::Full { .. }) => {
                resolved(DeliveryOutcome::failure(DeliveryStatus::FailedSend, e.to_string()))
            },
            Err(e) => resolved(DeliveryOutcome::failure(DeliveryStatus::UnknownError, e.to_string())),
        }
    }

    /// Waits for every in-flight delivery to finish, or for `timeout`.
    ///
    /// Returns `false` on timeout. Nothing is cancelled either way.
    pub async fn flush(&self, timeout: Option<Duration>) -> bool {
        self.inner.buffer.drain(timeout).await
    }
}

impl Inner {
    fn current_limits(&self) -> Arc<RateLimits> {
        self.rate_limits.read().clone()
    }

    /// Read-modify-write of the table as one step among writers.
    ///
    /// The new table is built outside the pointer lock; readers keep using
    /// the old snapshot until the swap.
    fn apply_rate_limits(&self, headers: &HeaderMap, now: DateTime<Utc>) {
        let _writer = self.rate_limit_writer.lock();
        let next = Arc::new(self.current_limits().update(headers, now));
        *self.rate_limits.write() = next;
    }

    /// Turns the executor's answer into an outcome, learning rate limits on the way.
    fn settle(
        &self,
        category: DataCategory,
        result: Result<TransportResponse, ExecutorError>,
    ) -> DeliveryOutcome {
        let response = match result {
            Ok(response) => response,
            Err(e) => return DeliveryOutcome::failure(DeliveryStatus::UnknownError, e.to_string()),
        };

        let status = DeliveryStatus::from_http_code(response.status_code);
        let now = self.clock.now();

        if let Some(headers) = &response.headers {
            self.apply_rate_limits(headers, now);
        }

        if status == DeliveryStatus::Success {
            return DeliveryOutcome::success(response.reason);
        }

        let reason = non_empty(response.reason)
            .or_else(|| non_empty(response.body))
            .unwrap_or_else(|| {
                if status == DeliveryStatus::RateLimit {
                    self.current_limits().reason_for(category, now)
                } else {
                    UNKNOWN_TRANSPORT_ERROR.to_string()
                }
            });

        DeliveryOutcome::failure(status, reason)
    }
}

fn resolved(outcome: DeliveryOutcome) -> Delivery {
    future::ready(outcome).boxed()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
