/**
 * Transport layer: everything related to *how* envelopes are delivered.
 *
 * - `base`: the `Transport` dispatch engine and its request/response types
 * - `buffer`: bounded set of in-flight delivery tasks
 * - `rate_limits`: per-category limits learned from the collector
 * - `status`: HTTP status to delivery status mapping
 * - `http`: the default `ureq` request executor
 * - `worker`: background thread feeding the transport from sync code
 */

pub mod base;
pub mod buffer;
pub mod http;
pub mod rate_limits;
pub mod status;
pub mod worker;

pub use base::{
    Delivery, DeliveryOutcome, ExecutorFuture, RequestExecutor, Transport, TransportOptions,
    TransportRequest, TransportResponse,
};
pub use buffer::{TaskBuffer, TaskHandle};
pub use http::UreqExecutor;
pub use rate_limits::RateLimits;
pub use status::DeliveryStatus;
pub use worker::{FlushSignal, Worker, WorkerMsg};
