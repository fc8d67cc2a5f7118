/*!
 * Beacon Core: the delivery engine of the Beacon telemetry SDK.
 *
 * Instrumentation code hands over envelopes; this crate delivers them to
 * the collector while bounding concurrency and honouring the rate limits the
 * collector announces. End users should depend on the `beacon` facade crate.
 *
 * # Module structure
 *
 * - `protocol/`: what we send: envelopes, categories, events, DSN
 * - `transport/`: how we deliver: dispatch engine, task buffer, rate
 *   limits, HTTP executor, background worker
 * - `client`: SDK lifecycle: init, global state, envelope routing
 * - `guard`: RAII flush-on-drop
 * - `clock`: injectable wall clock
 * - `error`: configuration and plumbing errors
 */

mod client;
mod guard;

pub mod clock;
pub mod error;
pub mod protocol;
pub mod transport;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use client::{BeforeSend, Client, Options};
pub use error::{BufferError, ConfigError, ExecutorError};
pub use guard::Guard;
pub use protocol::category::{DataCategory, ItemType};
pub use protocol::constants::{CLIENT_IDENTIFIER, DEFAULT_BUFFER_SIZE, SDK_NAME, SDK_VERSION};
pub use protocol::dsn::Dsn;
pub use protocol::envelope::{Envelope, EnvelopeItem};
pub use protocol::event::{Event, FeedbackParams, Level};
pub use transport::{
    Delivery, DeliveryOutcome, DeliveryStatus, RateLimits, RequestExecutor, TaskBuffer, Transport,
    TransportOptions, TransportRequest, TransportResponse,
};
pub use uuid::Uuid;

// ---------------------------------------------------------------------------
// Public functions
// ---------------------------------------------------------------------------

/**
 * Initializes the global client.
 *
 * Returns `Ok(Guard)` on success. The `Guard` flushes pending deliveries
 * when dropped; keep it alive for the duration of your app.
 *
 * Returns `Err` if the DSN is malformed or `init` was already called.
 */
pub fn init(options: Options) -> Result<Guard, ConfigError> {
    client::Client::init(options)?;
    Ok(Guard::new())
}

/// Queues an envelope. Silent no-op if not initialized.
pub fn capture_envelope(envelope: Envelope) {
    if let Some(client) = client::get_client() {
        client.capture_envelope(envelope);
    }
}

/**
 * Sends a message event.
 *
 * Accepts anything that implements `Display`: strings, errors, formatted
 * messages. Returns the event id, or `None` if the SDK is not initialized.
 */
pub fn capture_message(message: &(impl std::fmt::Display + ?Sized), level: Level) -> Option<Uuid> {
    client::get_client().and_then(|client| client.capture_message(message.to_string(), level))
}

/// Sends user feedback. Returns the feedback id, or `None` if not initialized.
pub fn capture_feedback(params: &FeedbackParams) -> Option<Uuid> {
    client::get_client().and_then(|client| client.capture_feedback(params))
}

/**
 * Manually flushes pending deliveries, blocking until drained or timeout.
 *
 * Normally you don't need this: the `Guard` handles it on drop.
 */
pub fn flush() -> bool {
    match client::get_client() {
        Some(client) => client.flush(None),
        None => true,
    }
}
