/**
 * Beacon: telemetry delivery SDK for Rust.
 *
 * This is the crate applications depend on. It re-exports the core API and
 * turns configuration errors into a startup panic so `init` reads as one line.
 *
 * # Quick start
 *
 * ```ignore
 * fn main() {
 *     let _guard = beacon::init("https://public@collector.example.com/1");
 *
 *     beacon::capture_message("Application started", beacon::Level::Info);
 *
 *     // _guard is dropped here → pending envelopes are flushed
 * }
 * ```
 *
 * # With options
 *
 * ```ignore
 * use std::sync::Arc;
 *
 * fn main() {
 *     let _guard = beacon::init(beacon::Options {
 *         dsn: "https://public@collector.example.com/1".into(),
 *         buffer_size: 10,
 *         before_send: Some(Arc::new(|envelope| Some(envelope))),
 *         ..Default::default()
 *     });
 * }
 * ```
 */

// ---------------------------------------------------------------------------
// Re-exports from beacon_core: the public surface area
// ---------------------------------------------------------------------------

pub use beacon_core::{
    capture_envelope, capture_feedback, capture_message, flush, BeforeSend, Client, ConfigError,
    DataCategory, DeliveryOutcome, DeliveryStatus, Dsn, Envelope, EnvelopeItem, Event,
    FeedbackParams, Guard, ItemType, Level, Options, RequestExecutor, Transport,
    TransportOptions, TransportRequest, TransportResponse, Uuid, SDK_NAME, SDK_VERSION,
};

/// Lower-level building blocks for custom executors and embedders.
pub mod transport {
    pub use beacon_core::transport::*;
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

/**
 * Initializes the Beacon SDK.
 *
 * Accepts either a bare DSN string or a full `Options` struct:
 *
 * ```ignore
 * let _guard = beacon::init("https://public@collector.example.com/1");
 * ```
 *
 * # Panics
 * Panics if the DSN is malformed, the background worker cannot start, or
 * `init` is called more than once. These are configuration bugs that should
 * surface at startup.
 *
 * # Returns
 * A `Guard`. Keep it alive for the duration of your app.
 * When it drops, all pending envelopes are flushed.
 */
#[allow(clippy::expect_used)]
pub fn init(options: impl Into<Options>) -> Guard {
    beacon_core::init(options.into()).expect("[Beacon] Failed to initialize SDK")
}

/**
 * Fallible variant of [`init`] for applications that want to handle a bad
 * configuration themselves.
 */
pub fn try_init(options: impl Into<Options>) -> Result<Guard, ConfigError> {
    beacon_core::init(options.into())
}
