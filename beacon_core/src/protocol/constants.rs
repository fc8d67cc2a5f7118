/**
 * SDK-wide constants.
 *
 * These values identify the SDK to the collector and name the parts of the
 * wire contract the transport has to read or write.
 */

/// SDK name reported in envelope headers and event payloads.
pub const SDK_NAME: &str = "beacon.rust";

/// SDK version string used as the client identifier in the auth header.
/// Derived at compile time from the `beacon_core` package version in `Cargo.toml`.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Client identifier sent with every request, e.g. `beacon.rust/0.1.0`.
pub const CLIENT_IDENTIFIER: &str = concat!("beacon.rust/", env!("CARGO_PKG_VERSION"));

/// Envelope protocol version announced in the auth header.
pub const PROTOCOL_VERSION: u8 = 7;

/// Response header carrying category rate-limit directives.
pub const RATE_LIMITS_HEADER: &str = "x-sentry-rate-limits";

/// Request header carrying the DSN public key.
pub const AUTH_HEADER: &str = "x-sentry-auth";

/// Content type of a serialized envelope.
pub const ENVELOPE_CONTENT_TYPE: &str = "application/x-sentry-envelope";

/// Default number of deliveries allowed in flight at once.
pub const DEFAULT_BUFFER_SIZE: usize = 30;
