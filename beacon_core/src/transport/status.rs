//! Mapping from HTTP status codes to delivery statuses.

use std::fmt;

/// Semantic result of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryStatus {
    /// The collector accepted the envelope (2xx).
    Success,
    /// Rate limited, either by a 429 or by a limit already known locally.
    RateLimit,
    /// The collector rejected the request (3xx, 4xx other than 429).
    Invalid,
    /// The collector failed to process the request (5xx), or the envelope
    /// never left the client because the buffer was full.
    FailedSend,
    /// No usable status, e.g. a network failure before any response.
    UnknownError,
}

impl DeliveryStatus {
    /// Maps an HTTP status code to a delivery status.
    ///
    /// Total over every input; `None` (no response at all) and codes outside
    /// the known ranges fall into `UnknownError`.
    pub fn from_http_code(code: Option<u16>) -> Self {
        match code {
            Some(200..=299) => DeliveryStatus::Success,
            Some(429) => DeliveryStatus::RateLimit,
            Some(300..=499) => DeliveryStatus::Invalid,
            Some(500..=599) => DeliveryStatus::FailedSend,
            _ => DeliveryStatus::UnknownError,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Success => "success",
            DeliveryStatus::RateLimit => "rate_limit",
            DeliveryStatus::Invalid => "invalid",
            DeliveryStatus::FailedSend => "failed_send",
            DeliveryStatus::UnknownError => "unknown_error",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
