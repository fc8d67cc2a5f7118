//! Error types for the delivery engine.
//!
//! Only construction and plumbing failures live here. Delivery failures are
//! never errors: they resolve as a `DeliveryOutcome` carrying a status and a
//! reason, so a telemetry problem cannot leak into the instrumented code path.

use thiserror::Error;

/// Configuration problems detected while building a client or transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The DSN could not be parsed or is missing a required part.
    #[error("invalid dsn: {message}")]
    InvalidDsn {
        /// What was wrong with the DSN
        message: String,
    },

    /// `init` was called while a global client already exists.
    #[error("beacon is already initialized")]
    AlreadyInitialized,

    /// The background worker could not be started.
    #[error("failed to start background worker: {message}")]
    Worker {
        /// Underlying spawn or runtime error
        message: String,
    },
}

impl ConfigError {
    /// Creates an invalid DSN error.
    pub fn invalid_dsn(message: impl Into<String>) -> Self {
        Self::InvalidDsn { message: message.into() }
    }

    /// Creates a worker start-up error.
    pub fn worker(message: impl Into<String>) -> Self {
        Self::Worker { message: message.into() }
    }
}

/// Failures raised by the task buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// Admission refused: the buffer already holds `capacity` active tasks.
    #[error("transport buffer is full: {capacity} tasks in flight")]
    Full {
        /// Configured capacity of the buffer
        capacity: usize,
    },

    /// `submit` was called outside a Tokio runtime.
    #[error("no async runtime available to run the task")]
    NoRuntime,

    /// The task panicked or was aborted before producing a value.
    #[error("task did not complete: {message}")]
    TaskFailed {
        /// Join error description
        message: String,
    },
}

impl BufferError {
    /// Creates a task failure error.
    pub fn task_failed(message: impl Into<String>) -> Self {
        Self::TaskFailed { message: message.into() }
    }
}

/// Failures of the request executor before any HTTP status was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    /// Connection, DNS, TLS or timeout failure.
    #[error("network error: {message}")]
    Network {
        /// Error message from the HTTP layer
        message: String,
    },

    /// The blocking request job could not be joined.
    #[error("request job failed: {message}")]
    Job {
        /// Join error description
        message: String,
    },
}

impl ExecutorError {
    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Creates a job failure error.
    pub fn job(message: impl Into<String>) -> Self {
        Self::Job { message: message.into() }
    }
}
