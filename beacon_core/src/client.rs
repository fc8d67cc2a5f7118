/**
 * The SDK client: owns the event queue, background worker, and transport.
 *
 * Lifecycle:
 * 1. User calls `beacon::init(options)` → creates a `Client` and stores it
 *    in a global `OnceLock`.
 * 2. `capture_envelope()` / `capture_message()` / `capture_feedback()` read
 *    the global `Client` and enqueue envelopes.
 * 3. `init` returns a `Guard`; when the guard is dropped, it calls
 *    `Client::flush()` to drain pending deliveries before the process exits.
 *
 * `Client::new` builds a standalone client without touching the global,
 * which is what tests and embedders with their own lifecycle use.
 */
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam_channel::{Sender, TrySendError};
use uuid::Uuid;

use crate::error::ConfigError;
use crate::protocol::constants::DEFAULT_BUFFER_SIZE;
use crate::protocol::dsn::Dsn;
use crate::protocol::envelope::Envelope;
use crate::protocol::event::{feedback_envelope, Event, FeedbackParams, Level};
use crate::transport::{
    FlushSignal, RequestExecutor, Transport, TransportOptions, UreqExecutor, Worker, WorkerMsg,
};

// ---------------------------------------------------------------------------
// Global singleton
// ---------------------------------------------------------------------------

/**
 * Process-wide singleton holding the initialized `Client`.
 *
 * `OnceLock` ensures that `init()` can only succeed once; subsequent calls
 * return `ConfigError::AlreadyInitialized`.
 */
static GLOBAL_CLIENT: OnceLock<Client> = OnceLock::new();

/// Returns the global client, or `None` if `init()` has not been called yet.
pub fn get_client() -> Option<&'static Client> {
    GLOBAL_CLIENT.get()
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Callback that may rewrite an envelope (`Some`) or drop it (`None`).
pub type BeforeSend = Arc<dyn Fn(Envelope) -> Option<Envelope> + Send + Sync>;

/**
 * Configuration options for the SDK.
 *
 * All fields except `dsn` have defaults via `Default`.
 *
 * # Example
 * ```ignore
 * use std::sync::Arc;
 *
 * beacon_core::init(beacon_core::Options {
 *     dsn: "https://key@collector.example.com/1".into(),
 *     before_send: Some(Arc::new(|envelope| {
 *         // return None to drop the envelope
 *         Some(envelope)
 *     })),
 *     ..Default::default()
 * });
 * ```
 */
#[derive(Clone)]
pub struct Options {
    /// Where envelopes are delivered.
    pub dsn: String,

    /// Maximum number of deliveries in flight at once.
    pub buffer_size: usize,

    /// Capacity of the producer queue. When full, new envelopes are dropped.
    pub queue_capacity: usize,

    /// How long `flush()` waits by default.
    pub flush_timeout: Duration,

    /// Optional callback invoked before each envelope is queued.
    ///
    /// If the callback panics, the original envelope is sent unchanged.
    pub before_send: Option<BeforeSend>,

    /// Replaces the default HTTP executor.
    pub executor: Option<Arc<dyn RequestExecutor>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            dsn: String::new(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            queue_capacity: QUEUE_CAPACITY,
            flush_timeout: FLUSH_TIMEOUT,
            before_send: None,
            executor: None,
        }
    }
}

/// Allows `init("https://key@host/1")` with all other options defaulted.
impl From<&str> for Options {
    fn from(dsn: &str) -> Self {
        Self { dsn: dsn.to_string(), ..Default::default() }
    }
}

// ---------------------------------------------------------------------------
// Internal constants
// ---------------------------------------------------------------------------

/// Default producer queue capacity.
const QUEUE_CAPACITY: usize = 100;

/// Default maximum time `flush()` blocks.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Stand-in deadline for timeouts too large to add to an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// The SDK client.
pub struct Client {
    dsn: Dsn,
    sender: Sender<WorkerMsg>,
    transport: Transport,
    before_send: Option<BeforeSend>,
    flush_timeout: Duration,
}

impl Client {
    /**
     * Builds a client and starts its background worker.
     *
     * # Steps
     * 1. Parse the DSN.
     * 2. Pick the executor: the injected one, or HTTP to the DSN endpoint.
     * 3. Build the transport with the configured buffer size.
     * 4. Create the bounded queue and spawn the worker.
     */
    pub fn new(options: Options) -> Result<Self, ConfigError> {
        let dsn = Dsn::parse(&options.dsn)?;

        let executor: Arc<dyn RequestExecutor> = match options.executor {
            Some(executor) => executor,
            None => Arc::new(UreqExecutor::new(&dsn)),
        };

        let transport = Transport::with_options(
            executor,
            TransportOptions { buffer_size: options.buffer_size, ..Default::default() },
        );

        let (sender, receiver) = crossbeam_channel::bounded(options.queue_capacity);
        Worker::spawn(receiver, transport.clone(), options.flush_timeout)?;

        tracing::debug!(
            endpoint = %dsn.envelope_endpoint(),
            buffer_size = options.buffer_size,
            "Client initialized"
        );

        Ok(Self {
            dsn,
            sender,
            transport,
            before_send: options.before_send,
            flush_timeout: options.flush_timeout,
        })
    }

    /**
     * Creates the global client.
     *
     * Should be called exactly once (via `init()`); later calls fail with
     * `ConfigError::AlreadyInitialized`.
     */
    pub fn init(options: Options) -> Result<(), ConfigError> {
        /*
         * Early guard: avoid spawning threads and runtimes if already initialized.
         */
        if GLOBAL_CLIENT.get().is_some() {
            return Err(ConfigError::AlreadyInitialized);
        }

        let client = Client::new(options)?;

        GLOBAL_CLIENT.set(client).map_err(|_| ConfigError::AlreadyInitialized)
    }

    pub fn dsn(&self) -> &Dsn {
        &self.dsn
    }

    /// The transport deliveries go through.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /**
     * Queues an envelope for delivery.
     *
     * Fills in the `dsn` and `sent_at` headers, runs `before_send`, then
     * enqueues without blocking. If the queue is full the envelope is
     * dropped with a warning.
     */
    pub fn capture_envelope(&self, mut envelope: Envelope) {
        envelope.headers.dsn.get_or_insert_with(|| self.dsn.to_string());
        envelope.headers.sent_at.get_or_insert_with(Utc::now);

        if let Some(ref callback) = self.before_send {
            let original = envelope.clone();

            let result =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(original)));

            match result {
                Ok(None) => return,
                Ok(Some(modified)) => envelope = modified,
                Err(_) => {
                    tracing::warn!("before_send panicked, sending original envelope unchanged");
                },
            }
        }

        match self.sender.try_send(WorkerMsg::Envelope(envelope)) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Envelope queue is full, dropping envelope");
            },
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!("Worker thread has shut down, dropping envelope");
            },
        }
    }

    /// Queues a message event. Returns its id, or `None` if it could not be built.
    pub fn capture_message(&self, message: impl Into<String>, level: Level) -> Option<Uuid> {
        let event = Event::message(message, level);
        let event_id = event.event_id;

        match event.into_envelope() {
            Ok(envelope) => {
                self.capture_envelope(envelope);
                Some(event_id)
            },
            Err(e) => {
                tracing::warn!("Failed to serialize message event: {e}");
                None
            },
        }
    }

    /// Queues user feedback. Returns the feedback event id.
    pub fn capture_feedback(&self, params: &FeedbackParams) -> Option<Uuid> {
        match feedback_envelope(params) {
            Ok((event_id, envelope)) => {
                self.capture_envelope(envelope);
                Some(event_id)
            },
            Err(e) => {
                tracing::warn!("Failed to serialize feedback: {e}");
                None
            },
        }
    }

    /**
     * Waits until every envelope captured so far has been delivered, or the
     * timeout elapses. `None` uses the configured `flush_timeout`.
     *
     * The timeout is one deadline covering both queueing the flush marker
     * and the drain itself. A zero timeout does not wait: it reports `true`
     * only if the worker confirms an idle transport immediately.
     *
     * # Returns
     * `true` if the transport drained within the timeout, `false` otherwise.
     */
    pub fn flush(&self, timeout: Option<Duration>) -> bool {
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout.unwrap_or(self.flush_timeout))
            .unwrap_or_else(|| now + FAR_FUTURE);
        let signal = Arc::new(FlushSignal::new());

        /*
         * The flush marker travels behind every envelope already queued, and
         * the worker admits envelopes in order, so the drain covers them all.
         */
        let msg = WorkerMsg::Flush { signal: Arc::clone(&signal), deadline };
        if self.sender.send_deadline(msg, deadline).is_err() {
            return false;
        }

        signal.wait_timeout(deadline.saturating_duration_since(Instant::now()))
    }
}
