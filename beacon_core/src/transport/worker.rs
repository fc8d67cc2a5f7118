/**
 * Background worker bridging synchronous producers and the async transport.
 *
 * Architecture overview:
 *
 * ```text
 *  ┌──────────────┐    bounded channel    ┌─────────────────┐
 *  │  User code   │ ───── WorkerMsg ────► │  Worker thread  │
 *  │ (any thread) │                       │ (beacon-worker) │
 *  └──────────────┘                       └────────┬────────┘
 *                                                  │ Transport::send()
 *                                                  ▼
 *                                         ┌─────────────────┐
 *                                         │  Tokio runtime  │──► collector
 *                                         │   (beacon-io)   │
 *                                         └─────────────────┘
 * ```
 *
 * The channel carries `WorkerMsg` variants:
 * - `Envelope`: admitted to the transport in arrival order; the outcome is
 *   awaited on the runtime and logged.
 * - `Flush`: answered by draining the transport's buffer until the caller's
 *   deadline and signalling the waiting caller with the result.
 *
 * Admission happens on the worker thread itself, so every envelope received
 * before a `Flush` is already in the buffer when the drain starts.
 *
 * The worker loop runs until the channel disconnects (i.e., all senders
 * are dropped), which happens when the `Client` is dropped. Deliveries still
 * in flight at that point are given up to the shutdown timeout to finish
 * before the runtime is dropped.
 */
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use tokio::runtime::Runtime;

use super::base::{DeliveryOutcome, Transport};
use super::status::DeliveryStatus;
use crate::error::ConfigError;
use crate::protocol::category::DataCategory;
use crate::protocol::envelope::Envelope;

// ---------------------------------------------------------------------------
// WorkerMsg: the messages sent through the bounded channel
// ---------------------------------------------------------------------------

/// Messages that flow from producer threads to the single background worker.
pub enum WorkerMsg {
    /// An envelope to deliver.
    Envelope(Envelope),

    /// A flush request covering every envelope sent before it.
    ///
    /// The drain stops at `deadline`, the same instant the caller stops
    /// waiting on `signal`.
    Flush {
        signal: Arc<FlushSignal>,
        deadline: Instant,
    },
}

// ---------------------------------------------------------------------------
// FlushSignal: condvar-based notification for flush completion
// ---------------------------------------------------------------------------

/**
 * Synchronization primitive used to block the caller of `flush()` until
 * the worker reports the drain result.
 *
 * The slot starts empty; the worker fills it with `true` (buffer drained)
 * or `false` (drain timed out) and notifies.
 */
pub struct FlushSignal {
    result: Mutex<Option<bool>>,
    condvar: Condvar,
}

impl FlushSignal {
    pub fn new() -> Self {
        Self { result: Mutex::new(None), condvar: Condvar::new() }
    }

    /// Records the drain result and wakes the waiting caller.
    pub fn notify(&self, drained: bool) {
        if let Ok(mut result) = self.result.lock() {
            *result = Some(drained);
            self.condvar.notify_all();
        }
    }

    /**
     * Blocks until the worker reports, or until `timeout` elapses.
     *
     * # Returns
     * The reported drain result, or `false` if nothing was reported in time.
     */
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Ok(guard) = self.result.lock() else {
            return false;
        };

        match self.condvar.wait_timeout_while(guard, timeout, |result| result.is_none()) {
            Ok((result, _)) => result.unwrap_or(false),
            Err(_) => false,
        }
    }
}

impl Default for FlushSignal {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Worker: the background thread
// ---------------------------------------------------------------------------

/// Handle type for spawning the background worker.
pub struct Worker;

impl Worker {
    /**
     * Builds the I/O runtime and spawns the worker thread.
     *
     * The thread runs until the channel disconnects, then waits up to
     * `shutdown_timeout` for in-flight deliveries. No join handle is kept:
     * `Guard::drop()` → `flush()` is what makes sure pending deliveries
     * finish before the process exits.
     */
    pub fn spawn(
        receiver: Receiver<WorkerMsg>,
        transport: Transport,
        shutdown_timeout: Duration,
    ) -> Result<(), ConfigError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("beacon-io")
            .enable_all()
            .build()
            .map_err(|e| ConfigError::worker(format!("failed to build runtime: {e}")))?;

        thread::Builder::new()
            .name("beacon-worker".into())
            .spawn(move || {
                /*
                 * A panic in the loop would otherwise kill the thread
                 * silently; log it so dropped envelopes are explained.
                 */
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    Self::run_loop(&receiver, &runtime, &transport);
                }));

                if result.is_err() {
                    tracing::error!("Worker thread panicked, pending envelopes are dropped");
                    return;
                }

                let drained = if shutdown_timeout.is_zero() {
                    transport.buffer().is_empty()
                } else {
                    runtime.block_on(transport.flush(Some(shutdown_timeout)))
                };

                if !drained {
                    tracing::warn!(
                        in_flight = transport.buffer().len(),
                        "Shutdown timed out, abandoning in-flight deliveries"
                    );
                }
            })
            .map(|_| ())
            .map_err(|e| ConfigError::worker(e.to_string()))
    }

    /// Blocks on the channel and dispatches each message.
    fn run_loop(receiver: &Receiver<WorkerMsg>, runtime: &Runtime, transport: &Transport) {
        let _context = runtime.enter();

        while let Ok(msg) = receiver.recv() {
            match msg {
                WorkerMsg::Envelope(envelope) => {
                    let category = envelope.category();
                    let delivery = transport.send(&envelope);

                    runtime.spawn(async move {
                        report(category, &delivery.await);
                    });
                },
                WorkerMsg::Flush { signal, deadline } => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        // A zero drain timeout means "forever"; the caller is already gone.
                        signal.notify(transport.buffer().is_empty());
                        continue;
                    }

                    let transport = transport.clone();
                    runtime.spawn(async move {
                        signal.notify(transport.flush(Some(remaining)).await);
                    });
                },
            }
        }

        tracing::debug!("Event channel closed, worker exiting");
    }
}

/// Logs the outcome of one delivery.
fn report(category: DataCategory, outcome: &DeliveryOutcome) {
    let reason = outcome.reason.as_deref().unwrap_or_default();

    match outcome.status {
        DeliveryStatus::Success => {
            tracing::debug!(%category, "Envelope delivered");
        },
        DeliveryStatus::RateLimit => {
            tracing::info!(%category, "Envelope dropped: {reason}");
        },
        status => {
            tracing::warn!(%category, %status, "Envelope not delivered: {reason}");
        },
    }
}
