/**
 * Bounded set of in-flight delivery tasks.
 *
 * ```text
 *   submit(task) ──► active < capacity? ──no──► Err(BufferFull)
 *                          │ yes
 *                          ▼
 *                   active += 1, spawn
 *                          │
 *                   task completes (ok, panic or abort)
 *                          │
 *                   active -= 1  ──► at 0: idle_epoch += 1, wakes drain()
 *                          │
 *                   TaskHandle resolves
 * ```
 *
 * There is no waiting queue: a full buffer rejects immediately. The active
 * count lives in a `tokio::sync::watch` channel, so admission is a single
 * check-and-increment under the channel's lock. The slot is released inside
 * the spawned task, before its output is published, so a drain racing the
 * last completion never sees a finished task still counted.
 *
 * A watch receiver only sees the latest value, and a new submission can
 * refill the set before a waiting `drain` is polled. Every transition to
 * zero therefore also bumps `idle_epoch`; `drain` resolves on an empty set
 * or on any epoch change since it started.
 */
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::BufferError;
use crate::protocol::constants::DEFAULT_BUFFER_SIZE;

// ---------------------------------------------------------------------------
// Occupancy
// ---------------------------------------------------------------------------

/// State published through the watch channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Occupancy {
    /// Tasks admitted and not yet finished.
    active: usize,
    /// Number of times `active` has dropped to zero.
    idle_epoch: u64,
}

// ---------------------------------------------------------------------------
// TaskBuffer
// ---------------------------------------------------------------------------

/// Fixed-capacity set of running tasks with admission control and drain.
#[derive(Debug)]
pub struct TaskBuffer {
    capacity: usize,
    state: Arc<watch::Sender<Occupancy>>,
}

impl TaskBuffer {
    /// Creates a buffer admitting at most `capacity` concurrent tasks.
    ///
    /// A capacity of zero is valid and rejects every submission.
    pub fn new(capacity: usize) -> Self {
        let (state, _) = watch::channel(Occupancy::default());
        Self { capacity, state: Arc::new(state) }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of tasks currently in flight.
    pub fn len(&self) -> usize {
        self.state.borrow().active
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /**
     * Admits and starts `task`.
     *
     * # Returns
     * * `Ok(TaskHandle)` resolving to the task's output once it finishes.
     *   Dropping the handle does not cancel the task.
     * * `Err(BufferError::Full)` if `capacity` tasks are already active. The
     *   task is dropped without ever being polled.
     * * `Err(BufferError::NoRuntime)` when called outside a Tokio runtime.
     */
    pub fn submit<F>(&self, task: F) -> Result<TaskHandle<F::Output>, BufferError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| BufferError::NoRuntime)?;

        let capacity = self.capacity;
        let admitted = self.state.send_if_modified(|state| {
            if state.active >= capacity {
                false
            } else {
                state.active += 1;
                true
            }
        });

        if !admitted {
            return Err(BufferError::Full { capacity });
        }

        let slot = Slot { state: Arc::clone(&self.state) };
        let join = runtime.spawn(async move {
            let output = task.await;
            drop(slot);
            output
        });

        Ok(TaskHandle { join })
    }

    /**
     * Waits until the active set becomes empty.
     *
     * Resolves the first time the set is empty after the call, even if new
     * tasks are admitted right afterwards. With `Some(timeout)` of non-zero
     * length, gives up after `timeout` and returns `false`; running tasks
     * are left alone. `None` or a zero timeout waits indefinitely. Returns
     * `true` immediately when the buffer is already empty.
     */
    pub async fn drain(&self, timeout: Option<Duration>) -> bool {
        let mut state = self.state.subscribe();
        let started = state.borrow_and_update().idle_epoch;
        let idle = async move {
            state
                .wait_for(|s| s.active == 0 || s.idle_epoch != started)
                .await
                .is_ok()
        };

        match timeout.filter(|t| !t.is_zero()) {
            Some(limit) => tokio::time::timeout(limit, idle).await.unwrap_or(false),
            None => idle.await,
        }
    }
}

impl Default for TaskBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

/// Membership of one task in the active set; released on drop, which also
/// covers panics and aborts.
struct Slot {
    state: Arc<watch::Sender<Occupancy>>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.state.send_modify(|state| {
            state.active = state.active.saturating_sub(1);
            if state.active == 0 {
                state.idle_epoch = state.idle_epoch.wrapping_add(1);
            }
        });
    }
}

// ---------------------------------------------------------------------------
// TaskHandle
// ---------------------------------------------------------------------------

/// Completion handle of a submitted task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    join: JoinHandle<T>,
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, BufferError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.join)
            .poll(cx)
            .map(|result| result.map_err(|e| BufferError::task_failed(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use tokio::sync::{oneshot, Semaphore};
    use tokio::time::sleep;

    use super::*;

    #[tokio::test]
    async fn runs_task_and_returns_output() {
        let buffer = TaskBuffer::new(2);

        let handle = buffer.submit(async { 7 }).expect("admitted");

        assert_eq!(handle.await, Ok(7));
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn rejects_when_full_without_running_task() {
        let buffer = TaskBuffer::new(2);
        let gate = Arc::new(Semaphore::new(0));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let gate = Arc::clone(&gate);
            let handle = buffer
                .submit(async move {
                    let _permit = gate.acquire().await;
                })
                .expect("within capacity");
            handles.push(handle);
        }

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let rejected = buffer.submit(async move { flag.store(true, Ordering::SeqCst) });

        assert!(matches!(rejected, Err(BufferError::Full { capacity: 2 })));
        assert_eq!(buffer.len(), 2);

        gate.add_permits(2);
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(!ran.load(Ordering::SeqCst));
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn zero_capacity_rejects_everything_and_drains_immediately() {
        let buffer = TaskBuffer::new(0);

        assert!(matches!(buffer.submit(async {}), Err(BufferError::Full { capacity: 0 })));
        assert!(buffer.drain(None).await);
    }

    #[tokio::test]
    async fn drain_on_empty_buffer_is_immediate() {
        let buffer = TaskBuffer::default();
        assert_eq!(buffer.capacity(), DEFAULT_BUFFER_SIZE);
        assert!(buffer.drain(Some(Duration::from_millis(10))).await);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_without_timeout_waits_for_all_tasks() {
        let buffer = TaskBuffer::new(4);

        let fast = buffer.submit(sleep(Duration::from_millis(50))).unwrap();
        let slow = buffer.submit(sleep(Duration::from_millis(300))).unwrap();

        let started = tokio::time::Instant::now();
        assert!(buffer.drain(None).await);

        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(buffer.is_empty());
        fast.await.unwrap();
        slow.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn drain_times_out_without_cancelling() {
        let buffer = TaskBuffer::new(1);
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);

        let handle = buffer
            .submit(async move {
                sleep(Duration::from_millis(500)).await;
                flag.store(true, Ordering::SeqCst);
            })
            .unwrap();

        let started = tokio::time::Instant::now();
        assert!(!buffer.drain(Some(Duration::from_millis(100))).await);
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(buffer.len(), 1);

        handle.await.unwrap();
        assert!(finished.load(Ordering::SeqCst));
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn zero_timeout_waits_indefinitely() {
        let buffer = TaskBuffer::new(1);
        let (tx, rx) = oneshot::channel::<()>();
        buffer.submit(async move { rx.await.ok() }).unwrap();

        let drained = tokio::spawn({
            let buffer = Arc::new(buffer);
            async move { buffer.drain(Some(Duration::ZERO)).await }
        });

        tx.send(()).unwrap();
        assert!(drained.await.unwrap());
    }

    #[tokio::test]
    async fn slot_is_released_before_handle_resolves() {
        let buffer = Arc::new(TaskBuffer::new(1));

        let handle = buffer.submit(async { "done" }).unwrap();
        assert_eq!(handle.await.unwrap(), "done");

        assert_eq!(buffer.len(), 0);
        assert!(buffer.submit(async {}).is_ok());
    }

    #[tokio::test]
    async fn panicking_task_frees_its_slot() {
        let buffer = TaskBuffer::new(1);

        let handle = buffer
            .submit(async {
                if true {
                    panic!("boom");
                }
            })
            .unwrap();
        let result: Result<(), BufferError> = handle.await;

        assert!(matches!(result, Err(BufferError::TaskFailed { .. })));
        assert!(buffer.is_empty());
        assert!(buffer.drain(None).await);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_resolves_at_first_empty_moment_despite_refills() {
        let buffer = Arc::new(TaskBuffer::new(1));

        let first = buffer.submit(sleep(Duration::from_millis(100))).unwrap();
        let chain = tokio::spawn({
            let buffer = Arc::clone(&buffer);
            async move {
                first.await.unwrap();
                for _ in 0..4 {
                    let next = buffer.submit(sleep(Duration::from_millis(100))).unwrap();
                    next.await.unwrap();
                }
            }
        });

        let started = tokio::time::Instant::now();
        assert!(buffer.drain(None).await);
        assert!(started.elapsed() < Duration::from_millis(200));

        chain.await.unwrap();
        assert!(buffer.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submits_never_over_admit() {
        const CAPACITY: usize = 4;
        const CALLERS: usize = 64;

        let buffer = Arc::new(TaskBuffer::new(CAPACITY));
        let gate = Arc::new(Semaphore::new(0));
        let start = Arc::new(tokio::sync::Barrier::new(CALLERS));

        let callers: Vec<_> = (0..CALLERS)
            .map(|_| {
                let buffer = Arc::clone(&buffer);
                let gate = Arc::clone(&gate);
                let start = Arc::clone(&start);
                tokio::spawn(async move {
                    start.wait().await;
                    let result = buffer.submit(async move {
                        let _permit = gate.acquire().await;
                    });
                    assert!(buffer.len() <= CAPACITY);
                    result
                })
            })
            .collect();

        let mut admitted = Vec::new();
        let mut rejected = 0;
        for caller in callers {
            match caller.await.unwrap() {
                Ok(handle) => admitted.push(handle),
                Err(BufferError::Full { capacity: CAPACITY }) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(admitted.len(), CAPACITY);
        assert_eq!(rejected, CALLERS - CAPACITY);
        assert_eq!(buffer.len(), CAPACITY);

        gate.add_permits(CAPACITY);
        for handle in admitted {
            handle.await.unwrap();
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn submit_outside_runtime_is_an_error() {
        let buffer = TaskBuffer::new(1);
        assert!(matches!(buffer.submit(async {}), Err(BufferError::NoRuntime)));
        assert!(buffer.is_empty());
    }
}
