/**
 * RAII guard returned by `init()`.
 *
 * The `Guard` makes sure pending deliveries finish before the process exits:
 *
 * ```ignore
 * fn main() {
 *     let _guard = beacon_core::init("https://key@collector.example.com/1".into()).unwrap();
 *
 *     // ... application logic, envelopes captured here ...
 *
 * }   // <-- _guard is dropped here, triggering flush()
 * ```
 *
 * If the flush times out (the configured `flush_timeout`, 2 seconds by
 * default) the guard logs and returns; delivery is best-effort.
 */
use crate::client;

/**
 * Flush-on-drop guard.
 *
 * The guard does NOT own the `Client`; the client lives in a `static
 * OnceLock` and outlives the guard. The guard only triggers the flush on
 * scope exit.
 */
pub struct Guard {
    _private: (),
}

impl Guard {
    /// Only `init()` creates guards.
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

impl Drop for Guard {
    fn drop(&mut self) {
        if let Some(client) = client::get_client() {
            if !client.flush(None) {
                tracing::warn!("Flush timed out, some envelopes may not have been delivered");
            }
        }
    }
}
