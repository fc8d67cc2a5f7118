/**
 * Minimal harness for the Beacon SDK.
 *
 * Point the DSN constant (or the `BEACON_DSN` variable) at a collector, then run:
 *
 *   cargo run -p beacon_demo
 *   cargo run -p beacon_demo -- --feedback       # also send user feedback
 *   cargo run -p beacon_demo -- --before-send    # drop feedback envelopes
 *
 * Set `RUST_LOG=beacon_core=debug` to watch deliveries and rate limits.
 */
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// Paste your DSN here, or set `BEACON_DSN`.
const DSN: &str = "https://public@localhost:8000/1";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("beacon_core=info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let send_feedback = args.iter().any(|a| a == "--feedback");
    let filter = args.iter().any(|a| a == "--before-send");

    let dsn = std::env::var("BEACON_DSN").unwrap_or_else(|_| DSN.to_string());

    /*
     * Initialize the SDK.
     * With --before-send, feedback envelopes are dropped before they are queued.
     */
    let _guard = if filter {
        tracing::info!("Initializing with before_send filter");
        beacon::init(beacon::Options {
            dsn,
            before_send: Some(Arc::new(|envelope: beacon::Envelope| {
                let is_feedback = envelope
                    .items
                    .first()
                    .is_some_and(|item| item.item_type == beacon::ItemType::Feedback);
                (!is_feedback).then_some(envelope)
            })),
            ..Default::default()
        })
    } else {
        beacon::init(dsn.as_str())
    };

    /*
     * Send a plain text message.
     */
    if let Some(id) = beacon::capture_message("Hello from the Beacon Rust SDK!", beacon::Level::Info)
    {
        tracing::info!(%id, "Sent a text message");
    }

    /*
     * Report a real error (file not found).
     */
    match std::fs::read_to_string("/nonexistent/path.txt") {
        Ok(_) => unreachable!(),
        Err(e) => {
            beacon::capture_message(&e, beacon::Level::Error);
            tracing::info!("Sent an io::Error: {e}");
        },
    }

    if send_feedback {
        let params = beacon::FeedbackParams {
            message: "The demo works!".into(),
            name: Some("Demo User".into()),
            ..Default::default()
        };
        if let Some(id) = beacon::capture_feedback(&params) {
            tracing::info!(%id, "Sent feedback");
        }
    }

    tracing::info!("Done. Envelopes are flushed when _guard drops.");
}
