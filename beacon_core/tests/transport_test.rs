//! End-to-end tests for the transport dispatch engine.
//!
//! The request executor is a closure double; time is a `ManualClock` so
//! rate-limit windows can be crossed deterministically.

#![allow(clippy::unwrap_used)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use beacon_core::clock::{Clock, ManualClock};
use beacon_core::protocol::constants::RATE_LIMITS_HEADER;
use beacon_core::{
    DataCategory, DeliveryStatus, Envelope, EnvelopeItem, ExecutorError, ItemType, RequestExecutor,
    TaskBuffer, Transport, TransportOptions, TransportRequest, TransportResponse,
};
use chrono::{TimeZone, Utc};
use http::{HeaderMap, HeaderValue};
use tokio::sync::Semaphore;

fn envelope(item_type: ItemType) -> Envelope {
    Envelope::new().with_item(EnvelopeItem::new(item_type, r#"{"message":"hello"}"#))
}

fn rate_limit_headers(value: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(RATE_LIMITS_HEADER, HeaderValue::from_static(value));
    headers
}

/// Executor that counts calls and answers with whatever `respond` builds.
fn counting<R>(calls: &Arc<AtomicUsize>, respond: R) -> impl RequestExecutor + 'static
where
    R: Fn(&TransportRequest) -> TransportResponse + Send + Sync + 'static,
{
    let calls = Arc::clone(calls);
    move |request: TransportRequest| {
        calls.fetch_add(1, Ordering::SeqCst);
        let response = respond(&request);
        async move { Ok::<_, ExecutorError>(response) }
    }
}

fn transport_with<E>(executor: E, clock: &ManualClock) -> Transport
where
    E: RequestExecutor + 'static,
{
    Transport::with_options(
        Arc::new(executor),
        TransportOptions { clock: Arc::new(clock.clone()), ..Default::default() },
    )
}

#[tokio::test]
async fn delivers_successfully() {
    let calls = Arc::new(AtomicUsize::new(0));
    let clock = ManualClock::new();
    let transport = transport_with(counting(&calls, |_| TransportResponse::with_status(200)), &clock);

    let outcome = transport.send(&envelope(ItemType::Event)).await;

    assert_eq!(outcome.status, DeliveryStatus::Success);
    assert_eq!(outcome.reason, None);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn request_carries_category_and_serialized_body() {
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    let transport = Transport::new(move |request: TransportRequest| {
        record.lock().push(request);
        async { Ok::<_, ExecutorError>(TransportResponse::with_status(200)) }
    });

    let envelope = envelope(ItemType::Transaction);
    transport.send(&envelope).await;

    let requests = seen.lock();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].category, DataCategory::Transaction);
    assert_eq!(requests[0].body, envelope.to_bytes().unwrap());
}

#[tokio::test]
async fn too_many_requests_disables_category_until_retry_after() {
    let calls = Arc::new(AtomicUsize::new(0));
    let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());
    let transport = transport_with(
        counting(&calls, |_| TransportResponse {
            status_code: Some(429),
            headers: Some(rate_limit_headers("60::organization")),
            ..Default::default()
        }),
        &clock,
    );

    let first = transport.send(&envelope(ItemType::Event)).await;

    assert_eq!(first.status, DeliveryStatus::RateLimit);
    let reason = first.reason.unwrap();
    assert!(reason.contains("error"), "reason was {reason}");
    assert!(reason.contains("2024-05-01T08:01:00.000Z"), "reason was {reason}");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    clock.advance(Duration::from_secs(30));
    let second = transport.send(&envelope(ItemType::Event)).await;

    assert_eq!(second.status, DeliveryStatus::RateLimit);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "limited send must not reach the executor");
    assert!(transport.buffer().is_empty());

    clock.advance(Duration::from_secs(31));
    transport.send(&envelope(ItemType::Event)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn category_limit_leaves_other_categories_alone() {
    let calls = Arc::new(AtomicUsize::new(0));
    let clock = ManualClock::new();
    let transport = transport_with(
        counting(&calls, |request| match request.category {
            DataCategory::Transaction => TransportResponse {
                status_code: Some(429),
                headers: Some(rate_limit_headers("120:transaction:project")),
                ..Default::default()
            },
            _ => TransportResponse::with_status(200),
        }),
        &clock,
    );

    transport.send(&envelope(ItemType::Transaction)).await;

    let limited = transport.send(&envelope(ItemType::Transaction)).await;
    let delivered = transport.send(&envelope(ItemType::Event)).await;

    assert_eq!(limited.status, DeliveryStatus::RateLimit);
    assert_eq!(delivered.status, DeliveryStatus::Success);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn success_response_can_still_announce_limits() {
    let calls = Arc::new(AtomicUsize::new(0));
    let clock = ManualClock::new();
    let transport = transport_with(
        counting(&calls, |_| TransportResponse {
            status_code: Some(200),
            headers: Some(rate_limit_headers("60:error:key")),
            ..Default::default()
        }),
        &clock,
    );

    assert!(transport.send(&envelope(ItemType::Event)).await.is_success());

    let next = transport.send(&envelope(ItemType::Event)).await;
    assert_eq!(next.status, DeliveryStatus::RateLimit);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn server_error_reports_body() {
    let calls = Arc::new(AtomicUsize::new(0));
    let clock = ManualClock::new();
    let transport = transport_with(
        counting(&calls, |_| TransportResponse {
            status_code: Some(500),
            body: Some("server error".into()),
            ..Default::default()
        }),
        &clock,
    );

    let outcome = transport.send(&envelope(ItemType::Event)).await;

    assert_eq!(outcome.status, DeliveryStatus::FailedSend);
    assert_eq!(outcome.reason.as_deref(), Some("server error"));
}

#[tokio::test]
async fn same_envelope_twice_is_sent_twice() {
    let calls = Arc::new(AtomicUsize::new(0));
    let clock = ManualClock::new();
    let transport = transport_with(counting(&calls, |_| TransportResponse::with_status(202)), &clock);
    let envelope = envelope(ItemType::Event);

    let (a, b) = tokio::join!(transport.send(&envelope), transport.send(&envelope));

    assert!(a.is_success() && b.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn full_buffer_fails_without_calling_executor() {
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Semaphore::new(0));

    let counter = Arc::clone(&calls);
    let blocker = Arc::clone(&gate);
    let executor = move |_request: TransportRequest| {
        counter.fetch_add(1, Ordering::SeqCst);
        let gate = Arc::clone(&blocker);
        async move {
            let _permit = gate.acquire().await;
            Ok::<_, ExecutorError>(TransportResponse::with_status(200))
        }
    };

    let transport = Transport::with_options(
        Arc::new(executor),
        TransportOptions { buffer_size: 1, ..Default::default() },
    );

    let pending = transport.send(&envelope(ItemType::Event));
    let rejected = transport.send(&envelope(ItemType::Event)).await;

    assert_eq!(rejected.status, DeliveryStatus::FailedSend);
    assert!(rejected.reason.unwrap().contains("buffer is full"));

    gate.add_permits(1);
    assert!(pending.await.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn known_rate_limit_does_not_need_a_buffer_slot() {
    let calls = Arc::new(AtomicUsize::new(0));
    let clock = ManualClock::new();
    let buffer = Arc::new(TaskBuffer::new(1));
    let transport = Transport::with_options(
        Arc::new(counting(&calls, |_| TransportResponse {
            status_code: Some(429),
            headers: Some(rate_limit_headers("60::org")),
            ..Default::default()
        })),
        TransportOptions {
            buffer: Some(Arc::clone(&buffer)),
            clock: Arc::new(clock.clone()),
            ..Default::default()
        },
    );

    transport.send(&envelope(ItemType::Event)).await;

    // Occupy the only slot; a limited send must still short-circuit to rate_limit.
    let gate = Arc::new(Semaphore::new(0));
    let blocker = Arc::clone(&gate);
    let occupant = buffer
        .submit(async move {
            let _permit = blocker.acquire().await;
        })
        .unwrap();

    let outcome = transport.send(&envelope(ItemType::Session)).await;
    assert_eq!(outcome.status, DeliveryStatus::RateLimit);
    assert_eq!(buffer.len(), 1);

    gate.add_permits(1);
    occupant.await.unwrap();
}

#[tokio::test]
async fn later_response_overrides_longer_limit() {
    let clock = ManualClock::new();
    let start = clock.now();
    let calls = Arc::new(AtomicUsize::new(0));
    let transport = transport_with(
        counting(&calls, |request| match request.category {
            DataCategory::Transaction => TransportResponse {
                status_code: Some(200),
                headers: Some(rate_limit_headers("3600:error:org")),
                ..Default::default()
            },
            _ => TransportResponse {
                status_code: Some(200),
                headers: Some(rate_limit_headers("10:error:org")),
                ..Default::default()
            },
        }),
        &clock,
    );

    transport.send(&envelope(ItemType::Transaction)).await;
    assert!(transport.rate_limits().is_rate_limited(DataCategory::Error, clock.now()));

    // A feedback response shortens the error limit: last write wins.
    transport.send(&envelope(ItemType::Feedback)).await;
    assert_eq!(
        transport.rate_limits().get(DataCategory::Error),
        Some(start + chrono::TimeDelta::seconds(10))
    );
}

#[tokio::test(start_paused = true)]
async fn flush_waits_for_in_flight_deliveries() {
    let gate = Arc::new(Semaphore::new(0));
    let blocker = Arc::clone(&gate);
    let transport = Transport::new(move |_request: TransportRequest| {
        let gate = Arc::clone(&blocker);
        async move {
            let _permit = gate.acquire().await;
            Ok::<_, ExecutorError>(TransportResponse::with_status(200))
        }
    });

    let delivery = tokio::spawn(transport.send(&envelope(ItemType::Event)));

    assert!(!transport.flush(Some(Duration::from_millis(100))).await);
    assert_eq!(transport.buffer().len(), 1);

    gate.add_permits(1);
    assert!(transport.flush(None).await);
    assert!(delivery.await.unwrap().is_success());
}

#[tokio::test]
async fn flush_on_idle_transport_is_immediate() {
    let transport = Transport::new(|_request: TransportRequest| async {
        Ok::<_, ExecutorError>(TransportResponse::with_status(200))
    });

    assert!(transport.flush(Some(Duration::from_millis(1))).await);
    assert!(transport.flush(None).await);
}
