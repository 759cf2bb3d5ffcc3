use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use beacon_client::SessionState;
use beacon_client::engine::{EngineEvent, RemoteTrack};
use beacon_core::{MediaKind, TrackInfo};

use crate::integration::{OFFER_SDP, init_tracing, offer_message, start_session};
use crate::utils::HeldPacketSource;

/// A read failure surfacing from a previous session's track task must not
/// tear down the session that replaced it.
#[tokio::test]
async fn a_stale_track_failure_cannot_kill_a_new_session() {
    init_tracing();
    let (connection, server, factory) = start_session().await;

    server.send(offer_message("conn-1", OFFER_SDP)).await;
    server.expect("answer").await.expect("no answer sent");

    let (source, release) = HeldPacketSource::new();
    factory
        .emit(EngineEvent::Track(RemoteTrack {
            info: TrackInfo {
                ssrc: 7,
                kind: MediaKind::Audio,
                payload_type: 111,
            },
            source: Arc::new(source),
        }))
        .await;
    // let the packet pump park on its read
    tokio::time::sleep(Duration::from_millis(50)).await;

    connection.disconnect().await;
    server.expect("disconnect").await.expect("no disconnect message");

    connection.connect().await.expect("reconnect failed");
    server.expect("connect").await.expect("no second connect");
    server.send(offer_message("conn-2", OFFER_SDP)).await;
    server.expect("answer").await.expect("no answer after reconnect");

    let fired = Arc::new(AtomicUsize::new(0));
    let fired_clone = Arc::clone(&fired);
    connection
        .on_disconnect(move |_reason, _err| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        })
        .await;

    // the stale task now fails its read against the dead session
    release.notify_one();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert_eq!(connection.connection_id().await, "conn-2");
    assert_eq!(connection.state().await, SessionState::Negotiating);

    connection.disconnect().await;
}

/// A disconnect landing while an offer is mid-negotiation must leave the
/// session idle; the half-built engine is discarded and closed, and the
/// handle accepts a fresh connect afterwards.
#[tokio::test]
async fn an_offer_racing_a_disconnect_does_not_resurrect_the_session() {
    init_tracing();
    let (connection, server, factory) = start_session().await;

    let release = factory.hold_next_create().await;
    server.send(offer_message("conn-1", OFFER_SDP)).await;
    // let dispatch park inside engine creation
    tokio::time::sleep(Duration::from_millis(50)).await;

    connection.disconnect().await;
    server.expect("disconnect").await.expect("no disconnect message");

    release.notify_one();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(connection.state().await, SessionState::Idle);
    assert!(connection.connection_id().await.is_empty());
    let log = factory.call_log().await;
    assert!(
        log.iter().any(|entry| entry == "close"),
        "discarded engine was not closed: {log:?}"
    );

    connection.connect().await.expect("reconnect blocked");
    server.expect("connect").await.expect("no second connect");
    connection.disconnect().await;
}
