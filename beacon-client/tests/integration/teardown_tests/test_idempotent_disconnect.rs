use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use beacon_client::{Connection, SessionState};
use beacon_core::ConnectionOptions;

use crate::integration::{OFFER_SDP, init_tracing, offer_message, start_session};
use crate::utils::wait_until;

#[tokio::test]
async fn disconnect_before_connect_is_a_no_op() {
    init_tracing();
    let options = ConnectionOptions::new("ws://127.0.0.1:1", "never-used");
    let connection = Connection::new(options);

    connection.disconnect().await;
    connection.disconnect().await;
    assert_eq!(connection.state().await, SessionState::Idle);
}

#[tokio::test]
async fn repeated_disconnects_fire_the_callback_once() {
    init_tracing();
    let (connection, server, _factory) = start_session().await;

    server.send(offer_message("conn-1", OFFER_SDP)).await;
    server.expect("answer").await.expect("no answer sent");

    let fired = Arc::new(AtomicUsize::new(0));
    let fired_clone = Arc::clone(&fired);
    connection
        .on_disconnect(move |_reason, _err| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        })
        .await;

    connection.disconnect().await;
    connection.disconnect().await;
    connection.disconnect().await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(connection.state().await, SessionState::Idle);
    assert!(connection.connection_id().await.is_empty());
}

/// A local disconnect racing a server-side close must still resolve to
/// exactly one teardown and one callback.
#[tokio::test]
async fn concurrent_local_and_remote_close_tear_down_once() {
    init_tracing();
    let (connection, server, _factory) = start_session().await;

    let fired = Arc::new(AtomicUsize::new(0));
    let fired_clone = Arc::clone(&fired);
    connection
        .on_disconnect(move |_reason, _err| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        })
        .await;

    tokio::join!(connection.disconnect(), server.close());

    let probe = Arc::clone(&fired);
    assert!(
        wait_until(move || probe.load(Ordering::SeqCst) >= 1, 2000).await,
        "no disconnect callback at all"
    );
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(connection.state().await, SessionState::Idle);
}
