use std::sync::{Arc, Mutex};
use std::time::Duration;

use beacon_client::SessionState;
use beacon_core::DisconnectReason;

use crate::integration::{OFFER_SDP, init_tracing, offer_message, start_session};
use crate::utils::wait_until;

#[tokio::test]
async fn server_close_reports_socket_closed() {
    init_tracing();
    let (connection, server, factory) = start_session().await;

    server.send(offer_message("conn-1", OFFER_SDP)).await;
    server.expect("answer").await.expect("no answer sent");

    let reasons: Arc<Mutex<Vec<DisconnectReason>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = reasons.clone();
    connection
        .on_disconnect(move |reason, _err| {
            sink.lock().unwrap().push(reason);
        })
        .await;

    server.close().await;

    let probe = reasons.clone();
    assert!(
        wait_until(|| !probe.lock().unwrap().is_empty(), 2000).await,
        "disconnect callback never fired"
    );
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(
        *reasons.lock().unwrap(),
        vec![DisconnectReason::SocketClosed]
    );
    assert_eq!(connection.state().await, SessionState::Idle);
    assert!(connection.connection_id().await.is_empty());

    // the engine created for the offer must have been closed too
    let log = factory.call_log().await;
    assert!(log.iter().any(|entry| entry == "close"), "engine not closed: {log:?}");
}
