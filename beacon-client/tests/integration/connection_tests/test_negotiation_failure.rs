use std::sync::{Arc, Mutex};

use beacon_client::SessionState;
use beacon_core::DisconnectReason;

use crate::integration::{init_tracing, offer_message, start_session};
use crate::utils::wait_until;

#[tokio::test]
async fn failed_remote_description_tears_the_session_down() {
    init_tracing();
    let (connection, server, factory) = start_session().await;

    let reasons: Arc<Mutex<Vec<DisconnectReason>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = reasons.clone();
    connection
        .on_disconnect(move |reason, _err| {
            sink.lock().unwrap().push(reason);
        })
        .await;

    factory.fail_next_remote_description();
    server.send(offer_message("conn-1", "v=0\r\n")).await;

    let probe = reasons.clone();
    assert!(
        wait_until(|| !probe.lock().unwrap().is_empty(), 2000).await,
        "disconnect callback never fired"
    );
    assert_eq!(
        *reasons.lock().unwrap(),
        vec![DisconnectReason::NegotiationFailed]
    );
    assert_eq!(connection.state().await, SessionState::Idle);
    assert!(connection.connection_id().await.is_empty());
}
