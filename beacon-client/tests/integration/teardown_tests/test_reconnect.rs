use beacon_client::SessionState;

use crate::integration::{OFFER_SDP, init_tracing, offer_message, start_session};

/// After a full teardown the same handle connects again from scratch.
#[tokio::test]
async fn a_closed_connection_can_connect_again() {
    init_tracing();
    let (connection, server, factory) = start_session().await;

    server.send(offer_message("conn-1", OFFER_SDP)).await;
    server.expect("answer").await.expect("no answer sent");
    assert_eq!(connection.connection_id().await, "conn-1");

    connection.disconnect().await;
    server.expect("disconnect").await.expect("no disconnect message");
    assert_eq!(connection.state().await, SessionState::Idle);
    assert!(connection.connection_id().await.is_empty());

    connection.connect().await.expect("reconnect failed");
    let connect = server.expect("connect").await.expect("no second connect");
    assert_eq!(connect["channel_id"], "test-channel");

    server.send(offer_message("conn-2", OFFER_SDP)).await;
    let answer = server.expect("answer").await.expect("no answer after reconnect");
    assert!(answer["sdp"].as_str().unwrap_or_default().contains("mock answer"));
    assert_eq!(connection.connection_id().await, "conn-2");
    assert_eq!(factory.engines_created(), 2);

    connection.disconnect().await;
}
