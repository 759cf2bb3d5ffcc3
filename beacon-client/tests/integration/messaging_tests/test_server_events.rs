use std::sync::{Arc, Mutex};

use beacon_core::NotifyPayload;

use crate::integration::{init_tracing, start_session};
use crate::utils::wait_until;

#[tokio::test]
async fn notify_payloads_reach_the_callback() {
    init_tracing();
    let (connection, server, _factory) = start_session().await;

    let notifies: Arc<Mutex<Vec<NotifyPayload>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = notifies.clone();
    connection
        .on_notify(move |payload| {
            sink.lock().unwrap().push(payload);
        })
        .await;

    server
        .send(
            serde_json::json!({
                "type": "notify",
                "event_type": "connection.created",
                "connection_id": "conn-7",
                "channel_connections": 3
            })
            .to_string(),
        )
        .await;

    let probe = notifies.clone();
    assert!(
        wait_until(|| !probe.lock().unwrap().is_empty(), 2000).await,
        "notify callback never fired"
    );

    let payload = notifies.lock().unwrap().remove(0);
    assert_eq!(payload.event_type, "connection.created");
    assert_eq!(payload.connection_id.as_deref(), Some("conn-7"));
    assert_eq!(payload.channel_connections, Some(3));

    connection.disconnect().await;
}

#[tokio::test]
async fn push_payloads_are_forwarded_verbatim() {
    init_tracing();
    let (connection, server, _factory) = start_session().await;

    let pushes: Arc<Mutex<Vec<serde_json::Value>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = pushes.clone();
    connection
        .on_push(move |value| {
            sink.lock().unwrap().push(value);
        })
        .await;

    server
        .send(r#"{"type":"push","data":{"topic":"chat","body":"hello"}}"#)
        .await;

    let probe = pushes.clone();
    assert!(
        wait_until(|| !probe.lock().unwrap().is_empty(), 2000).await,
        "push callback never fired"
    );

    let value = pushes.lock().unwrap().remove(0);
    assert_eq!(value["data"]["topic"], "chat");
    assert_eq!(value["data"]["body"], "hello");

    connection.disconnect().await;
}
