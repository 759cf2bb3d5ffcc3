use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::integration::{
    OFFER_SDP, UPDATE_SDP, init_tracing, offer_message, start_session, update_message,
};

/// One offer followed by two renegotiations: the first local description goes
/// out tagged `answer`, every later one tagged `update`, and *open* fires
/// exactly once for the whole session.
#[tokio::test]
async fn updates_are_tagged_update_and_open_fires_once() {
    init_tracing();
    let (connection, server, factory) = start_session().await;

    let opens = Arc::new(AtomicUsize::new(0));
    let opens_clone = Arc::clone(&opens);
    connection
        .on_open(move || {
            opens_clone.fetch_add(1, Ordering::SeqCst);
        })
        .await;

    server.send(offer_message("conn-1", OFFER_SDP)).await;
    server.expect("answer").await.expect("first commit must be answer");

    server.send(update_message(UPDATE_SDP)).await;
    server.expect("update").await.expect("second commit must be update");

    server.send(update_message(UPDATE_SDP)).await;
    server.expect("update").await.expect("third commit must be update");

    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert_eq!(factory.engines_created(), 1);

    connection.disconnect().await;
}

#[tokio::test]
async fn update_before_any_offer_is_ignored() {
    init_tracing();
    let (connection, server, factory) = start_session().await;

    server.send(update_message(UPDATE_SDP)).await;
    // Nothing to renegotiate yet; the session stays up and the next offer
    // proceeds normally.
    server.send(offer_message("conn-1", OFFER_SDP)).await;
    server.expect("answer").await.expect("offer should still work");

    assert_eq!(factory.engines_created(), 1);
    connection.disconnect().await;
}
