use beacon_core::SignalError;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config};
use tracing::{debug, trace, warn};

/// How long a blocking read may wait before the session is considered dead.
pub const READ_TIMEOUT: Duration = Duration::from_secs(90);
/// Deadline for a single outbound frame.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
/// Inbound control messages are tiny; anything past this is hostile.
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;
/// Size of the decoded-message queue between the read task and dispatch.
pub const INBOUND_QUEUE_CAPACITY: usize = 100;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Write/close half of the signaling socket. Closing twice, or sending after
/// close, is a quiet no-op so teardown never has to care about ordering.
pub struct SignalTransport {
    sink: Mutex<Option<WsSink>>,
}

/// Read half, owned by the dedicated read task.
pub struct TransportReader {
    stream: WsSource,
}

impl SignalTransport {
    /// Opens the WebSocket to the signaling endpoint.
    pub async fn connect(url: &str) -> Result<(Self, TransportReader), SignalError> {
        debug!(url, "connecting to signaling endpoint");

        let config = WebSocketConfig::default()
            .max_message_size(Some(MAX_MESSAGE_SIZE))
            .max_frame_size(Some(MAX_MESSAGE_SIZE));

        let (ws, _response) = connect_async_with_config(url, Some(config), false)
            .await
            .map_err(|e| SignalError::Transport(e.to_string()))?;
        debug!(url, "signaling socket open");

        let (sink, stream) = ws.split();
        let transport = Self {
            sink: Mutex::new(Some(sink)),
        };
        Ok((transport, TransportReader { stream }))
    }

    /// Sends one JSON control message under the write deadline. Sending on a
    /// closed transport is a no-op, matching the best-effort notification
    /// paths that run during teardown.
    pub async fn send_json<T: Serialize>(&self, msg: &T) -> Result<(), SignalError> {
        let json = serde_json::to_string(msg).map_err(|e| SignalError::Protocol(e.to_string()))?;
        self.send_text(json).await
    }

    async fn send_text(&self, text: String) -> Result<(), SignalError> {
        let mut guard = self.sink.lock().await;
        let Some(sink) = guard.as_mut() else {
            trace!("send on closed transport dropped");
            return Ok(());
        };

        trace!(len = text.len(), "send signaling message");
        match tokio::time::timeout(WRITE_TIMEOUT, sink.send(Message::text(text))).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SignalError::Transport(e.to_string())),
            Err(_) => Err(SignalError::Transport("write deadline exceeded".into())),
        }
    }

    /// Closes the socket. Idempotent: absent or already-closed handles are
    /// left alone.
    pub async fn close(&self) {
        let Some(mut sink) = self.sink.lock().await.take() else {
            return;
        };
        if let Err(e) = sink.send(Message::Close(None)).await {
            trace!(error = %e, "close frame not delivered");
        }
        let _ = sink.close().await;
        debug!("signaling socket closed");
    }
}

impl TransportReader {
    /// Blocks for the next inbound message under the read deadline. Any error
    /// (deadline, peer close, protocol violation) means this reader produces
    /// nothing further; the caller signals closure to its consumer.
    pub async fn receive(&mut self) -> Result<Vec<u8>, SignalError> {
        loop {
            let frame = tokio::time::timeout(READ_TIMEOUT, self.stream.next())
                .await
                .map_err(|_| SignalError::Transport("read deadline exceeded".into()))?;

            match frame {
                Some(Ok(Message::Text(text))) => return Ok(text.as_bytes().to_vec()),
                Some(Ok(Message::Binary(bytes))) => return Ok(bytes.to_vec()),
                Some(Ok(Message::Close(_))) => {
                    return Err(SignalError::Transport("closed by peer".into()));
                }
                // Ping/pong and partial frames are handled by the protocol layer.
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!(error = %e, "signaling read failed");
                    return Err(SignalError::Transport(e.to_string()));
                }
                None => return Err(SignalError::Transport("socket closed".into())),
            }
        }
    }
}
