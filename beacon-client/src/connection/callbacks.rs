use beacon_core::{DisconnectReason, MediaPacket, NotifyPayload, SignalError, TrackInfo};
use std::sync::Arc;

pub type OpenHandler = Arc<dyn Fn() + Send + Sync>;
pub type ConnectHandler = Arc<dyn Fn() + Send + Sync>;
pub type DisconnectHandler = Arc<dyn Fn(DisconnectReason, Option<SignalError>) + Send + Sync>;
pub type TrackPacketHandler = Arc<dyn Fn(&TrackInfo, MediaPacket) + Send + Sync>;
pub type NotifyHandler = Arc<dyn Fn(NotifyPayload) + Send + Sync>;
pub type PushHandler = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

/// One current handler per event. Replacing a handler takes effect on the
/// next invocation; invokers clone the `Arc` out under the session lock and
/// call it after releasing, so a replacement never blocks on a running
/// callback.
pub(crate) struct CallbackRegistry {
    pub on_open: OpenHandler,
    pub on_connect: ConnectHandler,
    pub on_disconnect: DisconnectHandler,
    pub on_track_packet: TrackPacketHandler,
    pub on_notify: NotifyHandler,
    pub on_push: PushHandler,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self {
            on_open: Arc::new(|| {}),
            on_connect: Arc::new(|| {}),
            on_disconnect: Arc::new(|_, _| {}),
            on_track_packet: Arc::new(|_, _| {}),
            on_notify: Arc::new(|_| {}),
            on_push: Arc::new(|_| {}),
        }
    }

    /// Back to no-ops. Runs on every teardown so a dead session can never
    /// call into the application again.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
