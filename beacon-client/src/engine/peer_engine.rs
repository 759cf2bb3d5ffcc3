//! Boundary to the externally supplied peer-connection engine.
//!
//! The connection engine never touches ICE/DTLS/SRTP directly; it drives an
//! implementation of [`PeerEngine`] and consumes the [`EngineEvent`] stream
//! the engine feeds back through the channel handed to its factory.

use async_trait::async_trait;
use beacon_core::{
    CandidateInit, ConnectionOptions, MediaPacket, OfferConfig, PacketReadError, Role, SignalError,
    TrackInfo,
};
use std::sync::Arc;
use tokio::sync::mpsc;

use beacon_core::MediaKind;

/// ICE connection states as the engine reports them. Repeated identical
/// states are delivered as-is; de-duplication happens in dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

/// Events the engine pushes into the dispatch loop.
pub enum EngineEvent {
    /// A new inbound track started.
    Track(RemoteTrack),
    /// A local ICE candidate was discovered (trickle).
    LocalCandidate(CandidateInit),
    /// The ICE connection state changed.
    IceState(IceState),
}

/// One inbound track plus the source its packets are pumped from.
pub struct RemoteTrack {
    pub info: TrackInfo,
    pub source: Arc<dyn PacketSource>,
}

/// Per-track packet source: `read_next` blocks until a packet arrives,
/// the track ends, or the transport underneath fails.
#[async_trait]
pub trait PacketSource: Send + Sync {
    async fn read_next(&self) -> Result<MediaPacket, PacketReadError>;
}

#[async_trait]
pub trait PeerEngine: Send + Sync {
    /// Registers a transceiver of the given kind with a direction derived
    /// from the requested role.
    async fn add_transceiver(&self, kind: MediaKind, role: Role) -> Result<(), SignalError>;

    /// Applies a remote offer (or renegotiation offer) SDP.
    async fn set_remote_description(&self, sdp: &str) -> Result<(), SignalError>;

    /// Creates a local answer, commits it as the local description and
    /// returns its SDP.
    async fn create_answer(&self) -> Result<String, SignalError>;

    /// Feeds a remote trickle-ICE candidate into the engine.
    async fn add_remote_candidate(&self, candidate: CandidateInit) -> Result<(), SignalError>;

    /// Asks the remote sender for a refresh frame on the given ssrc.
    async fn request_keyframe(&self, ssrc: u32) -> Result<(), SignalError>;

    /// Whether the engine's signaling state has reached closed. Engine close
    /// is asynchronous underneath, so teardown polls this.
    fn signaling_closed(&self) -> bool;

    async fn close(&self) -> Result<(), SignalError>;
}

/// Builds one engine instance per inbound offer, configured with the ICE
/// servers and transport policy the server attached to it. The `events`
/// sender is where the instance must report tracks, candidates and ICE
/// state changes.
#[async_trait]
pub trait PeerEngineFactory: Send + Sync {
    async fn create(
        &self,
        options: &ConnectionOptions,
        config: &OfferConfig,
        events: mpsc::Sender<EngineEvent>,
    ) -> Result<Arc<dyn PeerEngine>, SignalError>;
}
