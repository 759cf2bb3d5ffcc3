//! Signaling client for a WebRTC SFU.
//!
//! The entry point is [`Connection`]: it drives the JSON control protocol
//! over a persistent WebSocket, hands SDP and ICE candidates to a pluggable
//! peer engine, and fans media packets and lifecycle events out to
//! caller-registered callbacks. One `Connection` manages exactly one
//! session at a time; after any failure it returns to idle and a new
//! session is an explicit `connect()` call.

pub mod connection;
pub mod engine;
pub mod transport;

pub use connection::{Connection, SessionState};
pub use engine::{
    EngineEvent, IceState, PacketSource, PeerEngine, PeerEngineFactory, RemoteTrack,
    WebrtcEngineFactory,
};
pub use transport::{SignalTransport, TransportReader};

/// Library name and version reported in the connect message.
pub const CLIENT_VERSION: &str = concat!("beacon v", env!("CARGO_PKG_VERSION"));
