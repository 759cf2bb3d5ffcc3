use std::fmt;
use thiserror::Error;

/// Failure modes of a signaling session. Everything non-recoverable collapses
/// into a teardown plus one disconnect callback carrying a [`DisconnectReason`].
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("invalid signaling message: {0}")]
    Protocol(String),

    #[error("negotiation rejected by peer engine: {0}")]
    Negotiation(String),

    #[error("ice connectivity lost or never established")]
    Ice,

    #[error("connection already exists")]
    AlreadyConnected,
}

/// Errors a per-track packet source may report.
#[derive(Debug, Error)]
pub enum PacketReadError {
    /// Normal end of the track, expected on teardown. Never escalated.
    #[error("end of stream")]
    EndOfStream,

    #[error("packet read failure: {0}")]
    Transport(String),
}

/// Tag handed to the disconnect callback identifying which path tore the
/// session down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Caller invoked `disconnect()`.
    LocalClose,
    /// The signaling socket closed or failed on the read path.
    SocketClosed,
    /// Malformed or unrecognized control message.
    ProtocolError,
    /// The peer engine rejected a remote or local description.
    NegotiationFailed,
    /// ICE reported disconnected or failed.
    IceFailed,
    /// A track packet source failed with something other than end-of-stream.
    PacketReadError,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            DisconnectReason::LocalClose => "LOCAL-CLOSE",
            DisconnectReason::SocketClosed => "SOCKET-CLOSED",
            DisconnectReason::ProtocolError => "PROTOCOL-ERROR",
            DisconnectReason::NegotiationFailed => "NEGOTIATION-FAILED",
            DisconnectReason::IceFailed => "ICE-CONNECTION-FAILED",
            DisconnectReason::PacketReadError => "PACKET-READ-ERROR",
        };
        write!(f, "{tag}")
    }
}
