pub mod error;
pub mod model;
pub mod sdp;

pub use error::{DisconnectReason, PacketReadError, SignalError};
pub use model::{
    CandidateInit, ClientMessage, ConnectionOptions, IceServerConfig, MediaKind, MediaPacket,
    NotifyPayload, OfferConfig, Role, ServerMessage, TrackInfo, VideoCodec, VideoConfig,
};
