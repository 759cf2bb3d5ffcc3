mod message;
mod options;
mod packet;

pub use message::{
    CandidateInit, ClientMessage, IceServerConfig, NotifyPayload, OfferConfig, ServerMessage,
};
pub use options::{ConnectionOptions, Role, VideoCodec, VideoConfig};
pub use packet::{MediaKind, MediaPacket, TrackInfo};
