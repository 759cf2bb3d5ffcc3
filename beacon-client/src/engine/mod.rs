mod peer_engine;
mod webrtc_engine;

pub use peer_engine::{
    EngineEvent, IceState, PacketSource, PeerEngine, PeerEngineFactory, RemoteTrack,
};
pub use webrtc_engine::WebrtcEngineFactory;
