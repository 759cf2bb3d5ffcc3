pub use beacon_client::{CLIENT_VERSION, Connection, SessionState};

pub mod model {
    pub use beacon_core::model::*;
}

pub mod engine {
    pub use beacon_client::engine::*;
}

pub use beacon_core::{DisconnectReason, PacketReadError, SignalError};
pub use beacon_core::{ConnectionOptions, Role, VideoCodec, VideoConfig};
