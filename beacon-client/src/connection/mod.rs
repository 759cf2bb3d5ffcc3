mod callbacks;
mod connection;
mod negotiation;

pub use callbacks::{
    ConnectHandler, DisconnectHandler, NotifyHandler, OpenHandler, PushHandler,
    TrackPacketHandler,
};
pub use connection::{Connection, SessionState};
