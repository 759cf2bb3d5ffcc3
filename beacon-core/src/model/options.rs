use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction the client requests for its media transceivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Sendonly,
    Recvonly,
    Sendrecv,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Sendonly => write!(f, "sendonly"),
            Role::Recvonly => write!(f, "recvonly"),
            Role::Sendrecv => write!(f, "sendrecv"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoCodec {
    #[serde(rename = "VP8")]
    Vp8,
    #[serde(rename = "VP9")]
    Vp9,
    #[serde(rename = "H264")]
    H264,
    #[serde(rename = "AV1")]
    Av1,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoConfig {
    pub codec_type: VideoCodec,
    #[serde(rename = "bitrate", default, skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u32>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            codec_type: VideoCodec::Vp8,
            bit_rate: None,
        }
    }
}

/// Per-session configuration, immutable once the connection is built.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Signaling endpoint URL (`ws://` or `wss://`).
    pub signal_url: String,
    /// Channel to join on the server.
    pub channel_id: String,
    /// Client id, only honored when the server allows client-side assignment.
    pub client_id: Option<String>,
    pub role: Role,
    pub audio: bool,
    pub video: VideoConfig,
    pub multistream: bool,
    pub simulcast: bool,
    /// Opaque authentication payload forwarded verbatim in the connect message.
    pub metadata: Option<serde_json::Value>,
    /// Exchange ICE candidates incrementally instead of bundling them in the SDP.
    pub trickle_ice: bool,
}

impl ConnectionOptions {
    pub fn new(signal_url: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            signal_url: signal_url.into(),
            channel_id: channel_id.into(),
            client_id: None,
            role: Role::Recvonly,
            audio: true,
            video: VideoConfig::default(),
            multistream: false,
            simulcast: false,
            metadata: None,
            trickle_ice: false,
        }
    }
}
