use serde::{Deserialize, Serialize};

use crate::model::options::{Role, VideoConfig};

/// ICE server entry carried inside the offer `config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// ICE configuration snapshot the server attaches to its first offer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferConfig {
    #[serde(rename = "iceServers", default)]
    pub ice_servers: Vec<IceServerConfig>,
    #[serde(rename = "iceTransportPolicy", default)]
    pub ice_transport_policy: String,
}

/// Trickle-ICE candidate, same shape in both directions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateInit {
    pub candidate: String,
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u16>,
    #[serde(rename = "usernameFragment", default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

/// Body of a `notify` event, counters included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotifyPayload {
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_connections: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_upstream_connections: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_downstream_connections: Option<u64>,
}

/// Messages the client writes onto the signaling socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Connect {
        /// Client library name and version, reported for server-side stats.
        client: String,
        environment: String,
        role: Role,
        channel_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
        multistream: bool,
        simulcast: bool,
        audio: bool,
        video: VideoConfig,
        /// Always empty on the first connect; negotiation happens via offer/answer.
        sdp: String,
    },
    Answer {
        sdp: String,
    },
    Update {
        sdp: String,
    },
    Candidate(CandidateInit),
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stats: Option<serde_json::Value>,
    },
    Disconnect,
}

/// Messages the server is allowed to send. Anything else on the wire is a
/// protocol error, including client-only types echoed back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Offer {
        #[serde(default)]
        version: String,
        #[serde(default)]
        client_id: String,
        #[serde(default)]
        connection_id: String,
        sdp: String,
        #[serde(default)]
        config: OfferConfig,
    },
    Update {
        sdp: String,
    },
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stats: Option<serde_json::Value>,
    },
    Candidate(CandidateInit),
    Notify(NotifyPayload),
    Push(serde_json::Value),
}
