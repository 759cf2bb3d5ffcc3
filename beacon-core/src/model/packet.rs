use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Audio,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// Descriptor for one inbound media track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub ssrc: u32,
    pub kind: MediaKind,
    pub payload_type: u8,
}

/// One RTP packet as delivered to the track-packet callback. The payload is
/// the depacketized RTP body; header fields are carried alongside so callers
/// can reorder or demux without another parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPacket {
    pub ssrc: u32,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub payload_type: u8,
    pub marker: bool,
    pub payload: Bytes,
}
