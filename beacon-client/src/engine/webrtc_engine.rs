//! Production [`PeerEngine`] backed by the `webrtc` crate.

use async_trait::async_trait;
use beacon_core::{
    CandidateInit, ConnectionOptions, MediaKind, MediaPacket, OfferConfig, PacketReadError, Role,
    SignalError, TrackInfo,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::dtls_transport::dtls_role::DTLSRole;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::policy::ice_transport_policy::RTCIceTransportPolicy;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::track::track_remote::TrackRemote;

use crate::engine::peer_engine::{
    EngineEvent, IceState, PacketSource, PeerEngine, PeerEngineFactory, RemoteTrack,
};

/// Builds [`WebrtcEngine`] instances. This is the default factory a
/// [`crate::Connection`] uses when the caller does not supply one.
#[derive(Debug, Default)]
pub struct WebrtcEngineFactory;

struct WebrtcEngine {
    pc: Arc<RTCPeerConnection>,
}

#[async_trait]
impl PeerEngineFactory for WebrtcEngineFactory {
    async fn create(
        &self,
        options: &ConnectionOptions,
        config: &OfferConfig,
        events: mpsc::Sender<EngineEvent>,
    ) -> Result<Arc<dyn PeerEngine>, SignalError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(negotiation_err)?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(negotiation_err)?;

        // The SFU offers, we answer; pin the DTLS client role accordingly.
        let mut setting_engine = SettingEngine::default();
        setting_engine
            .set_answering_dtls_role(DTLSRole::Client)
            .map_err(negotiation_err)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .with_setting_engine(setting_engine)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ice_transport_policy: match config.ice_transport_policy.as_str() {
                "relay" => RTCIceTransportPolicy::Relay,
                _ => RTCIceTransportPolicy::All,
            },
            ..Default::default()
        };
        debug!(
            servers = config.ice_servers.len(),
            policy = %config.ice_transport_policy,
            "creating peer connection"
        );

        let pc = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .map_err(negotiation_err)?,
        );

        let track_tx = events.clone();
        pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let tx = track_tx.clone();
            Box::pin(async move {
                trace!(ssrc = track.ssrc(), "inbound track started");
                let remote = RemoteTrack {
                    info: track_info(&track),
                    source: Arc::new(RemoteTrackSource { track }),
                };
                let _ = tx.send(EngineEvent::Track(remote)).await;
            })
        }));

        let ice_tx = events.clone();
        pc.on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
            let tx = ice_tx.clone();
            Box::pin(async move {
                trace!(?state, "ice connection state changed");
                let _ = tx.send(EngineEvent::IceState(map_ice_state(state))).await;
            })
        }));

        pc.on_signaling_state_change(Box::new(move |state: RTCSignalingState| {
            Box::pin(async move {
                trace!(?state, "signaling state changed");
            })
        }));

        if options.trickle_ice {
            let candidate_tx = events.clone();
            pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                let tx = candidate_tx.clone();
                Box::pin(async move {
                    let Some(candidate) = candidate else { return };
                    let init = match candidate.to_json() {
                        Ok(init) => init,
                        Err(e) => {
                            warn!(error = %e, "dropping unserializable local candidate");
                            return;
                        }
                    };
                    let _ = tx
                        .send(EngineEvent::LocalCandidate(CandidateInit {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_mline_index: init.sdp_mline_index,
                            username_fragment: init.username_fragment,
                        }))
                        .await;
                })
            }));
        }

        Ok(Arc::new(WebrtcEngine { pc }))
    }
}

#[async_trait]
impl PeerEngine for WebrtcEngine {
    async fn add_transceiver(&self, kind: MediaKind, role: Role) -> Result<(), SignalError> {
        let codec_type = match kind {
            MediaKind::Audio => RTPCodecType::Audio,
            MediaKind::Video => RTPCodecType::Video,
        };
        let direction = match role {
            Role::Sendonly => RTCRtpTransceiverDirection::Sendonly,
            Role::Recvonly => RTCRtpTransceiverDirection::Recvonly,
            Role::Sendrecv => RTCRtpTransceiverDirection::Sendrecv,
        };

        self.pc
            .add_transceiver_from_kind(
                codec_type,
                Some(RTCRtpTransceiverInit {
                    direction,
                    send_encodings: vec![],
                }),
            )
            .await
            .map_err(negotiation_err)?;
        Ok(())
    }

    async fn set_remote_description(&self, sdp: &str) -> Result<(), SignalError> {
        let desc = RTCSessionDescription::offer(sdp.to_string()).map_err(negotiation_err)?;
        self.pc
            .set_remote_description(desc)
            .await
            .map_err(negotiation_err)
    }

    async fn create_answer(&self) -> Result<String, SignalError> {
        let answer = self.pc.create_answer(None).await.map_err(negotiation_err)?;
        self.pc
            .set_local_description(answer.clone())
            .await
            .map_err(negotiation_err)?;
        Ok(answer.sdp)
    }

    async fn add_remote_candidate(&self, candidate: CandidateInit) -> Result<(), SignalError> {
        self.pc
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate,
                sdp_mid: candidate.sdp_mid,
                sdp_mline_index: candidate.sdp_mline_index,
                username_fragment: candidate.username_fragment,
            })
            .await
            .map_err(negotiation_err)
    }

    async fn request_keyframe(&self, ssrc: u32) -> Result<(), SignalError> {
        self.pc
            .write_rtcp(&[Box::new(PictureLossIndication {
                sender_ssrc: 0,
                media_ssrc: ssrc,
            })])
            .await
            .map_err(|e| SignalError::Transport(e.to_string()))?;
        Ok(())
    }

    fn signaling_closed(&self) -> bool {
        self.pc.signaling_state() == RTCSignalingState::Closed
    }

    async fn close(&self) -> Result<(), SignalError> {
        self.pc
            .close()
            .await
            .map_err(|e| SignalError::Transport(e.to_string()))
    }
}

struct RemoteTrackSource {
    track: Arc<TrackRemote>,
}

#[async_trait]
impl PacketSource for RemoteTrackSource {
    async fn read_next(&self) -> Result<MediaPacket, PacketReadError> {
        let (packet, _attributes) = self.track.read_rtp().await.map_err(map_read_err)?;
        Ok(MediaPacket {
            ssrc: packet.header.ssrc,
            sequence_number: packet.header.sequence_number,
            timestamp: packet.header.timestamp,
            payload_type: packet.header.payload_type,
            marker: packet.header.marker,
            payload: packet.payload,
        })
    }
}

fn track_info(track: &TrackRemote) -> TrackInfo {
    TrackInfo {
        ssrc: track.ssrc(),
        kind: match track.kind() {
            RTPCodecType::Audio => MediaKind::Audio,
            _ => MediaKind::Video,
        },
        payload_type: track.payload_type(),
    }
}

fn map_ice_state(state: RTCIceConnectionState) -> IceState {
    match state {
        RTCIceConnectionState::Checking => IceState::Checking,
        RTCIceConnectionState::Connected => IceState::Connected,
        RTCIceConnectionState::Completed => IceState::Completed,
        RTCIceConnectionState::Disconnected => IceState::Disconnected,
        RTCIceConnectionState::Failed => IceState::Failed,
        RTCIceConnectionState::Closed => IceState::Closed,
        _ => IceState::New,
    }
}

fn map_read_err(err: webrtc::Error) -> PacketReadError {
    // Track shutdown surfaces as a closed connection or a closed internal
    // buffer depending on which layer notices first; both are the normal
    // end of the stream, not a failure.
    let msg = err.to_string();
    if matches!(err, webrtc::Error::ErrConnectionClosed)
        || msg.contains("EOF")
        || msg.contains("buffer: closed")
    {
        PacketReadError::EndOfStream
    } else {
        PacketReadError::Transport(msg)
    }
}

fn negotiation_err(err: impl std::fmt::Display) -> SignalError {
    SignalError::Negotiation(err.to_string())
}
