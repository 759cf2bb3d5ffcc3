//! Glue between the dispatch loop and the peer engine: transceiver
//! registration, per-track packet pumps and the periodic keyframe request.

use beacon_core::{ConnectionOptions, DisconnectReason, MediaKind, PacketReadError, SignalError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use crate::connection::Connection;
use crate::engine::{PeerEngine, RemoteTrack};

/// The SFU is a relay, not an encoder; asking for a refresh frame on a fixed
/// interval coaxes the upstream into keeping decoders recoverable.
pub(crate) const KEYFRAME_INTERVAL: Duration = Duration::from_secs(3);

/// Registers the transceivers the options imply: audio only when enabled,
/// video always, direction from the requested role.
pub(crate) async fn register_transceivers(
    engine: &Arc<dyn PeerEngine>,
    options: &ConnectionOptions,
) -> Result<(), SignalError> {
    if options.audio {
        engine.add_transceiver(MediaKind::Audio, options.role).await?;
    }
    engine.add_transceiver(MediaKind::Video, options.role).await?;
    Ok(())
}

/// Starts the two tasks tied to one inbound track. Both unwind on their own
/// once the engine reports a closed signaling state; neither mutates session
/// state directly.
pub(crate) fn spawn_track_tasks(
    connection: Connection,
    epoch: u64,
    engine: Arc<dyn PeerEngine>,
    track: RemoteTrack,
) {
    let ssrc = track.info.ssrc;
    debug!(ssrc, kind = %track.info.kind, "starting track tasks");

    if track.info.kind == MediaKind::Video {
        let keyframe_engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(KEYFRAME_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if keyframe_engine.signaling_closed() {
                    trace!(ssrc, "keyframe task done, engine closed");
                    return;
                }
                if let Err(e) = keyframe_engine.request_keyframe(ssrc).await {
                    trace!(ssrc, error = %e, "keyframe request not delivered");
                }
            }
        });
    }

    tokio::spawn(async move {
        loop {
            match track.source.read_next().await {
                Ok(packet) => {
                    let handler = connection.track_packet_handler().await;
                    handler(&track.info, packet);
                }
                Err(PacketReadError::EndOfStream) => {
                    trace!(ssrc, "track ended");
                    return;
                }
                Err(err) => {
                    debug!(ssrc, error = %err, "track read failed");
                    connection
                        .fail(
                            epoch,
                            DisconnectReason::PacketReadError,
                            Some(SignalError::Transport(err.to_string())),
                        )
                        .await;
                    return;
                }
            }

            if engine.signaling_closed() {
                return;
            }
        }
    });
}
