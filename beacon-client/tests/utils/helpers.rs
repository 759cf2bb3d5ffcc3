use beacon_core::MediaPacket;
use bytes::Bytes;
use std::time::Duration;

/// Polls a condition until it holds or the timeout elapses.
pub async fn wait_until<F>(condition: F, timeout_ms: u64) -> bool
where
    F: Fn() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    loop {
        if condition() {
            return true;
        }
        if start.elapsed() > timeout {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

pub fn media_packet(sequence_number: u16) -> MediaPacket {
    MediaPacket {
        ssrc: 0xbeef,
        sequence_number,
        timestamp: u32::from(sequence_number) * 3000,
        payload_type: 96,
        marker: false,
        payload: Bytes::from_static(b"payload"),
    }
}
