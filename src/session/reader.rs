//! Background reader that turns transport bytes into packet batches

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{LinkMonitor, PacketSink};
use crate::protocol::{PACKET_DELIMITER, decode_many};
use crate::transport::Transport;
use crate::types::PacketId;

/// Pause after a read that returned no data.
const IDLE_BACKOFF: Duration = Duration::from_millis(5);

/// Packet whose arrival proves the device is alive.
pub(crate) const HEARTBEAT_PACKET: PacketId = PacketId::MODEL_NUMBER;

fn error_backoff(error_count: u32) -> Duration {
    // 50ms, 100ms, 200ms, ... capped at 1.6s
    Duration::from_millis(50 * (1 << error_count.saturating_sub(1).min(5)))
}

/// Read until cancelled.
///
/// Bytes accumulate in a rolling buffer of at most `max_read_bytes`. Whenever
/// the buffer holds a delimiter, every frame up to the last delimiter is
/// decoded and handed to the sink as one batch; the partial frame after it is
/// kept for the next read. Transport errors are logged and retried.
pub(crate) async fn read_loop<S: PacketSink>(
    transport: Arc<dyn Transport>,
    sink: S,
    monitor: Arc<LinkMonitor>,
    max_read_bytes: usize,
    cancel: CancellationToken,
) {
    info!(max_read_bytes, "Session reader started");

    let mut buffer: Vec<u8> = Vec::with_capacity(max_read_bytes);
    let mut chunk = vec![0u8; max_read_bytes];
    let mut packet_count = 0u64;
    let mut error_count = 0u32;

    loop {
        let to_read = max_read_bytes - buffer.len();

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = transport.read(&mut chunk[..to_read]) => result,
        };

        match result {
            Ok(0) => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(IDLE_BACKOFF) => {}
                }
                continue;
            }
            Ok(n) => {
                if error_count > 0 {
                    info!("Transport reads recovered after {} errors", error_count);
                    error_count = 0;
                }
                trace!(bytes = n, "Read from transport");
                buffer.extend_from_slice(&chunk[..n]);
            }
            Err(e) => {
                error_count = error_count.saturating_add(1);
                warn!(
                    "Failed to read from the device; the connection was likely lost ({}): {}",
                    error_count, e
                );

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(error_backoff(error_count)) => {}
                }
                continue;
            }
        }

        let Some(last_delimiter) = buffer.iter().rposition(|&b| b == PACKET_DELIMITER) else {
            if buffer.len() >= max_read_bytes {
                warn!(
                    buffered = buffer.len(),
                    "Read buffer filled without a frame delimiter; discarding to resynchronize"
                );
                buffer.clear();
            }
            continue;
        };

        let packets = decode_many(&buffer[..=last_delimiter]);
        buffer.drain(..=last_delimiter);

        if packets.is_empty() {
            continue;
        }

        if packets.iter().any(|p| p.packet_id() == HEARTBEAT_PACKET) {
            monitor.record_heartbeat(Instant::now());
        }

        packet_count += packets.len() as u64;
        debug!(count = packets.len(), total = packet_count, "Delivering packet batch");

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sink.deliver(packets) => {}
        }
    }

    info!(packet_count, "Session reader stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(error_backoff(1), Duration::from_millis(50));
        assert_eq!(error_backoff(2), Duration::from_millis(100));
        assert_eq!(error_backoff(6), Duration::from_millis(1600));
        assert_eq!(error_backoff(40), Duration::from_millis(1600));
    }
}
