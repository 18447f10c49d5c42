//! Packet framing: checksum, length trailer and byte stuffing
//!
//! ## Frame Layout
//!
//! ```text
//! [ payload (1..=251) ][ packet_id ][ device_id ][ length ][ checksum ]
//! ```
//!
//! `length` counts every byte of the frame (payload plus the four trailer
//! bytes) and `checksum` covers everything before it. The whole sequence is
//! then byte-stuffed and terminated with [`PACKET_DELIMITER`].

use tracing::{trace, warn};

use super::PACKET_DELIMITER;
use super::cobs::{MAX_BLOCK_SIZE, stuff, unstuff};
use super::crc::checksum;
use crate::ReachError;
use crate::error::FrameError;
use crate::types::{DeviceId, Packet, PacketId};

/// Bytes appended after the payload: packet id, device id, length, checksum.
pub const TRAILER_SIZE: usize = 4;

/// Largest payload whose frame length still fits the one-byte length field.
pub const MAX_PAYLOAD_SIZE: usize = u8::MAX as usize - TRAILER_SIZE;

/// Longest encoded frame: a full body, its code bytes and the delimiter.
pub const MAX_FRAME_SIZE: usize = {
    let body = MAX_PAYLOAD_SIZE + TRAILER_SIZE;
    body + body / MAX_BLOCK_SIZE + 2
};

/// Encode a packet into a delimited wire frame.
pub fn encode(packet: &Packet) -> Vec<u8> {
    let payload = packet.payload();
    let mut body = Vec::with_capacity(payload.len() + TRAILER_SIZE);
    body.extend_from_slice(payload);
    body.push(packet.packet_id().value());
    body.push(packet.device_id().value());
    // Packet construction bounds the payload, so the length always fits
    body.push((payload.len() + TRAILER_SIZE) as u8);
    body.push(checksum(&body));

    stuff(&body)
}

/// Decode one frame, with or without its trailing delimiter.
pub fn decode(frame: &[u8]) -> Result<Packet, FrameError> {
    if frame.is_empty() {
        return Err(FrameError::Truncated { len: 0 });
    }

    let mut body = unstuff(frame)?;
    if body.len() <= TRAILER_SIZE {
        return Err(FrameError::Truncated { len: body.len() });
    }

    let actual_crc = body.pop().ok_or(FrameError::Truncated { len: 0 })?;
    let expected_crc = checksum(&body);
    if actual_crc != expected_crc {
        return Err(FrameError::ChecksumMismatch { expected: expected_crc, actual: actual_crc });
    }

    let declared = body.pop().ok_or(FrameError::Truncated { len: 0 })? as usize;
    // Remaining bytes plus the length and checksum bytes already removed
    let actual = body.len() + 2;
    if declared != actual {
        return Err(FrameError::LengthMismatch { declared, actual });
    }

    let device_id = body.pop().ok_or(FrameError::Truncated { len: 0 })?;
    let packet_id = body.pop().ok_or(FrameError::Truncated { len: 0 })?;

    packet_from_parts(PacketId::new(packet_id), DeviceId::new(device_id), body, declared)
}

/// Build the decoded packet, reporting construction failures as frame errors.
fn packet_from_parts(
    packet_id: PacketId,
    device_id: DeviceId,
    payload: Vec<u8>,
    declared: usize,
) -> Result<Packet, FrameError> {
    let frame_len = payload.len() + TRAILER_SIZE;
    Packet::new(packet_id, device_id, payload).map_err(|e| match e {
        ReachError::PayloadTooLarge { .. } => FrameError::LengthMismatch { declared, actual: frame_len },
        _ => FrameError::Truncated { len: frame_len },
    })
}

/// Decode every complete frame in `buffer`.
///
/// The buffer is split on the delimiter and each candidate is decoded
/// independently. Corrupt candidates are logged and skipped so that one bad
/// frame never blocks the frames after it. Bytes after the last delimiter are
/// treated as one more candidate; callers streaming data should only pass
/// complete frames.
pub fn decode_many(buffer: &[u8]) -> Vec<Packet> {
    let mut packets = Vec::new();

    for candidate in buffer.split(|&b| b == PACKET_DELIMITER) {
        if candidate.is_empty() {
            continue;
        }

        match decode(candidate) {
            Ok(packet) => {
                trace!(
                    packet_id = %packet.packet_id(),
                    device_id = %packet.device_id(),
                    len = packet.payload_len(),
                    "Decoded packet"
                );
                packets.push(packet);
            }
            Err(e) => {
                warn!(frame_len = candidate.len(), "Dropping corrupt frame: {}", e);
            }
        }
    }

    packets
}
