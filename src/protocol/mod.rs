//! Wire protocol: checksum, byte stuffing and packet framing.

pub mod cobs;
pub mod crc;
mod frame;

pub use frame::{MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE, TRAILER_SIZE, decode, decode_many, encode};

/// Byte reserved for separating frames in a stream.
pub const PACKET_DELIMITER: u8 = 0x00;
