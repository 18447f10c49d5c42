//! Core types for packets and addressing.
//!
//! - [`PacketId`] is the one-byte message-type code with named firmware constants
//! - [`DeviceId`] is the one-byte sub-device address, with family tables in
//!   [`alpha5`] and [`bravo7`]
//! - [`Packet`] is one immutable message with a non-empty payload
//! - [`PayloadValue`] decodes and encodes single little-endian payload values
//!
//! ## Usage Example
//!
//! ```rust
//! use reach::types::{Packet, PacketId, alpha5};
//!
//! let packet = Packet::from_value(PacketId::POSITION, alpha5::JOINT_A, 1.5f32);
//! assert_eq!(packet.payload_len(), 4);
//! assert_eq!(packet.value::<f32>().unwrap(), 1.5);
//! ```

mod device_id;
mod packet;
mod packet_id;
mod payload;
mod update_rate;

pub use device_id::{DeviceId, alpha5, bravo7};
pub use packet::Packet;
pub use packet_id::PacketId;
pub use payload::PayloadValue;
pub use update_rate::UpdateRate;
