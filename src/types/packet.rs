//! Packet type shared by every layer of the stack

use std::sync::Arc;

use super::{DeviceId, PacketId, PayloadValue};
use crate::protocol::MAX_PAYLOAD_SIZE;
use crate::{ReachError, Result};

/// One decoded or outgoing message.
///
/// The payload always holds between 1 and [`MAX_PAYLOAD_SIZE`] bytes. Packets are immutable; the
/// payload is shared via `Arc<[u8]>` so handing a packet to several consumers
/// does not copy it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    packet_id: PacketId,
    device_id: DeviceId,
    payload: Arc<[u8]>,
}

impl Packet {
    /// Create a packet, rejecting empty or oversized payloads.
    pub fn new(packet_id: PacketId, device_id: DeviceId, payload: Vec<u8>) -> Result<Self> {
        if payload.is_empty() {
            return Err(ReachError::EmptyPayload { packet_id });
        }
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ReachError::PayloadTooLarge { len: payload.len(), max: MAX_PAYLOAD_SIZE });
        }

        Ok(Self { packet_id, device_id, payload: payload.into() })
    }

    /// Create a packet carrying a single little-endian value.
    pub fn from_value<T: PayloadValue>(packet_id: PacketId, device_id: DeviceId, value: T) -> Self {
        let mut payload = Vec::with_capacity(T::SIZE);
        value.write_payload(&mut payload);
        // PayloadValue sizes are between 1 and 8 bytes
        Self { packet_id, device_id, payload: payload.into() }
    }

    pub fn packet_id(&self) -> PacketId {
        self.packet_id
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Decode the payload as a single value of type `T`.
    ///
    /// Fails with [`ReachError::PayloadSize`] unless the payload is exactly
    /// `T::SIZE` bytes long.
    pub fn value<T: PayloadValue>(&self) -> Result<T> {
        T::from_payload(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_rejected() {
        let result = Packet::new(PacketId::POSITION, DeviceId::new(0x05), Vec::new());
        assert!(matches!(result, Err(ReachError::EmptyPayload { packet_id: PacketId::POSITION })));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let result = Packet::new(PacketId::POSITION, DeviceId::ALL, vec![1; MAX_PAYLOAD_SIZE + 1]);
        assert!(matches!(result, Err(ReachError::PayloadTooLarge { len: 252, max: 251 })));
        assert!(Packet::new(PacketId::POSITION, DeviceId::ALL, vec![1; MAX_PAYLOAD_SIZE]).is_ok());
    }

    #[test]
    fn accessors_return_constructed_fields() {
        let packet = Packet::new(PacketId::VELOCITY, DeviceId::new(0x02), vec![1, 2, 3]).unwrap();
        assert_eq!(packet.packet_id(), PacketId::VELOCITY);
        assert_eq!(packet.device_id(), DeviceId::new(0x02));
        assert_eq!(packet.payload(), &[1, 2, 3]);
        assert_eq!(packet.payload_len(), 3);
    }

    #[test]
    fn value_round_trips_through_payload() {
        let packet = Packet::from_value(PacketId::POSITION, DeviceId::new(0x05), 1.0f32);
        assert_eq!(packet.payload(), &[0x00, 0x00, 0x80, 0x3F]);
        assert_eq!(packet.value::<f32>().unwrap(), 1.0);
    }

    #[test]
    fn value_rejects_wrong_size() {
        let packet = Packet::new(PacketId::MODEL_NUMBER, DeviceId::new(0x05), vec![1, 2]).unwrap();
        assert!(matches!(
            packet.value::<f32>(),
            Err(ReachError::PayloadSize { expected: 4, found: 2 })
        ));
    }
}
