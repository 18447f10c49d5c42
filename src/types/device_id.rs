//! Sub-device addressing

use serde::{Deserialize, Serialize};
use std::fmt;

/// One-byte address of a sub-device (joint, end effector, sensor).
///
/// What a given value means physically depends on the device family; see
/// [`alpha5`](super::alpha5) and [`bravo7`](super::bravo7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct DeviceId(u8);

impl DeviceId {
    /// Broadcast address.
    pub const ALL: DeviceId = DeviceId(0xFF);

    pub const fn new(address: u8) -> Self {
        Self(address)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    pub const fn is_broadcast(self) -> bool {
        self.0 == Self::ALL.0
    }
}

impl From<u8> for DeviceId {
    fn from(address: u8) -> Self {
        Self(address)
    }
}

impl From<DeviceId> for u8 {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_broadcast() { f.write_str("ALL") } else { write!(f, "{:#04x}", self.0) }
    }
}

/// Addresses on the five-function Alpha 5 arm.
pub mod alpha5 {
    use super::DeviceId;

    pub const END_EFFECTOR: DeviceId = DeviceId::new(0x01);
    pub const JOINT_D: DeviceId = DeviceId::new(0x02);
    pub const JOINT_C: DeviceId = DeviceId::new(0x03);
    pub const JOINT_B: DeviceId = DeviceId::new(0x04);
    pub const JOINT_A: DeviceId = DeviceId::new(0x05);
    pub const ALL_JOINTS: DeviceId = DeviceId::ALL;
}

/// Addresses on the seven-function Bravo 7 arm.
pub mod bravo7 {
    use super::DeviceId;

    pub const END_EFFECTOR: DeviceId = DeviceId::new(0x01);
    pub const JOINT_F: DeviceId = DeviceId::new(0x02);
    pub const JOINT_E: DeviceId = DeviceId::new(0x03);
    pub const JOINT_D: DeviceId = DeviceId::new(0x04);
    pub const JOINT_C: DeviceId = DeviceId::new(0x05);
    pub const JOINT_B: DeviceId = DeviceId::new(0x06);
    pub const JOINT_A: DeviceId = DeviceId::new(0x07);
    pub const FORCE_TORQUE_SENSOR: DeviceId = DeviceId::new(0x0D);
    pub const ALL_JOINTS: DeviceId = DeviceId::ALL;
}
