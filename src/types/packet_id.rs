//! Message-type codes defined by the device firmware

use serde::{Deserialize, Serialize};
use std::fmt;

/// One-byte message-type code.
///
/// Known codes are exposed as associated constants. Any other byte is still
/// accepted (device families add their own codes) and reports no [`name`](Self::name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct PacketId(u8);

macro_rules! packet_ids {
    ($($name:ident = $value:literal),+ $(,)?) => {
        impl PacketId {
            $(pub const $name: PacketId = PacketId($value);)+

            /// Firmware name of this code, or `None` for codes outside the table.
            pub const fn name(self) -> Option<&'static str> {
                match self.0 {
                    $($value => Some(stringify!($name)),)+
                    _ => None,
                }
            }
        }
    };
}

packet_ids! {
    MODE = 0x01,
    VELOCITY = 0x02,
    POSITION = 0x03,
    CURRENT = 0x05,
    INDEXED_POSITION = 0x0D,
    RELATIVE_POSITION = 0x0E,
    POSITION_LIMITS = 0x10,
    VELOCITY_LIMITS = 0x11,
    CURRENT_LIMITS = 0x12,
    SAVE = 0x50,
    REQUEST = 0x60,
    SERIAL_NUMBER = 0x61,
    MODEL_NUMBER = 0x62,
    TEMPERATURE = 0x66,
    VOLTAGE = 0x90,
    HEARTBEAT_SET = 0x91,
    HEARTBEAT_FREQUENCY = 0x92,
    VOLTAGE_THRESHOLD_PARAMETERS = 0x99,
    KM_END_POS = 0xA1,
    KM_END_VEL = 0xA2,
    KM_BOX_OBSTACLE_02 = 0xA5,
    KM_BOX_OBSTACLE_03 = 0xA6,
    KM_BOX_OBSTACLE_04 = 0xA7,
    KM_BOX_OBSTACLE_05 = 0xA8,
    KM_CYLINDER_OBSTACLE_02 = 0xAB,
    KM_CYLINDER_OBSTACLE_03 = 0xAC,
    KM_CYLINDER_OBSTACLE_04 = 0xAD,
    KM_CYLINDER_OBSTACLE_05 = 0xAE,
    KM_END_VEL_LOCAL = 0xCB,
    ATI_FT_READING = 0xD8,
    BOOTLOADER = 0xFF,
}

impl PacketId {
    /// Wrap a raw code.
    pub const fn new(code: u8) -> Self {
        Self(code)
    }

    /// Raw wire value.
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Whether this code appears in the firmware table.
    pub const fn is_known(self) -> bool {
        self.name().is_some()
    }
}

impl From<u8> for PacketId {
    fn from(code: u8) -> Self {
        Self(code)
    }
}

impl From<PacketId> for u8 {
    fn from(id: PacketId) -> Self {
        id.0
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "UNKNOWN({:#04x})", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_have_names() {
        assert_eq!(PacketId::POSITION.value(), 0x03);
        assert_eq!(PacketId::POSITION.name(), Some("POSITION"));
        assert_eq!(PacketId::from(0x62), PacketId::MODEL_NUMBER);
        assert!(PacketId::HEARTBEAT_SET.is_known());
    }

    #[test]
    fn unknown_codes_fall_back() {
        let id = PacketId::new(0x42);
        assert!(!id.is_known());
        assert_eq!(id.to_string(), "UNKNOWN(0x42)");
        assert_eq!(u8::from(id), 0x42);
    }
}
