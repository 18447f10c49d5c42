//! Payload value encoding trait and implementations

use crate::{ReachError, Result};

/// Types that travel as a single little-endian value in a packet payload.
pub trait PayloadValue: Sized {
    /// Encoded size in bytes. Always non-zero.
    const SIZE: usize;

    /// Parse the value from a payload of exactly [`SIZE`](Self::SIZE) bytes.
    fn from_payload(payload: &[u8]) -> Result<Self>;

    /// Append the encoded value to `out`.
    fn write_payload(&self, out: &mut Vec<u8>);
}

fn exact<const N: usize>(payload: &[u8]) -> Result<[u8; N]> {
    payload
        .try_into()
        .map_err(|_| ReachError::PayloadSize { expected: N, found: payload.len() })
}

macro_rules! impl_payload_value {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl PayloadValue for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn from_payload(payload: &[u8]) -> Result<Self> {
                    Ok(<$ty>::from_le_bytes(exact(payload)?))
                }

                fn write_payload(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }
        )+
    };
}

impl_payload_value!(u8, i8, u16, i16, u32, i32, f32, f64);
