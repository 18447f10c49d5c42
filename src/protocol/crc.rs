//! CRC-8 frame checksum
//!
//! Parameters: polynomial 0x4D, initial value 0x00, final XOR 0xFF, input and
//! result reflected. The lookup table is the reflected form of the polynomial,
//! which folds both reflections into a right-shifting update.

const POLYNOMIAL: u8 = 0x4D;
const INITIAL_VALUE: u8 = 0x00;
const FINAL_XOR_VALUE: u8 = 0xFF;

const LOOKUP_TABLE: [u8; 256] = build_reflected_table(POLYNOMIAL.reverse_bits());

const fn build_reflected_table(reflected_poly: u8) -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut index = 0;
    while index < 256 {
        let mut crc = index as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x01 != 0 { (crc >> 1) ^ reflected_poly } else { crc >> 1 };
            bit += 1;
        }
        table[index] = crc;
        index += 1;
    }
    table
}

/// Compute the frame checksum over `data`.
pub fn checksum(data: &[u8]) -> u8 {
    let crc = data
        .iter()
        .fold(INITIAL_VALUE, |crc, &byte| LOOKUP_TABLE[(crc ^ byte) as usize]);
    crc ^ FINAL_XOR_VALUE
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Bit-at-a-time reference using the non-reflected polynomial with explicit
    /// reflection of every input byte and of the result.
    fn reference_crc(data: &[u8]) -> u8 {
        let mut crc = INITIAL_VALUE;
        for &byte in data {
            crc ^= byte.reverse_bits();
            for _ in 0..8 {
                crc = if crc & 0x80 != 0 { (crc << 1) ^ POLYNOMIAL } else { crc << 1 };
            }
        }
        crc.reverse_bits() ^ FINAL_XOR_VALUE
    }

    #[test]
    fn single_byte_reference_vector() {
        assert_eq!(checksum(&[0x01]), 0xC1);
    }

    #[test]
    fn check_string_and_empty_input() {
        assert_eq!(checksum(b"123456789"), 0x7B);
        assert_eq!(checksum(&[]), 0xFF);
    }

    #[test]
    fn heartbeat_frame_body() {
        // MODEL_NUMBER response body: payload, id, device, length
        assert_eq!(checksum(&[0x62, 0x62, 0xFF, 0x05]), 0x01);
    }

    proptest! {
        #[test]
        fn matches_bitwise_reference(data in prop::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(checksum(&data), reference_crc(&data));
        }

        #[test]
        fn deterministic(data in prop::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(checksum(&data), checksum(&data));
        }

        #[test]
        fn single_bit_flip_changes_checksum(
            data in prop::collection::vec(any::<u8>(), 1..256),
            index in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let mut flipped = data.clone();
            let i = index.index(flipped.len());
            flipped[i] ^= 1 << bit;
            prop_assert_ne!(checksum(&data), checksum(&flipped));
        }
    }
}
