//! Consistent overhead byte stuffing
//!
//! Removes every `0x00` from a byte sequence so that `0x00` can delimit frames
//! in a continuous stream. Each run of up to 254 non-zero bytes is preceded by
//! a code byte holding `run length + 1`; a code below `0xFF` also stands for a
//! zero that followed the run in the original data.

use crate::error::FrameError;

use super::PACKET_DELIMITER;

/// Longest run of data bytes one code byte can describe.
pub(crate) const MAX_BLOCK_SIZE: usize = 254;

/// Stuff `data` and append the trailing delimiter.
pub fn stuff(data: &[u8]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(data.len() + data.len() / MAX_BLOCK_SIZE + 2);
    let mut code_index = 0;
    let mut block_size = 0usize;
    encoded.push(0x00);

    for &byte in data {
        if byte == 0x00 {
            encoded[code_index] = (block_size + 1) as u8;
            code_index = encoded.len();
            encoded.push(0x00);
            block_size = 0;
        } else {
            encoded.push(byte);
            block_size += 1;

            if block_size >= MAX_BLOCK_SIZE {
                encoded[code_index] = (block_size + 1) as u8;
                code_index = encoded.len();
                encoded.push(0x00);
                block_size = 0;
            }
        }
    }

    encoded[code_index] = (block_size + 1) as u8;
    encoded.push(PACKET_DELIMITER);
    encoded
}

/// Reverse [`stuff`].
///
/// Accepts input with or without the trailing delimiter; decoding stops at the
/// first zero code byte or at the end of input. A zero inside a block, or a
/// block that runs past the end of input, is reported as
/// [`FrameError::Unstuffing`].
pub fn unstuff(data: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut decoded = Vec::with_capacity(data.len());
    let mut pos = 0;

    while pos < data.len() {
        let code = data[pos];
        if code == PACKET_DELIMITER {
            break;
        }

        let block_size = code as usize - 1;
        pos += 1;

        let block = data.get(pos..pos + block_size).ok_or(FrameError::Unstuffing { position: data.len() })?;
        if let Some(offset) = block.iter().position(|&b| b == 0x00) {
            return Err(FrameError::Unstuffing { position: pos + offset });
        }
        decoded.extend_from_slice(block);
        pos += block_size;

        let more_follows = data.get(pos).is_some_and(|&b| b != PACKET_DELIMITER);
        if more_follows && block_size < MAX_BLOCK_SIZE {
            decoded.push(0x00);
        }
    }

    Ok(decoded)
}
