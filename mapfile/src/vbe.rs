//! Variable byte encoding.
//!
//! Integers are split into groups of 7 bits, least significant group first.
//! Bit 7 of every byte but the last is set. Signed values store their
//! magnitude; the last byte only carries 6 bits and uses bit 6 as the sign.

/// Longest encoding of a 32 bit value.
pub const MAX_LENGTH: usize = 5;

const CONTINUATION: u8 = 0x80;
const SIGN: u8 = 0x40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VbeError {
    #[error("variable byte integer truncated after {0} bytes")]
    Truncated(usize),
    #[error("variable byte integer does not fit in 32 bits")]
    Overflow,
}

/// Decodes an unsigned value, returning it with the number of bytes read.
pub fn decode_unsigned(bytes: &[u8]) -> Result<(u32, usize), VbeError> {
    let mut value = 0u64;
    for (index, &byte) in bytes.iter().enumerate() {
        if index == MAX_LENGTH {
            return Err(VbeError::Overflow);
        }
        value |= u64::from(byte & !CONTINUATION) << (7 * index);
        if byte & CONTINUATION == 0 {
            let value = u32::try_from(value).map_err(|_| VbeError::Overflow)?;
            return Ok((value, index + 1));
        }
    }
    Err(VbeError::Truncated(bytes.len()))
}

/// Decodes a signed value, returning it with the number of bytes read.
pub fn decode_signed(bytes: &[u8]) -> Result<(i32, usize), VbeError> {
    let mut magnitude = 0u64;
    for (index, &byte) in bytes.iter().enumerate() {
        if index == MAX_LENGTH {
            return Err(VbeError::Overflow);
        }
        let shift = 7 * index;
        if byte & CONTINUATION != 0 {
            magnitude |= u64::from(byte & !CONTINUATION) << shift;
            continue;
        }

        magnitude |= u64::from(byte & !(CONTINUATION | SIGN)) << shift;
        let value = if byte & SIGN != 0 {
            -i64::try_from(magnitude).map_err(|_| VbeError::Overflow)?
        } else {
            i64::try_from(magnitude).map_err(|_| VbeError::Overflow)?
        };
        let value = i32::try_from(value).map_err(|_| VbeError::Overflow)?;
        return Ok((value, index + 1));
    }
    Err(VbeError::Truncated(bytes.len()))
}

pub fn encode_unsigned(mut value: u32, out: &mut Vec<u8>) {
    while value >= u32::from(CONTINUATION) {
        out.push((value as u8 & !CONTINUATION) | CONTINUATION);
        value >>= 7;
    }
    out.push(value as u8);
}

pub fn encode_signed(value: i32, out: &mut Vec<u8>) {
    let mut magnitude = value.unsigned_abs();
    while magnitude >= u32::from(SIGN) {
        out.push((magnitude as u8 & !CONTINUATION) | CONTINUATION);
        magnitude >>= 7;
    }
    let sign = if value < 0 { SIGN } else { 0 };
    out.push(magnitude as u8 | sign);
}
