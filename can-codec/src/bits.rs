//! Bit extraction and insertion
//!
//! Pure routines that read and write a signal's bit span inside a frame
//! payload. Both DBC layouts are supported:
//!
//! - Intel (little-endian): `start_bit` is the signal LSB. Bits are numbered
//!   LSB-first within a byte, and the signal grows towards higher byte addresses.
//! - Motorola (big-endian): `start_bit` is the signal MSB. Bits are consumed
//!   from bit `start_bit % 8` downwards; after bit 0 of a byte the walk continues
//!   at bit 7 of the next byte.
//!
//! Every access is bounds-checked up front, so a short buffer is an error and
//! never a partial read or write.

use crate::signals::ByteOrder;

/// Longest signal the codec supports, in bits
pub const MAX_SIGNAL_BITS: u16 = 64;

/// Bit-level precondition failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BitError {
    #[error("signal length {0} is outside 1..=64")]
    InvalidLength(u16),

    #[error("bit span needs {required} bytes but buffer has {available}")]
    OutOfRange { required: usize, available: usize },
}

/// Mask covering the low `length` bits
pub fn mask(length: u16) -> u64 {
    if length >= 64 {
        u64::MAX
    } else {
        (1u64 << length) - 1
    }
}

/// Number of payload bytes a signal span touches
pub fn required_bytes(start_bit: u16, length: u16, byte_order: ByteOrder) -> usize {
    let start = start_bit as usize;
    let length = length as usize;
    match byte_order {
        ByteOrder::LittleEndian => (start + length + 7) / 8,
        ByteOrder::BigEndian => {
            let in_first_byte = start % 8 + 1;
            let first_byte = start / 8;
            if length <= in_first_byte {
                first_byte + 1
            } else {
                first_byte + 1 + (length - in_first_byte + 7) / 8
            }
        }
    }
}

fn check_span(
    available: usize,
    start_bit: u16,
    length: u16,
    byte_order: ByteOrder,
) -> Result<(), BitError> {
    if length == 0 || length > MAX_SIGNAL_BITS {
        return Err(BitError::InvalidLength(length));
    }
    let required = required_bytes(start_bit, length, byte_order);
    if required > available {
        return Err(BitError::OutOfRange {
            required,
            available,
        });
    }
    Ok(())
}

/// Next Motorola bit position after `pos`
fn next_motorola_position(pos: usize) -> usize {
    if pos % 8 == 0 {
        pos + 15
    } else {
        pos - 1
    }
}

/// Extract the unsigned bit pattern of a signal
///
/// # Example
/// ```
/// use can_codec::bits::extract;
/// use can_codec::ByteOrder;
///
/// let data = [0xAB, 0x00];
/// assert_eq!(extract(&data, 7, 8, ByteOrder::BigEndian).unwrap(), 0xAB);
/// ```
pub fn extract(
    data: &[u8],
    start_bit: u16,
    length: u16,
    byte_order: ByteOrder,
) -> Result<u64, BitError> {
    check_span(data.len(), start_bit, length, byte_order)?;

    let raw = match byte_order {
        ByteOrder::LittleEndian => extract_little_endian(data, start_bit as usize, length as usize),
        ByteOrder::BigEndian => extract_big_endian(data, start_bit as usize, length as usize),
    };
    Ok(raw)
}

fn extract_little_endian(data: &[u8], start_bit: usize, length: usize) -> u64 {
    let mut result: u64 = 0;
    let mut byte_idx = start_bit / 8;
    let mut bit_idx = start_bit % 8;
    let mut bits_left = length;
    let mut shift = 0;

    while bits_left > 0 {
        let take = bits_left.min(8 - bit_idx);
        let chunk = (data[byte_idx] as u64 >> bit_idx) & mask(take as u16);
        result |= chunk << shift;

        bits_left -= take;
        shift += take;
        byte_idx += 1;
        bit_idx = 0;
    }

    result
}

fn extract_big_endian(data: &[u8], start_bit: usize, length: usize) -> u64 {
    let mut result: u64 = 0;
    let mut pos = start_bit;

    for _ in 0..length {
        let bit = (data[pos / 8] >> (pos % 8)) & 0x01;
        result = (result << 1) | bit as u64;
        pos = next_motorola_position(pos);
    }

    result
}

/// Write the low `length` bits of `raw` into a signal span
///
/// Bits outside the span keep their current value.
pub fn insert(
    data: &mut [u8],
    raw: u64,
    start_bit: u16,
    length: u16,
    byte_order: ByteOrder,
) -> Result<(), BitError> {
    check_span(data.len(), start_bit, length, byte_order)?;

    let raw = raw & mask(length);
    let (start, len) = (start_bit as usize, length as usize);
    match byte_order {
        ByteOrder::LittleEndian => insert_little_endian(data, raw, start, len),
        ByteOrder::BigEndian => insert_big_endian(data, raw, start, len),
    }
    Ok(())
}

fn insert_little_endian(data: &mut [u8], raw: u64, start_bit: usize, length: usize) {
    let mut byte_idx = start_bit / 8;
    let mut bit_idx = start_bit % 8;
    let mut bits_left = length;
    let mut shift = 0;

    while bits_left > 0 {
        let take = bits_left.min(8 - bit_idx);
        let byte_mask = (mask(take as u16) << bit_idx) as u8;
        let chunk = (((raw >> shift) & mask(take as u16)) << bit_idx) as u8;
        data[byte_idx] = (data[byte_idx] & !byte_mask) | chunk;

        bits_left -= take;
        shift += take;
        byte_idx += 1;
        bit_idx = 0;
    }
}

fn insert_big_endian(data: &mut [u8], raw: u64, start_bit: usize, length: usize) {
    let mut pos = start_bit;

    for i in 0..length {
        let bit = (raw >> (length - 1 - i)) & 0x01;
        let bit_mask = 1u8 << (pos % 8);
        if bit == 1 {
            data[pos / 8] |= bit_mask;
        } else {
            data[pos / 8] &= !bit_mask;
        }
        pos = next_motorola_position(pos);
    }
}

/// Sign-extend a `length`-bit two's complement value to 64 bits
pub fn sign_extend(raw: u64, length: u16) -> i64 {
    if length == 0 || length >= 64 {
        return raw as i64;
    }
    let shift = 64 - length as u32;
    ((raw << shift) as i64) >> shift
}
