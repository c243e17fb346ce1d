//! Variable-length 7-bit unsigned integer encoding (Spec 7.1.6).
//!
//! Each octet has a continuation bit (MSB) and 7 data bits. The least
//! significant group is written first. The last octet has continuation = 0.
//! Octets are always eight bits wide, so the encoding is identical in every
//! alignment.

use crate::bitstream::{BitReader, BitWriter};
use crate::{Error, Result};

/// Encodes a `u64` as a variable-length unsigned integer (Spec 7.1.6).
#[inline]
pub fn encode(writer: &mut BitWriter, value: u64) {
    let mut v = value;
    loop {
        let low7 = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            writer.write_byte_aligned(low7);
            return;
        }
        writer.write_byte_aligned(0x80 | low7);
    }
}

/// Decodes a variable-length unsigned integer (Spec 7.1.6).
#[inline]
pub fn decode(reader: &mut BitReader) -> Result<u64> {
    let mut result = 0u64;
    let mut shift: u32 = 0;
    loop {
        let byte = reader.read_byte_aligned()?;
        let data = u64::from(byte & 0x7F);
        // Beim 10. Byte ist nur noch Daten-Bit 0 gültig
        if shift == 63 && (data > 1 || byte & 0x80 != 0) {
            return Err(Error::IntegerOverflow);
        }
        result |= data << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

/// Decodes an unsigned integer that must fit in `usize` (lengths, ids).
pub fn decode_usize(reader: &mut BitReader) -> Result<usize> {
    usize::try_from(decode(reader)?).map_err(|_| Error::IntegerOverflow)
}
