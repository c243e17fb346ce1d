//! String encoding (Spec 7.1.10).
//!
//! A string is a length followed by its Unicode code points, each an
//! Unsigned Integer (Spec 7.1.6). String-table encodings (Spec 7.3) shift
//! the length by a small offset to make room for hit markers, so the length
//! prefix and the code points are exposed separately.

use crate::bitstream::{BitReader, BitWriter};
use crate::{Error, Result, unsigned_integer};

/// Encodes a length-prefixed string (Spec 7.1.10).
pub fn encode(writer: &mut BitWriter, value: &str) {
    encode_with_offset(writer, value, 0);
}

/// Encodes `value` with its character count shifted by `offset` (Spec 7.3.3).
pub fn encode_with_offset(writer: &mut BitWriter, value: &str, offset: u64) {
    if value.is_ascii() {
        // ASCII: Code Point == Byte, ein Byte pro Unsigned Integer
        unsigned_integer::encode(writer, value.len() as u64 + offset);
        writer.write_bytes_aligned(value.as_bytes());
    } else {
        unsigned_integer::encode(writer, value.chars().count() as u64 + offset);
        encode_chars(writer, value);
    }
}

/// Writes the code points of `value` without a length prefix.
pub fn encode_chars(writer: &mut BitWriter, value: &str) {
    for ch in value.chars() {
        unsigned_integer::encode(writer, u64::from(ch as u32));
    }
}

/// Decodes a length-prefixed string (Spec 7.1.10).
pub fn decode(reader: &mut BitReader) -> Result<String> {
    let len = unsigned_integer::decode(reader)?;
    decode_chars(reader, len)
}

/// Reads `len` code points.
///
/// Returns [`Error::InvalidCodePoint`] for surrogates and values beyond U+10FFFF.
pub fn decode_chars(reader: &mut BitReader, len: u64) -> Result<String> {
    // Länge nicht blind vertrauen: jeder Code Point braucht mindestens 8 Bits
    if len > (reader.remaining_bits() / 8) as u64 {
        return Err(Error::PrematureEndOfStream);
    }
    let mut s = String::with_capacity(len as usize);
    for _ in 0..len {
        let cp = unsigned_integer::decode(reader)?;
        let ch = u32::try_from(cp)
            .ok()
            .and_then(char::from_u32)
            .ok_or(Error::InvalidCodePoint(cp))?;
        s.push(ch);
    }
    Ok(s)
}
