//! Signed integer encoding (Spec 7.1.5).
//!
//! A sign (boolean, Spec 7.1.2) followed by the magnitude as an unsigned
//! integer. For negative values the magnitude is `(-value - 1)`.

use crate::bitstream::{BitReader, BitWriter};
use crate::{Error, Result, n_bit_unsigned_integer, unsigned_integer};

/// Encodes a signed integer (Spec 7.1.5).
pub fn encode(writer: &mut BitWriter, value: i64, aligned: bool) {
    if value >= 0 {
        n_bit_unsigned_integer::encode(writer, 0, 1, aligned);
        unsigned_integer::encode(writer, value as u64);
    } else {
        n_bit_unsigned_integer::encode(writer, 1, 1, aligned);
        // (-value - 1) über unsigned Arithmetik, kein Überlauf bei i64::MIN
        unsigned_integer::encode(writer, !(value as u64));
    }
}

/// Decodes a signed integer (Spec 7.1.5).
pub fn decode(reader: &mut BitReader, aligned: bool) -> Result<i64> {
    let negative = n_bit_unsigned_integer::decode(reader, 1, aligned)? == 1;
    let magnitude = unsigned_integer::decode(reader)?;
    if magnitude > i64::MAX as u64 {
        return Err(Error::IntegerOverflow);
    }
    if negative {
        Ok(-(magnitude as i64) - 1)
    } else {
        Ok(magnitude as i64)
    }
}
