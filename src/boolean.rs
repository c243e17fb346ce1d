//! Boolean encoding (Spec 7.1.2).
//!
//! Ein Boolean ist ein 1-bit unsigned integer (0 = false, 1 = true). In den
//! byte-orientierten Alignments belegt er ein ganzes Byte.

use crate::bitstream::{BitReader, BitWriter};
use crate::{Result, n_bit_unsigned_integer};

/// Encodes a boolean as a 1-bit unsigned integer (Spec 7.1.2).
pub fn encode(writer: &mut BitWriter, value: bool, aligned: bool) {
    n_bit_unsigned_integer::encode(writer, u64::from(value), 1, aligned);
}

/// Decodes a boolean from a 1-bit unsigned integer (Spec 7.1.2).
pub fn decode(reader: &mut BitReader, aligned: bool) -> Result<bool> {
    Ok(n_bit_unsigned_integer::decode(reader, 1, aligned)? == 1)
}

/// Lexikalischer Raum von xsd:boolean: `true`, `false`, `1`, `0`.
///
/// Umgebender Whitespace wird ignoriert (whiteSpace collapse).
pub fn parse(lexical: &str) -> Option<bool> {
    match lexical.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
