//! Binary encoding (Spec 7.1.1).
//!
//! The Binary datatype representation is a length-prefixed sequence of octets.
//! The length is represented as an Unsigned Integer (Spec 7.1.6).

use crate::bitstream::{BitReader, BitWriter};
use crate::{Error, Result, unsigned_integer};

/// Encodes binary data as a length-prefixed sequence of octets (Spec 7.1.1).
pub fn encode(writer: &mut BitWriter, value: &[u8]) {
    unsigned_integer::encode(writer, value.len() as u64);
    writer.write_bytes_aligned(value);
}

/// Decodes binary data from a length-prefixed sequence of octets (Spec 7.1.1).
///
/// # Errors
///
/// [`Error::PrematureEndOfStream`] wenn die Länge den Rest des Streams übersteigt.
pub fn decode(reader: &mut BitReader) -> Result<Vec<u8>> {
    let len = unsigned_integer::decode_usize(reader)?;
    if len > reader.remaining_bits() / 8 {
        return Err(Error::PrematureEndOfStream);
    }
    reader.read_bytes_aligned(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: &[u8]) -> Vec<u8> {
        let mut w = BitWriter::new();
        encode(&mut w, value);
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        decode(&mut r).unwrap()
    }

    /// Spec 7.1.1: empty binary, length=0, no octets
    #[test]
    fn leeres_binary() {
        assert_eq!(round_trip(&[]), Vec::<u8>::new());
        let mut w = BitWriter::new();
        encode(&mut w, &[]);
        assert_eq!(w.into_vec(), vec![0x00]);
    }

    #[test]
    fn mehrere_octets() {
        let input = vec![0xDE, 0xAD, 0xBE, 0xEF];
        assert_eq!(round_trip(&input), input);
    }

    #[test]
    fn laenge_ueber_stream_ende() {
        let mut r = BitReader::new(&[0x05, 0x01]);
        assert_eq!(decode(&mut r), Err(Error::PrematureEndOfStream));
    }
}
