//! EXI header encoding/decoding (Spec 5, 5.1, 5.2, 5.3).
//!
//! Der Header hat folgende Struktur:
//! - [EXI Cookie] (optional): `$EXI` als 4 ASCII-Bytes (Spec 5.1)
//! - Distinguishing Bits: `10` (Spec 5.2)
//! - Presence Bit: 1 = Options vorhanden (Spec 5)
//! - Format Version: Preview-Bit + 4-Bit-Chunks (Spec 5.3)
//! - [Options] (optional): kompaktes Bitlayout, siehe [`HeaderOptions`]
//! - [Padding] bei byte-orientierten Alignments
//!
//! # Beispiel
//!
//! ```
//! use exi_grammar::bitstream::{BitReader, BitWriter};
//! use exi_grammar::header::{self, ExiHeader};
//! use exi_grammar::options::Alignment;
//!
//! let mut w = BitWriter::new();
//! header::encode(&mut w, &ExiHeader::default().with_cookie(), Alignment::BitPacked);
//! let data = w.into_vec();
//! let mut r = BitReader::new(&data);
//! let decoded = header::decode(&mut r, Alignment::BitPacked).unwrap();
//! assert!(decoded.cookie());
//! assert!(decoded.options().is_none());
//! ```

use crate::bitstream::{BitReader, BitWriter};
use crate::options::{Alignment, GrammarOptions, Preserve, StreamOptions};
use crate::{Error, Result, unsigned_integer};

/// EXI Cookie als ASCII-Bytes: "$EXI" (Spec 5.1)
const EXI_COOKIE: [u8; 4] = *b"$EXI";

/// Distinguishing Bits: `10` (Spec 5.2)
const DISTINGUISHING_BITS: u64 = 0b10;

/// Options transported in the header.
///
/// Bitlayout: alignment (2), strict, comments, pis, dtd, prefixes,
/// lexical_values, self_contained (je 1), block_size (uint),
/// value_max_length und value_partition_capacity (je Presence-Bit + uint).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderOptions {
    pub grammar: GrammarOptions,
    pub stream: StreamOptions,
}

/// EXI Header (Spec 5).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExiHeader {
    cookie: bool,
    options: Option<HeaderOptions>,
}

impl ExiHeader {
    /// EXI Cookie vorhanden (Spec 5.1).
    pub fn cookie(&self) -> bool {
        self.cookie
    }

    /// Im Header übertragene Options (Spec 5.4).
    pub fn options(&self) -> Option<&HeaderOptions> {
        self.options.as_ref()
    }

    pub fn with_cookie(mut self) -> Self {
        self.cookie = true;
        self
    }

    pub fn with_options(mut self, options: HeaderOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// Encodiert den Header. `alignment` bestimmt das abschließende Padding.
pub fn encode(writer: &mut BitWriter, header: &ExiHeader, alignment: Alignment) {
    if header.cookie {
        writer.write_bytes_aligned(&EXI_COOKIE);
    }
    writer.write_bits(DISTINGUISHING_BITS, 2);
    writer.write_bit(header.options.is_some());
    // Final (Preview-Bit 0), Version 1 = Chunk 0
    writer.write_bit(false);
    writer.write_bits(0, 4);

    if let Some(options) = &header.options {
        encode_options(writer, options);
    }
    if alignment.is_byte_oriented() {
        writer.align_to_byte();
    }
}

fn encode_options(writer: &mut BitWriter, options: &HeaderOptions) {
    let grammar = &options.grammar;
    let preserve = grammar.preserve();
    writer.write_bits(options.stream.alignment().to_bits(), 2);
    for flag in [
        grammar.strict(),
        preserve.comments,
        preserve.pis,
        preserve.dtd,
        preserve.prefixes,
        preserve.lexical_values,
        grammar.self_contained(),
    ] {
        writer.write_bit(flag);
    }
    unsigned_integer::encode(writer, u64::from(options.stream.block_size()));
    for bound in [options.stream.value_max_length(), options.stream.value_partition_capacity()] {
        writer.write_bit(bound.is_some());
        if let Some(v) = bound {
            unsigned_integer::encode(writer, u64::from(v));
        }
    }
}

/// Decodiert den Header.
///
/// `fallback` ist das Alignment, das ohne Options im Header gilt; es
/// bestimmt, ob Padding-Bits übersprungen werden.
///
/// # Errors
///
/// - [`Error::InvalidDistinguishingBits`] wenn die Bits nicht `10` sind
/// - [`Error::UnsupportedVersion`] für Preview- oder Folgeversionen
/// - [`Error::PrematureEndOfStream`] bei unerwartetem Stream-Ende
pub fn decode(reader: &mut BitReader, fallback: Alignment) -> Result<ExiHeader> {
    let cookie = try_decode_cookie(reader)?;

    let bits = reader.read_bits(2)?;
    if bits != DISTINGUISHING_BITS {
        return Err(Error::InvalidDistinguishingBits(bits as u8));
    }
    let options_present = reader.read_bit()?;

    let preview = reader.read_bit()?;
    let mut chunk = reader.read_bits(4)?;
    let mut version = chunk + 1;
    while chunk == 15 {
        chunk = reader.read_bits(4)?;
        version += chunk;
    }
    if preview || version != 1 {
        return Err(Error::UnsupportedVersion);
    }

    let options = if options_present { Some(decode_options(reader)?) } else { None };
    let alignment = options.map_or(fallback, |o| o.stream.alignment());
    if alignment.is_byte_oriented() {
        reader.align_to_byte();
    }
    Ok(ExiHeader { cookie, options })
}

fn try_decode_cookie(reader: &mut BitReader) -> Result<bool> {
    // Das erste Byte entscheidet: '$' kann nie mit den Bits `10` beginnen
    let mut probe = reader.clone();
    if probe.read_bits(8)? != u64::from(EXI_COOKIE[0]) {
        return Ok(false);
    }
    for &expected in &EXI_COOKIE {
        if reader.read_byte_aligned()? != expected {
            return Err(Error::MalformedHeader);
        }
    }
    Ok(true)
}

fn decode_options(reader: &mut BitReader) -> Result<HeaderOptions> {
    let alignment = Alignment::from_bits(reader.read_bits(2)?);
    let strict = reader.read_bit()?;
    let preserve = Preserve {
        comments: reader.read_bit()?,
        pis: reader.read_bit()?,
        dtd: reader.read_bit()?,
        prefixes: reader.read_bit()?,
        lexical_values: reader.read_bit()?,
    };
    let self_contained = reader.read_bit()?;

    let mut grammar = GrammarOptions::default().with_preserve(preserve);
    if strict {
        grammar = grammar.with_strict();
    }
    if self_contained {
        grammar = grammar.with_self_contained();
    }

    let block_size = u32::try_from(unsigned_integer::decode(reader)?)
        .map_err(|_| Error::MalformedHeader)?;
    let mut stream = StreamOptions::default()
        .with_alignment(alignment)
        .with_block_size(block_size);
    if reader.read_bit()? {
        let v = u32::try_from(unsigned_integer::decode(reader)?).map_err(|_| Error::MalformedHeader)?;
        stream = stream.with_value_max_length(v);
    }
    if reader.read_bit()? {
        let v = u32::try_from(unsigned_integer::decode(reader)?).map_err(|_| Error::MalformedHeader)?;
        stream = stream.with_value_partition_capacity(v);
    }
    grammar.validate()?;
    stream.validate(&grammar)?;
    Ok(HeaderOptions { grammar, stream })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(header: &ExiHeader, alignment: Alignment) -> ExiHeader {
        let mut w = BitWriter::new();
        encode(&mut w, header, alignment);
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        decode(&mut r, alignment).unwrap()
    }

    // Spec 5: minimaler Header = 10 0 0 0000 → 0x80
    #[test]
    fn minimaler_header_ein_byte() {
        let mut w = BitWriter::new();
        encode(&mut w, &ExiHeader::default(), Alignment::BitPacked);
        assert_eq!(w.bit_position(), 8);
        assert_eq!(w.into_vec(), vec![0x80]);
    }

    #[test]
    fn cookie_wird_erkannt() {
        let mut w = BitWriter::new();
        encode(&mut w, &ExiHeader::default().with_cookie(), Alignment::BitPacked);
        let data = w.into_vec();
        assert_eq!(&data[..4], b"$EXI");
        assert!(round_trip(&ExiHeader::default().with_cookie(), Alignment::BitPacked).cookie());
    }

    #[test]
    fn options_roundtrip() {
        let options = HeaderOptions {
            grammar: GrammarOptions::default()
                .with_preserve(Preserve { comments: true, prefixes: true, ..Preserve::default() }),
            stream: StreamOptions::default()
                .with_alignment(Alignment::Compression)
                .with_block_size(4)
                .with_value_partition_capacity(16),
        };
        let header = ExiHeader::default().with_options(options);
        let decoded = round_trip(&header, Alignment::BitPacked);
        assert_eq!(decoded.options(), Some(&options));
    }

    #[test]
    fn padding_bei_byte_alignment() {
        let mut w = BitWriter::new();
        encode(&mut w, &ExiHeader::default(), Alignment::ByteAlignment);
        assert!(w.is_aligned());
        w.write_bit(true);
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        decode(&mut r, Alignment::ByteAlignment).unwrap();
        assert_eq!(r.bit_position(), 8);
        assert!(r.read_bit().unwrap());
    }

    #[test]
    fn falsche_distinguishing_bits() {
        let mut r = BitReader::new(&[0b0100_0000]);
        assert_eq!(
            decode(&mut r, Alignment::BitPacked),
            Err(Error::InvalidDistinguishingBits(0b01))
        );
    }

    #[test]
    fn preview_version_abgelehnt() {
        // 10 0 1 0000
        let mut r = BitReader::new(&[0b1001_0000]);
        assert_eq!(decode(&mut r, Alignment::BitPacked), Err(Error::UnsupportedVersion));
    }

    #[test]
    fn kaputtes_cookie() {
        let mut r = BitReader::new(b"$EXX\x80");
        assert_eq!(decode(&mut r, Alignment::BitPacked), Err(Error::MalformedHeader));
    }
}
