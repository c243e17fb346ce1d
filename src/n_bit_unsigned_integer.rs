//! n-bit unsigned integers (Spec 7.1.9) and the shared bit-width rule.
//!
//! Bit-packed streams write exactly `n` bits. The byte-oriented alignments
//! write the minimum number of bytes able to hold `n` bits, least
//! significant byte first. When `n` is 0 the value is omitted entirely.

use crate::Result;
use crate::bitstream::{BitReader, BitWriter};

/// Anzahl Bits für `n` unterschiedliche Werte: `⌈log₂(n)⌉` (Spec 6.2, 7.3).
///
/// `n = 0` und `n = 1` benötigen kein Bit.
#[inline]
pub fn bits_for(n: usize) -> u8 {
    if n <= 1 {
        0
    } else {
        (usize::BITS - (n - 1).leading_zeros()) as u8
    }
}

/// Writes `value` using exactly `n` bits, or `⌈n/8⌉` bytes when `aligned`.
#[inline]
pub fn encode(writer: &mut BitWriter, value: u64, n: u8, aligned: bool) {
    debug_assert!(n == 64 || value < (1u64 << n), "value {value} does not fit in {n} bits");
    if aligned {
        for i in 0..n.div_ceil(8) {
            writer.write_byte_aligned((value >> (u32::from(i) * 8)) as u8);
        }
    } else {
        writer.write_bits(value, n);
    }
}

/// Reads an `n`-bit value written by [`encode`] with the same `aligned` flag.
#[inline]
pub fn decode(reader: &mut BitReader, n: u8, aligned: bool) -> Result<u64> {
    if aligned {
        let mut value = 0u64;
        for i in 0..n.div_ceil(8) {
            value |= u64::from(reader.read_byte_aligned()?) << (u32::from(i) * 8);
        }
        Ok(value)
    } else {
        reader.read_bits(n)
    }
}
