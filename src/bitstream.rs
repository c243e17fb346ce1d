//! Bit-Ein- und -Ausgabe für EXI Streams (Spec 7.1).
//!
//! Das höchstwertige Bit eines Bytes kommt zuerst. Bei ByteAlignment und
//! den Channel-Modi schreiben alle Primitive ganze Bytes, daher genügt ein
//! Writer für alle vier Alignments.

use crate::{Error, Result};

/// Sammelt Bits in einem wachsenden Byte-Buffer.
///
/// Das angefangene Byte liegt rechtsbündig in `partial`, bis es voll ist.
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    buf: Vec<u8>,
    partial: u8,
    /// Belegte Bits in `partial` (0..8).
    used: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_bit(&mut self, bit: bool) {
        self.partial = (self.partial << 1) | u8::from(bit);
        self.used += 1;
        if self.used == 8 {
            self.buf.push(self.partial);
            self.partial = 0;
            self.used = 0;
        }
    }

    /// Die unteren `n` Bits von `value`, höchstes zuerst. `n == 0` schreibt nichts.
    pub fn write_bits(&mut self, value: u64, n: u8) {
        debug_assert!(n <= 64, "bit count {n} > 64");
        let mut left = n;
        while left > 0 {
            let room = 8 - self.used;
            let take = room.min(left);
            left -= take;
            let chunk = ((value >> left) & ((1u64 << take) - 1)) as u8;
            // take == 8 nur bei leerem partial
            self.partial = if take == 8 { chunk } else { (self.partial << take) | chunk };
            self.used += take;
            if self.used == 8 {
                self.buf.push(self.partial);
                self.partial = 0;
                self.used = 0;
            }
        }
    }

    /// Füllt das angefangene Byte mit Nullen auf.
    pub fn align_to_byte(&mut self) {
        if self.used > 0 {
            self.buf.push(self.partial << (8 - self.used));
            self.partial = 0;
            self.used = 0;
        }
    }

    pub fn write_byte_aligned(&mut self, byte: u8) {
        if self.used == 0 {
            self.buf.push(byte);
        } else {
            self.write_bits(u64::from(byte), 8);
        }
    }

    pub fn write_bytes_aligned(&mut self, bytes: &[u8]) {
        if self.used == 0 {
            self.buf.extend_from_slice(bytes);
        } else {
            bytes.iter().for_each(|&b| self.write_bits(u64::from(b), 8));
        }
    }

    pub fn bit_position(&self) -> usize {
        self.buf.len() * 8 + usize::from(self.used)
    }

    pub fn is_aligned(&self) -> bool {
        self.used == 0
    }

    pub fn into_vec(mut self) -> Vec<u8> {
        self.align_to_byte();
        self.buf
    }

    /// Bisherige Bytes (mit Padding) herausgeben, der Writer ist danach leer.
    pub fn take_bytes(&mut self) -> Vec<u8> {
        self.align_to_byte();
        std::mem::take(&mut self.buf)
    }
}

/// Liest Bits aus einem Byte-Slice über einen Bit-Cursor.
///
/// Ein fehlgeschlagener Read verändert den Cursor nicht.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    /// Anzahl gelesener Bits.
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        let byte = *self.data.get(self.pos / 8).ok_or(Error::PrematureEndOfStream)?;
        let bit = (byte >> (7 - self.pos % 8)) & 1 == 1;
        self.pos += 1;
        Ok(bit)
    }

    /// `n` Bits als Zahl, höchstes zuerst. `n == 0` liefert 0.
    pub fn read_bits(&mut self, n: u8) -> Result<u64> {
        debug_assert!(n <= 64, "bit count {n} > 64");
        if usize::from(n) > self.remaining_bits() {
            return Err(Error::PrematureEndOfStream);
        }
        let mut value = 0u64;
        let mut left = n;
        while left > 0 {
            let offset = (self.pos % 8) as u8;
            let take = (8 - offset).min(left);
            let byte = self.data[self.pos / 8];
            let chunk = (byte >> (8 - offset - take)) & (0xFF >> (8 - take));
            value = (value << take) | u64::from(chunk);
            self.pos += usize::from(take);
            left -= take;
        }
        Ok(value)
    }

    /// Überspringt die Padding-Bits bis zur nächsten Byte-Grenze.
    pub fn align_to_byte(&mut self) {
        self.pos = self.pos.next_multiple_of(8);
    }

    pub fn read_byte_aligned(&mut self) -> Result<u8> {
        Ok(self.read_bits(8)? as u8)
    }

    pub fn read_bytes_aligned(&mut self, len: usize) -> Result<Vec<u8>> {
        if len * 8 > self.remaining_bits() {
            return Err(Error::PrematureEndOfStream);
        }
        if self.pos % 8 == 0 {
            let start = self.pos / 8;
            self.pos += len * 8;
            return Ok(self.data[start..start + len].to_vec());
        }
        (0..len).map(|_| self.read_byte_aligned()).collect()
    }

    pub fn bit_position(&self) -> usize {
        self.pos
    }

    /// Offset des nächsten ganzen Bytes; ein angefangenes zählt als gelesen.
    pub fn byte_position(&self) -> usize {
        self.pos.div_ceil(8)
    }

    pub fn remaining_bits(&self) -> usize {
        self.data.len() * 8 - self.pos
    }
}
