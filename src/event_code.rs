//! Event Code Berechnung und Encoding (Spec 6.1, 6.2, 8.2)
//!
//! Event Codes identifizieren Events in EXI Streams und bestehen aus 1-3 Teilen.
//! Jeder Teil wird als n-bit unsigned integer encodiert, wobei n von der Anzahl
//! der möglichen Werte (Geschwister) abhängt.
//!
//! # Spec 6.2: Sibling-basierte Bitbreiten
//!
//! - Part 1: Alle Tier-1 Codes plus ggf. der Escape-Wert zu Tier 2
//! - Part 2: Alle Slots in Tier 2
//! - Part 3: Nur die Einträge einer Tier-3 Gruppe
//!
//! Im byte-orientierten Alignment wird jeder Teil in `⌈n/8⌉` Bytes geschrieben.

use std::fmt;

use crate::bitstream::{BitReader, BitWriter};
use crate::n_bit_unsigned_integer::{self, bits_for};
use crate::{Error, Result};

/// Ein Event Code mit 1-3 Teilen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventCode {
    part1: u32,
    part2: Option<u32>,
    part3: Option<u32>,
}

impl EventCode {
    pub fn one(part1: u32) -> Self {
        Self { part1, part2: None, part3: None }
    }

    pub fn two(part1: u32, part2: u32) -> Self {
        Self { part1, part2: Some(part2), part3: None }
    }

    pub fn three(part1: u32, part2: u32, part3: u32) -> Self {
        Self { part1, part2: Some(part2), part3: Some(part3) }
    }

    /// Anzahl der Teile, zugleich die Tier-Tiefe (1-3).
    pub fn length(&self) -> u8 {
        1 + u8::from(self.part2.is_some()) + u8::from(self.part3.is_some())
    }

    pub fn part1(&self) -> u32 {
        self.part1
    }

    pub fn part2(&self) -> Option<u32> {
        self.part2
    }

    pub fn part3(&self) -> Option<u32> {
        self.part3
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.part1)?;
        if let Some(p2) = self.part2 {
            write!(f, ".{p2}")?;
        }
        if let Some(p3) = self.part3 {
            write!(f, ".{p3}")?;
        }
        Ok(())
    }
}

/// Tier-Layout einer EventTypeList (Spec 6.2, 8.5.4.4).
///
/// `slots` beschreibt Tier 2: `None` ist ein einzelner Slot, `Some(n)` eine
/// Gruppe mit `n` Tier-3 Einträgen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CodeLayout {
    tier1: u32,
    slots: Vec<Option<u32>>,
}

impl CodeLayout {
    pub fn new(tier1: u32, slots: Vec<Option<u32>>) -> Self {
        Self { tier1, slots }
    }

    pub fn tier1_len(&self) -> u32 {
        self.tier1
    }

    pub fn has_tier2(&self) -> bool {
        !self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Option<u32>] {
        &self.slots
    }

    /// Part1-Breite: Tier-1 Einträge plus Escape-Wert.
    pub fn bits_for_part1(&self) -> u8 {
        bits_for(self.tier1 as usize + usize::from(self.has_tier2()))
    }

    pub fn bits_for_part2(&self) -> u8 {
        bits_for(self.slots.len())
    }

    /// Part3-Breite der Gruppe in Slot `part2` (0 für Einzel-Slots).
    pub fn bits_for_part3(&self, part2: u32) -> u8 {
        match self.slots.get(part2 as usize) {
            Some(Some(n)) => bits_for(*n as usize),
            _ => 0,
        }
    }

    fn is_group(&self, part2: u32) -> bool {
        matches!(self.slots.get(part2 as usize), Some(Some(_)))
    }
}

fn invalid(code: &EventCode, reason: String) -> Error {
    Error::invalid_event_code(code.to_string(), reason)
}

/// Prüft einen Code gegen das Layout.
fn validate(code: &EventCode, layout: &CodeLayout) -> Result<()> {
    match (code.part2, code.part3) {
        (None, None) if code.part1 < layout.tier1 => Ok(()),
        (Some(p2), p3) if code.part1 == layout.tier1 && (p2 as usize) < layout.slots.len() => {
            match (layout.slots[p2 as usize], p3) {
                (None, None) => Ok(()),
                (Some(n), Some(p3)) if p3 < n => Ok(()),
                _ => Err(invalid(code, format!("slot {p2} shape mismatch"))),
            }
        }
        _ => Err(invalid(code, format!("layout {}/{}", layout.tier1, layout.slots.len()))),
    }
}

/// Schreibt einen Event Code (Spec 6.2, Table 6-1 / 6-2).
///
/// # Errors
///
/// [`Error::InvalidEventCode`] wenn der Code nicht ins Layout passt.
pub fn encode(writer: &mut BitWriter, code: &EventCode, layout: &CodeLayout, aligned: bool) -> Result<()> {
    validate(code, layout)?;
    n_bit_unsigned_integer::encode(writer, u64::from(code.part1), layout.bits_for_part1(), aligned);
    if let Some(p2) = code.part2 {
        n_bit_unsigned_integer::encode(writer, u64::from(p2), layout.bits_for_part2(), aligned);
        if let Some(p3) = code.part3 {
            n_bit_unsigned_integer::encode(writer, u64::from(p3), layout.bits_for_part3(p2), aligned);
        }
    }
    Ok(())
}

/// Liest einen Event Code. Die Breite von Part3 hängt vom gelesenen Part2 ab.
///
/// # Errors
///
/// - [`Error::InvalidEventCode`] bei Werten außerhalb des Layouts
/// - [`Error::PrematureEndOfStream`] bei unerwartetem Stream-Ende
pub fn decode(reader: &mut BitReader, layout: &CodeLayout, aligned: bool) -> Result<EventCode> {
    let part1 = n_bit_unsigned_integer::decode(reader, layout.bits_for_part1(), aligned)? as u32;
    if part1 < layout.tier1 {
        return Ok(EventCode::one(part1));
    }
    if part1 > layout.tier1 || !layout.has_tier2() {
        return Err(invalid(&EventCode::one(part1), format!("tier1 len {}", layout.tier1)));
    }
    let part2 = n_bit_unsigned_integer::decode(reader, layout.bits_for_part2(), aligned)? as u32;
    let code = if layout.is_group(part2) {
        let part3 =
            n_bit_unsigned_integer::decode(reader, layout.bits_for_part3(part2), aligned)? as u32;
        EventCode::three(part1, part2, part3)
    } else {
        EventCode::two(part1, part2)
    };
    validate(&code, layout)?;
    Ok(code)
}
