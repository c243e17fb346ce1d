//! Typed Value Encoding/Decoding (Spec 7, Table 7-1).
//!
//! Schema-informed Werte werden nicht als Strings, sondern mit der
//! Repräsentation ihres [`Datatype`] kodiert. Strings laufen über die
//! String Table und sind nicht Teil dieses Moduls.
//!
//! Ein lexikalischer Wert, der nicht in den Wertebereich passt, liefert
//! bei [`parse`] `None`; der Aufrufer weicht dann auf die untyped
//! Production aus (Spec 8.5.4.4.1).
//!
//! Der Decoder liefert immer die kanonische Form (Spec 7.1, XSD 1.0 Part 2):
//! Zahlen ohne führende Nullen und ohne `+`, Base64 mit Padding, Hex in
//! Großbuchstaben.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::bitstream::{BitReader, BitWriter};
use crate::schema::Datatype;
use crate::{Error, Result, binary, boolean, integer, unsigned_integer};

/// Ein geparster Wert eines nicht-String Datatypes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    Boolean(bool),
    Integer(i64),
    Unsigned(u64),
    Binary(Vec<u8>),
}

/// Parst `lexical` im lexikalischen Raum von `datatype`.
///
/// Gibt `None` zurück wenn der Wert nicht passt oder `datatype` String ist.
/// Whitespace am Rand wird ignoriert (whiteSpace collapse).
pub fn parse(datatype: Datatype, lexical: &str) -> Option<TypedValue> {
    let s = lexical.trim();
    match datatype {
        Datatype::String => None,
        Datatype::Boolean => boolean::parse(s).map(TypedValue::Boolean),
        Datatype::Integer => parse_integer(s).map(TypedValue::Integer),
        Datatype::UnsignedInteger => parse_unsigned(s).map(TypedValue::Unsigned),
        Datatype::Base64Binary => parse_base64(s).map(TypedValue::Binary),
        Datatype::HexBinary => parse_hex(s).map(TypedValue::Binary),
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

// i64 passt in Integer (Spec 7.1.5); größere Werte gehen untyped
fn parse_integer(s: &str) -> Option<i64> {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    if !is_digits(digits) {
        return None;
    }
    s.parse().ok()
}

fn parse_unsigned(s: &str) -> Option<u64> {
    let digits = s.strip_prefix('+').unwrap_or(s);
    if !is_digits(digits) {
        // "-0" ist lexikalisch gültig für nonNegativeInteger
        return match s.strip_prefix('-') {
            Some(rest) if is_digits(rest) && rest.bytes().all(|b| b == b'0') => Some(0),
            _ => None,
        };
    }
    digits.parse().ok()
}

fn parse_base64(s: &str) -> Option<Vec<u8>> {
    // Base64 erlaubt Whitespace zwischen den Gruppen
    let compact: String = s.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact.as_bytes()).ok()
}

fn parse_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    s.as_bytes()
        .chunks(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16)?;
            let lo = (pair[1] as char).to_digit(16)?;
            Some((hi * 16 + lo) as u8)
        })
        .collect()
}

/// Schreibt einen geparsten Wert (Spec 7.1.1, 7.1.2, 7.1.5, 7.1.6).
pub fn encode(writer: &mut BitWriter, value: &TypedValue, aligned: bool) {
    match value {
        TypedValue::Boolean(b) => boolean::encode(writer, *b, aligned),
        TypedValue::Integer(i) => integer::encode(writer, *i, aligned),
        TypedValue::Unsigned(u) => unsigned_integer::encode(writer, *u),
        TypedValue::Binary(bytes) => binary::encode(writer, bytes),
    }
}

/// Liest einen Wert von `datatype` und liefert seine kanonische Form.
///
/// # Errors
///
/// - [`Error::InvalidValue`] für den String-Datatype (gehört in die String Table)
/// - [`Error::IntegerOverflow`] bei Integer-Werten außerhalb von i64
/// - [`Error::PrematureEndOfStream`] bei unerwartetem Stream-Ende
pub fn decode(reader: &mut BitReader, datatype: Datatype, aligned: bool) -> Result<Arc<str>> {
    let text = match datatype {
        Datatype::String => {
            return Err(Error::InvalidValue("string values use the string table".into()));
        }
        Datatype::Boolean => boolean::decode(reader, aligned)?.to_string(),
        Datatype::Integer => integer::decode(reader, aligned)?.to_string(),
        Datatype::UnsignedInteger => unsigned_integer::decode(reader)?.to_string(),
        Datatype::Base64Binary => STANDARD.encode(binary::decode(reader)?),
        Datatype::HexBinary => to_hex(&binary::decode(reader)?),
    };
    Ok(text.into())
}

fn to_hex(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(DIGITS[usize::from(b >> 4)] as char);
        out.push(DIGITS[usize::from(b & 0x0F)] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(datatype: Datatype, lexical: &str, aligned: bool) -> Arc<str> {
        let value = parse(datatype, lexical).expect("parsebar");
        let mut w = BitWriter::new();
        encode(&mut w, &value, aligned);
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        decode(&mut r, datatype, aligned).unwrap()
    }

    #[test]
    fn boolean_kanonisch() {
        assert_eq!(&*round_trip(Datatype::Boolean, "1", false), "true");
        assert_eq!(&*round_trip(Datatype::Boolean, " false ", true), "false");
    }

    // Spec 7.1.5: Vorzeichen + Betrag, führende Nullen fallen weg
    #[test]
    fn integer_kanonisch() {
        assert_eq!(&*round_trip(Datatype::Integer, "+007", false), "7");
        assert_eq!(&*round_trip(Datatype::Integer, "-42", true), "-42");
        assert_eq!(&*round_trip(Datatype::Integer, "-9223372036854775808", false), "-9223372036854775808");
    }

    #[test]
    fn integer_ausserhalb_i64_ist_untyped() {
        assert_eq!(parse(Datatype::Integer, "99999999999999999999"), None);
        assert_eq!(parse(Datatype::Integer, "1.5"), None);
        assert_eq!(parse(Datatype::Integer, "+"), None);
    }

    #[test]
    fn unsigned_grenzen() {
        assert_eq!(&*round_trip(Datatype::UnsignedInteger, "18446744073709551615", false), "18446744073709551615");
        assert_eq!(parse(Datatype::UnsignedInteger, "-0"), Some(TypedValue::Unsigned(0)));
        assert_eq!(parse(Datatype::UnsignedInteger, "-1"), None);
    }

    #[test]
    fn base64_mit_whitespace() {
        assert_eq!(&*round_trip(Datatype::Base64Binary, "SGVs\n bG8=", false), "SGVsbG8=");
        assert_eq!(parse(Datatype::Base64Binary, "@@@"), None);
    }

    #[test]
    fn hex_gross_geschrieben() {
        assert_eq!(&*round_trip(Datatype::HexBinary, "0fa1", true), "0FA1");
        assert_eq!(parse(Datatype::HexBinary, "abc"), None);
        assert_eq!(parse(Datatype::HexBinary, "zz"), None);
        assert_eq!(&*round_trip(Datatype::HexBinary, "", false), "");
    }

    #[test]
    fn string_nicht_typisiert() {
        assert_eq!(parse(Datatype::String, "x"), None);
        let mut r = BitReader::new(&[0]);
        assert!(matches!(decode(&mut r, Datatype::String, false), Err(Error::InvalidValue(_))));
    }
}
