//! Central error types for the EXI codec.
//!
//! Each variant references the relevant W3C EXI 1.0 spec section.

use core::fmt;
use std::borrow::Cow;

/// Grund einer Strict-Verletzung (Spec 8.5.4.4).
///
/// Im Strict-Modus fehlen alle undeclared Productions. Ein Event ohne
/// passende Production wird mit dem Production-Typ gemeldet, der gefehlt hat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationReason {
    /// Kein SE-Production für das Element.
    UnexpectedElement,
    /// Kein AT-Production für das Attribut (inkl. xsi:nil ohne Nillable).
    UnexpectedAttribute,
    /// Keine CH-Production an dieser Stelle.
    UnexpectedCharacters,
    /// EE ist in diesem Zustand nicht erlaubt.
    UnexpectedEndElement,
    /// xsi:type ohne TYPE-Production oder mit unbekanntem Typ.
    UnexpectedTypeCast,
    /// Sonstiges Event (NS, SC, CM, PI, DT, ER) ohne Production.
    UnexpectedEvent,
}

impl ViolationReason {
    /// Kurzbezeichnung für Fehlermeldungen.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnexpectedElement => "unexpected element",
            Self::UnexpectedAttribute => "unexpected attribute",
            Self::UnexpectedCharacters => "unexpected characters",
            Self::UnexpectedEndElement => "unexpected end element",
            Self::UnexpectedTypeCast => "unexpected xsi:type",
            Self::UnexpectedEvent => "unexpected event",
        }
    }
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All error types raised by the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// EXI version number is not supported (Spec 5.3).
    UnsupportedVersion,
    /// EXI header is malformed (Spec 5).
    MalformedHeader,
    /// The EXI distinguishing bits are not `10` (Spec 5.2).
    InvalidDistinguishingBits(u8),
    /// An event code does not match any production in the current grammar (Spec 6.1, 6.2).
    InvalidEventCode {
        /// Der Event Code der nicht passte.
        event_code: Cow<'static, str>,
        /// Der Grammar-Zustand in dem der Fehler auftrat.
        grammar_state: Cow<'static, str>,
    },
    /// The EXI stream ended before a complete structure was decoded (Spec 6).
    PrematureEndOfStream,
    /// An invalid combination of options was specified (Spec 5.4).
    InvalidOptionCombination(Cow<'static, str>),
    /// Header options disagree with the grammar cache the decoder was built with (Spec 5.4).
    OptionsMismatch,
    /// Block size must be greater than zero (Spec 9.1).
    InvalidBlockSize,
    /// A strict grammar has no production for the event (Spec 8.5.4.4).
    StrictViolation {
        /// Welche Production gefehlt hat.
        reason: ViolationReason,
        /// Das betroffene Event (QName o.ä.).
        detail: Cow<'static, str>,
    },
    /// The event sequence does not form a well-nested document (Spec 8).
    OrderingViolation {
        /// Was erwartet wurde.
        expected: Cow<'static, str>,
        /// Was gefunden wurde.
        found: Cow<'static, str>,
    },
    /// The schema corpus is inconsistent (Spec 8.5).
    SchemaViolation(Cow<'static, str>),
    /// An integer value exceeds the representable range (Spec 7.1.5, 7.1.6).
    IntegerOverflow,
    /// A Unicode code point is invalid: surrogate or > U+10FFFF (Spec 7.1.10).
    InvalidCodePoint(u64),
    /// A compact identifier is out of range for its partition (Spec 7.3).
    InvalidCompactId(u64),
    /// A typed value could not be parsed or is invalid (Spec 7.1).
    InvalidValue(Cow<'static, str>),
    /// DEFLATE compression failed (Spec 9.3).
    CompressionError(String),
    /// DEFLATE decompression failed (Spec 9.3).
    DecompressionError(String),
    /// XSD parsing failed.
    XsdParseError(String),
    /// XML parsing failed.
    XmlParseError(String),
    /// Writing the EXI stream failed.
    IoError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion => write!(f, "unsupported EXI version (Spec 5.3)"),
            Self::MalformedHeader => write!(f, "malformed EXI header (Spec 5)"),
            Self::InvalidDistinguishingBits(bits) => {
                write!(f, "invalid distinguishing bits {bits:02b}, expected 10 (Spec 5.2)")
            }
            Self::InvalidEventCode { event_code, grammar_state } => {
                write!(f, "invalid event code")?;
                if !event_code.is_empty() {
                    write!(f, " {event_code}")?;
                }
                if !grammar_state.is_empty() {
                    write!(f, " in {grammar_state}")?;
                }
                write!(f, " (Spec 6.2)")
            }
            Self::PrematureEndOfStream => write!(f, "premature end of EXI stream (Spec 6)"),
            Self::InvalidOptionCombination(msg) => {
                write!(f, "invalid option combination: {msg} (Spec 5.4)")
            }
            Self::OptionsMismatch => {
                write!(f, "header options do not match the grammar cache (Spec 5.4)")
            }
            Self::InvalidBlockSize => write!(f, "block size must be greater than zero (Spec 9.1)"),
            Self::StrictViolation { reason, detail } => {
                write!(f, "strict grammar violation: {reason}")?;
                if !detail.is_empty() {
                    write!(f, " '{detail}'")?;
                }
                write!(f, " (Spec 8.5.4.4)")
            }
            Self::OrderingViolation { expected, found } => {
                write!(f, "event ordering violation: expected {expected}, found {found} (Spec 8)")
            }
            Self::SchemaViolation(msg) => write!(f, "schema violation: {msg} (Spec 8.5)"),
            Self::IntegerOverflow => write!(f, "integer overflow (Spec 7.1.5, 7.1.6)"),
            Self::InvalidCodePoint(cp) => {
                write!(f, "invalid Unicode code point U+{cp:X} (Spec 7.1.10)")
            }
            Self::InvalidCompactId(id) => write!(f, "invalid compact identifier {id} (Spec 7.3)"),
            Self::InvalidValue(msg) => write!(f, "invalid typed value (Spec 7.1): {msg}"),
            Self::CompressionError(msg) => {
                write!(f, "DEFLATE compression failed (RFC 1951, Spec 9.3): {msg}")
            }
            Self::DecompressionError(msg) => {
                write!(f, "DEFLATE decompression failed (RFC 1951, Spec 9.3): {msg}")
            }
            Self::XsdParseError(msg) => write!(f, "XSD parse error: {msg}"),
            Self::XmlParseError(msg) => write!(f, "XML parse error: {msg}"),
            Self::IoError(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}

impl Error {
    /// Erstellt einen `InvalidEventCode` Fehler mit Kontext.
    pub fn invalid_event_code(
        event_code: impl Into<Cow<'static, str>>,
        grammar_state: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidEventCode {
            event_code: event_code.into(),
            grammar_state: grammar_state.into(),
        }
    }

    /// Erstellt einen `StrictViolation` Fehler.
    pub fn strict_violation(reason: ViolationReason, detail: impl Into<Cow<'static, str>>) -> Self {
        Self::StrictViolation {
            reason,
            detail: detail.into(),
        }
    }

    /// Erstellt einen `OrderingViolation` Fehler mit Kontext.
    pub fn ordering_violation(
        expected: impl Into<Cow<'static, str>>,
        found: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::OrderingViolation {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Erstellt einen `SchemaViolation` Fehler mit Nachricht.
    pub fn schema_violation(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::SchemaViolation(msg.into())
    }

    /// Erstellt einen `InvalidOptionCombination` Fehler mit Nachricht.
    pub fn invalid_options(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidOptionCombination(msg.into())
    }

    /// Liefert den Reason-Code bei Strict-Verletzungen.
    pub fn violation_reason(&self) -> Option<ViolationReason> {
        match self {
            Self::StrictViolation { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// A convenience `Result` type alias using [`Error`].
pub type Result<T> = core::result::Result<T, Error>;
