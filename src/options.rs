//! Options data model (Spec 5.4, Table 5-1).
//!
//! Two groups of options exist. [`GrammarOptions`] change the shape of the
//! grammars and are fixed when the [`GrammarCache`](crate::grammar::GrammarCache)
//! is built. [`StreamOptions`] are per-session layout parameters (alignment,
//! block size, value table bounds) that every encoder and decoder carries.
//!
//! # Beispiel
//!
//! ```
//! use exi_grammar::options::{Alignment, GrammarOptions, Preserve, StreamOptions};
//!
//! let grammar = GrammarOptions::default()
//!     .with_preserve(Preserve { comments: true, ..Preserve::default() });
//! let stream = StreamOptions::default()
//!     .with_alignment(Alignment::ByteAlignment)
//!     .with_value_max_length(64);
//!
//! assert!(grammar.validate().is_ok());
//! assert!(stream.validate(&grammar).is_ok());
//! assert_eq!(stream.value_max_length(), Some(64));
//! ```

use crate::{Error, Result};

/// Default block size for channelled alignments (Spec 5.4).
pub const DEFAULT_BLOCK_SIZE: u32 = 1_000_000;

/// Alignment of event codes and content items (Spec 5.4, 9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Alignment {
    /// Event codes and content are packed in bits without padding.
    #[default]
    BitPacked,
    /// Event codes and content are aligned on byte boundaries.
    ByteAlignment,
    /// Channels and blocks without DEFLATE (Spec 9).
    PreCompression,
    /// Channels and blocks, each stream DEFLATE-compressed (Spec 9.3).
    Compression,
}

impl Alignment {
    /// Alle vier Modi in Header-Reihenfolge.
    pub const ALL: [Alignment; 4] = [
        Alignment::BitPacked,
        Alignment::ByteAlignment,
        Alignment::PreCompression,
        Alignment::Compression,
    ];

    /// True wenn Event Codes und n-bit Werte byteweise geschrieben werden.
    pub fn is_byte_oriented(self) -> bool {
        !matches!(self, Alignment::BitPacked)
    }

    /// True für die beiden Modi mit Structure- und Value-Channels (Spec 9.2).
    pub fn uses_channels(self) -> bool {
        matches!(self, Alignment::PreCompression | Alignment::Compression)
    }

    pub(crate) fn to_bits(self) -> u64 {
        match self {
            Alignment::BitPacked => 0,
            Alignment::ByteAlignment => 1,
            Alignment::PreCompression => 2,
            Alignment::Compression => 3,
        }
    }

    pub(crate) fn from_bits(bits: u64) -> Self {
        match bits & 0b11 {
            0 => Alignment::BitPacked,
            1 => Alignment::ByteAlignment,
            2 => Alignment::PreCompression,
            _ => Alignment::Compression,
        }
    }
}

/// Fidelity options controlling preservation of information items (Spec 5.4, 6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Preserve {
    /// CM events can be preserved.
    pub comments: bool,
    /// PI events can be preserved.
    pub pis: bool,
    /// DT and ER events can be preserved.
    pub dtd: bool,
    /// NS events and namespace prefixes can be preserved.
    pub prefixes: bool,
    /// Lexical form of element and attribute values can be preserved.
    pub lexical_values: bool,
}

/// Options that determine grammar shape (Spec 5.4, 8.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct GrammarOptions {
    strict: bool,
    preserve: Preserve,
    self_contained: bool,
}

impl GrammarOptions {
    pub fn strict(&self) -> bool {
        self.strict
    }

    pub fn preserve(&self) -> &Preserve {
        &self.preserve
    }

    pub fn self_contained(&self) -> bool {
        self.self_contained
    }

    pub fn with_strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn with_preserve(mut self, preserve: Preserve) -> Self {
        self.preserve = preserve;
        self
    }

    pub fn with_self_contained(mut self) -> Self {
        self.self_contained = true;
        self
    }

    /// Prüft die Kombination der Grammar-Optionen (Spec 5.4).
    ///
    /// "strict" MUST NOT appear together with dtd, prefixes, comments, pis
    /// or selfContained.
    pub fn validate(&self) -> Result<()> {
        if !self.strict {
            return Ok(());
        }
        let conflicts = [
            (self.preserve.comments, "comments"),
            (self.preserve.pis, "pis"),
            (self.preserve.dtd, "dtd"),
            (self.preserve.prefixes, "prefixes"),
            (self.self_contained, "selfContained"),
        ];
        match conflicts.iter().find(|(set, _)| *set) {
            Some((_, name)) => Err(Error::invalid_options(format!("strict with {name}"))),
            None => Ok(()),
        }
    }
}

/// Per-session stream layout (Spec 5.4, 7.3.3, 9.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    alignment: Alignment,
    block_size: u32,
    value_max_length: Option<u32>,
    value_partition_capacity: Option<u32>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            alignment: Alignment::BitPacked,
            block_size: DEFAULT_BLOCK_SIZE,
            value_max_length: None,
            value_partition_capacity: None,
        }
    }
}

impl StreamOptions {
    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn value_max_length(&self) -> Option<u32> {
        self.value_max_length
    }

    pub fn value_partition_capacity(&self) -> Option<u32> {
        self.value_partition_capacity
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_block_size(mut self, size: u32) -> Self {
        self.block_size = size;
        self
    }

    pub fn with_value_max_length(mut self, len: u32) -> Self {
        self.value_max_length = Some(len);
        self
    }

    pub fn with_value_partition_capacity(mut self, cap: u32) -> Self {
        self.value_partition_capacity = Some(cap);
        self
    }

    /// Prüft die Session-Optionen gegen die Grammar-Optionen (Spec 5.4, 9.1).
    ///
    /// "selfContained" MUST NOT appear together with compression or
    /// pre-compression.
    pub fn validate(&self, grammar: &GrammarOptions) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::InvalidBlockSize);
        }
        if grammar.self_contained() && self.alignment.uses_channels() {
            return Err(Error::invalid_options(format!(
                "selfContained with {:?}",
                self.alignment
            )));
        }
        Ok(())
    }
}
