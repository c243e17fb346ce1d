//! EXI Stream Decoder (Spec 6, 8.4, 8.5).
//!
//! Zwei Phasen als Typestate: [`Decoder`] liest den Header und wird zum
//! [`Scanner`], der die Events des Bodys liefert. Pro Event wird der Code
//! mit der Tier-Breite der aktuellen Liste gelesen, dann der Inhalt, dann
//! schaltet die Session genauso weiter wie im Encoder.
//!
//! # Beispiel
//!
//! ```
//! use std::sync::Arc;
//! use exi_grammar::decoder::{DecoderConfig, decode};
//! use exi_grammar::encoder::{EncoderConfig, encode};
//! use exi_grammar::event::ExiEvent;
//! use exi_grammar::grammar::GrammarCache;
//! use exi_grammar::options::GrammarOptions;
//!
//! let cache = Arc::new(GrammarCache::schemaless(GrammarOptions::default()).unwrap());
//! let events = vec![
//!     ExiEvent::StartDocument,
//!     ExiEvent::start("", "root"),
//!     ExiEvent::characters("hi"),
//!     ExiEvent::EndElement,
//!     ExiEvent::EndDocument,
//! ];
//! let bytes = encode(Arc::clone(&cache), EncoderConfig::default(), &events).unwrap();
//! let decoded = decode(cache, DecoderConfig::default(), &bytes).unwrap();
//! assert_eq!(decoded, events);
//! ```

mod api;
mod compression;
mod context;
mod qname;


use std::collections::VecDeque;
use std::iter::FusedIterator;
use std::sync::Arc;

pub use api::{DecoderConfig, decode};

use crate::bitstream::BitReader;
use crate::error::{Error, Result};
use crate::event::ExiEvent;
use crate::grammar::GrammarCache;
use crate::header::{self, ExiHeader};
use crate::options::{Alignment, StreamOptions};
use crate::session::Session;

use compression::Inflater;
use context::Context;

/// Decoder vor dem Header.
#[derive(Debug)]
pub struct Decoder<'a> {
    cache: Arc<GrammarCache>,
    config: DecoderConfig,
    input: &'a [u8],
}

impl<'a> Decoder<'a> {
    /// # Errors
    ///
    /// Ungültige Kombination aus `config` und den Grammar-Optionen des Caches.
    pub fn new(cache: Arc<GrammarCache>, config: DecoderConfig, input: &'a [u8]) -> Result<Self> {
        config.validate(cache.options())?;
        Ok(Self { cache, config, input })
    }

    /// Liest den Header (Spec 5) und liefert den Scanner für den Body.
    ///
    /// Options im Header ersetzen die Stream-Optionen der Konfiguration;
    /// ihre Grammar-Flags müssen zu den Optionen des Caches passen.
    ///
    /// # Errors
    ///
    /// - Header-Fehler ([`Error::InvalidDistinguishingBits`], [`Error::UnsupportedVersion`], ...)
    /// - [`Error::OptionsMismatch`] bei abweichenden Grammar-Flags
    pub fn process_header(self) -> Result<Scanner<'a>> {
        let mut reader = BitReader::new(self.input);
        let header = header::decode(&mut reader, self.config.stream.alignment())?;
        let stream = self.effective_stream(&header)?;
        Ok(Scanner::new(self.cache, stream, self.input, reader))
    }

    fn effective_stream(&self, header: &ExiHeader) -> Result<StreamOptions> {
        let Some(options) = header.options() else {
            return Ok(self.config.stream);
        };
        if options.grammar != *self.cache.options() {
            log::debug!("header grammar options {:?} vs cache {:?}", options.grammar, self.cache.options());
            return Err(Error::OptionsMismatch);
        }
        options.stream.validate(&options.grammar)?;
        Ok(options.stream)
    }
}

/// Body-Modus des Scanners.
#[derive(Debug)]
enum Mode {
    /// BitPacked und ByteAlignment: ein Event pro Aufruf, mit Prefixen
    /// ein SE samt seinen NS.
    Direct,
    PreCompression,
    Compression(Inflater),
}

/// Liefert die Events des Bodys.
///
/// Nach ED oder nach einem Fehler liefert der Scanner nur noch `None`.
#[derive(Debug)]
pub struct Scanner<'a> {
    ctx: Context,
    input: &'a [u8],
    reader: BitReader<'a>,
    mode: Mode,
    block_size: usize,
    queue: VecDeque<ExiEvent>,
    failed: bool,
}

impl<'a> Scanner<'a> {
    fn new(cache: Arc<GrammarCache>, stream: StreamOptions, input: &'a [u8], reader: BitReader<'a>) -> Self {
        let mode = match stream.alignment() {
            Alignment::BitPacked | Alignment::ByteAlignment => Mode::Direct,
            Alignment::PreCompression => Mode::PreCompression,
            Alignment::Compression => Mode::Compression(Inflater::new(reader.byte_position())),
        };
        let defer = !matches!(mode, Mode::Direct);
        log::debug!("scanner: {:?}, block size {}", stream.alignment(), stream.block_size());
        Self {
            ctx: Context::new(Session::new(cache, stream), defer),
            input,
            reader,
            mode,
            block_size: stream.block_size() as usize,
            queue: VecDeque::new(),
            failed: false,
        }
    }

    /// Nächstes Event, `None` nach ED.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidEventCode`] für Codes ohne Event Type
    /// - [`Error::PrematureEndOfStream`] bei abgeschnittenem Input
    /// - [`Error::InvalidCompactId`], [`Error::InvalidCodePoint`], [`Error::InvalidValue`]
    pub fn next_event(&mut self) -> Result<Option<ExiEvent>> {
        // ein weggelassenes CH kann einen Aufruf ohne Event beenden
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Ok(Some(event));
            }
            if self.failed || self.ctx.session.is_finished() {
                return Ok(None);
            }
            if let Err(e) = self.advance() {
                self.failed = true;
                return Err(e);
            }
        }
    }

    fn advance(&mut self) -> Result<()> {
        match &mut self.mode {
            Mode::Direct => {
                let events = self.ctx.decode_direct(&mut self.reader)?;
                self.queue.extend(events);
            }
            Mode::PreCompression => {
                let events = self.ctx.read_block(&mut self.reader, self.block_size)?;
                self.queue.extend(events);
            }
            Mode::Compression(inflater) => {
                let events = self.ctx.inflate_block(self.input, inflater, self.block_size)?;
                self.queue.extend(events);
            }
        }
        Ok(())
    }
}

impl Iterator for Scanner<'_> {
    type Item = Result<ExiEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}

impl FusedIterator for Scanner<'_> {}
