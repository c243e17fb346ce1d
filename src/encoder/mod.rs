//! EXI Stream Encoder (Spec 6, 8.4, 8.5).
//!
//! Der Encoder sucht für jedes Event den ersten passenden Event Type der
//! aktuellen Liste: exakter QName, dann Namespace-Wildcard, dann
//! generisches SE(*)/AT(*). Danach schreibt er Code und Inhalt und schaltet
//! die [`Session`](crate::session::Session) genauso weiter wie der Decoder.
//!
//! # Beispiel
//!
//! ```
//! use std::sync::Arc;
//! use exi_grammar::encoder::{Encoder, EncoderConfig};
//! use exi_grammar::event::ExiEvent;
//! use exi_grammar::grammar::GrammarCache;
//! use exi_grammar::options::GrammarOptions;
//!
//! let cache = Arc::new(GrammarCache::schemaless(GrammarOptions::default()).unwrap());
//! let events = vec![
//!     ExiEvent::StartDocument,
//!     ExiEvent::start("", "root"),
//!     ExiEvent::EndElement,
//!     ExiEvent::EndDocument,
//! ];
//! let bytes = Encoder::new(cache, EncoderConfig::default(), Vec::new())
//!     .unwrap()
//!     .encode(events)
//!     .unwrap();
//! assert!(!bytes.is_empty());
//! ```

mod compression;
mod config;
mod qname;
mod value;

#[cfg(test)]
mod tests;

use std::io::Write;
use std::sync::Arc;

pub use config::EncoderConfig;

use crate::bitstream::BitWriter;
use crate::error::{Error, Result, ViolationReason};
use crate::event::ExiEvent;
use crate::event_code;
use crate::event_type::{EventType, ItemType};
use crate::grammar::GrammarCache;
use crate::header::{self, ExiHeader, HeaderOptions};
use crate::qname::QName;
use crate::session::Session;

use compression::Block;
use qname::Scope;

/// Encoder für ein einzelnes Dokument.
///
/// Das Ergebnis wird bei [`finish`](Self::finish) in den Sink geschrieben.
pub struct Encoder<W: Write> {
    session: Session,
    config: EncoderConfig,
    sink: W,
    /// Gesamter Stream, bei Channel-Modi nur der Structure Channel.
    writer: BitWriter,
    /// Nur bei PreCompression und Compression.
    block: Option<Block>,
    scope: Scope,
}

impl<W: Write> Encoder<W> {
    /// Erstellt den Encoder und schreibt den Header (Spec 5).
    ///
    /// # Errors
    ///
    /// Ungültige Kombination aus `config` und den Grammar-Optionen des Caches.
    pub fn new(cache: Arc<GrammarCache>, config: EncoderConfig, sink: W) -> Result<Self> {
        config.validate(cache.options())?;
        let alignment = config.stream.alignment();

        let mut header = ExiHeader::default();
        if config.include_cookie {
            header = header.with_cookie();
        }
        if config.include_options {
            header = header.with_options(HeaderOptions { grammar: *cache.options(), stream: config.stream });
        }
        let mut writer = BitWriter::new();
        header::encode(&mut writer, &header, alignment);

        let block = if alignment.uses_channels() {
            Some(Block::new(writer.take_bytes(), alignment))
        } else {
            None
        };
        log::debug!(
            "encoder: {alignment:?}, schema-informed={}, strict={}",
            cache.is_schema_informed(),
            cache.options().strict()
        );
        Ok(Self { session: Session::new(cache, config.stream), config, sink, writer, block, scope: Scope::default() })
    }

    /// Encodiert ein Event.
    ///
    /// # Errors
    ///
    /// - [`Error::StrictViolation`] wenn im Strict-Modus keine Production passt
    /// - [`Error::OrderingViolation`] für Events ohne Production im aktuellen Zustand
    /// - [`Error::InvalidValue`] für nicht typisierbare Werte im Strict-Modus
    pub fn encode_event(&mut self, event: &ExiEvent) -> Result<()> {
        if self.session.is_finished() {
            return Err(Error::ordering_violation("no further event", event.kind()));
        }
        self.scope.track(event);
        if !self.fidelity_enabled(event) {
            log::trace!("dropping {} (fidelity option off)", event.kind());
            return Ok(());
        }
        log::trace!("encode {} in {}", event.kind(), self.session.state_label());

        match event {
            ExiEvent::StartDocument => self.start_document()?,
            ExiEvent::EndDocument => self.end_document()?,
            ExiEvent::StartElement(q) => self.start_element(q)?,
            ExiEvent::EndElement => self.end_element()?,
            ExiEvent::Attribute(at) => self.attribute(&at.qname, &at.value)?,
            ExiEvent::TypeCast(q) => self.type_cast(q)?,
            ExiEvent::Nil(nil) => self.nil(*nil)?,
            ExiEvent::Characters(text) => self.characters(text)?,
            ExiEvent::NamespaceDeclaration(ns) => self.namespace(ns)?,
            ExiEvent::SelfContained => self.self_contained()?,
            ExiEvent::Comment(_)
            | ExiEvent::ProcessingInstruction(_)
            | ExiEvent::DocType(_)
            | ExiEvent::EntityReference(_) => self.misc(event)?,
        }
        self.maybe_flush_block()
    }

    /// Encodiert alle Events und liefert den Sink.
    pub fn encode(mut self, events: impl IntoIterator<Item = ExiEvent>) -> Result<W> {
        for event in events {
            self.encode_event(&event)?;
        }
        self.finish()
    }

    /// Schreibt den Stream in den Sink. Das Dokument muss mit ED beendet sein.
    pub fn finish(mut self) -> Result<W> {
        if !self.session.is_finished() {
            return Err(Error::ordering_violation("ED", "end of input"));
        }
        let bytes = match self.block.take() {
            Some(block) => block.into_bytes(),
            None => std::mem::take(&mut self.writer).into_vec(),
        };
        self.sink.write_all(&bytes)?;
        self.sink.flush()?;
        Ok(self.sink)
    }

    /// CM, PI, DT, ER und NS nur mit der passenden Fidelity-Option (Spec 6.3).
    fn fidelity_enabled(&self, event: &ExiEvent) -> bool {
        let p = self.session.options().preserve();
        match event {
            ExiEvent::Comment(_) => p.comments,
            ExiEvent::ProcessingInstruction(_) => p.pis,
            ExiEvent::DocType(_) | ExiEvent::EntityReference(_) => p.dtd,
            ExiEvent::NamespaceDeclaration(_) => p.prefixes,
            _ => true,
        }
    }

    /// Erster Event Type der aktuellen Liste, der `pred` erfüllt.
    fn find(&self, pred: impl Fn(&EventType) -> bool) -> Result<Option<EventType>> {
        let list = self.session.events()?;
        Ok(list.iter().find(|t| pred(t)).cloned())
    }

    /// Fehler für ein Event ohne Production.
    fn no_production(&self, reason: ViolationReason, found: String) -> Error {
        if self.session.options().strict() {
            Error::strict_violation(reason, found)
        } else {
            Error::ordering_violation(self.session.state_label(), found)
        }
    }

    fn write_code(&mut self, et: &EventType) -> Result<()> {
        let list = self.session.events()?;
        log::trace!("code {} for {}", et.code, et.item.label());
        event_code::encode(&mut self.writer, &et.code, list.layout(), self.session.aligned())
    }

    /// Schreibt den Code eines Events ohne Inhalt und schaltet weiter.
    fn plain(&mut self, item: ItemType, reason: ViolationReason) -> Result<()> {
        let et = self
            .find(|t| t.item == item)?
            .ok_or_else(|| self.no_production(reason, item.label()))?;
        self.write_code(&et)?;
        self.session.advance(&et, None)
    }

    fn start_document(&mut self) -> Result<()> {
        self.plain(ItemType::StartDocument, ViolationReason::UnexpectedEvent)
    }

    fn end_document(&mut self) -> Result<()> {
        let et = self
            .find(|t| t.item == ItemType::EndDocument)?
            .ok_or_else(|| self.no_production(ViolationReason::UnexpectedEvent, "ED".into()))?;
        self.write_code(&et)?;
        self.session.end_document()?;
        if let Some(block) = self.block.as_mut() {
            block.flush(&mut self.writer, &mut self.session)?;
        }
        Ok(())
    }

    fn start_element(&mut self, q: &QName) -> Result<()> {
        let et = self
            .find(|t| match &t.item {
                ItemType::StartElement(n) => n == q,
                ItemType::StartElementNs(uri) => *uri == q.uri,
                ItemType::StartElementGeneric => {
                    self.session.production(t.index).is_none_or(|p| p.allows(&q.uri))
                }
                _ => false,
            })?
            .ok_or_else(|| self.no_production(ViolationReason::UnexpectedElement, format!("SE({q})")))?;
        self.write_code(&et)?;
        self.write_qname_content(&et.item, q);
        self.session.start_element(&et, q)
    }

    fn end_element(&mut self) -> Result<()> {
        let mut et = self.session.events()?.generic_end_element().cloned();
        if et.is_none() && self.empty_characters()? {
            et = self.session.events()?.generic_end_element().cloned();
        }
        let et = et.ok_or_else(|| self.no_production(ViolationReason::UnexpectedEndElement, "EE".into()))?;
        self.write_code(&et)?;
        self.session.end_element(&et)?;

        if self.session.fragment_open() {
            // ED des SC-Fragments, danach Byte-Grenze (Spec 8.5.4.4.1)
            self.plain(ItemType::EndDocument, ViolationReason::UnexpectedEvent)?;
            self.writer.align_to_byte();
            self.session.leave_fragment()?;
        }
        Ok(())
    }

    /// SC: Code, Padding, dann SD und SE des Elements im neuen Fragment.
    fn self_contained(&mut self) -> Result<()> {
        if !self.session.options().self_contained() {
            return Err(Error::invalid_options("SC event without selfContained"));
        }
        self.plain(ItemType::SelfContained, ViolationReason::UnexpectedEvent)?;
        self.writer.align_to_byte();
        let qname = self.session.element_qname()?;
        self.session.enter_fragment()?;
        self.plain(ItemType::StartDocument, ViolationReason::UnexpectedEvent)?;
        self.start_element(&qname)
    }

    fn maybe_flush_block(&mut self) -> Result<()> {
        if let Some(block) = self.block.as_mut()
            && block.is_full(self.config.stream.block_size())
        {
            block.flush(&mut self.writer, &mut self.session)?;
        }
        Ok(())
    }
}

/// Encodiert eine Event-Sequenz in einen Byte-Vektor.
///
/// # Errors
///
/// Siehe [`Encoder::new`] und [`Encoder::encode_event`].
pub fn encode(cache: Arc<GrammarCache>, config: EncoderConfig, events: &[ExiEvent]) -> Result<Vec<u8>> {
    Encoder::new(cache, config, Vec::new())?.encode(events.iter().cloned())
}
