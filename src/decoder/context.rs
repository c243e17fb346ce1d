use std::sync::Arc;

use crate::bitstream::BitReader;
use crate::event::{AtContent, DtContent, ExiEvent, NsContent, PiContent};
use crate::event_code;
use crate::event_type::{EventType, ItemType};
use crate::qname::QName;
use crate::schema::Datatype;
use crate::session::Session;
use crate::{Error, Result, boolean, string};

/// Ein Value, dessen Inhalt erst aus seinem Channel gelesen wird (Spec 9.2).
#[derive(Debug, Clone)]
pub(super) struct Pending {
    /// Index des Events im Block.
    pub(super) event: usize,
    pub(super) key: QName,
    pub(super) datatype: Option<Datatype>,
}

/// Decodier-Zustand: Session plus zurückgestellte Values im Channel-Modus.
#[derive(Debug)]
pub(super) struct Context {
    pub(super) session: Session,
    pub(super) defer: bool,
    pub(super) pending: Vec<Pending>,
    /// CH aus Zuständen ohne EE-Production; leer stehen sie nur für das EE.
    pub(super) implied: Vec<usize>,
    /// Index des nächsten Events im aktuellen Block.
    pub(super) position: usize,
}

impl Context {
    pub(super) fn new(session: Session, defer: bool) -> Self {
        Self { session, defer, pending: Vec::new(), implied: Vec::new(), position: 0 }
    }

    /// Liest Code und Inhalt eines Events und schaltet weiter.
    pub(super) fn decode_event(&mut self, r: &mut BitReader) -> Result<ExiEvent> {
        let et = self.read_code(r)?;
        log::trace!("decode {} ({}) in {}", et.item.label(), et.code, self.session.state_label());

        let event = match et.item.clone() {
            ItemType::StartDocument => {
                self.session.advance(&et, None)?;
                ExiEvent::StartDocument
            }
            ItemType::EndDocument => {
                self.session.end_document()?;
                ExiEvent::EndDocument
            }
            ItemType::StartElement(_) | ItemType::StartElementNs(_) | ItemType::StartElementGeneric => {
                let q = self.read_qname_content(r, &et.item)?;
                self.session.start_element(&et, &q)?;
                ExiEvent::StartElement(q)
            }
            ItemType::EndElement => {
                self.session.end_element(&et)?;
                if self.session.fragment_open() {
                    self.end_fragment(r)?;
                }
                ExiEvent::EndElement
            }
            ItemType::Attribute(_)
            | ItemType::AttributeUntyped(_)
            | ItemType::AttributeNs(_)
            | ItemType::AttributeGeneric => self.attribute(r, &et)?,
            ItemType::Characters | ItemType::CharactersUntyped => {
                if self.session.events()?.generic_end_element().is_none() {
                    self.implied.push(self.position);
                }
                let key = self.session.element_qname()?;
                let datatype = self.session.typed_datatype(&et);
                let value = self.read_value(r, &key, datatype)?;
                self.session.advance(&et, None)?;
                ExiEvent::Characters(value)
            }
            ItemType::TypeCast => {
                let type_name = self.read_qname_value(r)?;
                self.session.advance(&et, Some(&QName::xsi_type()))?;
                self.session.type_cast(&type_name)?;
                ExiEvent::TypeCast(type_name)
            }
            ItemType::Nil => {
                let nil = boolean::decode(r, self.session.aligned())?;
                self.session.nil(&et, nil)?;
                ExiEvent::Nil(nil)
            }
            ItemType::NamespaceDeclaration => {
                let (uri_id, uri) = self.session.table.decode_uri(r)?;
                let prefix = self.session.table.decode_prefix(r, uri_id)?;
                let local_element_ns = boolean::decode(r, self.session.aligned())?;
                self.session.advance(&et, None)?;
                ExiEvent::NamespaceDeclaration(NsContent { uri, prefix, local_element_ns })
            }
            ItemType::SelfContained => {
                self.session.advance(&et, None)?;
                self.start_fragment(r)?;
                ExiEvent::SelfContained
            }
            ItemType::Comment => {
                let text = read_string(r)?;
                self.session.advance(&et, None)?;
                ExiEvent::Comment(text)
            }
            ItemType::ProcessingInstruction => {
                let target = read_string(r)?;
                let data = read_string(r)?;
                self.session.advance(&et, None)?;
                ExiEvent::ProcessingInstruction(PiContent { target, data })
            }
            ItemType::DocType => {
                let name = read_string(r)?;
                let public = read_string(r)?;
                let system = read_string(r)?;
                let text = read_string(r)?;
                self.session.advance(&et, None)?;
                ExiEvent::DocType(DtContent { name, public, system, text })
            }
            ItemType::EntityReference => {
                let name = read_string(r)?;
                self.session.advance(&et, None)?;
                ExiEvent::EntityReference(name)
            }
        };
        Ok(event)
    }

    /// BitPacked und ByteAlignment: ein Event, mit Prefixen auch die NS
    /// nach einem SE, damit dessen Prefix feststeht.
    pub(super) fn decode_direct(&mut self, r: &mut BitReader) -> Result<Vec<ExiEvent>> {
        let prefixes = self.session.options().preserve().prefixes;
        let mut events = Vec::new();
        loop {
            self.position = events.len();
            let event = self.decode_event(r)?;
            let more = prefixes
                && matches!(
                    event,
                    ExiEvent::StartElement(_) | ExiEvent::NamespaceDeclaration(_) | ExiEvent::SelfContained
                );
            events.push(event);
            if !more {
                return Ok(self.finish(events));
            }
        }
    }

    /// Letzter Schritt für decodierte Events mit allen Values.
    ///
    /// - NS mit `local_element_ns` setzt den Prefix des SE davor
    /// - leere CH aus Zuständen ohne EE fallen weg
    pub(super) fn finish(&mut self, mut events: Vec<ExiEvent>) -> Vec<ExiEvent> {
        let mut element = None;
        let mut own_prefixes = Vec::new();
        for (i, event) in events.iter().enumerate() {
            match event {
                ExiEvent::StartElement(_) => element = Some(i),
                ExiEvent::NamespaceDeclaration(ns) if ns.local_element_ns => {
                    if let Some(e) = element {
                        own_prefixes.push((e, (!ns.prefix.is_empty()).then(|| Arc::clone(&ns.prefix))));
                    }
                }
                _ => {}
            }
        }
        for (e, prefix) in own_prefixes {
            if let Some(ExiEvent::StartElement(q)) = events.get_mut(e) {
                q.prefix = prefix;
            }
        }

        let implied = std::mem::take(&mut self.implied);
        if implied.is_empty() {
            return events;
        }
        events
            .into_iter()
            .enumerate()
            .filter(|(i, e)| !(implied.contains(i) && matches!(e, ExiEvent::Characters(text) if text.is_empty())))
            .map(|(_, e)| e)
            .collect()
    }

    fn read_code(&self, r: &mut BitReader) -> Result<EventType> {
        let list = self.session.events()?;
        let code = event_code::decode(r, list.layout(), self.session.aligned())?;
        list.by_code(&code)
            .cloned()
            .ok_or_else(|| Error::invalid_event_code(code.to_string(), self.session.state_label()))
    }

    /// Liest einen Code und erwartet `item`.
    fn expect(&mut self, r: &mut BitReader, item: ItemType) -> Result<EventType> {
        let et = self.read_code(r)?;
        if et.item != item {
            return Err(Error::ordering_violation(item.label(), et.item.label()));
        }
        Ok(et)
    }

    fn attribute(&mut self, r: &mut BitReader, et: &EventType) -> Result<ExiEvent> {
        let q = self.read_qname_content(r, &et.item)?;
        let generic = et.item == ItemType::AttributeGeneric;

        if generic && q.is_xsi_type() {
            let type_name = self.read_qname_value(r)?;
            self.session.advance(et, Some(&q))?;
            self.session.type_cast(&type_name)?;
            return Ok(ExiEvent::TypeCast(type_name));
        }

        if generic && q.is_xsi_nil() {
            // Structure Channel, wie im Encoder
            let value = self.session.table.decode_value(r, &q)?;
            self.session.advance(et, Some(&q))?;
            return Ok(match boolean::parse(&value) {
                Some(b) => ExiEvent::Nil(b),
                None => ExiEvent::Attribute(AtContent { qname: q, value }),
            });
        }

        let datatype = self.session.typed_datatype(et);
        let value = self.read_value(r, &q, datatype)?;
        self.session.advance(et, Some(&q))?;
        Ok(ExiEvent::Attribute(AtContent { qname: q, value }))
    }

    /// Liest einen Value oder merkt ihn für seinen Channel vor.
    fn read_value(
        &mut self,
        r: &mut BitReader,
        key: &QName,
        datatype: Option<Datatype>,
    ) -> Result<Arc<str>> {
        if self.defer {
            self.pending.push(Pending { event: self.position, key: key.expanded(), datatype });
            return Ok(Arc::from(""));
        }
        self.value_now(r, key, datatype)
    }

    pub(super) fn value_now(&mut self, r: &mut BitReader, key: &QName, datatype: Option<Datatype>) -> Result<Arc<str>> {
        match datatype {
            Some(dt) => crate::typed_value::decode(r, dt, self.session.aligned()),
            None => self.session.table.decode_value(r, key),
        }
    }

    /// Nach SC: Padding, SD und SE im Fragment (Spec 8.5.4.4.1).
    fn start_fragment(&mut self, r: &mut BitReader) -> Result<()> {
        r.align_to_byte();
        self.session.enter_fragment()?;
        let sd = self.expect(r, ItemType::StartDocument)?;
        self.session.advance(&sd, None)?;
        match self.decode_event(r)? {
            ExiEvent::StartElement(q) => {
                log::trace!("self-contained fragment for {q}");
                Ok(())
            }
            other => Err(Error::ordering_violation("SE in fragment", other.kind())),
        }
    }

    /// Nach dem EE des Fragment-Elements: ED, Padding, alter Zustand.
    fn end_fragment(&mut self, r: &mut BitReader) -> Result<()> {
        let ed = self.expect(r, ItemType::EndDocument)?;
        log::trace!("fragment ED ({})", ed.code);
        r.align_to_byte();
        self.session.leave_fragment()
    }
}

fn read_string(r: &mut BitReader) -> Result<Arc<str>> {
    Ok(string::decode(r)?.into())
}
