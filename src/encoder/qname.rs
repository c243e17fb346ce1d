//! QName-Inhalte, NS und die seltenen Fidelity-Events (Spec 7.1.7, 8.4.3).

use std::io::Write;
use std::sync::Arc;

use crate::boolean;
use crate::error::{Result, ViolationReason};
use crate::event::{ExiEvent, NsContent};
use crate::event_type::ItemType;
use crate::qname::{QName, XML_NS};

use super::Encoder;

/// Prefix-Bindungen der offenen Elemente aus ihren NS-Events.
///
/// Wird auch ohne Prefix-Option geführt: `xsi:type`-Werte brauchen sie.
#[derive(Debug, Default)]
pub(super) struct Scope {
    frames: Vec<Vec<(Arc<str>, Arc<str>)>>,
}

impl Scope {
    pub(super) fn track(&mut self, event: &ExiEvent) {
        match event {
            ExiEvent::StartElement(_) => self.frames.push(Vec::new()),
            ExiEvent::EndElement => {
                self.frames.pop();
            }
            ExiEvent::NamespaceDeclaration(ns) => {
                if let Some(frame) = self.frames.last_mut() {
                    frame.push((Arc::clone(&ns.prefix), Arc::clone(&ns.uri)));
                }
            }
            _ => {}
        }
    }

    fn lookup(&self, prefix: &str) -> Option<&Arc<str>> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| &**p == prefix)
            .map(|(_, uri)| uri)
    }

    /// Lexikalischer QName `p:local` aus einem Attributwert.
    ///
    /// Ohne Prefix gilt der Default-Namespace. Ungebundene Prefixe
    /// ergeben einen Namen ohne Namespace.
    pub(super) fn resolve(&self, value: &str) -> QName {
        let value = value.trim();
        let (prefix, local) = value.split_once(':').unwrap_or(("", value));
        match self.lookup(prefix) {
            Some(uri) if prefix.is_empty() => QName::new(Arc::clone(uri), local),
            Some(uri) => QName::with_prefix(Arc::clone(uri), local, prefix),
            None if prefix == "xml" => QName::with_prefix(XML_NS, local, prefix),
            None => {
                if !prefix.is_empty() {
                    log::debug!("unbound prefix '{prefix}' in '{value}'");
                }
                QName::local(local)
            }
        }
    }
}

impl<W: Write> Encoder<W> {
    /// URI-ID ohne Stream-Ausgabe, bei Bedarf neu angelegt.
    fn implied_uri(&mut self, uri: &str) -> usize {
        match self.session.table.lookup_uri(uri) {
            Some(id) => id,
            None => self.session.table.add_uri(uri),
        }
    }

    /// Prefix bei erhaltenen Prefixes (Spec 7.1.7).
    fn write_prefix(&mut self, uri_id: usize, q: &QName) {
        if self.session.options().preserve().prefixes {
            let prefix = q.prefix.as_deref().unwrap_or("");
            self.session.table.encode_qname_prefix(&mut self.writer, uri_id, prefix);
        }
    }

    /// QName-Anteil eines SE/AT Events.
    ///
    /// - SE(q)/AT(q): implizit, nur der Prefix
    /// - SE(uri:*)/AT(uri:*): Local-Name und Prefix
    /// - SE(*)/AT(*): vollständiger QName
    pub(super) fn write_qname_content(&mut self, item: &ItemType, q: &QName) {
        let uri_id = match item {
            ItemType::StartElementGeneric | ItemType::AttributeGeneric => {
                self.session.table.encode_qname(&mut self.writer, q)
            }
            ItemType::StartElementNs(uri) | ItemType::AttributeNs(uri) => {
                let id = self.implied_uri(uri);
                self.session.table.encode_local_name(&mut self.writer, id, &q.local_name);
                id
            }
            _ => self.implied_uri(&q.uri),
        };
        self.write_prefix(uri_id, q);
    }

    /// QName als Value, z.B. der Zieltyp von xsi:type.
    pub(super) fn write_qname_value(&mut self, q: &QName) {
        let uri_id = self.session.table.encode_qname(&mut self.writer, q);
        self.write_prefix(uri_id, q);
    }

    /// NS: URI, Prefix und local-element-ns Flag (Spec 8.4.2).
    pub(super) fn namespace(&mut self, ns: &NsContent) -> Result<()> {
        let et = self
            .find(|t| t.item == ItemType::NamespaceDeclaration)?
            .ok_or_else(|| self.no_production(ViolationReason::UnexpectedEvent, format!("NS({})", ns.uri)))?;
        self.write_code(&et)?;
        let uri_id = self.session.table.encode_uri(&mut self.writer, &ns.uri);
        self.session.table.encode_prefix(&mut self.writer, uri_id, &ns.prefix);
        boolean::encode(&mut self.writer, ns.local_element_ns, self.session.aligned());
        self.session.advance(&et, None)
    }

    /// CM, PI, DT, ER: Code plus String-Inhalte.
    pub(super) fn misc(&mut self, event: &ExiEvent) -> Result<()> {
        let item = match event {
            ExiEvent::Comment(_) => ItemType::Comment,
            ExiEvent::ProcessingInstruction(_) => ItemType::ProcessingInstruction,
            ExiEvent::DocType(_) => ItemType::DocType,
            _ => ItemType::EntityReference,
        };
        let et = self
            .find(|t| t.item == item)?
            .ok_or_else(|| self.no_production(ViolationReason::UnexpectedEvent, item.label()))?;
        self.write_code(&et)?;
        match event {
            ExiEvent::Comment(text) => self.write_strings(&[&**text]),
            ExiEvent::ProcessingInstruction(pi) => self.write_strings(&[&*pi.target, &*pi.data]),
            ExiEvent::DocType(dt) => self.write_strings(&[&*dt.name, &*dt.public, &*dt.system, &*dt.text]),
            ExiEvent::EntityReference(name) => self.write_strings(&[&**name]),
            _ => {}
        }
        self.session.advance(&et, None)
    }
}
