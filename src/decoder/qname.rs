use std::sync::Arc;

use crate::Result;
use crate::bitstream::BitReader;
use crate::event_type::ItemType;
use crate::qname::QName;

use super::context::Context;

impl Context {
    /// Prefix lesen, sofern Prefixes erhalten werden (Spec 7.1.7).
    fn read_prefix(&mut self, r: &mut BitReader, uri_id: usize) -> Result<Option<Arc<str>>> {
        if !self.session.options().preserve().prefixes {
            return Ok(None);
        }
        // leerer Prefix heißt: kein Prefix
        let prefix = self.session.table.decode_qname_prefix(r, uri_id)?;
        Ok(prefix.filter(|p| !p.is_empty()))
    }

    fn implied_uri(&mut self, uri: &str) -> usize {
        match self.session.table.lookup_uri(uri) {
            Some(id) => id,
            None => self.session.table.add_uri(uri),
        }
    }

    /// QName eines SE/AT Events: implizit aus dem Event Type oder aus dem Stream.
    pub(super) fn read_qname_content(&mut self, r: &mut BitReader, item: &ItemType) -> Result<QName> {
        let (uri_id, mut q) = match item {
            ItemType::StartElement(q) | ItemType::Attribute(q) | ItemType::AttributeUntyped(q) => {
                (self.implied_uri(&q.uri), q.clone())
            }
            ItemType::StartElementNs(uri) | ItemType::AttributeNs(uri) => {
                let uri_id = self.implied_uri(uri);
                let local = self.session.table.decode_local_name(r, uri_id)?;
                (uri_id, QName::new(Arc::clone(uri), local))
            }
            _ => self.session.table.decode_qname(r)?,
        };
        q.prefix = self.read_prefix(r, uri_id)?;
        Ok(q)
    }

    /// QName als Value (Zieltyp von xsi:type).
    pub(super) fn read_qname_value(&mut self, r: &mut BitReader) -> Result<QName> {
        let (uri_id, mut q) = self.session.table.decode_qname(r)?;
        q.prefix = self.read_prefix(r, uri_id)?;
        Ok(q)
    }
}
