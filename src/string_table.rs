//! String Table (Spec 7.3, 7.3.1, 7.3.2, 7.3.3, Appendix D).
//!
//! EXI vergibt "compact identifiers" für Strings. Die Tabelle ist in
//! Partitionen aufgeteilt: URI, Prefix (pro URI), Local-Name (pro URI) und
//! Value (global + lokal pro QName).
//!
//! Die Bitbreite eines Compact Identifiers wird immer **vor** dem Einfügen
//! bestimmt, damit Encoder und Decoder identische Breiten verwenden.
//!
//! Lifecycle: eine StringTable pro EXI Stream. Self-contained Elemente
//! starten mit einer frischen Tabelle (Spec 8.5.4.4.1).

use std::sync::Arc;

use crate::bitstream::{BitReader, BitWriter};
use crate::n_bit_unsigned_integer::{self, bits_for};
use crate::options::StreamOptions;
use crate::qname::{QName, XML_NS, XSD_NS, XSI_NS};
use crate::schema::SchemaCorpus;
use crate::{Error, FastHashMap, Result, string, unsigned_integer};

/// Initiale Local-Names im xml-Namespace (Spec D.3).
const XML_LOCAL_NAMES: &[&str] = &["base", "id", "lang", "space"];
/// Initiale Local-Names im xsi-Namespace (Spec D.3).
const XSI_LOCAL_NAMES: &[&str] = &["nil", "type"];
/// Initiale Local-Names im XSD-Namespace für schema-informed Streams (Spec D.3).
const XSD_LOCAL_NAMES: &[&str] = &[
    "ENTITIES", "ENTITY", "ID", "IDREF", "IDREFS", "NCName", "NMTOKEN", "NMTOKENS",
    "NOTATION", "Name", "QName", "anySimpleType", "anyType", "anyURI", "base64Binary",
    "boolean", "byte", "date", "dateTime", "decimal", "double", "duration", "float",
    "gDay", "gMonth", "gMonthDay", "gYear", "gYearMonth", "hexBinary", "int", "integer",
    "language", "long", "negativeInteger", "nonNegativeInteger", "nonPositiveInteger",
    "normalizedString", "positiveInteger", "short", "string", "time", "token",
    "unsignedByte", "unsignedInt", "unsignedLong", "unsignedShort",
];

/// Partition für String→ID Mapping.
#[derive(Debug, Clone, Default)]
struct Partition {
    entries: Vec<Arc<str>>,
    lookup: FastHashMap<Arc<str>, usize>,
}

impl Partition {
    fn with_entries(values: &[&str]) -> Self {
        let mut partition = Self::default();
        for value in values {
            partition.add(value);
        }
        partition
    }

    fn lookup(&self, value: &str) -> Option<usize> {
        self.lookup.get(value).copied()
    }

    /// Fügt hinzu (idempotent) und liefert die Compact ID.
    fn add(&mut self, value: &str) -> usize {
        if let Some(existing) = self.lookup(value) {
            return existing;
        }
        let id = self.entries.len();
        let arc: Arc<str> = value.into();
        self.lookup.insert(Arc::clone(&arc), id);
        self.entries.push(arc);
        id
    }

    fn get(&self, id: usize) -> Option<&Arc<str>> {
        self.entries.get(id)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Lokale Value-Partition eines QNames. Verdrängte Einträge bleiben als
/// Lücke stehen, damit IDs und Bitbreiten stabil bleiben.
#[derive(Debug, Clone, Default)]
struct LocalValues {
    entries: Vec<Option<Arc<str>>>,
    lookup: FastHashMap<Arc<str>, usize>,
}

impl LocalValues {
    fn push(&mut self, value: Arc<str>) -> usize {
        let id = self.entries.len();
        self.lookup.insert(Arc::clone(&value), id);
        self.entries.push(Some(value));
        id
    }

    fn evict(&mut self, id: usize) {
        if let Some(value) = self.entries.get_mut(id).and_then(Option::take)
            && self.lookup.get(&value) == Some(&id)
        {
            self.lookup.remove(&value);
        }
    }
}

/// Eintrag der globalen Value-Partition mit Rückverweis auf die lokale ID.
#[derive(Debug, Clone)]
struct GlobalValue {
    value: Arc<str>,
    owner: QName,
    local_id: usize,
}

/// Per-Dokument String Table.
#[derive(Debug, Clone)]
pub struct StringTable {
    uris: Partition,
    prefixes: Vec<Partition>,
    local_names: Vec<Partition>,
    global_values: Vec<GlobalValue>,
    global_lookup: FastHashMap<Arc<str>, usize>,
    /// Nächster Slot für Wrap-Around bei voller Partition.
    next_global_slot: usize,
    local_values: FastHashMap<QName, LocalValues>,
    value_max_length: Option<u32>,
    value_partition_capacity: Option<u32>,
    aligned: bool,
}

impl StringTable {
    /// Erstellt die initial befüllte Tabelle (Spec 7.3.1, D.1 – D.3).
    ///
    /// Mit Schema werden zusätzlich der XSD-Namespace und alle
    /// Schema-Namespaces samt sortierten Local-Names vorbelegt.
    pub fn new(corpus: Option<&SchemaCorpus>, stream: &StreamOptions) -> Self {
        let mut table = Self {
            uris: Partition::with_entries(&["", XML_NS, XSI_NS]),
            prefixes: vec![
                Partition::with_entries(&[""]),
                Partition::with_entries(&["xml"]),
                Partition::with_entries(&["xsi"]),
            ],
            local_names: vec![
                Partition::default(),
                Partition::with_entries(XML_LOCAL_NAMES),
                Partition::with_entries(XSI_LOCAL_NAMES),
            ],
            global_values: Vec::new(),
            global_lookup: FastHashMap::default(),
            next_global_slot: 0,
            local_values: FastHashMap::default(),
            value_max_length: stream.value_max_length(),
            value_partition_capacity: stream.value_partition_capacity(),
            aligned: stream.alignment().is_byte_oriented(),
        };

        if let Some(corpus) = corpus {
            let xsd = table.add_uri(XSD_NS);
            for name in XSD_LOCAL_NAMES {
                table.add_local_name(xsd, name);
            }
            // schema_names() ist nach (URI, local-name) sortiert
            for name in corpus.schema_names() {
                let uri = table.add_uri(&name.uri);
                table.add_local_name(uri, &name.local_name);
            }
        }
        table
    }

    pub fn lookup_uri(&self, uri: &str) -> Option<usize> {
        self.uris.lookup(uri)
    }

    pub fn add_uri(&mut self, uri: &str) -> usize {
        let id = self.uris.add(uri);
        if id == self.prefixes.len() {
            self.prefixes.push(Partition::default());
            self.local_names.push(Partition::default());
        }
        id
    }

    pub fn uri_count(&self) -> usize {
        self.uris.len()
    }

    pub fn add_prefix(&mut self, uri_id: usize, prefix: &str) -> usize {
        self.prefixes[uri_id].add(prefix)
    }

    pub fn prefix_count(&self, uri_id: usize) -> usize {
        self.prefixes.get(uri_id).map_or(0, Partition::len)
    }

    pub fn add_local_name(&mut self, uri_id: usize, local_name: &str) -> usize {
        self.local_names[uri_id].add(local_name)
    }

    pub fn lookup_local_name(&self, uri_id: usize, local_name: &str) -> Option<usize> {
        self.local_names.get(uri_id)?.lookup(local_name)
    }

    pub fn local_name_count(&self, uri_id: usize) -> usize {
        self.local_names.get(uri_id).map_or(0, Partition::len)
    }

    pub fn global_value_count(&self) -> usize {
        self.global_values.len()
    }

    pub fn local_value_count(&self, qname: &QName) -> usize {
        self.local_values.get(qname).map_or(0, |l| l.entries.len())
    }

    /// Fügt einen Value hinzu, sofern Länge und Kapazität es erlauben (Spec 7.3.3).
    ///
    /// Bei voller globaler Partition wird der älteste Eintrag verdrängt
    /// (global und lokal).
    pub fn add_value(&mut self, qname: &QName, value: &str) {
        let len = value.chars().count();
        if len == 0 || self.value_max_length.is_some_and(|max| len > max as usize) {
            return;
        }
        let capacity = self.value_partition_capacity.map(|c| c as usize);
        if capacity == Some(0) || self.global_lookup.contains_key(value) {
            return;
        }

        let arc: Arc<str> = value.into();
        let local_id = self.local_values.entry(qname.expanded()).or_default().push(Arc::clone(&arc));

        let entry = GlobalValue { value: Arc::clone(&arc), owner: qname.expanded(), local_id };
        match capacity {
            Some(cap) if self.global_values.len() >= cap => {
                let slot = self.next_global_slot;
                let evicted = std::mem::replace(&mut self.global_values[slot], entry);
                self.global_lookup.remove(&evicted.value);
                if let Some(owner) = self.local_values.get_mut(&evicted.owner) {
                    owner.evict(evicted.local_id);
                }
                self.global_lookup.insert(arc, slot);
                self.next_global_slot = (slot + 1) % cap;
            }
            _ => {
                self.global_lookup.insert(arc, self.global_values.len());
                self.global_values.push(entry);
            }
        }
    }

    fn nbit(&self, writer: &mut BitWriter, value: usize, count: usize) {
        n_bit_unsigned_integer::encode(writer, value as u64, bits_for(count), self.aligned);
    }

    fn read_nbit(&self, reader: &mut BitReader, count: usize) -> Result<usize> {
        Ok(n_bit_unsigned_integer::decode(reader, bits_for(count), self.aligned)? as usize)
    }

    // ------------------------------------------------------------------
    // Encoding (Spec 7.3.2, 7.3.3)
    // ------------------------------------------------------------------

    /// URI: Hit = ID+1, Miss = 0 + String (Spec 7.3.2). Liefert die URI-ID.
    pub fn encode_uri(&mut self, writer: &mut BitWriter, uri: &str) -> usize {
        let count = self.uris.len() + 1;
        match self.uris.lookup(uri) {
            Some(id) => {
                self.nbit(writer, id + 1, count);
                id
            }
            None => {
                self.nbit(writer, 0, count);
                string::encode(writer, uri);
                self.add_uri(uri)
            }
        }
    }

    /// Prefix: wie URI, Partition pro URI (Spec 7.3.2).
    pub fn encode_prefix(&mut self, writer: &mut BitWriter, uri_id: usize, prefix: &str) {
        let count = self.prefixes[uri_id].len() + 1;
        match self.prefixes[uri_id].lookup(prefix) {
            Some(id) => self.nbit(writer, id + 1, count),
            None => {
                self.nbit(writer, 0, count);
                string::encode(writer, prefix);
                self.prefixes[uri_id].add(prefix);
            }
        }
    }

    /// Local-Name: Hit = uint 0 + n-bit ID, Miss = uint (len+1) + Zeichen (Spec 7.3.3).
    pub fn encode_local_name(&mut self, writer: &mut BitWriter, uri_id: usize, local_name: &str) {
        match self.local_names[uri_id].lookup(local_name) {
            Some(id) => {
                unsigned_integer::encode(writer, 0);
                self.nbit(writer, id, self.local_names[uri_id].len());
            }
            None => {
                string::encode_with_offset(writer, local_name, 1);
                self.local_names[uri_id].add(local_name);
            }
        }
    }

    /// QName als URI + Local-Name (Spec 7.1.7). Liefert die URI-ID.
    pub fn encode_qname(&mut self, writer: &mut BitWriter, qname: &QName) -> usize {
        let uri_id = self.encode_uri(writer, &qname.uri);
        self.encode_local_name(writer, uri_id, &qname.local_name);
        uri_id
    }

    /// Value: lokaler Hit = 0, globaler Hit = 1, Miss = len+2 (Spec 7.3.3).
    pub fn encode_value(&mut self, writer: &mut BitWriter, qname: &QName, value: &str) {
        if let Some(local) = self.local_values.get(qname)
            && let Some(&id) = local.lookup.get(value)
        {
            unsigned_integer::encode(writer, 0);
            self.nbit(writer, id, local.entries.len());
            return;
        }
        if let Some(&id) = self.global_lookup.get(value) {
            unsigned_integer::encode(writer, 1);
            self.nbit(writer, id, self.global_values.len());
            return;
        }
        string::encode_with_offset(writer, value, 2);
        self.add_value(qname, value);
    }

    /// Prefix eines QNames bei erhaltenen Prefixes (Spec 7.1.7).
    ///
    /// Nur Compact ID ohne Miss-Fall; ein unbekannter Prefix wird als 0
    /// geschrieben. Ohne Einträge in der Partition entfällt der Prefix.
    pub fn encode_qname_prefix(&self, writer: &mut BitWriter, uri_id: usize, prefix: &str) {
        let count = self.prefix_count(uri_id);
        if count == 0 {
            return;
        }
        let id = self.prefixes[uri_id].lookup(prefix).unwrap_or(0);
        self.nbit(writer, id, count);
    }

    // ------------------------------------------------------------------
    // Decoding
    // ------------------------------------------------------------------

    /// Gegenstück zu [`encode_uri`](Self::encode_uri): liefert (ID, URI).
    pub fn decode_uri(&mut self, reader: &mut BitReader) -> Result<(usize, Arc<str>)> {
        let code = self.read_nbit(reader, self.uris.len() + 1)?;
        if code == 0 {
            let uri = string::decode(reader)?;
            let id = self.add_uri(&uri);
            return Ok((id, Arc::clone(&self.uris.entries[id])));
        }
        let id = code - 1;
        let uri = self.uris.get(id).ok_or(Error::InvalidCompactId(code as u64))?;
        Ok((id, Arc::clone(uri)))
    }

    pub fn decode_prefix(&mut self, reader: &mut BitReader, uri_id: usize) -> Result<Arc<str>> {
        let code = self.read_nbit(reader, self.prefixes[uri_id].len() + 1)?;
        if code == 0 {
            let prefix = string::decode(reader)?;
            let id = self.prefixes[uri_id].add(&prefix);
            return Ok(Arc::clone(&self.prefixes[uri_id].entries[id]));
        }
        self.prefixes[uri_id]
            .get(code - 1)
            .cloned()
            .ok_or(Error::InvalidCompactId(code as u64))
    }

    pub fn decode_local_name(&mut self, reader: &mut BitReader, uri_id: usize) -> Result<Arc<str>> {
        let len = unsigned_integer::decode(reader)?;
        if len == 0 {
            let id = self.read_nbit(reader, self.local_names[uri_id].len())?;
            return self.local_names[uri_id]
                .get(id)
                .cloned()
                .ok_or(Error::InvalidCompactId(id as u64));
        }
        let name = string::decode_chars(reader, len - 1)?;
        let id = self.local_names[uri_id].add(&name);
        Ok(Arc::clone(&self.local_names[uri_id].entries[id]))
    }

    pub fn decode_qname(&mut self, reader: &mut BitReader) -> Result<(usize, QName)> {
        let (uri_id, uri) = self.decode_uri(reader)?;
        let local_name = self.decode_local_name(reader, uri_id)?;
        Ok((uri_id, QName::new(uri, local_name)))
    }

    /// Gegenstück zu [`encode_qname_prefix`](Self::encode_qname_prefix).
    pub fn decode_qname_prefix(&self, reader: &mut BitReader, uri_id: usize) -> Result<Option<Arc<str>>> {
        let count = self.prefix_count(uri_id);
        if count == 0 {
            return Ok(None);
        }
        let id = self.read_nbit(reader, count)?;
        self.prefixes[uri_id]
            .get(id)
            .cloned()
            .map(Some)
            .ok_or(Error::InvalidCompactId(id as u64))
    }

    pub fn decode_value(&mut self, reader: &mut BitReader, qname: &QName) -> Result<Arc<str>> {
        match unsigned_integer::decode(reader)? {
            0 => {
                let count = self.local_value_count(qname);
                let id = self.read_nbit(reader, count)?;
                self.local_values
                    .get(qname)
                    .and_then(|l| l.entries.get(id))
                    .and_then(Clone::clone)
                    .ok_or(Error::InvalidCompactId(id as u64))
            }
            1 => {
                let id = self.read_nbit(reader, self.global_values.len())?;
                self.global_values
                    .get(id)
                    .map(|g| Arc::clone(&g.value))
                    .ok_or(Error::InvalidCompactId(id as u64))
            }
            len => {
                let value: Arc<str> = string::decode_chars(reader, len - 2)?.into();
                self.add_value(qname, &value);
                Ok(value)
            }
        }
    }
}
