//! XML-Text zu EXI Events (quick-xml).
//!
//! Der Reader liefert alle Konstrukte des Dokuments: NS, CM, PI, DT, ER und
//! Whitespace. Was davon im Stream landet, entscheidet der Encoder anhand
//! der Fidelity-Optionen.
//!
//! Pro Start-Tag ist die Reihenfolge: SE, NS, TypeCast (`xsi:type`),
//! Nil (`xsi:nil`), danach die übrigen Attribute sortiert nach local-name
//! und URI (Spec 8.5.4.1.3). Text, CDATA und aufgelöste Referenzen werden zu
//! einem CH zusammengefasst.
//!
//! # Beispiel
//!
//! ```
//! use exi_grammar::event::ExiEvent;
//! use exi_grammar::xml::parse_events;
//!
//! let events = parse_events(r#"<a y="2" x="1">text</a>"#).unwrap();
//! assert_eq!(events[1], ExiEvent::start("", "a"));
//! assert_eq!(events[2], ExiEvent::attribute("", "x", "1"));
//! assert_eq!(events[4], ExiEvent::characters("text"));
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use memchr::memchr;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{QName as XmlQName, ResolveResult};
use quick_xml::reader::NsReader;

use crate::boolean;
use crate::event::{AtContent, DtContent, ExiEvent, NsContent, PiContent};
use crate::qname::QName;
use crate::{Error, Result};

/// Parst ein XML-Dokument zu einer Event-Sequenz (SD ... ED).
///
/// # Errors
///
/// [`Error::XmlParseError`] bei nicht wohlgeformtem XML, unbekannten
/// Prefixes oder Text außerhalb des Wurzelelements.
pub fn parse_events(xml: &str) -> Result<Vec<ExiEvent>> {
    // XML 1.0 Sec. 2.11
    let xml = normalize_line_endings(xml);
    let mut reader = NsReader::from_str(&xml);
    reader.config_mut().trim_text(false);

    let mut out = Output { events: vec![ExiEvent::StartDocument], text: None };
    let mut depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                out.flush_text();
                start_tag(&reader, &e, &mut out.events)?;
                depth += 1;
            }
            Ok(Event::Empty(e)) => {
                out.flush_text();
                start_tag(&reader, &e, &mut out.events)?;
                out.events.push(ExiEvent::EndElement);
            }
            Ok(Event::End(_)) => {
                out.flush_text();
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| Error::XmlParseError("end tag without start tag".to_string()))?;
                out.events.push(ExiEvent::EndElement);
            }
            Ok(Event::Text(e)) => {
                let raw = utf8(&e)?;
                let text = quick_xml::escape::unescape(raw).map_err(|er| Error::XmlParseError(er.to_string()))?;
                out.text(depth, &text)?;
            }
            Ok(Event::CData(e)) => {
                let text = utf8(&e)?;
                out.text(depth, text)?;
            }
            Ok(Event::GeneralRef(e)) => {
                let name = utf8(e.as_ref())?;
                if let Some(ch) = name.strip_prefix('#').and_then(resolve_char_reference) {
                    out.text(depth, ch.encode_utf8(&mut [0; 4]))?;
                } else if let Some(resolved) = resolve_predefined_entity(name) {
                    out.text(depth, resolved)?;
                } else {
                    out.flush_text();
                    out.events.push(ExiEvent::EntityReference(name.into()));
                }
            }
            Ok(Event::Comment(e)) => {
                out.flush_text();
                out.events.push(ExiEvent::Comment(utf8(e.as_ref())?.into()));
            }
            Ok(Event::PI(e)) => {
                out.flush_text();
                let target = utf8(e.target())?;
                // S zwischen Target und Daten gehört nicht zu den Daten
                let data = utf8(e.content())?.trim_start();
                out.events.push(ExiEvent::ProcessingInstruction(PiContent {
                    target: target.into(),
                    data: data.into(),
                }));
            }
            Ok(Event::DocType(e)) => {
                out.flush_text();
                out.events.push(ExiEvent::DocType(parse_doctype(utf8(e.as_ref())?)));
            }
            Ok(Event::Decl(_)) => {}
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlParseError(format!(
                    "at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
        }
    }

    if depth != 0 {
        return Err(Error::XmlParseError(format!("{depth} unclosed element(s)")));
    }
    out.flush_text();
    out.events.push(ExiEvent::EndDocument);
    log::debug!("parsed {} events", out.events.len());
    Ok(out.events)
}

struct Output {
    events: Vec<ExiEvent>,
    /// Text bis zum nächsten Nicht-CH-Event.
    text: Option<String>,
}

impl Output {
    fn text(&mut self, depth: usize, text: &str) -> Result<()> {
        if depth == 0 {
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(Error::XmlParseError("character data outside root element".to_string()));
        }
        if !text.is_empty() {
            self.text.get_or_insert_with(String::new).push_str(text);
        }
        Ok(())
    }

    fn flush_text(&mut self) {
        if let Some(text) = self.text.take() {
            self.events.push(ExiEvent::Characters(text.into()));
        }
    }
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| Error::XmlParseError(e.to_string()))
}

fn start_tag(reader: &NsReader<&[u8]>, e: &BytesStart, events: &mut Vec<ExiEvent>) -> Result<()> {
    let element = resolve(reader.resolver().resolve_element(e.name()), e.name())?;
    events.push(ExiEvent::StartElement(element.clone()));

    let mut namespaces = Vec::new();
    let mut type_cast = None;
    let mut nil = None;
    let mut attributes = Vec::new();

    for attr in e.attributes() {
        let attr = attr.map_err(|er| Error::XmlParseError(er.to_string()))?;
        let key = attr.key.as_ref();
        let value = unescape_attr(utf8(&attr.value)?);

        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            let prefix = utf8(key.get(6..).unwrap_or_default())?;
            let local_element_ns = element.prefix.as_deref().unwrap_or("") == prefix && *element.uri == *value;
            namespaces.push(ExiEvent::NamespaceDeclaration(NsContent {
                uri: value.into(),
                prefix: prefix.into(),
                local_element_ns,
            }));
            continue;
        }

        let qname = resolve(reader.resolver().resolve_attribute(attr.key), attr.key)?;
        if qname.is_xsi_type() {
            type_cast = Some(ExiEvent::TypeCast(type_name(reader, value.trim())?));
        } else if qname.is_xsi_nil()
            && let Some(b) = boolean::parse(&value)
        {
            nil = Some(ExiEvent::Nil(b));
        } else {
            attributes.push(AtContent { qname, value: value.into() });
        }
    }
    attributes.sort_by(|a, b| a.qname.cmp(&b.qname));

    events.extend(namespaces);
    events.extend(type_cast);
    events.extend(nil);
    events.extend(attributes.into_iter().map(ExiEvent::Attribute));
    Ok(())
}

fn resolve(result: (ResolveResult, quick_xml::name::LocalName), raw: XmlQName) -> Result<QName> {
    let (ns, local) = result;
    let uri: Arc<str> = match ns {
        ResolveResult::Bound(ns) => utf8(ns.as_ref())?.into(),
        ResolveResult::Unbound => "".into(),
        ResolveResult::Unknown(prefix) => {
            return Err(Error::XmlParseError(format!(
                "unknown namespace prefix '{}'",
                String::from_utf8_lossy(&prefix)
            )));
        }
    };
    let local = utf8(local.as_ref())?;
    Ok(match raw.prefix() {
        Some(prefix) => QName::with_prefix(uri, local, utf8(prefix.as_ref())?),
        None => QName::new(uri, local),
    })
}

/// Zielname von `xsi:type`: der Prefix im Wert wird wie bei Elementen aufgelöst.
fn type_name(reader: &NsReader<&[u8]>, value: &str) -> Result<QName> {
    let raw = XmlQName(value.as_bytes());
    resolve(reader.resolver().resolve_element(raw), raw)
}

/// Zeichen- und vordefinierte Referenzen in Attributwerten.
///
/// Unbekannte Entities bleiben als Text stehen.
fn unescape_attr(value: &str) -> Cow<'_, str> {
    let bytes = value.as_bytes();
    let Some(first) = memchr(b'&', bytes) else {
        return Cow::Borrowed(value);
    };
    let mut out = String::with_capacity(value.len());
    let mut pos = 0;
    let mut amp = first;
    loop {
        out.push_str(&value[pos..amp]);
        let Some(len) = memchr(b';', &bytes[amp + 1..]) else {
            out.push_str(&value[amp..]);
            return Cow::Owned(out);
        };
        let semi = amp + 1 + len;
        let name = &value[amp + 1..semi];
        match name.strip_prefix('#').and_then(resolve_char_reference) {
            Some(ch) => out.push(ch),
            None => match resolve_predefined_entity(name) {
                Some(s) => out.push_str(s),
                None => out.push_str(&value[amp..=semi]),
            },
        }
        pos = semi + 1;
        match memchr(b'&', &bytes[pos..]) {
            Some(rel) => amp = pos + rel,
            None => {
                out.push_str(&value[pos..]);
                return Cow::Owned(out);
            }
        }
    }
}

/// `49` oder `x31` (ohne `&#` und `;`).
fn resolve_char_reference(digits: &str) -> Option<char> {
    let code = match digits.strip_prefix('x') {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(code)
}

/// XML 1.0 Sec. 2.11: `\r\n` und `\r` werden zu `\n`.
fn normalize_line_endings(s: &str) -> Cow<'_, str> {
    if memchr(b'\r', s.as_bytes()).is_none() {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Zerlegt den DOCTYPE-Inhalt in Name, Public-ID, System-ID und internes Subset.
fn parse_doctype(raw: &str) -> DtContent {
    let trimmed = raw.trim();
    let name_end = trimmed
        .find(|c: char| c.is_whitespace() || c == '[')
        .unwrap_or(trimmed.len());
    let (name, rest) = trimmed.split_at(name_end);
    let mut rest = rest.trim_start();

    let mut public = "";
    let mut system = "";
    if let Some(after) = rest.strip_prefix("SYSTEM") {
        (system, rest) = quoted(after.trim_start());
    } else if let Some(after) = rest.strip_prefix("PUBLIC") {
        (public, rest) = quoted(after.trim_start());
        (system, rest) = quoted(rest.trim_start());
    }

    let text = rest
        .find('[')
        .and_then(|open| {
            let subset = &rest[open + 1..];
            subset.rfind(']').map(|close| subset[..close].trim())
        })
        .unwrap_or("");

    DtContent { name: name.into(), public: public.into(), system: system.into(), text: Arc::from(text) }
}

fn quoted(s: &str) -> (&str, &str) {
    let Some(quote) = s.chars().next().filter(|c| matches!(c, '"' | '\'')) else {
        return ("", s);
    };
    match s[1..].find(quote) {
        Some(end) => (&s[1..1 + end], &s[end + 2..]),
        None => ("", s),
    }
}
