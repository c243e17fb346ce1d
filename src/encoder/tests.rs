use super::*;
use crate::error::ViolationReason;
use crate::event::{NsContent, PiContent};
use crate::qname::XSD_NS;

use super::qname::Scope;
use crate::options::{Alignment, GrammarOptions, Preserve, StreamOptions};
use crate::xsd::load_schema;

const SCHEMA: &str = r#"
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:t="urn:t"
           targetNamespace="urn:t" elementFormDefault="qualified">
  <xs:element name="A">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="AB" type="xs:int"/>
        <xs:element name="AC" type="xs:string" minOccurs="0" nillable="true"/>
      </xs:sequence>
      <xs:attribute name="id" type="xs:unsignedInt"/>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

fn schema_cache(options: GrammarOptions) -> Arc<GrammarCache> {
    let corpus = load_schema(SCHEMA).unwrap();
    Arc::new(GrammarCache::new(Arc::new(corpus), options).unwrap())
}

fn schemaless() -> Arc<GrammarCache> {
    Arc::new(GrammarCache::schemaless(GrammarOptions::default()).unwrap())
}

fn doc(body: Vec<ExiEvent>) -> Vec<ExiEvent> {
    let mut events = vec![ExiEvent::StartDocument];
    events.extend(body);
    events.push(ExiEvent::EndDocument);
    events
}

fn a_document(ab: &str) -> Vec<ExiEvent> {
    doc(vec![
        ExiEvent::start("urn:t", "A"),
        ExiEvent::attribute("", "id", "7"),
        ExiEvent::start("urn:t", "AB"),
        ExiEvent::characters(ab),
        ExiEvent::EndElement,
        ExiEvent::EndElement,
    ])
}

// ============================================================================
// Header (Spec 5)
// ============================================================================

/// Distinguishing Bits 10, Presence 0, Version 0 0000.
#[test]
fn header_ohne_optionen() {
    let bytes = encode(schemaless(), EncoderConfig::default(), &doc(vec![
        ExiEvent::start("", "r"),
        ExiEvent::EndElement,
    ]))
    .unwrap();
    assert_eq!(bytes[0], 0x80);
}

#[test]
fn header_mit_cookie_und_optionen() {
    let config = EncoderConfig::with_cookie()
        .with_options()
        .with_stream(StreamOptions::default().with_alignment(Alignment::ByteAlignment));
    let bytes = encode(schemaless(), config, &doc(vec![ExiEvent::start("", "r"), ExiEvent::EndElement])).unwrap();
    assert_eq!(&bytes[..4], b"$EXI");
    assert_eq!(bytes[4], 0xA0);
}

#[test]
fn ungueltige_konfiguration() {
    let config = EncoderConfig::default().with_stream(StreamOptions::default().with_block_size(0));
    assert!(matches!(Encoder::new(schemaless(), config, Vec::new()), Err(Error::InvalidBlockSize)));
}

// ============================================================================
// Reihenfolge und Abschluss
// ============================================================================

#[test]
fn finish_ohne_ed() {
    let mut enc = Encoder::new(schemaless(), EncoderConfig::default(), Vec::new()).unwrap();
    enc.encode_event(&ExiEvent::StartDocument).unwrap();
    enc.encode_event(&ExiEvent::start("", "r")).unwrap();
    assert!(matches!(enc.finish(), Err(Error::OrderingViolation { .. })));
}

#[test]
fn event_nach_ed() {
    let mut enc = Encoder::new(schemaless(), EncoderConfig::default(), Vec::new()).unwrap();
    for event in doc(vec![ExiEvent::start("", "r"), ExiEvent::EndElement]) {
        enc.encode_event(&event).unwrap();
    }
    assert!(matches!(
        enc.encode_event(&ExiEvent::start("", "r")),
        Err(Error::OrderingViolation { .. })
    ));
}

#[test]
fn ee_ohne_offenes_element() {
    let result = encode(schemaless(), EncoderConfig::default(), &[ExiEvent::StartDocument, ExiEvent::EndElement]);
    assert!(matches!(result, Err(Error::OrderingViolation { .. })));
}

#[test]
fn ed_mit_offenem_element() {
    let result = encode(
        schemaless(),
        EncoderConfig::default(),
        &[ExiEvent::StartDocument, ExiEvent::start("", "r"), ExiEvent::EndDocument],
    );
    assert!(result.is_err());
}

#[test]
fn sc_ohne_option() {
    let result = encode(
        schemaless(),
        EncoderConfig::default(),
        &doc(vec![ExiEvent::start("", "r"), ExiEvent::SelfContained, ExiEvent::EndElement]),
    );
    assert!(matches!(result, Err(Error::InvalidOptionCombination(_))));
}

// ============================================================================
// Fidelity und Whitespace
// ============================================================================

#[test]
fn fidelity_events_ohne_option_verworfen() {
    let plain = doc(vec![ExiEvent::start("", "r"), ExiEvent::EndElement]);
    let with_misc = doc(vec![
        ExiEvent::Comment("c".into()),
        ExiEvent::start("", "r"),
        ExiEvent::ProcessingInstruction(PiContent { target: "t".into(), data: "d".into() }),
        ExiEvent::EndElement,
    ]);
    let a = encode(schemaless(), EncoderConfig::default(), &plain).unwrap();
    let b = encode(schemaless(), EncoderConfig::default(), &with_misc).unwrap();
    assert_eq!(a, b);
}

#[test]
fn kommentar_mit_option_kostet_bits() {
    let options = GrammarOptions::default().with_preserve(Preserve { comments: true, ..Preserve::default() });
    let cache = Arc::new(GrammarCache::schemaless(options).unwrap());
    let plain = doc(vec![ExiEvent::start("", "r"), ExiEvent::EndElement]);
    let commented = doc(vec![ExiEvent::start("", "r"), ExiEvent::Comment("hello".into()), ExiEvent::EndElement]);
    let a = encode(Arc::clone(&cache), EncoderConfig::default(), &plain).unwrap();
    let b = encode(cache, EncoderConfig::default(), &commented).unwrap();
    assert!(b.len() > a.len());
}

// Whitespace zwischen Elementen ohne deklarierten Text
#[test]
fn whitespace_in_element_only_verworfen() {
    let cache = schema_cache(GrammarOptions::default());
    let mut padded = a_document("42");
    padded.insert(3, ExiEvent::characters("\n  "));
    let a = encode(Arc::clone(&cache), EncoderConfig::default(), &a_document("42")).unwrap();
    let b = encode(Arc::clone(&cache), EncoderConfig::default(), &padded).unwrap();
    assert_eq!(a, b);

    let c = encode(cache, EncoderConfig::default().with_whitespace(), &padded).unwrap();
    assert_ne!(a, c);
}

// ============================================================================
// Schema-informed und Strict
// ============================================================================

#[test]
fn deterministisch() {
    let cache = schema_cache(GrammarOptions::default());
    for alignment in Alignment::ALL {
        let config = EncoderConfig::default().with_stream(StreamOptions::default().with_alignment(alignment));
        let a = encode(Arc::clone(&cache), config, &a_document("42")).unwrap();
        let b = encode(Arc::clone(&cache), config, &a_document("42")).unwrap();
        assert_eq!(a, b, "{alignment:?}");
    }
}

#[test]
fn strict_unbekanntes_element() {
    let cache = schema_cache(GrammarOptions::default().with_strict());
    let events = doc(vec![ExiEvent::start("urn:t", "A"), ExiEvent::start("urn:t", "Z")]);
    let err = encode(cache, EncoderConfig::default(), &events).unwrap_err();
    assert_eq!(err.violation_reason(), Some(ViolationReason::UnexpectedElement));
}

#[test]
fn strict_ungueltiger_wert() {
    let cache = schema_cache(GrammarOptions::default().with_strict());
    let err = encode(cache, EncoderConfig::default(), &a_document("abc")).unwrap_err();
    assert!(matches!(err, Error::InvalidValue(_)));
}

// Nicht-strict: untypisierter Fallback statt Fehler
#[test]
fn lenient_ungueltiger_wert() {
    let cache = schema_cache(GrammarOptions::default());
    assert!(encode(cache, EncoderConfig::default(), &a_document("abc")).is_ok());
}

// Deklariertes AT(id) mit ungültigem Wert: AT(id)[untyped] statt AT(*)
#[test]
fn ungueltiger_attributwert_schaltet_weiter() {
    let cache = schema_cache(GrammarOptions::default());
    let mut enc = Encoder::new(cache, EncoderConfig::default(), Vec::new()).unwrap();
    for event in [ExiEvent::StartDocument, ExiEvent::start("urn:t", "A"), ExiEvent::attribute("", "id", "nicht-zahl")] {
        enc.encode_event(&event).unwrap();
    }
    let id = QName::local("id");
    let list = enc.session.events().unwrap();
    assert!(!list.iter().any(|t| matches!(&t.item, ItemType::Attribute(n) | ItemType::AttributeUntyped(n) if *n == id)));
    assert!(list.iter().any(|t| t.item.label() == "SE({urn:t}AB)"));
}

// xsi:type als Attribut: Prefix über die NS-Events auflösen
#[test]
fn xsi_type_prefix_aufgeloest() {
    let scope_events = [
        ExiEvent::start("urn:t", "A"),
        ExiEvent::NamespaceDeclaration(NsContent { uri: "urn:t".into(), prefix: "t".into(), local_element_ns: true }),
        ExiEvent::NamespaceDeclaration(NsContent { uri: XSD_NS.into(), prefix: "xs".into(), local_element_ns: false }),
        ExiEvent::start("urn:t", "AB"),
        ExiEvent::NamespaceDeclaration(NsContent { uri: "urn:innen".into(), prefix: "xs".into(), local_element_ns: false }),
    ];
    let mut scope = Scope::default();
    for event in &scope_events {
        scope.track(event);
    }
    assert_eq!(scope.resolve("xs:int"), QName::new("urn:innen", "int"));
    assert_eq!(scope.resolve(" t:Typ "), QName::new("urn:t", "Typ"));
    assert_eq!(scope.resolve("frei"), QName::local("frei"));
    scope.track(&ExiEvent::EndElement);
    assert_eq!(scope.resolve("xs:int"), QName::new(XSD_NS, "int"));
    assert_eq!(scope.resolve("xs:int").prefix.as_deref(), Some("xs"));
}

#[test]
fn strict_nil_nur_wenn_nillable() {
    let cache = schema_cache(GrammarOptions::default().with_strict());
    let nilled_ab = doc(vec![ExiEvent::start("urn:t", "A"), ExiEvent::start("urn:t", "AB"), ExiEvent::Nil(true)]);
    let err = encode(Arc::clone(&cache), EncoderConfig::default(), &nilled_ab).unwrap_err();
    assert_eq!(err.violation_reason(), Some(ViolationReason::UnexpectedAttribute));

    let mut nilled_ac = a_document("1");
    let at = nilled_ac.len() - 2;
    nilled_ac.splice(at..at, [ExiEvent::start("urn:t", "AC"), ExiEvent::Nil(true), ExiEvent::EndElement]);
    assert!(encode(cache, EncoderConfig::default(), &nilled_ac).is_ok());
}

#[test]
fn strict_unbekannter_typ() {
    let cache = schema_cache(GrammarOptions::default().with_strict());
    let events = doc(vec![ExiEvent::start("urn:t", "A"), ExiEvent::TypeCast(QName::new("urn:t", "Nope"))]);
    let err = encode(cache, EncoderConfig::default(), &events).unwrap_err();
    assert_eq!(err.violation_reason(), Some(ViolationReason::UnexpectedTypeCast));
}

// ============================================================================
// Sink
// ============================================================================

struct Voll;

impl Write for Voll {
    fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::other("disk full"))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn sink_fehler_wird_gemeldet() {
    let enc = Encoder::new(schemaless(), EncoderConfig::default(), Voll).unwrap();
    let result = enc.encode(doc(vec![ExiEvent::start("", "r"), ExiEvent::EndElement]));
    assert!(matches!(result, Err(Error::IoError(_))));
}
