//! Schema-informed Round-Trips: XSD + XML → Encode → Decode → Events.
//!
//! Jeder Test läuft über alle 4 Alignments (bitpacked, bytealigned,
//! precompression, compression).

use std::sync::Arc;

use exi_grammar::decoder::{DecoderConfig, decode};
use exi_grammar::encoder::{EncoderConfig, encode};
use exi_grammar::error::{Error, ViolationReason};
use exi_grammar::event::ExiEvent;
use exi_grammar::grammar::GrammarCache;
use exi_grammar::options::{Alignment, GrammarOptions, StreamOptions};
use exi_grammar::qname::QName;
use exi_grammar::{xml, xsd};

// ============================================================================
// Hilfsfunktionen
// ============================================================================

const ALIGNMENTS: [Alignment; 4] = Alignment::ALL;

fn cache(xsd_text: &str, options: GrammarOptions) -> Arc<GrammarCache> {
    let corpus = xsd::load_schema(xsd_text).unwrap_or_else(|e| panic!("XSD-Fehler: {e}"));
    Arc::new(GrammarCache::new(Arc::new(corpus), options).unwrap())
}

/// Events ohne NS (ohne Prefix-Option verwirft der Encoder sie).
fn parse(xml_text: &str) -> Vec<ExiEvent> {
    xml::parse_events(xml_text)
        .unwrap_or_else(|e| panic!("XML-Fehler: {e}"))
        .into_iter()
        .filter(|e| !matches!(e, ExiEvent::NamespaceDeclaration(_)))
        .collect()
}

fn config(alignment: Alignment) -> (EncoderConfig, DecoderConfig) {
    let stream = StreamOptions::default().with_alignment(alignment);
    (EncoderConfig::default().with_stream(stream), DecoderConfig::with_stream(stream))
}

fn round_trip(cache: &Arc<GrammarCache>, alignment: Alignment, events: &[ExiEvent]) -> Vec<ExiEvent> {
    let (enc, dec) = config(alignment);
    let bytes = encode(Arc::clone(cache), enc, events)
        .unwrap_or_else(|e| panic!("Encode-Fehler ({alignment:?}): {e}"));
    decode(Arc::clone(cache), dec, &bytes).unwrap_or_else(|e| panic!("Decode-Fehler ({alignment:?}): {e}"))
}

fn assert_round_trip(cache: &Arc<GrammarCache>, events: &[ExiEvent]) {
    for alignment in ALIGNMENTS {
        assert_eq!(round_trip(cache, alignment, events), events, "{alignment:?}");
    }
}

fn strict_error(cache: &Arc<GrammarCache>, events: &[ExiEvent]) -> Error {
    encode(Arc::clone(cache), EncoderConfig::default(), events).unwrap_err()
}

// ============================================================================
// End-to-End: A/AB/AC/AD/AE
// ============================================================================

const NESTED: &str = r#"
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="A">
    <xs:complexType>
      <xs:sequence>
        <xs:sequence>
          <xs:element name="AB"><xs:complexType/></xs:element>
          <xs:element name="AC" minOccurs="0" maxOccurs="2"><xs:complexType/></xs:element>
        </xs:sequence>
        <xs:element name="AD"><xs:complexType/></xs:element>
        <xs:element name="AE" minOccurs="0"><xs:complexType/></xs:element>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

#[test]
fn end_to_end_verschachtelte_sequenz() {
    for options in [GrammarOptions::default(), GrammarOptions::default().with_strict()] {
        let cache = cache(NESTED, options);
        let events = parse("<A><AB/><AC/><AC/><AD/><AE/></A>");
        let mut expected = vec![ExiEvent::StartDocument, ExiEvent::start("", "A")];
        for name in ["AB", "AC", "AC", "AD", "AE"] {
            expected.extend([ExiEvent::start("", name), ExiEvent::EndElement]);
        }
        expected.extend([ExiEvent::EndElement, ExiEvent::EndDocument]);
        assert_eq!(events, expected);
        assert_eq!(events.len(), 14);
        assert_round_trip(&cache, &events);
    }
}

#[test]
fn end_to_end_dritter_ac_nur_lenient() {
    let events = parse("<A><AB/><AC/><AC/><AC/><AD/></A>");
    assert_round_trip(&cache(NESTED, GrammarOptions::default()), &events);
    let err = strict_error(&cache(NESTED, GrammarOptions::default().with_strict()), &events);
    assert_eq!(err.violation_reason(), Some(ViolationReason::UnexpectedElement));
}

#[test]
fn end_to_end_fehlendes_pflichtelement() {
    let events = parse("<A><AB/></A>");
    let err = strict_error(&cache(NESTED, GrammarOptions::default().with_strict()), &events);
    assert_eq!(err.violation_reason(), Some(ViolationReason::UnexpectedEndElement));
    // Tier-2 EE im Default-Modus
    assert_round_trip(&cache(NESTED, GrammarOptions::default()), &events);
}

// ============================================================================
// All-Gruppe
// ============================================================================

const ALL_GROUP: &str = r#"
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="C">
    <xs:complexType>
      <xs:all>
        <xs:element name="AB"><xs:complexType/></xs:element>
        <xs:element name="AC" minOccurs="0"><xs:complexType/></xs:element>
      </xs:all>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

#[test]
fn all_gruppe_umgekehrte_reihenfolge() {
    for options in [GrammarOptions::default(), GrammarOptions::default().with_strict()] {
        let cache = cache(ALL_GROUP, options);
        assert_round_trip(&cache, &parse("<C><AC/><AB/></C>"));
        assert_round_trip(&cache, &parse("<C><AB/></C>"));

        // SE(AB) ist Index 0 nach AC
        let c = cache.element_grammar(&QName::local("C")).unwrap();
        let g = cache.grammar(c);
        let ac = g.events.position(|i| i.label() == "SE(AC)").unwrap();
        let after_ac = cache.grammar(g.productions[ac].next.unwrap());
        assert_eq!(after_ac.events.item(0).unwrap().item.label(), "SE(AB)");
        assert!(after_ac.events.iter().filter(|t| t.is_declared()).all(|t| t.item.label() != "EE"));
    }
}

// {AB, AC(0..2)}: AC vor AB, danach nur noch SE(AB) deklariert
const ALL_GROUP_AC_ZWEIMAL: &str = r#"
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="C">
    <xs:complexType>
      <xs:all>
        <xs:element name="AB"><xs:complexType/></xs:element>
        <xs:element name="AC" minOccurs="0" maxOccurs="2"><xs:complexType/></xs:element>
      </xs:all>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

#[test]
fn all_gruppe_ac_bis_zweimal() {
    let events = parse("<C><AC/><AB/></C>");
    assert_eq!(events.len(), 8);
    for options in [GrammarOptions::default(), GrammarOptions::default().with_strict()] {
        let cache = cache(ALL_GROUP_AC_ZWEIMAL, options);
        assert_round_trip(&cache, &events);

        let c = cache.element_grammar(&QName::local("C")).unwrap();
        let g = cache.grammar(c);
        let ac = g.events.position(|i| i.label() == "SE(AC)").unwrap();
        let after_ac = cache.grammar(g.productions[ac].next.unwrap());
        let declared: Vec<String> =
            after_ac.events.iter().filter(|t| t.is_declared()).map(|t| t.item.label()).collect();
        assert_eq!(declared, ["SE(AB)"]);
        assert_eq!(after_ac.events.item(0).unwrap().item.label(), "SE(AB)");
    }
}

#[test]
fn all_gruppe_ohne_pflichtelement_strict() {
    let cache = cache(ALL_GROUP, GrammarOptions::default().with_strict());
    let err = strict_error(&cache, &parse("<C><AC/></C>"));
    assert_eq!(err.violation_reason(), Some(ViolationReason::UnexpectedEndElement));
}

// ============================================================================
// Wildcards
// ============================================================================

const WILDCARDS: &str = r###"
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           targetNamespace="urn:t" elementFormDefault="qualified">
  <xs:element name="W">
    <xs:complexType>
      <xs:sequence>
        <xs:any namespace="##other" processContents="lax"/>
        <xs:any namespace="##local ##targetNamespace" processContents="lax"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"###;

#[test]
fn wildcard_other_dann_local() {
    let cache = cache(WILDCARDS, GrammarOptions::default().with_strict());
    let events = parse(r#"<t:W xmlns:t="urn:t" xmlns:x="urn:x"><x:a/><b/></t:W>"#);
    assert_round_trip(&cache, &events);
}

#[test]
fn zweites_other_faellt_auf_se_stern() {
    let events = parse(r#"<t:W xmlns:t="urn:t" xmlns:x="urn:x"><x:a/><x:b/></t:W>"#);
    let strict = cache(WILDCARDS, GrammarOptions::default().with_strict());
    assert_eq!(strict_error(&strict, &events).violation_reason(), Some(ViolationReason::UnexpectedElement));
    assert_round_trip(&cache(WILDCARDS, GrammarOptions::default()), &events);
}

// ============================================================================
// xsi:nil und xsi:type
// ============================================================================

const TYPES: &str = r#"
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:complexType name="Base">
    <xs:sequence>
      <xs:element name="b" type="xs:string"/>
    </xs:sequence>
  </xs:complexType>
  <xs:complexType name="Derived">
    <xs:complexContent>
      <xs:extension base="Base">
        <xs:sequence>
          <xs:element name="d" type="xs:int"/>
        </xs:sequence>
        <xs:attribute name="flag" type="xs:boolean"/>
      </xs:extension>
    </xs:complexContent>
  </xs:complexType>
  <xs:element name="R">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="E" type="Base" maxOccurs="unbounded"/>
        <xs:element name="N" type="xs:int" minOccurs="0" nillable="true"/>
        <xs:element name="P" type="xs:int" minOccurs="0"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

const XSI: &str = r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#;

#[test]
fn xsi_type_auf_abgeleiteten_typ() {
    let events = parse(&format!(
        r#"<R {XSI}><E><b>eins</b></E><E xsi:type="Derived" flag="true"><b>zwei</b><d>2</d></E></R>"#
    ));
    assert!(events.contains(&ExiEvent::TypeCast(QName::local("Derived"))));
    for options in [GrammarOptions::default(), GrammarOptions::default().with_strict()] {
        assert_round_trip(&cache(TYPES, options), &events);
    }
}

#[test]
fn xsi_type_unbekannt_strict() {
    let events = parse(&format!(r#"<R {XSI}><E xsi:type="Nope"><b>x</b></E></R>"#));
    let strict = cache(TYPES, GrammarOptions::default().with_strict());
    assert_eq!(strict_error(&strict, &events).violation_reason(), Some(ViolationReason::UnexpectedTypeCast));
}

#[test]
fn nil_auf_nillable_element() {
    let events = parse(&format!(r#"<R {XSI}><E><b/></E><N xsi:nil="true"/></R>"#));
    assert!(events.contains(&ExiEvent::Nil(true)));
    for options in [GrammarOptions::default(), GrammarOptions::default().with_strict()] {
        assert_round_trip(&cache(TYPES, options), &events);
    }
}

// Nil auf nicht-nillable Element: Default akzeptiert, Strict nicht
#[test]
fn lenient_nil() {
    let events = parse(&format!(r#"<R {XSI}><E><b/></E><P xsi:nil="true"/></R>"#));
    assert_round_trip(&cache(TYPES, GrammarOptions::default()), &events);
    let strict = cache(TYPES, GrammarOptions::default().with_strict());
    assert_eq!(strict_error(&strict, &events).violation_reason(), Some(ViolationReason::UnexpectedAttribute));
}

// Leerer String-Inhalt: im Strict-Modus gibt es für b nur CH, kein EE
#[test]
fn strict_leeres_string_element() {
    let events = parse(&format!(r#"<R {XSI}><E><b/></E><E><b>x</b></E></R>"#));
    assert!(!events.iter().any(|e| matches!(e, ExiEvent::Characters(t) if t.is_empty())));
    for options in [GrammarOptions::default(), GrammarOptions::default().with_strict()] {
        assert_round_trip(&cache(TYPES, options), &events);
    }
}

// "" ist kein xs:int, also bleibt das EE ohne Production
#[test]
fn strict_leeres_int_element() {
    let events = parse(&format!(r#"<R {XSI}><E><b/></E><N/></R>"#));
    let strict = cache(TYPES, GrammarOptions::default().with_strict());
    assert_eq!(strict_error(&strict, &events).violation_reason(), Some(ViolationReason::UnexpectedEndElement));
    assert_round_trip(&cache(TYPES, GrammarOptions::default()), &events);
}

#[test]
fn nil_false_behaelt_inhalt() {
    let events = parse(&format!(r#"<R {XSI}><E><b/></E><N xsi:nil="false">5</N></R>"#));
    assert_round_trip(&cache(TYPES, GrammarOptions::default().with_strict()), &events);
}

// ============================================================================
// Typisierte Werte und Whitespace
// ============================================================================

const VALUES: &str = r#"
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="V">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="i" type="xs:long" maxOccurs="unbounded"/>
        <xs:element name="u" type="xs:unsignedShort" minOccurs="0"/>
        <xs:element name="f" type="xs:boolean" minOccurs="0"/>
        <xs:element name="h" type="xs:hexBinary" minOccurs="0"/>
        <xs:element name="s" type="xs:string" minOccurs="0"/>
      </xs:sequence>
      <xs:attribute name="code" type="xs:base64Binary"/>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

#[test]
fn typisierte_werte() {
    let events = parse(
        r#"<V code="AQID"><i>-9223372036854775808</i><i>0</i><u>65535</u><f>true</f><h>0AFF</h><s> mit Leerzeichen </s></V>"#,
    );
    for options in [GrammarOptions::default(), GrammarOptions::default().with_strict()] {
        assert_round_trip(&cache(VALUES, options), &events);
    }
}

#[test]
fn untypisierter_fallback_lenient() {
    let events = parse("<V><i>keine Zahl</i></V>");
    assert_round_trip(&cache(VALUES, GrammarOptions::default()), &events);
    let strict = cache(VALUES, GrammarOptions::default().with_strict());
    assert!(matches!(strict_error(&strict, &events), Error::InvalidValue(_)));
}

#[test]
fn whitespace_zwischen_elementen() {
    let cache = cache(VALUES, GrammarOptions::default());
    let padded = parse("<V>\n  <i>1</i>\n  <s>x</s>\n</V>");
    let compact = parse("<V><i>1</i><s>x</s></V>");
    for alignment in ALIGNMENTS {
        assert_eq!(round_trip(&cache, alignment, &padded), compact, "{alignment:?}");

        let stream = StreamOptions::default().with_alignment(alignment);
        let enc = EncoderConfig::default().with_stream(stream).with_whitespace();
        let bytes = encode(Arc::clone(&cache), enc, &padded).unwrap();
        let decoded = decode(Arc::clone(&cache), DecoderConfig::with_stream(stream), &bytes).unwrap();
        assert_eq!(decoded, padded, "{alignment:?}");
    }
}

// ============================================================================
// Kompression und Determinismus
// ============================================================================

fn many_values(n: usize, modulus: usize) -> Vec<ExiEvent> {
    let mut xml_text = String::from("<V>");
    for i in 0..n {
        xml_text.push_str(&format!("<i>{}</i>", i * 31 % modulus));
    }
    xml_text.push_str("<s>ende</s></V>");
    parse(&xml_text)
}

// Mehr als 100 Values im Block: eigener Deflate-Stream pro Channel
#[test]
fn viele_werte_mit_bloecken() {
    let cache = cache(VALUES, GrammarOptions::default());
    let events = many_values(250, 1000);
    for block_size in [1_000_000, 64] {
        for alignment in [Alignment::PreCompression, Alignment::Compression] {
            let stream = StreamOptions::default().with_alignment(alignment).with_block_size(block_size);
            let bytes = encode(Arc::clone(&cache), EncoderConfig::default().with_stream(stream), &events).unwrap();
            let decoded = decode(Arc::clone(&cache), DecoderConfig::with_stream(stream), &bytes).unwrap();
            assert_eq!(decoded, events, "{alignment:?}, block {block_size}");
        }
    }
}

#[test]
fn kompression_ist_kleiner() {
    let cache = cache(VALUES, GrammarOptions::default());
    let events = many_values(500, 4);
    let (plain, _) = config(Alignment::BitPacked);
    let (deflated, _) = config(Alignment::Compression);
    let a = encode(Arc::clone(&cache), plain, &events).unwrap();
    let b = encode(cache, deflated, &events).unwrap();
    assert!(b.len() < a.len(), "{} vs {}", b.len(), a.len());
}

#[test]
fn deterministische_ausgabe() {
    let events = many_values(20, 1000);
    let first = cache(VALUES, GrammarOptions::default());
    let second = cache(VALUES, GrammarOptions::default());
    for alignment in ALIGNMENTS {
        let (enc, _) = config(alignment);
        let a = encode(Arc::clone(&first), enc, &events).unwrap();
        let b = encode(Arc::clone(&second), enc, &events).unwrap();
        assert_eq!(a, b, "{alignment:?}");
    }
    let v = QName::local("V");
    let a = first.grammar(first.element_grammar(&v).unwrap());
    let b = second.grammar(second.element_grammar(&v).unwrap());
    assert_eq!(a.events, b.events);
    assert_eq!(first.list_count(), second.list_count());
}

// Ein Cache, mehrere Threads
#[test]
fn cache_wird_geteilt() {
    let cache = cache(VALUES, GrammarOptions::default());
    let events = Arc::new(many_values(30, 1000));
    let handles: Vec<_> = ALIGNMENTS
        .into_iter()
        .map(|alignment| {
            let cache = Arc::clone(&cache);
            let events = Arc::clone(&events);
            std::thread::spawn(move || round_trip(&cache, alignment, &events) == *events)
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
}
