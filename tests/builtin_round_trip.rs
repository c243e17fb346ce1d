//! Schemalose Round-Trips: Built-in Grammars, Lernen, Fidelity, SC.
//!
//! Jeder Test läuft über die Alignments, die für seine Optionen gültig sind.

use std::sync::Arc;

use exi_grammar::decoder::{DecoderConfig, decode};
use exi_grammar::encoder::{EncoderConfig, encode};
use exi_grammar::error::Error;
use exi_grammar::event::ExiEvent;
use exi_grammar::grammar::GrammarCache;
use exi_grammar::options::{Alignment, GrammarOptions, Preserve, StreamOptions};
use exi_grammar::xml;

// ============================================================================
// Hilfsfunktionen
// ============================================================================

const ALIGNMENTS: [Alignment; 4] = Alignment::ALL;

fn schemaless(options: GrammarOptions) -> Arc<GrammarCache> {
    Arc::new(GrammarCache::schemaless(options).unwrap())
}

fn parse(xml_text: &str) -> Vec<ExiEvent> {
    xml::parse_events(xml_text).unwrap_or_else(|e| panic!("XML-Fehler: {e}"))
}

fn without_ns(events: Vec<ExiEvent>) -> Vec<ExiEvent> {
    events.into_iter().filter(|e| !matches!(e, ExiEvent::NamespaceDeclaration(_))).collect()
}

fn encode_with(cache: &Arc<GrammarCache>, alignment: Alignment, events: &[ExiEvent]) -> Vec<u8> {
    let stream = StreamOptions::default().with_alignment(alignment);
    encode(Arc::clone(cache), EncoderConfig::default().with_stream(stream), events)
        .unwrap_or_else(|e| panic!("Encode-Fehler ({alignment:?}): {e}"))
}

fn round_trip(cache: &Arc<GrammarCache>, alignment: Alignment, events: &[ExiEvent]) -> Vec<ExiEvent> {
    let bytes = encode_with(cache, alignment, events);
    let stream = StreamOptions::default().with_alignment(alignment);
    decode(Arc::clone(cache), DecoderConfig::with_stream(stream), &bytes)
        .unwrap_or_else(|e| panic!("Decode-Fehler ({alignment:?}): {e}"))
}

// ============================================================================
// Built-in Grammars
// ============================================================================

#[test]
fn einfaches_dokument() {
    let cache = schemaless(GrammarOptions::default());
    let events = without_ns(parse(
        r#"<bestellung xmlns="urn:shop" nr="17"><posten menge="2">Apfel</posten><posten menge="1">Birne</posten><notiz/></bestellung>"#,
    ));
    for alignment in ALIGNMENTS {
        assert_eq!(round_trip(&cache, alignment, &events), events, "{alignment:?}");
    }
}

#[test]
fn gemischter_inhalt_und_referenzen() {
    let cache = schemaless(GrammarOptions::default());
    let events = parse("<p>Text <b>fett</b> &amp; mehr &#x41;<i/>Ende</p>");
    assert!(events.contains(&ExiEvent::characters(" & mehr A")));
    for alignment in ALIGNMENTS {
        assert_eq!(round_trip(&cache, alignment, &events), events, "{alignment:?}");
    }
}

// Wiederholte Elemente laufen nach dem Lernen über Tier 1
#[test]
fn gelernte_productions_sind_billiger() {
    let cache = schemaless(GrammarOptions::default());
    let doc = |n: usize| parse(&format!("<r>{}</r>", "<x/>".repeat(n)));
    for alignment in ALIGNMENTS {
        for n in 1..=5 {
            assert_eq!(round_trip(&cache, alignment, &doc(n)), doc(n), "{alignment:?}, {n}");
        }
    }
    let size = |n| encode_with(&cache, Alignment::ByteAlignment, &doc(n)).len();
    // erstes x in StartTagContent, zweites in ElementContent, danach gelernt
    let learned = size(4) - size(3);
    assert_eq!(learned, size(5) - size(4));
    assert!(learned < size(2) - size(1));
}

#[test]
fn string_table_treffer() {
    let cache = schemaless(GrammarOptions::default());
    let once = parse("<r><a>ein recht langer Wert</a></r>");
    let twice = parse("<r><a>ein recht langer Wert</a><a>ein recht langer Wert</a></r>");
    let a = encode_with(&cache, Alignment::ByteAlignment, &once);
    let b = encode_with(&cache, Alignment::ByteAlignment, &twice);
    // Wiederholung als Compact ID statt Literal
    assert!(b.len() - a.len() < "ein recht langer Wert".len());
    for alignment in ALIGNMENTS {
        assert_eq!(round_trip(&cache, alignment, &twice), twice, "{alignment:?}");
    }
}

// Werte über valueMaxLength kommen nicht in die Tabelle
#[test]
fn value_max_length() {
    let cache = schemaless(GrammarOptions::default());
    let events = parse("<r><a>lang genug</a><a>lang genug</a><a>kurz</a><a>kurz</a></r>");
    for alignment in ALIGNMENTS {
        let stream = StreamOptions::default()
            .with_alignment(alignment)
            .with_value_max_length(5)
            .with_value_partition_capacity(8);
        let bytes = encode(Arc::clone(&cache), EncoderConfig::default().with_stream(stream), &events).unwrap();
        let decoded = decode(Arc::clone(&cache), DecoderConfig::with_stream(stream), &bytes).unwrap();
        assert_eq!(decoded, events, "{alignment:?}");
    }
}

// ============================================================================
// Fidelity
// ============================================================================

#[test]
fn kommentare_und_pis() {
    let preserve = Preserve { comments: true, pis: true, ..Preserve::default() };
    let cache = schemaless(GrammarOptions::default().with_preserve(preserve));
    let events = parse("<!-- vorne --><?style typ=\"a\"?><r><!--innen--><k/><?ziel daten?></r><!-- hinten -->");
    assert!(events.iter().any(|e| matches!(e, ExiEvent::ProcessingInstruction(_))));
    for alignment in ALIGNMENTS {
        assert_eq!(round_trip(&cache, alignment, &events), events, "{alignment:?}");
    }
}

#[test]
fn doctype_und_entity_referenzen() {
    let preserve = Preserve { dtd: true, ..Preserve::default() };
    let cache = schemaless(GrammarOptions::default().with_preserve(preserve));
    let events = parse(r#"<!DOCTYPE r SYSTEM "r.dtd"><r>vor &eigen; nach</r>"#);
    assert!(events.contains(&ExiEvent::EntityReference("eigen".into())));
    for alignment in ALIGNMENTS {
        assert_eq!(round_trip(&cache, alignment, &events), events, "{alignment:?}");
    }
}

fn prefixes(events: &[ExiEvent]) -> Vec<Option<String>> {
    events
        .iter()
        .filter_map(|e| match e {
            ExiEvent::StartElement(q) => Some(q.prefix.as_deref().map(str::to_owned)),
            ExiEvent::Attribute(at) => Some(at.qname.prefix.as_deref().map(str::to_owned)),
            _ => None,
        })
        .collect()
}

// QName-Vergleich ignoriert Prefixe, daher die eigene Liste
#[test]
fn prefixe_erhalten() {
    let preserve = Preserve { prefixes: true, ..Preserve::default() };
    let cache = schemaless(GrammarOptions::default().with_preserve(preserve));
    let events = parse(r#"<a:r xmlns:a="urn:a" xmlns:b="urn:b"><b:k a:x="1"/><a:k/></a:r>"#);
    let some = |p: &str| Some(p.to_owned());
    assert_eq!(prefixes(&events), vec![some("a"), some("b"), some("a"), some("a")]);
    for alignment in ALIGNMENTS {
        let decoded = round_trip(&cache, alignment, &events);
        assert_eq!(decoded, events, "{alignment:?}");
        assert_eq!(prefixes(&decoded), prefixes(&events), "{alignment:?}");
    }
}

// Element mit eigener Deklaration: Prefix kommt aus dem NS danach
#[test]
fn prefix_aus_eigener_deklaration() {
    let preserve = Preserve { prefixes: true, ..Preserve::default() };
    let cache = schemaless(GrammarOptions::default().with_preserve(preserve));
    let events = parse(r#"<r><x:e xmlns:x="urn:x"><x:f/></x:e><g xmlns="urn:g"/></r>"#);
    let some = |p: &str| Some(p.to_owned());
    assert_eq!(prefixes(&events), vec![None, some("x"), some("x"), None]);
    for alignment in ALIGNMENTS {
        let decoded = round_trip(&cache, alignment, &events);
        assert_eq!(decoded, events, "{alignment:?}");
        assert_eq!(prefixes(&decoded), prefixes(&events), "{alignment:?}");
    }
}

#[test]
fn fidelity_ohne_option_verworfen() {
    let cache = schemaless(GrammarOptions::default());
    let events = parse("<!--weg--><r><?pi weg?><k/></r>");
    let expected = parse("<r><k/></r>");
    for alignment in ALIGNMENTS {
        assert_eq!(round_trip(&cache, alignment, &events), expected, "{alignment:?}");
    }
}

// ============================================================================
// Self-Contained
// ============================================================================

fn self_contained_events() -> Vec<ExiEvent> {
    vec![
        ExiEvent::StartDocument,
        ExiEvent::start("", "r"),
        ExiEvent::start("", "teil"),
        ExiEvent::characters("wert"),
        ExiEvent::EndElement,
        ExiEvent::start("", "teil"),
        ExiEvent::SelfContained,
        ExiEvent::attribute("", "n", "2"),
        ExiEvent::characters("wert"),
        ExiEvent::start("", "innen"),
        ExiEvent::EndElement,
        ExiEvent::EndElement,
        ExiEvent::start("", "teil"),
        ExiEvent::characters("wert"),
        ExiEvent::EndElement,
        ExiEvent::EndElement,
        ExiEvent::EndDocument,
    ]
}

#[test]
fn self_contained_fragment() {
    let cache = schemaless(GrammarOptions::default().with_self_contained());
    let events = self_contained_events();
    for alignment in [Alignment::BitPacked, Alignment::ByteAlignment] {
        assert_eq!(round_trip(&cache, alignment, &events), events, "{alignment:?}");
    }
}

#[test]
fn self_contained_mit_kompression_abgelehnt() {
    let cache = schemaless(GrammarOptions::default().with_self_contained());
    let stream = StreamOptions::default().with_alignment(Alignment::PreCompression);
    let result = encode(cache, EncoderConfig::default().with_stream(stream), &self_contained_events());
    assert!(matches!(result, Err(Error::InvalidOptionCombination(_))));
}

// ============================================================================
// Header-Optionen
// ============================================================================

#[test]
fn decoder_liest_optionen_aus_header() {
    let preserve = Preserve { comments: true, ..Preserve::default() };
    let cache = schemaless(GrammarOptions::default().with_preserve(preserve));
    let events = parse("<r><!--c--><k>v</k></r>");
    for alignment in ALIGNMENTS {
        let stream = StreamOptions::default().with_alignment(alignment).with_block_size(3);
        let config = EncoderConfig::with_cookie().with_options().with_stream(stream);
        let bytes = encode(Arc::clone(&cache), config, &events).unwrap();
        assert_eq!(&bytes[..4], b"$EXI");
        let decoded = decode(Arc::clone(&cache), DecoderConfig::default(), &bytes).unwrap();
        assert_eq!(decoded, events, "{alignment:?}");
    }
}
